// ImpactWatch — Motion Fusion
//
// Per-sensor pipelines: offset calibration, gravity compensation and peak
// tracking for accelerometers, bias removal and rotation integration for
// gyroscopes. Every processed sample is prepended to the channel's stream.

use std::time::Instant;

use crate::buffer::VectorStream;
use crate::events::{Magnitude, Sample3};
use crate::fusion::rotation::RotationEstimator;

// ---------------------------------------------------------------------------
// Peak tracking
// ---------------------------------------------------------------------------

/// Running maximum by magnitude. Only an explicit `reset` clears it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeakTracker<T: Magnitude> {
    sample: T,
    magnitude: f64,
}

impl<T: Magnitude> PeakTracker<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `sample` became the new peak.
    pub fn update(&mut self, sample: T) -> bool {
        let magnitude = sample.magnitude();
        if magnitude > self.magnitude {
            self.magnitude = magnitude;
            self.sample = sample;
            true
        } else {
            false
        }
    }

    pub fn sample(&self) -> T {
        self.sample
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ---------------------------------------------------------------------------
// Calibration offset
// ---------------------------------------------------------------------------

/// Mean of a batch of stationary readings. `None` for an empty batch.
pub fn average_offset<I: IntoIterator<Item = Sample3>>(samples: I) -> Option<Sample3> {
    let mut sum = Sample3::ZERO;
    let mut count = 0usize;
    for sample in samples {
        sum += sample;
        count += 1;
    }
    (count > 0).then(|| sum * (1.0 / count as f64))
}

// ---------------------------------------------------------------------------
// Gravity compensation
// ---------------------------------------------------------------------------

/// Expected gravity direction for the estimated orientation `angle` (rad).
pub fn gravity_vector(angle: Sample3) -> Sample3 {
    let (sx, cx) = angle.x.sin_cos();
    let (sy, cy) = angle.y.sin_cos();
    let (sz, cz) = angle.z.sin_cos();
    Sample3::new(
        sx * sy + cx * sz * cy,
        cx * cz - sx * sz * cy,
        cx * sz + sx * cz * cy,
    )
}

/// Remove the offset, then remove the change in gravity projection since
/// calibration (where the rotation estimate was zero), scaled per axis by
/// the measured offset.
pub fn compensate(raw: Sample3, offset: Sample3, angle: Sample3) -> Sample3 {
    let shift = gravity_vector(angle) - gravity_vector(Sample3::ZERO);
    (raw - offset) - shift.scale(&offset)
}

// ---------------------------------------------------------------------------
// Accelerometer channel
// ---------------------------------------------------------------------------
#[derive(Debug, Clone)]
pub struct MotionChannel {
    offset: Sample3,
    latest: Sample3,
    peak: PeakTracker<Sample3>,
    stream: VectorStream,
}

impl MotionChannel {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            offset: Sample3::ZERO,
            latest: Sample3::ZERO,
            peak: PeakTracker::new(),
            stream: VectorStream::with_header(header),
        }
    }

    pub fn set_offset(&mut self, offset: Sample3) {
        self.offset = offset;
    }

    pub fn offset(&self) -> Sample3 {
        self.offset
    }

    /// Fuse one raw reading (g) with the current orientation estimate.
    /// Returns `true` when the tracked peak rose.
    pub fn update(&mut self, raw: Sample3, angle: Sample3) -> bool {
        self.latest = compensate(raw, self.offset, angle);
        self.stream.prepend(self.latest);
        self.peak.update(self.latest)
    }

    pub fn latest(&self) -> Sample3 {
        self.latest
    }

    pub fn peak(&self) -> &PeakTracker<Sample3> {
        &self.peak
    }

    pub fn reset_peaks(&mut self) {
        self.peak.reset();
    }

    pub fn stream(&self) -> &VectorStream {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut VectorStream {
        &mut self.stream
    }
}

// ---------------------------------------------------------------------------
// Gyroscope channel
// ---------------------------------------------------------------------------

/// Angular-rate pipeline. The stream and peak hold bias-corrected rate in
/// deg/s; the rotation estimate integrates in radians.
#[derive(Debug, Clone)]
pub struct GyroChannel {
    rotation: RotationEstimator,
    last_update: Option<Instant>,
    latest: Sample3,
    peak: PeakTracker<Sample3>,
    stream: VectorStream,
}

impl GyroChannel {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            rotation: RotationEstimator::default(),
            last_update: None,
            latest: Sample3::ZERO,
            peak: PeakTracker::new(),
            stream: VectorStream::with_header(header),
        }
    }

    pub fn set_bias(&mut self, bias: Sample3) {
        self.rotation.set_bias(bias);
    }

    /// Start the dt clock; the first update after this integrates from `now`.
    pub fn start(&mut self, now: Instant) {
        self.last_update = Some(now);
    }

    /// Integrate one raw reading (rad/s) taken at `now`.
    /// Returns `true` when the tracked peak rose.
    pub fn update(&mut self, raw_rate: Sample3, now: Instant) -> bool {
        let dt_s = self
            .last_update
            .map(|t| now.saturating_duration_since(t).as_secs_f64())
            .unwrap_or(0.0);
        self.last_update = Some(now);

        let rate = self.rotation.update(raw_rate, dt_s);
        self.latest = Sample3::new(rate.x.to_degrees(), rate.y.to_degrees(), rate.z.to_degrees());
        self.stream.prepend(self.latest);
        self.peak.update(self.latest)
    }

    /// Accumulated orientation (rad).
    pub fn rotation(&self) -> Sample3 {
        self.rotation.angle()
    }

    pub fn latest(&self) -> Sample3 {
        self.latest
    }

    pub fn peak(&self) -> &PeakTracker<Sample3> {
        &self.peak
    }

    pub fn reset_peaks(&mut self) {
        self.peak.reset();
    }

    pub fn stream(&self) -> &VectorStream {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut VectorStream {
        &mut self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;
    use std::time::Duration;

    #[test]
    fn peak_keeps_largest_magnitude_until_reset() {
        let mut peak = PeakTracker::<Sample3>::new();
        assert!(peak.update(Sample3::new(1.0, 0.0, 0.0)));
        assert!(peak.update(Sample3::new(0.0, -3.0, 4.0)));
        assert!(!peak.update(Sample3::new(2.0, 2.0, 2.0)));
        assert_eq!(peak.sample(), Sample3::new(0.0, -3.0, 4.0));
        assert_eq!(peak.magnitude(), 5.0);

        peak.reset();
        assert_eq!(peak.magnitude(), 0.0);
        assert_eq!(peak.sample(), Sample3::ZERO);
    }

    #[test]
    fn scalar_peak_ranks_by_absolute_value() {
        let mut peak = PeakTracker::<f64>::new();
        peak.update(3.0);
        assert!(peak.update(-7.5));
        assert_eq!(peak.sample(), -7.5);
    }

    #[test]
    fn average_offset_is_the_mean() {
        let samples = (0..1000).map(|i| Sample3::new(1.0, i as f64 % 2.0, -2.0));
        let offset = average_offset(samples).unwrap();
        assert_relative_eq!(offset.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(offset.y, 0.5, epsilon = 1e-12);
        assert_relative_eq!(offset.z, -2.0, epsilon = 1e-12);
        assert!(average_offset(std::iter::empty()).is_none());
    }

    #[test]
    fn gravity_vector_matches_closed_form() {
        let level = gravity_vector(Sample3::ZERO);
        assert_relative_eq!(level.x, 0.0);
        assert_relative_eq!(level.y, 1.0);
        assert_relative_eq!(level.z, 0.0);

        let rolled = gravity_vector(Sample3::new(0.0, 0.0, FRAC_PI_2));
        assert_relative_eq!(rolled.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(rolled.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(rolled.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn compensation_at_rest_only_removes_offset() {
        let offset = Sample3::new(0.02, 1.0, -0.01);
        let raw = Sample3::new(0.52, 1.0, -0.01);
        let fused = compensate(raw, offset, Sample3::ZERO);
        assert_relative_eq!(fused.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(fused.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(fused.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn compensation_tracks_rotation() {
        let offset = Sample3::new(1.0, 1.0, 1.0);
        let angle = Sample3::new(0.0, 0.0, FRAC_PI_2);
        // Gravity projection shifts by (+1, -1, +1) for this rotation.
        let raw = Sample3::new(2.0, 0.0, 2.0);
        let fused = compensate(raw, offset, angle);
        assert_relative_eq!(fused.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(fused.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(fused.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn motion_channel_streams_and_tracks_peak() {
        let mut channel = MotionChannel::new("BODYLowGAccel");
        channel.set_offset(Sample3::new(0.0, 1.0, 0.0));
        assert!(channel.update(Sample3::new(3.0, 5.0, 0.0), Sample3::ZERO));
        assert!(!channel.update(Sample3::new(0.0, 1.0, 0.0), Sample3::ZERO));
        assert_eq!(channel.stream().len(), 2);
        assert_eq!(channel.peak().magnitude(), 5.0);
        assert_eq!(channel.stream().peek(1), Some(Sample3::new(3.0, 4.0, 0.0)));

        channel.reset_peaks();
        assert_eq!(channel.peak().magnitude(), 0.0);
        assert_eq!(channel.stream().len(), 2);
    }

    #[test]
    fn gyro_channel_integrates_wall_clock_dt() {
        let mut gyro = GyroChannel::new("HEADGyro");
        gyro.set_bias(Sample3::new(0.0, 0.0, 0.1));
        let t0 = Instant::now();
        gyro.start(t0);
        gyro.update(Sample3::new(0.0, 0.0, 1.1), t0 + Duration::from_millis(500));
        gyro.update(Sample3::new(0.0, 0.0, 1.1), t0 + Duration::from_millis(1500));
        assert_relative_eq!(gyro.rotation().z, 1.5, epsilon = 1e-9);
        assert_relative_eq!(gyro.latest().z, 1.0f64.to_degrees(), epsilon = 1e-9);
        assert_eq!(gyro.stream().len(), 2);
    }
}
