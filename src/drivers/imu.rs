// ImpactWatch — 6-axis IMU device
//
// One physical IMU feeds two fused channels: the gyroscope (bias removal,
// rotation estimate) and the low-range accelerometer (offset calibration,
// gravity compensation against that rotation estimate).

use std::time::Instant;

use crate::buffer::VectorStream;
use crate::config::*;
use crate::drivers::{init_with_retry, Device, ImuSource, InitPolicy};
use crate::events::Sample3;
use crate::fusion::{GyroChannel, MotionChannel, PeakTracker};

pub struct Imu {
    name: String,
    source: Box<dyn ImuSource>,
    gyro: GyroChannel,
    accel: MotionChannel,
    initialized: bool,
}

impl Imu {
    pub fn new(location: &str, source: Box<dyn ImuSource>) -> Self {
        Self {
            name: format!("{} IMU", location),
            source,
            gyro: GyroChannel::new(format!("{}{}", location, SUFFIX_GYRO)),
            accel: MotionChannel::new(format!("{}{}", location, SUFFIX_LOW_G)),
            initialized: false,
        }
    }

    /// Average stationary readings into the gyro bias and accel offset.
    fn calibrate(&mut self, policy: &InitPolicy) {
        let mut gyro_sum = Sample3::ZERO;
        let mut accel_sum = Sample3::ZERO;
        let mut count = 0usize;
        for _ in 0..policy.calibration_samples {
            if let Ok(reading) = self.source.read() {
                gyro_sum += reading.gyro;
                accel_sum += reading.accel * (1.0 / STANDARD_GRAVITY);
                count += 1;
            }
            if !policy.calibration_interval.is_zero() {
                std::thread::sleep(policy.calibration_interval);
            }
        }
        if count == 0 {
            log::warn!("{}: no readings during calibration, offsets left at zero", self.name);
            return;
        }
        let scale = 1.0 / count as f64;
        self.gyro.set_bias(gyro_sum * scale);
        self.accel.set_offset(accel_sum * scale);
        log::info!(
            "{} calibrated over {} samples (accel offset {:?} g)",
            self.name,
            count,
            self.accel.offset()
        );
    }

    /// Read, fuse and stream one sample taken at `now`.
    /// Returns `false` when no sample was taken.
    pub fn update_at(&mut self, now: Instant) -> bool {
        if !self.initialized {
            return false;
        }
        let reading = match self.source.read() {
            Ok(r) => r,
            Err(e) => {
                log::warn!("{} read error: {}", self.name, e);
                return false;
            }
        };
        self.gyro.update(reading.gyro, now);
        self.accel.update(reading.accel * (1.0 / STANDARD_GRAVITY), self.gyro.rotation());
        true
    }

    /// Orientation estimate (rad) used to compensate co-located accelerometers.
    pub fn rotation(&self) -> Sample3 {
        self.gyro.rotation()
    }

    pub fn accel_peak(&self) -> &PeakTracker<Sample3> {
        self.accel.peak()
    }

    pub fn gyro_peak(&self) -> &PeakTracker<Sample3> {
        self.gyro.peak()
    }

    pub fn accel_latest(&self) -> Sample3 {
        self.accel.latest()
    }

    pub fn gyro_latest(&self) -> Sample3 {
        self.gyro.latest()
    }

    pub fn accel_stream(&self) -> &VectorStream {
        self.accel.stream()
    }

    pub fn accel_stream_mut(&mut self) -> &mut VectorStream {
        self.accel.stream_mut()
    }

    pub fn gyro_stream(&self) -> &VectorStream {
        self.gyro.stream()
    }

    pub fn gyro_stream_mut(&mut self) -> &mut VectorStream {
        self.gyro.stream_mut()
    }
}

impl Device for Imu {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, policy: &InitPolicy) -> bool {
        let source = &mut self.source;
        if !init_with_retry(&self.name, policy, || source.begin()) {
            self.initialized = false;
            return false;
        }
        self.calibrate(policy);
        self.gyro.start(Instant::now());
        self.gyro.stream_mut().set_initialized(true);
        self.accel.stream_mut().set_initialized(true);
        self.initialized = true;
        true
    }

    fn update(&mut self) {
        self.update_at(Instant::now());
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn reset_peaks(&mut self) {
        self.gyro.reset_peaks();
        self.accel.reset_peaks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::sim::SimImu;
    use crate::drivers::ImuReading;
    use approx::assert_relative_eq;
    use std::time::Duration;

    fn at_rest() -> ImuReading {
        ImuReading {
            accel: Sample3::new(0.0, 0.0, STANDARD_GRAVITY),
            gyro: Sample3::new(0.01, -0.02, 0.0),
        }
    }

    #[test]
    fn uninitialized_imu_is_inert() {
        let sim = SimImu::new(at_rest());
        let mut imu = Imu::new(LOCATION_HEAD, Box::new(sim.clone()));
        assert!(!imu.update_at(Instant::now()));
        assert!(imu.accel_stream().is_empty());
        assert!(!imu.accel_stream().is_initialized());
    }

    #[test]
    fn dead_imu_stays_uninitialized() {
        let sim = SimImu::new(at_rest());
        sim.set_present(false);
        let mut imu = Imu::new(LOCATION_BODY, Box::new(sim));
        assert!(!imu.init(&InitPolicy::immediate()));
        assert!(!imu.is_initialized());
    }

    #[test]
    fn calibration_removes_gravity_and_gyro_bias() {
        let sim = SimImu::new(at_rest());
        let mut imu = Imu::new(LOCATION_HEAD, Box::new(sim.clone()));
        assert!(imu.init(&InitPolicy::immediate()));
        assert_eq!(imu.accel_stream().header(), "HEADLowGAccel");
        assert_eq!(imu.gyro_stream().header(), "HEADGyro");

        let t0 = Instant::now();
        assert!(imu.update_at(t0));
        assert_relative_eq!(imu.accel_latest().magnitude(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(imu.gyro_latest().magnitude(), 0.0, epsilon = 1e-9);

        sim.set_reading(ImuReading {
            accel: Sample3::new(6.0 * STANDARD_GRAVITY, 0.0, STANDARD_GRAVITY),
            gyro: at_rest().gyro,
        });
        assert!(imu.update_at(t0 + Duration::from_millis(2)));
        assert_relative_eq!(imu.accel_latest().magnitude(), 6.0, epsilon = 1e-9);
        assert_relative_eq!(imu.accel_peak().magnitude(), 6.0, epsilon = 1e-9);
        assert_relative_eq!(imu.gyro_peak().magnitude(), 0.0, epsilon = 1e-9);
        assert_eq!(imu.accel_stream().len(), 2);

        imu.reset_peaks();
        assert_eq!(imu.accel_peak().magnitude(), 0.0);
    }
}
