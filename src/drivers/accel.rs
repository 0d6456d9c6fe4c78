// ImpactWatch — High-range accelerometer (±400 g)
//
// Shares a location with an IMU and borrows that IMU's rotation estimate for
// gravity compensation.

use crate::buffer::VectorStream;
use crate::config::*;
use crate::drivers::{init_with_retry, sample_offset, AccelSource, Device, InitPolicy};
use crate::events::Sample3;
use crate::fusion::{MotionChannel, PeakTracker};

pub struct HighGAccel {
    name: String,
    source: Box<dyn AccelSource>,
    channel: MotionChannel,
    rotation: Sample3,
    initialized: bool,
}

impl HighGAccel {
    pub fn new(location: &str, source: Box<dyn AccelSource>) -> Self {
        Self {
            name: format!("{} high-g accel", location),
            source,
            channel: MotionChannel::new(format!("{}{}", location, SUFFIX_HIGH_G)),
            rotation: Sample3::ZERO,
            initialized: false,
        }
    }

    /// Read one sample and fuse it against `rotation`.
    /// Returns `false` when no sample was taken.
    pub fn update_with(&mut self, rotation: Sample3) -> bool {
        self.rotation = rotation;
        if !self.initialized {
            return false;
        }
        match self.source.read() {
            Ok(raw) => {
                self.channel.update(raw * (1.0 / STANDARD_GRAVITY), rotation);
                true
            }
            Err(e) => {
                log::warn!("{} read error: {}", self.name, e);
                false
            }
        }
    }

    pub fn peak(&self) -> &PeakTracker<Sample3> {
        self.channel.peak()
    }

    pub fn latest(&self) -> Sample3 {
        self.channel.latest()
    }

    pub fn stream(&self) -> &VectorStream {
        self.channel.stream()
    }

    pub fn stream_mut(&mut self) -> &mut VectorStream {
        self.channel.stream_mut()
    }
}

impl Device for HighGAccel {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, policy: &InitPolicy) -> bool {
        let source = &mut self.source;
        if !init_with_retry(&self.name, policy, || source.begin()) {
            self.initialized = false;
            return false;
        }
        let source = &mut self.source;
        match sample_offset(policy, || source.read().map(|s| s * (1.0 / STANDARD_GRAVITY))) {
            Some(offset) => self.channel.set_offset(offset),
            None => log::warn!("{}: no readings during calibration, offset left at zero", self.name),
        }
        self.channel.stream_mut().set_initialized(true);
        self.initialized = true;
        true
    }

    fn update(&mut self) {
        self.update_with(self.rotation);
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn reset_peaks(&mut self) {
        self.channel.reset_peaks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::sim::SimAccel;
    use approx::assert_relative_eq;

    #[test]
    fn offset_is_removed_and_peak_tracked() {
        let sim = SimAccel::new(Sample3::new(0.0, STANDARD_GRAVITY, 0.0));
        let mut accel = HighGAccel::new(LOCATION_BODY, Box::new(sim.clone()));
        assert!(accel.init(&InitPolicy::immediate()));
        assert_eq!(accel.stream().header(), "BODYHighGAccel");

        sim.set_reading(Sample3::new(0.0, 81.0 * STANDARD_GRAVITY, 0.0));
        assert!(accel.update_with(Sample3::ZERO));
        assert_relative_eq!(accel.peak().magnitude(), 80.0, epsilon = 1e-9);

        sim.set_reading(Sample3::new(0.0, STANDARD_GRAVITY, 0.0));
        assert!(accel.update_with(Sample3::ZERO));
        assert_relative_eq!(accel.latest().magnitude(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(accel.peak().magnitude(), 80.0, epsilon = 1e-9);
        assert_eq!(accel.stream().len(), 2);
    }

    #[test]
    fn missing_part_is_a_no_op() {
        let sim = SimAccel::new(Sample3::ZERO);
        sim.set_present(false);
        let mut accel = HighGAccel::new(LOCATION_HEAD, Box::new(sim));
        assert!(!accel.init(&InitPolicy::immediate()));
        accel.update();
        assert!(accel.stream().is_empty());
        assert!(!accel.stream().is_initialized());
    }
}
