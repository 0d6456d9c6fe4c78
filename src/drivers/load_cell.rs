// ImpactWatch — Shoulder load cell
//
// Raw amplifier counts are converted through the calibrated force curve at
// the current ambient temperature. A conversion that is not ready within the
// poll timeout simply yields no sample this cycle.

use crate::buffer::ScalarStream;
use crate::calibration::LoadCellCalibrator;
use crate::config::*;
use crate::drivers::{init_with_retry, Device, InitPolicy, LoadCellSource};
use crate::fusion::PeakTracker;

pub struct LoadCell {
    name: String,
    source: Box<dyn LoadCellSource>,
    calibrator: LoadCellCalibrator,
    current_temp: f64,
    reading: f64,
    peak: PeakTracker<f64>,
    stream: ScalarStream,
    initialized: bool,
}

impl LoadCell {
    pub fn new(location: &str, source: Box<dyn LoadCellSource>, calibrator: LoadCellCalibrator) -> Self {
        Self {
            name: format!("{} load cell", location),
            source,
            calibrator,
            current_temp: 0.0,
            reading: 0.0,
            peak: PeakTracker::new(),
            stream: ScalarStream::with_header(location),
            initialized: false,
        }
    }

    /// Ambient temperature (°C) used for intercept compensation.
    pub fn set_current_temp(&mut self, celsius: f64) {
        self.current_temp = celsius;
    }

    pub fn current_temp(&self) -> f64 {
        self.current_temp
    }

    /// Poll once. Returns `true` when a valid weight was taken.
    pub fn update_weight(&mut self) -> bool {
        if !self.initialized || !self.source.wait_ready(LOAD_CELL_READY_TIMEOUT) {
            return false;
        }
        let raw = match self.source.read_raw() {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("{} read error: {}", self.name, e);
                return false;
            }
        };
        let weight = self.calibrator.weight(raw, self.current_temp);
        if !weight.is_finite() || weight < 0.0 {
            return false;
        }
        self.reading = weight;
        self.stream.prepend(weight);
        self.peak.update(weight);
        true
    }

    /// Last valid weight.
    pub fn reading(&self) -> f64 {
        self.reading
    }

    pub fn peak(&self) -> &PeakTracker<f64> {
        &self.peak
    }

    pub fn stream(&self) -> &ScalarStream {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut ScalarStream {
        &mut self.stream
    }
}

impl Device for LoadCell {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, policy: &InitPolicy) -> bool {
        let source = &mut self.source;
        self.initialized = init_with_retry(&self.name, policy, || source.begin());
        self.stream.set_initialized(self.initialized);
        self.initialized
    }

    fn update(&mut self) {
        self.update_weight();
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn reset_peaks(&mut self) {
        self.peak.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::sim::SimLoadCell;
    use approx::assert_relative_eq;

    fn left_cell(sim: &SimLoadCell) -> LoadCell {
        let cal = LoadCellCalibrator::from_calibration(&LEFT_CELL_CALIBRATION).unwrap();
        LoadCell::new(LOCATION_LEFT_SHOULDER, Box::new(sim.clone()), cal)
    }

    #[test]
    fn converts_raw_counts_to_weight() {
        let sim = SimLoadCell::new(41100.0);
        let mut cell = left_cell(&sim);
        assert!(cell.init(&InitPolicy::immediate()));
        assert!(cell.update_weight());
        assert_relative_eq!(cell.reading(), 22.7, epsilon = 0.1);
        assert_eq!(cell.stream().header(), "LftShldr");
        assert_eq!(cell.stream().len(), 1);
    }

    #[test]
    fn not_ready_keeps_last_reading() {
        let sim = SimLoadCell::new(55200.0);
        let mut cell = left_cell(&sim);
        assert!(cell.init(&InitPolicy::immediate()));
        cell.update_weight();
        let before = cell.reading();

        sim.set_ready(false);
        sim.set_raw(41100.0);
        assert!(!cell.update_weight());
        assert_eq!(cell.reading(), before);
        assert_eq!(cell.stream().len(), 1);
    }

    #[test]
    fn negative_weights_are_discarded() {
        let sim = SimLoadCell::new(0.0);
        let mut cell = left_cell(&sim);
        assert!(cell.init(&InitPolicy::immediate()));
        assert!(!cell.update_weight());
        assert!(cell.stream().is_empty());
        assert_eq!(cell.peak().magnitude(), 0.0);
    }
}
