// ImpactWatch — Ambient thermometer

use std::time::Instant;

use crate::config::THERMOMETER_MIN_INTERVAL;
use crate::drivers::{init_with_retry, Device, InitPolicy, TemperatureSource};

pub struct Thermometer {
    source: Box<dyn TemperatureSource>,
    celsius: f64,
    last_read: Option<Instant>,
    initialized: bool,
}

impl Thermometer {
    pub fn new(source: Box<dyn TemperatureSource>) -> Self {
        Self { source, celsius: 0.0, last_read: None, initialized: false }
    }

    /// Refresh the cached value unless the last read was under a second ago.
    pub fn update_at(&mut self, now: Instant) {
        if !self.initialized {
            return;
        }
        if let Some(last) = self.last_read {
            if now.saturating_duration_since(last) < THERMOMETER_MIN_INTERVAL {
                return;
            }
        }
        self.last_read = Some(now);
        match self.source.read_celsius() {
            Ok(c) => {
                log::debug!("Ambient {:.2} °C", c);
                self.celsius = c;
            }
            Err(e) => log::warn!("Thermometer read error: {}", e),
        }
    }

    /// Last good temperature in °C (0 until the first read).
    pub fn celsius(&self) -> f64 {
        self.celsius
    }
}

impl Device for Thermometer {
    fn name(&self) -> &str {
        "thermometer"
    }

    fn init(&mut self, policy: &InitPolicy) -> bool {
        let source = &mut self.source;
        self.initialized = init_with_retry("thermometer", policy, || source.begin());
        if self.initialized {
            self.update_at(Instant::now());
        }
        self.initialized
    }

    fn update(&mut self) {
        self.update_at(Instant::now());
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn reset_peaks(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::sim::SimThermometer;
    use std::time::Duration;

    #[test]
    fn reads_are_rate_limited() {
        let sim = SimThermometer::new(21.5);
        let mut t = Thermometer::new(Box::new(sim.clone()));
        assert!(t.init(&InitPolicy::immediate()));
        assert_eq!(t.celsius(), 21.5);

        let now = Instant::now();
        sim.set_celsius(30.0);
        t.update_at(now);
        assert_eq!(t.celsius(), 21.5);

        t.update_at(now + Duration::from_millis(1001));
        assert_eq!(t.celsius(), 30.0);
    }

    #[test]
    fn failed_read_keeps_last_value() {
        let sim = SimThermometer::new(18.0);
        let mut t = Thermometer::new(Box::new(sim.clone()));
        assert!(t.init(&InitPolicy::immediate()));
        sim.set_present(false);
        t.update_at(Instant::now() + Duration::from_secs(5));
        assert_eq!(t.celsius(), 18.0);
    }
}
