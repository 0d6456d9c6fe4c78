// ImpactWatch — Temperature Task
//
// Slow refresh of the ambient temperature used by load-cell compensation.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use crate::config::TEMPERATURE_PERIOD;
use crate::state::{lock, Shared, System};
use crate::tasks::pace;

pub fn temperature_cycle(system: &mut System, now: Instant) {
    system.sensors.thermometer.update_at(now);
    system.sensors.apply_temperature();
}

pub fn temperature_task(shared: Shared, stop: Arc<AtomicBool>) {
    log::info!("Temperature task started");
    loop {
        let tick_start = Instant::now();
        temperature_cycle(&mut lock(&shared), tick_start);
        if !pace(tick_start, TEMPERATURE_PERIOD, &stop) {
            break;
        }
    }
    log::info!("Temperature task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::sim::SimRig;
    use std::time::Duration;

    #[test]
    fn new_reading_reaches_both_load_cells() {
        let dir = tempfile::tempdir().unwrap();
        let rig = SimRig::at_rest();
        let mut sys = rig.system(dir.path()).unwrap();
        assert_eq!(sys.sensors.left_cell.current_temp(), 22.0);

        rig.thermometer.set_celsius(31.0);
        temperature_cycle(&mut sys, Instant::now() + Duration::from_secs(2));
        assert_eq!(sys.sensors.left_cell.current_temp(), 31.0);
        assert_eq!(sys.sensors.right_cell.current_temp(), 31.0);
    }
}
