// ImpactWatch — Load Cell Task

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{LOAD_CELL_IMPACT_THRESHOLD, LOAD_CELL_PERIOD};
use crate::events::Detection;
use crate::state::{lock, Shared, System};
use crate::tasks::pace;

pub fn load_cell_cycle(system: &mut System, now: Instant) {
    let sensors = &mut system.sensors;
    for cell in [&mut sensors.left_cell, &mut sensors.right_cell] {
        if cell.update_weight() && cell.reading() > LOAD_CELL_IMPACT_THRESHOLD {
            log::info!("Shoulder load {:.1} over threshold", cell.reading());
            system.session.report(Detection::Impact, now);
        }
    }
}

pub fn load_cell_task(shared: Shared, stop: Arc<AtomicBool>) {
    log::info!("Load cell task started");
    loop {
        let tick_start = Instant::now();
        load_cell_cycle(&mut lock(&shared), tick_start);
        if !pace(tick_start, LOAD_CELL_PERIOD, &stop) {
            break;
        }
    }
    log::info!("Load cell task stopped");
}
