// ImpactWatch — Logger Task
//
// Runs the session state machine and performs the synchronized drain. Polls
// fast while a session is active and slowly otherwise.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{LOGGER_ACTIVE_PERIOD, LOGGER_IDLE_PERIOD};
use crate::logger::DrainMode;
use crate::session::SessionAction;
use crate::state::{lock, Shared, System};
use crate::tasks::pace;

/// One logger step. Returns how long to wait before the next one.
pub fn logger_cycle(system: &mut System, now: Instant) -> Duration {
    match system.session.poll(now) {
        SessionAction::Idle => LOGGER_IDLE_PERIOD,
        SessionAction::Record { rotate } => {
            if rotate {
                let next = system.logger.sequence() + 1;
                system.logger.set_sequence(next);
            }
            drain(system);
            LOGGER_ACTIVE_PERIOD
        }
        SessionAction::Finish => {
            drain(system);
            system.logger.close();
            system.session.finish(&mut system.sensors);
            LOGGER_IDLE_PERIOD
        }
    }
}

/// Destructive drain of every complete row. Storage errors are logged and
/// retried on the next cycle.
pub fn drain(system: &mut System) {
    match system.logger.sync(&mut system.sensors, DrainMode::Consume) {
        Ok(rows) => {
            system.session.note_file(system.logger.sequence());
            if rows > 0 {
                log::debug!("Logged {} rows", rows);
            }
        }
        Err(e) => log::warn!("Log sync failed: {}", e),
    }
}

pub fn logger_task(shared: Shared, stop: Arc<AtomicBool>) {
    log::info!("Logger task started");
    loop {
        let tick_start = Instant::now();
        let period = logger_cycle(&mut lock(&shared), tick_start);
        if !pace(tick_start, period, &stop) {
            break;
        }
    }
    log::info!("Logger task stopped");
}
