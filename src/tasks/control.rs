// ImpactWatch — Control Task
//
// Applies HMI commands (record / reset buttons, remote) to the shared state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Instant;

use crate::config::CONTROL_POLL;
use crate::events::{Detection, HmiCommand};
use crate::session::PeakReset;
use crate::state::{lock, Shared, System};

pub fn apply_command(system: &mut System, command: HmiCommand, now: Instant) {
    match command {
        HmiCommand::ResetPeaks => {
            log::info!("Peaks reset from control panel");
            system.sensors.reset_all_peaks();
        }
        HmiCommand::ForceRecording => {
            log::info!("Recording forced from control panel");
            system.session.report(Detection::Impact, now);
        }
    }
}

pub fn control_task(shared: Shared, stop: Arc<AtomicBool>, commands: Receiver<HmiCommand>) {
    log::info!("Control task started");
    while !stop.load(Ordering::Relaxed) {
        match commands.recv_timeout(CONTROL_POLL) {
            Ok(command) => apply_command(&mut lock(&shared), command, Instant::now()),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("Command channel closed, exiting control task");
                break;
            }
        }
    }
    log::info!("Control task stopped");
}
