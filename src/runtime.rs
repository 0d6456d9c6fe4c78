// ImpactWatch — Task Runtime
//
// Spawns the periodic tasks (std threads mapped onto FreeRTOS tasks) around
// one shared `System`, and tears them down again on request.
//
//   core 0: fusion, load cell
//   core 1: temperature, logger, telemetry, control

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::config::*;
use crate::events::HmiCommand;
use crate::state::{lock, Shared, System};
use crate::tasks;

pub struct Runtime {
    shared: Shared,
    stop: Arc<AtomicBool>,
    commands: Sender<HmiCommand>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Runtime {
    /// Start every task. Telemetry lines go to `telemetry`.
    pub fn spawn(system: System, telemetry: Box<dyn Write + Send>) -> anyhow::Result<Self> {
        let shared: Shared = Arc::new(Mutex::new(system));
        let stop = Arc::new(AtomicBool::new(false));
        let (commands, command_rx) = mpsc::channel();
        let mut handles = Vec::new();

        let (s, st) = (Arc::clone(&shared), Arc::clone(&stop));
        handles.push(spawn_task("fusion", STACK_FUSION, CORE_SENSORS, PRIORITY_DEFAULT, move || {
            tasks::fusion::fusion_task(s, st)
        })?);

        let (s, st) = (Arc::clone(&shared), Arc::clone(&stop));
        handles.push(spawn_task("load_cell", STACK_LOAD_CELL, CORE_SENSORS, PRIORITY_DEFAULT, move || {
            tasks::load_cell::load_cell_task(s, st)
        })?);

        let (s, st) = (Arc::clone(&shared), Arc::clone(&stop));
        handles.push(spawn_task("temperature", STACK_TEMPERATURE, CORE_SERVICE, PRIORITY_DEFAULT, move || {
            tasks::temperature::temperature_task(s, st)
        })?);

        let (s, st) = (Arc::clone(&shared), Arc::clone(&stop));
        handles.push(spawn_task("logger", STACK_LOGGER, CORE_SERVICE, PRIORITY_DEFAULT, move || {
            tasks::logger::logger_task(s, st)
        })?);

        let (s, st) = (Arc::clone(&shared), Arc::clone(&stop));
        handles.push(spawn_task("telemetry", STACK_TELEMETRY, CORE_SERVICE, PRIORITY_DEFAULT, move || {
            tasks::telemetry::telemetry_task(s, st, telemetry)
        })?);

        let (s, st) = (Arc::clone(&shared), Arc::clone(&stop));
        handles.push(spawn_task("control", STACK_CONTROL, CORE_SERVICE, PRIORITY_INPUT, move || {
            tasks::control::control_task(s, st, command_rx)
        })?);

        reset_task_placement()?;
        log::info!("{} tasks running", handles.len());

        Ok(Self { shared, stop, commands, handles })
    }

    /// Channel for HMI commands (buttons, remote).
    pub fn commands(&self) -> Sender<HmiCommand> {
        self.commands.clone()
    }

    pub fn shared(&self) -> Shared {
        Arc::clone(&self.shared)
    }

    /// Stop and join every task, flush an open session to storage and close
    /// the log file. Returns the system for inspection.
    pub fn shutdown(self) -> anyhow::Result<Shared> {
        log::info!("Shutting down");
        self.stop.store(true, Ordering::SeqCst);
        drop(self.commands);

        let mut panicked = Vec::new();
        for (name, handle) in self.handles {
            if handle.join().is_err() {
                log::error!("Task {} panicked", name);
                panicked.push(name);
            }
        }

        {
            let mut guard = lock(&self.shared);
            let sys = &mut *guard;
            if sys.session.is_active() {
                tasks::logger::drain(sys);
            }
            sys.logger.close();
        }

        if !panicked.is_empty() {
            anyhow::bail!("tasks panicked: {}", panicked.join(", "));
        }
        Ok(self.shared)
    }
}

fn spawn_task<F>(
    name: &'static str,
    stack_size: usize,
    core: u8,
    priority: u8,
    body: F,
) -> anyhow::Result<(&'static str, JoinHandle<()>)>
where
    F: FnOnce() + Send + 'static,
{
    place_next_task(stack_size, core, priority)?;
    let handle = thread::Builder::new().name(name.into()).stack_size(stack_size).spawn(body)?;
    Ok((name, handle))
}

// ---------------------------------------------------------------------------
// Core pinning / priority (FreeRTOS only)
// ---------------------------------------------------------------------------

#[cfg(target_os = "espidf")]
fn place_next_task(stack_size: usize, core: u8, priority: u8) -> anyhow::Result<()> {
    use esp_idf_hal::cpu::Core;
    use esp_idf_hal::task::thread::ThreadSpawnConfiguration;

    let pin_to_core = if core == 0 { Core::Core0 } else { Core::Core1 };
    ThreadSpawnConfiguration {
        stack_size,
        priority,
        pin_to_core: Some(pin_to_core),
        ..Default::default()
    }
    .set()?;
    Ok(())
}

#[cfg(target_os = "espidf")]
fn reset_task_placement() -> anyhow::Result<()> {
    esp_idf_hal::task::thread::ThreadSpawnConfiguration::default().set()?;
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn place_next_task(_stack_size: usize, core: u8, priority: u8) -> anyhow::Result<()> {
    log::debug!("Host build: ignoring placement on core {} at priority {}", core, priority);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn reset_task_placement() -> anyhow::Result<()> {
    Ok(())
}
