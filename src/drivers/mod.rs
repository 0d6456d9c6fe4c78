// ImpactWatch — Device capability interface
//
// Chip-level access sits behind the `*Source` traits (implemented by the board
// bindings and by the bench simulator). The device types in this module wrap
// a source with calibration, fusion, streams and peaks, and all share the
// `Device` lifecycle: bounded-retry init, no-op updates while uninitialized.

pub mod accel;
pub mod imu;
pub mod load_cell;
pub mod sim;
pub mod thermometer;

use std::thread;
use std::time::Duration;

use crate::config::*;
use crate::events::Sample3;

pub use accel::HighGAccel;
pub use imu::Imu;
pub use load_cell::LoadCell;
pub use thermometer::Thermometer;

// ---------------------------------------------------------------------------
// Raw sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImuReading {
    /// m/s²
    pub accel: Sample3,
    /// rad/s
    pub gyro: Sample3,
}

/// 6-axis IMU (low-range accelerometer + gyroscope).
pub trait ImuSource: Send {
    /// Probe and configure ranges/rates.
    fn begin(&mut self) -> anyhow::Result<()>;
    fn read(&mut self) -> anyhow::Result<ImuReading>;
}

/// High-range accelerometer, readings in m/s².
pub trait AccelSource: Send {
    fn begin(&mut self) -> anyhow::Result<()>;
    fn read(&mut self) -> anyhow::Result<Sample3>;
}

/// Load-cell amplifier.
pub trait LoadCellSource: Send {
    fn begin(&mut self) -> anyhow::Result<()>;
    /// Block up to `timeout` for a conversion; `false` means not ready.
    fn wait_ready(&mut self, timeout: Duration) -> bool;
    fn read_raw(&mut self) -> anyhow::Result<f64>;
}

/// Ambient temperature in °C.
pub trait TemperatureSource: Send {
    fn begin(&mut self) -> anyhow::Result<()>;
    fn read_celsius(&mut self) -> anyhow::Result<f64>;
}

// ---------------------------------------------------------------------------
// Device lifecycle
// ---------------------------------------------------------------------------

/// Bring-up knobs. `Default` uses the firmware timings; tests shrink them.
#[derive(Debug, Clone, Copy)]
pub struct InitPolicy {
    pub attempts: u32,
    pub backoff: Duration,
    pub calibration_samples: usize,
    pub calibration_interval: Duration,
}

impl InitPolicy {
    pub const fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts,
            backoff,
            calibration_samples: CALIBRATION_SAMPLES,
            calibration_interval: CALIBRATION_INTERVAL,
        }
    }

    pub const fn imu() -> Self {
        Self::new(IMU_INIT_ATTEMPTS, IMU_INIT_BACKOFF)
    }

    pub const fn accel() -> Self {
        Self::new(ACCEL_INIT_ATTEMPTS, ACCEL_INIT_BACKOFF)
    }

    pub const fn load_cell() -> Self {
        Self::new(LOAD_CELL_INIT_ATTEMPTS, LOAD_CELL_INIT_BACKOFF)
    }

    pub const fn thermometer() -> Self {
        Self::new(THERMOMETER_INIT_ATTEMPTS, THERMOMETER_INIT_BACKOFF)
    }

    /// No waiting anywhere; a handful of calibration samples.
    pub const fn immediate() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::ZERO,
            calibration_samples: 10,
            calibration_interval: Duration::ZERO,
        }
    }
}

pub trait Device {
    fn name(&self) -> &str;
    /// Attempt bring-up; on exhaustion the device stays uninitialized and
    /// every other operation is a no-op.
    fn init(&mut self, policy: &InitPolicy) -> bool;
    fn update(&mut self);
    fn is_initialized(&self) -> bool;
    fn reset_peaks(&mut self);
}

/// Run `attempt` up to `policy.attempts` times, sleeping `policy.backoff`
/// between failures.
pub fn init_with_retry<F>(name: &str, policy: &InitPolicy, mut attempt: F) -> bool
where
    F: FnMut() -> anyhow::Result<()>,
{
    let attempts = policy.attempts.max(1);
    for i in 1..=attempts {
        match attempt() {
            Ok(()) => {
                log::info!("{} initialised on attempt ({}/{})", name, i, attempts);
                return true;
            }
            Err(e) => {
                log::warn!("{} init failed ({}/{}): {}", name, i, attempts, e);
                if i < attempts && !policy.backoff.is_zero() {
                    thread::sleep(policy.backoff);
                }
            }
        }
    }
    log::error!("{} not found after {} attempts — check wiring", name, attempts);
    false
}

/// Average `policy.calibration_samples` readings; failed reads are skipped.
pub(crate) fn sample_offset<F>(policy: &InitPolicy, mut read: F) -> Option<Sample3>
where
    F: FnMut() -> anyhow::Result<Sample3>,
{
    let samples = (0..policy.calibration_samples).filter_map(|_| {
        let sample = read().ok();
        if !policy.calibration_interval.is_zero() {
            thread::sleep(policy.calibration_interval);
        }
        sample
    });
    crate::fusion::average_offset(samples)
}
