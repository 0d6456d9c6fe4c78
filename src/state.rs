// ImpactWatch — Shared system state
//
// Everything the tasks touch lives in one `System` behind one mutex. A task
// takes the lock for one update cycle and releases it before sleeping.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::buffer::ScalarStream;
use crate::calibration::LoadCellCalibrator;
use crate::config::*;
use crate::drivers::{
    AccelSource, Device, HighGAccel, Imu, ImuSource, InitPolicy, LoadCell, LoadCellSource,
    Thermometer, TemperatureSource,
};
use crate::events::StartupFaults;
use crate::logger::{Storage, SynchronizedLogger};
use crate::scorer::Assessment;
use crate::session::{PeakReset, SessionMachine};

pub type Shared = Arc<Mutex<System>>;

/// Take the system lock. A task that panicked while holding it leaves the
/// data usable, so poisoning is ignored.
pub fn lock(shared: &Shared) -> MutexGuard<'_, System> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Raw hardware handles for every sensor position.
pub struct Sources {
    pub head_imu: Box<dyn ImuSource>,
    pub body_imu: Box<dyn ImuSource>,
    pub head_accel: Box<dyn AccelSource>,
    pub body_accel: Box<dyn AccelSource>,
    pub left_cell: Box<dyn LoadCellSource>,
    pub right_cell: Box<dyn LoadCellSource>,
    pub thermometer: Box<dyn TemperatureSource>,
}

#[derive(Debug, Clone, Copy)]
pub struct BringUpPolicy {
    pub imu: InitPolicy,
    pub accel: InitPolicy,
    pub load_cell: InitPolicy,
    pub thermometer: InitPolicy,
}

impl Default for BringUpPolicy {
    fn default() -> Self {
        Self {
            imu: InitPolicy::imu(),
            accel: InitPolicy::accel(),
            load_cell: InitPolicy::load_cell(),
            thermometer: InitPolicy::thermometer(),
        }
    }
}

impl BringUpPolicy {
    pub fn immediate() -> Self {
        let p = InitPolicy::immediate();
        Self { imu: p, accel: p, load_cell: p, thermometer: p }
    }
}

pub struct SensorSet {
    pub head_imu: Imu,
    pub body_imu: Imu,
    pub head_accel: HighGAccel,
    pub body_accel: HighGAccel,
    pub left_cell: LoadCell,
    pub right_cell: LoadCell,
    pub thermometer: Thermometer,
    /// Concussion probability, one entry per fusion cycle.
    pub concussion: ScalarStream,
    pub last_assessment: Option<Assessment>,
}

impl SensorSet {
    pub fn new(sources: Sources) -> anyhow::Result<Self> {
        let left = LoadCellCalibrator::from_calibration(&LEFT_CELL_CALIBRATION)?;
        let right = LoadCellCalibrator::from_calibration(&RIGHT_CELL_CALIBRATION)?;
        let mut concussion = ScalarStream::with_header(CONCUSSION_LABEL);
        concussion.set_initialized(true);
        Ok(Self {
            head_imu: Imu::new(LOCATION_HEAD, sources.head_imu),
            body_imu: Imu::new(LOCATION_BODY, sources.body_imu),
            head_accel: HighGAccel::new(LOCATION_HEAD, sources.head_accel),
            body_accel: HighGAccel::new(LOCATION_BODY, sources.body_accel),
            left_cell: LoadCell::new(LOCATION_LEFT_SHOULDER, sources.left_cell, left),
            right_cell: LoadCell::new(LOCATION_RIGHT_SHOULDER, sources.right_cell, right),
            thermometer: Thermometer::new(sources.thermometer),
            concussion,
            last_assessment: None,
        })
    }

    /// Bring every device up in boot order and report which of
    /// the monitored ones failed.
    pub fn init(&mut self, policy: &BringUpPolicy) -> StartupFaults {
        let mut faults = StartupFaults::default();

        log::info!("Initializing thermometer");
        faults.set(StartupFaults::THERMOMETER, !self.thermometer.init(&policy.thermometer));

        log::info!("Initializing IMUs");
        faults.set(StartupFaults::BODY_IMU, !self.body_imu.init(&policy.imu));
        self.head_imu.init(&policy.imu);

        log::info!("Initializing high-g accelerometers");
        faults.set(StartupFaults::BODY_ACCEL, !self.body_accel.init(&policy.accel));
        self.head_accel.init(&policy.accel);

        log::info!("Initializing load cells");
        self.left_cell.init(&policy.load_cell);
        self.right_cell.init(&policy.load_cell);
        self.apply_temperature();

        self.reset_all_peaks();
        faults
    }

    /// Push the current ambient temperature into both load cells.
    pub fn apply_temperature(&mut self) {
        let celsius = self.thermometer.celsius();
        self.left_cell.set_current_temp(celsius);
        self.right_cell.set_current_temp(celsius);
    }
}

impl PeakReset for SensorSet {
    fn reset_all_peaks(&mut self) {
        self.head_imu.reset_peaks();
        self.body_imu.reset_peaks();
        self.head_accel.reset_peaks();
        self.body_accel.reset_peaks();
        self.left_cell.reset_peaks();
        self.right_cell.reset_peaks();
    }
}

pub struct System {
    pub sensors: SensorSet,
    pub session: SessionMachine,
    pub logger: SynchronizedLogger<SensorSet>,
    pub faults: StartupFaults,
}

impl System {
    /// Initialise every device, register the live streams with the logger
    /// and record the startup fault bits. `storage_ok` is the outcome of
    /// mounting the storage medium.
    pub fn bring_up(
        sources: Sources,
        storage: Box<dyn Storage>,
        storage_ok: bool,
        policy: &BringUpPolicy,
    ) -> anyhow::Result<Self> {
        let mut sensors = SensorSet::new(sources)?;
        let mut faults = sensors.init(policy);
        faults.set(StartupFaults::STORAGE, !storage_ok);

        let mut logger = SynchronizedLogger::new(storage, LOG_FILE_BASE, LOG_FILE_EXTENSION);
        register_streams(&mut logger, &sensors)?;

        if faults.is_clear() {
            log::info!("Startup complete, all monitored devices present");
        } else {
            log::warn!("Startup faults: {:#06b}", faults.bits());
        }

        Ok(Self { sensors, session: SessionMachine::new(), logger, faults })
    }
}

/// Register every stream whose device came up. Scalars first, then vectors.
fn register_streams(
    logger: &mut SynchronizedLogger<SensorSet>,
    sensors: &SensorSet,
) -> anyhow::Result<()> {
    let registry = logger.registry_mut();

    if sensors.left_cell.stream().is_initialized() {
        registry.register_scalar(|s| s.left_cell.stream_mut())?;
    }
    if sensors.right_cell.stream().is_initialized() {
        registry.register_scalar(|s| s.right_cell.stream_mut())?;
    }
    registry.register_scalar(|s| &mut s.concussion)?;

    if sensors.head_imu.is_initialized() {
        registry.register_vector(|s| s.head_imu.accel_stream_mut())?;
        registry.register_vector(|s| s.head_imu.gyro_stream_mut())?;
    }
    if sensors.head_accel.stream().is_initialized() {
        registry.register_vector(|s| s.head_accel.stream_mut())?;
    }
    if sensors.body_imu.is_initialized() {
        registry.register_vector(|s| s.body_imu.accel_stream_mut())?;
        registry.register_vector(|s| s.body_imu.gyro_stream_mut())?;
    }
    if sensors.body_accel.stream().is_initialized() {
        registry.register_vector(|s| s.body_accel.stream_mut())?;
    }

    log::info!("{} streams registered for logging", registry.stream_count());
    Ok(())
}
