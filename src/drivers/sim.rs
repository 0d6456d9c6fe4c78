// ImpactWatch — Simulated sources
//
// Bench-mode and test stand-ins for the chip bindings. Each simulator is a
// cheap handle: clones share state, so a test (or the bench scenario) keeps
// one handle to steer readings while the device owns the other.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::bail;

use crate::config::STANDARD_GRAVITY;
use crate::drivers::{AccelSource, ImuReading, ImuSource, LoadCellSource, TemperatureSource};
use crate::events::Sample3;
use crate::logger::FsStorage;
use crate::state::{BringUpPolicy, Sources, System};

#[derive(Debug)]
struct SimState<T> {
    value: T,
    present: bool,
    ready: bool,
}

#[derive(Debug)]
struct Handle<T>(Arc<Mutex<SimState<T>>>);

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Copy> Handle<T> {
    fn new(value: T) -> Self {
        Self(Arc::new(Mutex::new(SimState { value, present: true, ready: true })))
    }

    fn lock(&self) -> MutexGuard<'_, SimState<T>> {
        self.0.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn read(&self, what: &str) -> anyhow::Result<T> {
        let state = self.lock();
        if !state.present {
            bail!("{} not responding", what);
        }
        Ok(state.value)
    }

    fn probe(&self, what: &str) -> anyhow::Result<()> {
        self.read(what).map(|_| ())
    }
}

macro_rules! sim_controls {
    ($ty:ident, $setter:ident, $value:ty) => {
        impl $ty {
            pub fn $setter(&self, value: $value) {
                self.0.lock().value = value;
            }

            /// `false` makes every call fail as if the part were unplugged.
            pub fn set_present(&self, present: bool) {
                self.0.lock().present = present;
            }
        }
    };
}

#[derive(Debug, Clone)]
pub struct SimImu(Handle<ImuReading>);

impl SimImu {
    pub fn new(reading: ImuReading) -> Self {
        Self(Handle::new(reading))
    }
}

sim_controls!(SimImu, set_reading, ImuReading);

impl ImuSource for SimImu {
    fn begin(&mut self) -> anyhow::Result<()> {
        self.0.probe("IMU")
    }

    fn read(&mut self) -> anyhow::Result<ImuReading> {
        self.0.read("IMU")
    }
}

#[derive(Debug, Clone)]
pub struct SimAccel(Handle<Sample3>);

impl SimAccel {
    pub fn new(reading: Sample3) -> Self {
        Self(Handle::new(reading))
    }
}

sim_controls!(SimAccel, set_reading, Sample3);

impl AccelSource for SimAccel {
    fn begin(&mut self) -> anyhow::Result<()> {
        self.0.probe("accelerometer")
    }

    fn read(&mut self) -> anyhow::Result<Sample3> {
        self.0.read("accelerometer")
    }
}

#[derive(Debug, Clone)]
pub struct SimLoadCell(Handle<f64>);

impl SimLoadCell {
    pub fn new(raw: f64) -> Self {
        Self(Handle::new(raw))
    }

    pub fn set_ready(&self, ready: bool) {
        self.0.lock().ready = ready;
    }
}

sim_controls!(SimLoadCell, set_raw, f64);

impl LoadCellSource for SimLoadCell {
    fn begin(&mut self) -> anyhow::Result<()> {
        self.0.probe("load cell amplifier")
    }

    fn wait_ready(&mut self, _timeout: Duration) -> bool {
        let state = self.0.lock();
        state.present && state.ready
    }

    fn read_raw(&mut self) -> anyhow::Result<f64> {
        self.0.read("load cell amplifier")
    }
}

#[derive(Debug, Clone)]
pub struct SimThermometer(Handle<f64>);

impl SimThermometer {
    pub fn new(celsius: f64) -> Self {
        Self(Handle::new(celsius))
    }
}

sim_controls!(SimThermometer, set_celsius, f64);

impl TemperatureSource for SimThermometer {
    fn begin(&mut self) -> anyhow::Result<()> {
        self.0.probe("thermometer")
    }

    fn read_celsius(&mut self) -> anyhow::Result<f64> {
        self.0.read("thermometer")
    }
}

// ---------------------------------------------------------------------------
// Full harness
// ---------------------------------------------------------------------------

/// One simulator per sensor position, plus helpers for scripted scenarios.
#[derive(Debug, Clone)]
pub struct SimRig {
    pub head_imu: SimImu,
    pub body_imu: SimImu,
    pub head_accel: SimAccel,
    pub body_accel: SimAccel,
    pub left_cell: SimLoadCell,
    pub right_cell: SimLoadCell,
    pub thermometer: SimThermometer,
}

/// Raw amplifier counts for a lightly loaded pad.
const RESTING_LOAD_RAW: f64 = 20_000.0;

impl SimRig {
    /// Upright and still: 1 g on Z, no rotation, light shoulder load, 22 °C.
    pub fn at_rest() -> Self {
        let still = ImuReading { accel: Self::upright(), gyro: Sample3::ZERO };
        Self {
            head_imu: SimImu::new(still),
            body_imu: SimImu::new(still),
            head_accel: SimAccel::new(Self::upright()),
            body_accel: SimAccel::new(Self::upright()),
            left_cell: SimLoadCell::new(RESTING_LOAD_RAW),
            right_cell: SimLoadCell::new(RESTING_LOAD_RAW),
            thermometer: SimThermometer::new(22.0),
        }
    }

    fn upright() -> Sample3 {
        Sample3::new(0.0, 0.0, STANDARD_GRAVITY)
    }

    pub fn sources(&self) -> Sources {
        Sources {
            head_imu: Box::new(self.head_imu.clone()),
            body_imu: Box::new(self.body_imu.clone()),
            head_accel: Box::new(self.head_accel.clone()),
            body_accel: Box::new(self.body_accel.clone()),
            left_cell: Box::new(self.left_cell.clone()),
            right_cell: Box::new(self.right_cell.clone()),
            thermometer: Box::new(self.thermometer.clone()),
        }
    }

    /// Bring up a full system on these simulators without bring-up delays,
    /// logging into `log_dir`.
    pub fn system(&self, log_dir: &Path) -> anyhow::Result<System> {
        self.system_with(log_dir, &BringUpPolicy::immediate())
    }

    pub fn system_with(&self, log_dir: &Path, policy: &BringUpPolicy) -> anyhow::Result<System> {
        let storage = FsStorage::new(log_dir)?;
        System::bring_up(self.sources(), Box::new(storage), true, policy)
    }

    /// Blow to the helmet along X: `linear_g` on the high-g part (the low-g
    /// part clips at 16 g) and `rate` rad/s of yaw.
    pub fn head_hit(&self, linear_g: f64, rate: f64) {
        let clipped = linear_g.min(16.0);
        self.head_imu.set_reading(ImuReading {
            accel: Sample3::new(clipped * STANDARD_GRAVITY, 0.0, STANDARD_GRAVITY),
            gyro: Sample3::new(0.0, 0.0, rate),
        });
        self.head_accel
            .set_reading(Sample3::new(linear_g * STANDARD_GRAVITY, 0.0, STANDARD_GRAVITY));
    }

    /// Return every position to rest.
    pub fn settle(&self) {
        let still = ImuReading { accel: Self::upright(), gyro: Sample3::ZERO };
        self.head_imu.set_reading(still);
        self.body_imu.set_reading(still);
        self.head_accel.set_reading(Self::upright());
        self.body_accel.set_reading(Self::upright());
        self.left_cell.set_raw(RESTING_LOAD_RAW);
        self.right_cell.set_raw(RESTING_LOAD_RAW);
    }
}
