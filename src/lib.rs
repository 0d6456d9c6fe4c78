// ImpactWatch — Concussion monitoring firmware core
//
// Sensor fusion, impact/concussion detection and synchronized CSV logging for
// a shoulder-pad and helmet sensor harness. Everything here runs on the
// device and on a host (against simulated sources), the board bindings live
// in the firmware binary.

pub mod buffer;
pub mod calibration;
pub mod config;
pub mod drivers;
pub mod events;
pub mod fusion;
pub mod input;
pub mod logger;
pub mod runtime;
pub mod scorer;
pub mod session;
pub mod state;
pub mod tasks;

pub use runtime::Runtime;
pub use state::{BringUpPolicy, Shared, Sources, System};
