pub mod motion;
pub mod rotation;

pub use motion::{average_offset, compensate, gravity_vector, GyroChannel, MotionChannel, PeakTracker};
pub use rotation::RotationEstimator;
