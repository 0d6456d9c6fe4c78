// ImpactWatch — System Events & Data Types

use std::ops::{Add, AddAssign, Mul, Sub};

// ---------------------------------------------------------------------------
// 3-axis sample (acceleration, angular rate, orientation)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sample3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Sample3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Component-wise product.
    pub fn scale(&self, other: &Sample3) -> Sample3 {
        Sample3::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    /// Largest absolute single-axis value.
    pub fn max_abs_axis(&self) -> f64 {
        self.x.abs().max(self.y.abs()).max(self.z.abs())
    }
}

impl Add for Sample3 {
    type Output = Sample3;
    fn add(self, rhs: Sample3) -> Sample3 {
        Sample3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Sample3 {
    fn add_assign(&mut self, rhs: Sample3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Sample3 {
    type Output = Sample3;
    fn sub(self, rhs: Sample3) -> Sample3 {
        Sample3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Sample3 {
    type Output = Sample3;
    fn mul(self, rhs: f64) -> Sample3 {
        Sample3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Anything a peak tracker can rank.
pub trait Magnitude: Copy + Default {
    fn magnitude(&self) -> f64;
}

impl Magnitude for Sample3 {
    fn magnitude(&self) -> f64 {
        Sample3::magnitude(self)
    }
}

impl Magnitude for f64 {
    fn magnitude(&self) -> f64 {
        self.abs()
    }
}

// ---------------------------------------------------------------------------
// Detections
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    Impact,
    Concussion,
}

// ---------------------------------------------------------------------------
// HMI commands — sent to the control task via channel
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HmiCommand {
    /// Reset button: zero every sensor's tracked peak.
    ResetPeaks,
    /// Record button: latch an impact so a session starts (or extends).
    ForceRecording,
}

// ---------------------------------------------------------------------------
// Startup fault bitmask (shown on the status LEDs by the HMI layer)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupFaults(u8);

impl StartupFaults {
    pub const BODY_IMU: u8 = 0b0000_0001;
    pub const BODY_ACCEL: u8 = 0b0000_0010;
    pub const THERMOMETER: u8 = 0b0000_0100;
    pub const STORAGE: u8 = 0b0000_1000;

    pub fn set(&mut self, bit: u8, faulted: bool) {
        if faulted {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    pub fn contains(&self, bit: u8) -> bool {
        self.0 & bit == bit
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_clear(&self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitude_of_pythagorean_triple() {
        assert_eq!(Sample3::new(3.0, 4.0, 12.0).magnitude(), 13.0);
        assert_eq!(Magnitude::magnitude(&-2.5f64), 2.5);
    }

    #[test]
    fn fault_bits_accumulate() {
        let mut faults = StartupFaults::default();
        assert!(faults.is_clear());
        faults.set(StartupFaults::THERMOMETER, true);
        faults.set(StartupFaults::STORAGE, true);
        faults.set(StartupFaults::BODY_IMU, false);
        assert_eq!(faults.bits(), 0b1100);
        assert!(faults.contains(StartupFaults::STORAGE));
        assert!(!faults.contains(StartupFaults::BODY_ACCEL));
    }
}
