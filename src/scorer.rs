// ImpactWatch — Concussion risk from peak head kinematics
//
// Logistic model combining peak linear acceleration (g) and peak angular
// rate (deg/s):
// `P = 1 / (1 + exp(10.2 − 0.0433·a − 0.000873·ω + 0.00000092·a·ω))`.

use crate::config::{CONCUSSION_THRESHOLD, IMPACT_THRESHOLD_G, LOW_G_SATURATION_G};
use crate::events::Sample3;

pub fn concussion_probability(accel_g: f64, rate: f64) -> f64 {
    let exponent = 10.2 - 0.0433 * accel_g - 0.000873 * rate + 0.000_000_92 * accel_g * rate;
    1.0 / (1.0 + exponent.exp())
}

/// Linear acceleration magnitude to score. A low-range peak with any axis
/// beyond the saturation threshold is assumed clipped, so the high-range
/// sensor's peak is used instead.
pub fn linear_peak(low_range_peak: Sample3, high_range_peak: Sample3) -> f64 {
    if low_range_peak.max_abs_axis() > LOW_G_SATURATION_G {
        high_range_peak.magnitude()
    } else {
        low_range_peak.magnitude()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub probability: f64,
    pub concussion: bool,
}

pub fn assess(low_range_peak: Sample3, high_range_peak: Sample3, rate_peak: Sample3) -> Assessment {
    let probability =
        concussion_probability(linear_peak(low_range_peak, high_range_peak), rate_peak.magnitude());
    Assessment { probability, concussion: probability > CONCUSSION_THRESHOLD }
}

pub fn is_impact(accel_peak_magnitude: f64) -> bool {
    accel_peak_magnitude > IMPACT_THRESHOLD_G
}
