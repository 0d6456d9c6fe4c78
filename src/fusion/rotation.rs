// ImpactWatch — Dead-reckoning orientation from angular rate
//
// `angle += (rate - bias) * dt` per axis. There is no drift correction; a
// session only lasts seconds, so the accumulated error stays small.

use crate::events::Sample3;

#[derive(Debug, Clone, Copy, Default)]
pub struct RotationEstimator {
    bias: Sample3,
    angle: Sample3,
}

impl RotationEstimator {
    pub fn new(bias: Sample3) -> Self {
        Self { bias, angle: Sample3::ZERO }
    }

    pub fn set_bias(&mut self, bias: Sample3) {
        self.bias = bias;
    }

    pub fn bias(&self) -> Sample3 {
        self.bias
    }

    /// Integrate one raw rate sample (rad/s) over `dt_s` seconds and return
    /// the bias-corrected rate.
    pub fn update(&mut self, raw_rate: Sample3, dt_s: f64) -> Sample3 {
        let rate = raw_rate - self.bias;
        self.angle += rate * dt_s;
        rate
    }

    /// Accumulated angle in radians.
    pub fn angle(&self) -> Sample3 {
        self.angle
    }
}
