// ImpactWatch — Load-cell force curves
//
// A curve is the exact quadratic `w = a·r² + b·r + c` through three
// `(raw, weight)` pairs. Two curves taken at two ambient temperatures give a
// linear drift of the intercept, which corrects readings at run time.

use crate::config::LoadCellCalibration;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadCellCurve {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl LoadCellCurve {
    /// Closed-form fit through three points. Returns `None` when two raw
    /// readings coincide (the system is singular).
    pub fn fit(points: &[(f64, f64); 3]) -> Option<Self> {
        let [(x1, y1), (x2, y2), (x3, y3)] = *points;
        let denom = (x1 - x2) * (x1 - x3) * (x2 - x3);
        if denom == 0.0 || !denom.is_finite() {
            return None;
        }
        let a = (x3 * (y2 - y1) + x2 * (y1 - y3) + x1 * (y3 - y2)) / denom;
        let b = (x3 * x3 * (y1 - y2) + x2 * x2 * (y3 - y1) + x1 * x1 * (y2 - y3)) / denom;
        let c = (x2 * x3 * (x2 - x3) * y1 + x3 * x1 * (x3 - x1) * y2 + x1 * x2 * (x1 - x2) * y3)
            / denom;
        Some(Self { a, b, c })
    }

    pub fn evaluate(&self, raw: f64) -> f64 {
        self.a * raw * raw + self.b * raw + self.c
    }
}

/// A fitted curve plus its temperature compensation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadCellCalibrator {
    curve: LoadCellCurve,
    temp_factor: f64,
    reference_temp: f64,
}

impl LoadCellCalibrator {
    /// Fit both curves and derive the intercept drift per degree.
    pub fn from_calibration(cal: &LoadCellCalibration) -> anyhow::Result<Self> {
        let [t1, t2] = cal.temperatures;
        let first = LoadCellCurve::fit(&cal.curves[0])
            .ok_or_else(|| anyhow::anyhow!("first calibration curve has repeated raw readings"))?;
        let second = LoadCellCurve::fit(&cal.curves[1])
            .ok_or_else(|| anyhow::anyhow!("second calibration curve has repeated raw readings"))?;

        let temp_factor = if t1 == t2 || first.c == second.c {
            0.0
        } else {
            (second.c - first.c) / (t2 - t1)
        };

        log::info!(
            "Load cell curve a={:.9} b={:.9} c={:.9} temp factor={:.6}",
            first.a,
            first.b,
            first.c,
            temp_factor
        );

        Ok(Self { curve: first, temp_factor, reference_temp: t1 })
    }

    pub fn curve(&self) -> &LoadCellCurve {
        &self.curve
    }

    pub fn temp_factor(&self) -> f64 {
        self.temp_factor
    }

    /// Weight for a raw reading at the given ambient temperature (°C).
    pub fn weight(&self, raw: f64, current_temp: f64) -> f64 {
        self.curve.evaluate(raw) + self.temp_factor * (current_temp - self.reference_temp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LEFT_CELL_CALIBRATION;
    use approx::assert_relative_eq;

    #[test]
    fn fit_reproduces_its_points() {
        let points = [(15300.0, 0.0), (41100.0, 22.7), (55200.0, 45.4)];
        let curve = LoadCellCurve::fit(&points).unwrap();
        for (raw, weight) in points {
            assert_relative_eq!(curve.evaluate(raw), weight, epsilon = 1e-6);
        }
    }

    #[test]
    fn fit_recovers_known_quadratic() {
        let f = |x: f64| 0.5 * x * x - 3.0 * x + 7.0;
        let curve = LoadCellCurve::fit(&[(-2.0, f(-2.0)), (1.0, f(1.0)), (4.0, f(4.0))]).unwrap();
        assert_relative_eq!(curve.a, 0.5, epsilon = 1e-12);
        assert_relative_eq!(curve.b, -3.0, epsilon = 1e-12);
        assert_relative_eq!(curve.c, 7.0, epsilon = 1e-12);
    }

    #[test]
    fn repeated_raw_reading_is_rejected() {
        assert!(LoadCellCurve::fit(&[(1.0, 0.0), (1.0, 2.0), (3.0, 4.0)]).is_none());
    }

    #[test]
    fn equal_temperatures_disable_compensation() {
        let cal = LoadCellCalibrator::from_calibration(&LEFT_CELL_CALIBRATION).unwrap();
        assert_eq!(cal.temp_factor(), 0.0);
        assert_relative_eq!(cal.weight(41100.0, 35.0), 22.7, epsilon = 0.1);
    }

    #[test]
    fn temperature_shifts_the_intercept() {
        let cold = [(0.0, 1.0), (1.0, 2.0), (2.0, 3.0)];
        let warm = [(0.0, 3.0), (1.0, 4.0), (2.0, 5.0)];
        let cal = LoadCellCalibrator::from_calibration(&LoadCellCalibration {
            temperatures: [10.0, 20.0],
            curves: [cold, warm],
        })
        .unwrap();
        assert_relative_eq!(cal.temp_factor(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(cal.weight(1.0, 10.0), 2.0, epsilon = 1e-12);
        assert_relative_eq!(cal.weight(1.0, 15.0), 3.0, epsilon = 1e-12);
    }
}
