//! Heater calibration curve fitting.

use nalgebra::{Cholesky, Matrix2, Vector2};
use tracing::info;

use crate::analysis::segment::Run;
use crate::error::PreconditionError;
use crate::types::RunKind;

/// Linear model mapping electric heat load (W) to liquid-level decay rate
/// (%/s), fitted once per calibration session and read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationModel {
    /// Fitted slope, %/(s·W).
    pub slope: f64,
    /// Fitted y-intercept, %/s.
    pub intercept: f64,
    /// Heat-load correction for imperfect valve positioning, watts.
    ///
    /// A correctly balanced valve makes zero heat load imply zero decay
    /// rate, i.e. the fitted line passes through the origin. This is the
    /// negative x-intercept of the fitted line: adding it to every measured
    /// heat load moves the line onto the origin.
    pub heat_adjustment: f64,
}

impl CalibrationModel {
    /// Heat load implied by a decay-rate slope, before adjustments.
    pub fn implied_heat_load(&self, dll_dt: f64) -> f64 {
        dll_dt / self.slope
    }

    /// Decay rate the model predicts for an adjusted heat load.
    pub fn predicted_slope(&self, heat_load_w: f64) -> f64 {
        self.slope * heat_load_w
    }
}

/// Fit a [`CalibrationModel`] from a session's heater runs.
///
/// Ordinary least squares of (actual electric heat load, fitted dLL/dt)
/// pairs, solved through the 2x2 normal equations. Requires at least two
/// *distinct* heat-load points; with a single point the slope is
/// unconstrained and the fit is refused.
pub fn fit_calibration(runs: &[Run]) -> Result<CalibrationModel, PreconditionError> {
    let points: Vec<(f64, f64)> = runs
        .iter()
        .filter(|r| r.kind == RunKind::Heater)
        .map(|r| (r.elec_heat_actual_w, r.fit.slope))
        .collect();

    let mut distinct: Vec<f64> = points.iter().map(|p| p.0).collect();
    distinct.sort_by(|a, b| a.total_cmp(b));
    distinct.dedup();
    if distinct.len() < 2 {
        return Err(PreconditionError::InsufficientCalibrationPoints {
            distinct: distinct.len(),
        });
    }

    // Normal equations for y = intercept + slope * x:
    //   [ n      sum x   ] [ intercept ]   [ sum y  ]
    //   [ sum x  sum x^2 ] [ slope     ] = [ sum xy ]
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|p| p.0).sum();
    let sum_xx: f64 = points.iter().map(|p| p.0 * p.0).sum();
    let sum_y: f64 = points.iter().map(|p| p.1).sum();
    let sum_xy: f64 = points.iter().map(|p| p.0 * p.1).sum();

    let gram = Matrix2::new(n, sum_x, sum_x, sum_xx);
    let rhs = Vector2::new(sum_y, sum_xy);

    let chol = Cholesky::new(gram).ok_or_else(|| PreconditionError::MalformedTelemetry {
        detail: "calibration design matrix is singular".to_string(),
    })?;
    let beta = chol.solve(&rhs);

    let intercept = beta[0];
    let slope = beta[1];
    let x_intercept = -intercept / slope;
    let heat_adjustment = -x_intercept;

    info!(
        slope,
        intercept, heat_adjustment, points = points.len(),
        "fitted heater calibration curve"
    );

    Ok(CalibrationModel {
        slope,
        intercept,
        heat_adjustment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::segment::RunDiagnostics;
    use crate::statistics::LineFit;

    fn heater_run(heat_w: f64, slope: f64) -> Run {
        Run {
            start: 0,
            end: 1,
            kind: RunKind::Heater,
            elec_heat_commanded_w: heat_w,
            elec_heat_actual_w: heat_w,
            fit: LineFit {
                slope,
                intercept: 0.0,
                r_squared: 1.0,
            },
            diagnostics: RunDiagnostics {
                settle_cutoff_s: 0.0,
                duration_min: 10.0,
                r_squared: 1.0,
            },
        }
    }

    #[test]
    fn three_point_line_through_origin() {
        let runs = vec![
            heater_run(5.0, -0.01),
            heater_run(10.0, -0.02),
            heater_run(15.0, -0.03),
        ];

        let model = fit_calibration(&runs).unwrap();
        assert!((model.slope - -0.002).abs() < 1e-12);
        assert!(model.intercept.abs() < 1e-12);
        assert!(model.heat_adjustment.abs() < 1e-9);
    }

    #[test]
    fn offset_line_yields_adjustment() {
        // y = -0.002 x - 0.004: x-intercept at -2 W, adjustment +2 W.
        let runs = vec![
            heater_run(5.0, -0.014),
            heater_run(10.0, -0.024),
            heater_run(15.0, -0.034),
        ];

        let model = fit_calibration(&runs).unwrap();
        assert!((model.slope - -0.002).abs() < 1e-12);
        assert!((model.intercept - -0.004).abs() < 1e-12);
        assert!((model.heat_adjustment - 2.0).abs() < 1e-9);
    }

    #[test]
    fn one_distinct_point_is_a_precondition_fault() {
        let runs = vec![heater_run(5.0, -0.01), heater_run(5.0, -0.011)];

        match fit_calibration(&runs) {
            Err(PreconditionError::InsufficientCalibrationPoints { distinct }) => {
                assert_eq!(distinct, 1)
            }
            other => panic!("expected precondition fault, got {other:?}"),
        }
    }

    #[test]
    fn rf_runs_are_ignored() {
        let mut rf = heater_run(0.0, -0.005);
        rf.kind = RunKind::Rf;
        let runs = vec![rf, heater_run(5.0, -0.01)];

        assert!(fit_calibration(&runs).is_err());
    }

    #[test]
    fn projection_roundtrip() {
        let runs = vec![heater_run(5.0, -0.01), heater_run(15.0, -0.03)];
        let model = fit_calibration(&runs).unwrap();

        let heat = model.implied_heat_load(-0.02);
        assert!((heat - 10.0).abs() < 1e-9);
        assert!((model.predicted_slope(heat) - -0.02).abs() < 1e-12);
    }
}
