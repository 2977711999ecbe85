//! RF heat load derivation and temperature-corrected Q0.

use tracing::warn;

use crate::analysis::calibration::CalibrationModel;
use crate::analysis::segment::Run;
use crate::constants::{
    CAVITY_LENGTH_M, DESIGN_GRADIENT_MV_M, DESIGN_HEAT_LOAD_W, HELIUM_TEMP_OFFSET_K,
    HELIUM_TEMP_SLOPE_K_PER_TORR, Q0_C1, Q0_C2, Q0_C3, Q0_C5, Q0_C6, Q0_GRADIENT_OFFSET,
    R_OVER_Q_OHMS,
};
use crate::telemetry::TelemetryBuffer;
use crate::types::RunKind;

/// Derived quantities for one RF run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RfResult {
    /// Total heat load implied by the decay rate, watts.
    pub total_heat_w: f64,
    /// RF share of the heat load (total minus electric), watts.
    pub rf_heat_w: f64,
    /// Mean of the per-sample quality factors.
    pub q0: f64,
    /// Mean helium pressure over the run, torr.
    pub avg_pressure_torr: f64,
    /// RMS gradient over the run, MV/m.
    pub rms_gradient_mv_m: f64,
    /// Samples whose gradient reading was non-positive and was replaced by
    /// the session's target gradient.
    pub anomalous_gradient_samples: usize,
}

/// Average heat adjustment over a Q0 session's heater runs.
///
/// Each heater run provides an independent estimate of the valve-position
/// error: the difference between the electric heat it actually injected and
/// the heat the calibration curve back-computes from its decay rate.
/// Returns 0.0 when the session took no heater runs.
pub fn average_heat_adjustment(runs: &[Run], model: &CalibrationModel) -> f64 {
    let adjustments: Vec<f64> = runs
        .iter()
        .filter(|r| r.kind == RunKind::Heater)
        .map(|r| r.elec_heat_actual_w - model.implied_heat_load(r.fit.slope))
        .filter(|a| a.is_finite())
        .collect();

    if adjustments.is_empty() {
        return 0.0;
    }
    adjustments.iter().sum::<f64>() / adjustments.len() as f64
}

/// Evaluate an RF run against a calibration model.
///
/// The run's decay rate projects through the calibration slope into a total
/// heat load; subtracting the electric heat load leaves the RF heat load,
/// which the Q0 formula converts to a quality factor per sample.
///
/// `target_gradient` substitutes for non-positive gradient readings (the
/// archiver occasionally records zeros); such samples are counted, not
/// fatal.
pub fn evaluate_rf_run(
    buffer: &TelemetryBuffer,
    run: &Run,
    model: &CalibrationModel,
    avg_heat_adjustment: f64,
    target_gradient: f64,
) -> RfResult {
    let total_heat_w = model.implied_heat_load(run.fit.slope) + avg_heat_adjustment;
    let rf_heat_w = total_heat_w - run.elec_heat_actual_w;

    let mut q0_sum = 0.0;
    let mut grad_sq_sum = 0.0;
    let mut pressure_sum = 0.0;
    let mut anomalies = 0usize;
    let count = run.end - run.start + 1;

    for idx in run.start..=run.end {
        let pressure = if buffer.pressure.is_empty() {
            0.0
        } else {
            buffer.pressure[idx]
        };

        let gradient = match buffer.gradient_mv_m(idx) {
            Some(g) if g > 0.0 => g,
            _ => {
                anomalies += 1;
                target_gradient
            }
        };

        q0_sum += calc_q0(gradient, rf_heat_w, pressure);
        grad_sq_sum += gradient * gradient;
        pressure_sum += pressure;
    }

    if anomalies > 0 {
        warn!(
            anomalies,
            "gradient buffer had non-positive samples; used the target gradient instead - \
             consider refetching from the archiver"
        );
    }

    RfResult {
        total_heat_w,
        rf_heat_w,
        q0: q0_sum / count as f64,
        avg_pressure_torr: pressure_sum / count as f64,
        rms_gradient_mv_m: (grad_sq_sum / count as f64).sqrt(),
        anomalous_gradient_samples: anomalies,
    }
}

/// Quality factor from gradient (MV/m), RF heat load (W), and helium
/// pressure (torr).
///
/// The uncorrected Q0 follows from stored energy over dissipation; the
/// correction accounts for the temperature dependence of the BCS surface
/// resistance at the 2 K bath temperature implied by the pressure. Pure
/// function of its inputs.
pub fn calc_q0(gradient_mv_m: f64, rf_heat_w: f64, pressure_torr: f64) -> f64 {
    let gradient_v_m = gradient_mv_m * 1e6;
    let uncorrected = (gradient_v_m * CAVITY_LENGTH_M).powi(2) / (R_OVER_Q_OHMS * rf_heat_w);

    let helium_temp_k =
        pressure_torr * HELIUM_TEMP_SLOPE_K_PER_TORR + HELIUM_TEMP_OFFSET_K;

    let c4 = gradient_mv_m - Q0_GRADIENT_OFFSET;
    let c7 = Q0_C2 - Q0_C3 * c4 + Q0_C5 * c4 * c4;

    Q0_C1
        / ((c7 / 2.0) * (Q0_C6 / 2.0).exp() + Q0_C1 / uncorrected
            - (c7 / helium_temp_k) * (Q0_C6 / helium_temp_k).exp())
}

/// Expected heat load (W) from a cavity gradient at the design point.
///
/// A design-Q0 cavity dissipates 9.6 W at 16 MV/m and the heat scales
/// quadratically with gradient. Non-positive gradients are sensor noise and
/// imply no heat.
pub fn approx_heat_from_gradient(gradient_mv_m: f64) -> f64 {
    if gradient_mv_m > 0.0 {
        (gradient_mv_m / DESIGN_GRADIENT_MV_M).powi(2) * DESIGN_HEAT_LOAD_W
    } else {
        0.0
    }
}
