//! Human-readable session reports.

use colored::Colorize;

use crate::analysis::{RfResult, Run};
use crate::session::{CalibrationSession, Q0Session};
use crate::types::RunKind;

/// Label for a heater run, e.g. `-1.23e-4 %/s @ 5.2 W Electric Load`.
pub fn heater_run_label(run: &Run) -> String {
    format!(
        "{:.2e} %/s @ {:.2} W Electric Load",
        run.fit.slope, run.elec_heat_actual_w
    )
}

/// Label for an RF run, e.g. `-1.92e-2 %/s @ 16.0 MV/m, Q0 2.75e10`.
pub fn rf_run_label(run: &Run, result: &RfResult) -> String {
    format!(
        "{:.2e} %/s @ {:.1} MV/m, Q0 {:.2e}",
        run.fit.slope, result.rms_gradient_mv_m, result.q0
    )
}

/// Render a calibration session report for the terminal.
pub fn format_calibration_report(session: &CalibrationSession) -> String {
    let mut out = String::new();
    let title = format!("{} Heater Calibration", session.core.equipment);

    push_header(&mut out, &title);

    if session.core.runs.is_empty() {
        out.push_str(&format!(
            "{}\n",
            "No qualifying runs in this session.".yellow()
        ));
        return out;
    }

    for (num, run) in session.core.runs.iter().enumerate() {
        out.push_str(&format!(
            "{}\n",
            format!("  Run {} (heater)", num + 1).bold()
        ));
        out.push_str(&format!("    {}\n", heater_run_label(run)));
        push_diagnostics(&mut out, run);
    }

    match &session.model {
        Some(model) => {
            out.push_str(&format!(
                "  Calibration fit: {} %/(s*W)\n",
                format!("{:.2e}", model.slope).green()
            ));
            out.push_str(&format!(
                "  Curve intercept adjust: {} W\n",
                format!("{:.4}", model.heat_adjustment).green()
            ));
        }
        None => out.push_str(&format!(
            "{}\n",
            "  Too few heater points for a calibration fit.".yellow()
        )),
    }

    out
}

/// Render a Q0 session report for the terminal.
pub fn format_q0_report(session: &Q0Session) -> String {
    let mut out = String::new();
    let title = format!(
        "{} Q0 Measurement @ {:.1} MV/m",
        session.core.equipment, session.target_gradient
    );

    push_header(&mut out, &title);

    if session.core.runs.is_empty() {
        out.push_str(&format!(
            "{}\n",
            "No qualifying runs in this session.".yellow()
        ));
        return out;
    }

    let mut rf_results = session.rf_results.iter();
    for (num, run) in session.core.runs.iter().enumerate() {
        match run.kind {
            RunKind::Heater => {
                out.push_str(&format!(
                    "{}\n",
                    format!("  Run {} (heater)", num + 1).bold()
                ));
                out.push_str(&format!("    {}\n", heater_run_label(run)));
            }
            RunKind::Rf => {
                out.push_str(&format!("{}\n", format!("  Run {} (RF)", num + 1).bold()));
                if let Some(result) = rf_results.next() {
                    out.push_str(&format!("    {}\n", rf_run_label(run, result)));
                    out.push_str(&format!(
                        "    Avg pressure: {:.2} torr\n",
                        result.avg_pressure_torr
                    ));
                    out.push_str(&format!("    RF heat load: {:.2} W\n", result.rf_heat_w));
                    out.push_str(&format!(
                        "    Heat adjustment: {:.2} W\n",
                        session.avg_heat_adjustment
                    ));
                    out.push_str(&format!(
                        "    Calculated Q0: {}\n",
                        format!("{:.2e}", result.q0).green().bold()
                    ));
                    if result.anomalous_gradient_samples > 0 {
                        out.push_str(&format!(
                            "    {}\n",
                            format!(
                                "{} gradient samples substituted with the target value",
                                result.anomalous_gradient_samples
                            )
                            .yellow()
                        ));
                    }
                }
            }
        }
        push_diagnostics(&mut out, run);
    }

    out
}

fn push_header(out: &mut String, title: &str) {
    out.push_str(&format!("{}\n", "-".repeat(title.len() + 8)));
    out.push_str(&format!("    {}\n", title.bold()));
    out.push_str(&format!("{}\n", "-".repeat(title.len() + 8)));
}

fn push_diagnostics(out: &mut String, run: &Run) {
    out.push_str(&format!(
        "    Cutoff: {:.0} s  Duration: {:.1} min  R^2: {:.4}\n",
        run.diagnostics.settle_cutoff_s, run.diagnostics.duration_min, run.diagnostics.r_squared
    ));
}
