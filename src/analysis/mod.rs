//! Telemetry reduction: runs, calibration curves, Q0.
//!
//! All functions here are pure over an immutable [`TelemetryBuffer`]; they
//! can run off the control thread entirely.
//!
//! The pipeline is:
//! 1. [`extract_runs`] segments a buffer into stability-filtered runs and
//!    fits each one's liquid-level decay rate;
//! 2. [`fit_calibration`] turns heater runs into a [`CalibrationModel`];
//! 3. [`evaluate_rf_run`] projects an RF run through the model into an RF
//!    heat load and a temperature-corrected Q0.

mod calibration;
mod q0;
mod segment;

pub use calibration::{fit_calibration, CalibrationModel};
pub use q0::{
    approx_heat_from_gradient, average_heat_adjustment, calc_q0, evaluate_rf_run, RfResult,
};
pub use segment::{
    extract_runs, segment_spans, trim_settle, Run, RunDiagnostics, RunSpan, SessionProfile,
};
