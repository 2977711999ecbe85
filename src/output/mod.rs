//! Session reporting and persistence schemas.

mod index;
mod report;

pub use index::{append_index_row, CalibrationIndexRow, Q0IndexRow};
pub use report::{format_calibration_report, format_q0_report, heater_run_label, rf_run_label};
