//! Statistical primitives for telemetry reduction.
//!
//! - Ordinary least-squares line fitting with goodness-of-fit diagnostics
//! - Windowed median filtering for despiking level sensors

mod linefit;
mod median;

pub use linefit::{fit_line, LineFit};
pub use median::median_filter;
