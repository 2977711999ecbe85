//! Time-aligned telemetry storage.
//!
//! A [`TelemetryBuffer`] holds the parallel channel columns a measurement
//! session works on. Buffers are built once from an archive fetch, smoothed,
//! and then treated as read-only by segmentation and fitting.

mod buffer;

pub use buffer::{IngestStats, TelemetryBuffer};
