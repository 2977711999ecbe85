//! Collaborator interfaces for instrument access and the telemetry archive.
//!
//! The crate never talks to hardware or the archiver directly; both layers
//! are injected through the traits here. Production wires these to the
//! control-system bindings, tests wire them to in-memory fakes.

mod channels;

pub use channels::CryomoduleChannels;

use crate::error::InstrumentError;

/// Synchronous access to named process variables.
///
/// Both operations block for the physical polling latency of the control
/// system. Failures surface as [`InstrumentError`] and abort the current
/// procedure; there is no silent retry at this layer.
pub trait Instrument {
    /// Read the current value of `channel`.
    fn get(&self, channel: &str) -> Result<f64, InstrumentError>;

    /// Write `value` to `channel`.
    fn set(&self, channel: &str, value: f64) -> Result<(), InstrumentError>;
}

/// Access to the historical telemetry archive.
pub trait TelemetryArchive {
    /// Fetch `sample_count` rows for `channels`, starting at `start_unix_s`
    /// with `interval_s` between rows.
    ///
    /// Rows are aligned by timestamp; a channel reading the archiver could
    /// not supply is `NaN` in the returned table.
    fn fetch_range(
        &self,
        channels: &[String],
        start_unix_s: i64,
        sample_count: usize,
        interval_s: u32,
    ) -> Result<ArchiveTable, InstrumentError>;
}

/// Column-major table of archived samples, aligned by timestamp.
#[derive(Debug, Clone, Default)]
pub struct ArchiveTable {
    /// Channel name per value column.
    pub channels: Vec<String>,
    /// Sample timestamps, unix seconds.
    pub unix_time: Vec<f64>,
    /// One value column per channel, each the same length as `unix_time`.
    /// Missing readings are `NaN`.
    pub values: Vec<Vec<f64>>,
}

impl ArchiveTable {
    /// Look up the value column for `channel`, if present.
    pub fn column(&self, channel: &str) -> Option<&[f64]> {
        self.channels
            .iter()
            .position(|c| c == channel)
            .map(|idx| self.values[idx].as_slice())
    }

    /// Number of samples in the table.
    pub fn len(&self) -> usize {
        self.unix_time.len()
    }

    /// True when the table holds no samples.
    pub fn is_empty(&self) -> bool {
        self.unix_time.is_empty()
    }

    /// Check that every value column matches the timestamp column in length.
    pub fn is_rectangular(&self) -> bool {
        self.channels.len() == self.values.len()
            && self.values.iter().all(|col| col.len() == self.unix_time.len())
    }
}
