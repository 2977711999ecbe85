//! Error types for measurement and analysis failures.
//!
//! The taxonomy mirrors how faults are handled:
//! - precondition faults are reported to the caller without retry;
//! - stability faults carry a retry policy (cool down, narrow the window);
//! - a quench with hardware protection disabled is terminal and requires
//!   powering down the controlled element;
//! - instrument faults propagate from the I/O layer unchanged.
//!
//! Data anomalies (non-physical sensor readings) are deliberately *not*
//! errors: they are counted and substituted during analysis.

use std::fmt;

/// Top-level error for session construction and procedure control.
#[derive(Debug)]
pub enum Error {
    /// Input data cannot support the requested analysis.
    Precondition(PreconditionError),

    /// Cryogenic conditions were not stable enough to establish a reference
    /// operating point. Carries the retry policy the caller should apply.
    Stability {
        /// Hours of history searched before giving up.
        searched_hours: f64,
        /// Recommended cool-down before retrying, seconds.
        retry_after_s: u64,
        /// Recommended narrowed search window for the retry, hours.
        narrowed_window_hours: f64,
    },

    /// Cavity gradient collapsed while hardware quench protection was
    /// disabled. The caller must power down the controlled element.
    Quench {
        /// Reading before the drop.
        previous: f64,
        /// Reading that triggered the fault.
        measured: f64,
    },

    /// Instrument read/write failure.
    Instrument(InstrumentError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Precondition(e) => write!(f, "precondition fault: {e}"),
            Self::Stability {
                searched_hours,
                retry_after_s,
                narrowed_window_hours,
            } => write!(
                f,
                "cryo conditions not stable over the last {searched_hours} h; \
                 wait {retry_after_s} s and retry over {narrowed_window_hours} h"
            ),
            Self::Quench { previous, measured } => write!(
                f,
                "quench detected ({previous} -> {measured}) with protection disabled - aborting"
            ),
            Self::Instrument(e) => write!(f, "instrument fault: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Precondition(e) => Some(e),
            Self::Instrument(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PreconditionError> for Error {
    fn from(e: PreconditionError) -> Self {
        Self::Precondition(e)
    }
}

impl From<InstrumentError> for Error {
    fn from(e: InstrumentError) -> Self {
        Self::Instrument(e)
    }
}

/// A fault in the inputs to an analysis; never retried automatically.
#[derive(Debug, Clone, PartialEq)]
pub enum PreconditionError {
    /// Calibration fitting needs at least two distinct heat-load points.
    InsufficientCalibrationPoints {
        /// Number of distinct heat loads actually available.
        distinct: usize,
    },

    /// The archive returned no data for a required channel.
    MissingArchiveData {
        /// Channel (process variable) name.
        channel: String,
    },

    /// A telemetry table failed a structural check.
    MalformedTelemetry {
        /// Human-readable description of the defect.
        detail: String,
    },
}

impl fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientCalibrationPoints { distinct } => write!(
                f,
                "calibration requires >= 2 distinct heat-load points, got {distinct}"
            ),
            Self::MissingArchiveData { channel } => {
                write!(f, "no archive data for channel {channel}")
            }
            Self::MalformedTelemetry { detail } => write!(f, "malformed telemetry: {detail}"),
        }
    }
}

impl std::error::Error for PreconditionError {}

/// Failure reported by the instrument-access collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentError {
    /// Channel (process variable) the operation targeted.
    pub channel: String,
    /// Operation that failed.
    pub op: InstrumentOp,
    /// Collaborator-provided detail.
    pub detail: String,
}

/// The instrument operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentOp {
    /// Synchronous read.
    Get,
    /// Synchronous write.
    Set,
}

impl fmt::Display for InstrumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            InstrumentOp::Get => "get",
            InstrumentOp::Set => "set",
        };
        write!(f, "{op} {} failed: {}", self.channel, self.detail)
    }
}

impl std::error::Error for InstrumentError {}
