//! Small shared types used across the crate.

use serde::Serialize;

/// Time window over which a session's telemetry is sampled.
///
/// Times are unix seconds; the interval is the archive sampling period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeWindow {
    /// Window start, unix seconds.
    pub start_unix_s: i64,
    /// Window end, unix seconds. Must be after the start.
    pub end_unix_s: i64,
    /// Archive sampling interval in seconds. Must be positive.
    pub sample_interval_s: u32,
}

impl TimeWindow {
    /// Create a new time window.
    ///
    /// # Panics
    ///
    /// Panics if `end <= start` or the interval is zero.
    pub fn new(start_unix_s: i64, end_unix_s: i64, sample_interval_s: u32) -> Self {
        assert!(end_unix_s > start_unix_s, "time window end must be after start");
        assert!(sample_interval_s > 0, "sample interval must be positive");
        Self {
            start_unix_s,
            end_unix_s,
            sample_interval_s,
        }
    }

    /// Number of samples the window spans at its interval.
    pub fn sample_count(&self) -> usize {
        ((self.end_unix_s - self.start_unix_s) as u64 / u64::from(self.sample_interval_s)) as usize
    }

    /// Window duration in seconds.
    pub fn duration_s(&self) -> i64 {
        self.end_unix_s - self.start_unix_s
    }
}

/// Reference operating point of the cryogenic system ("valve params").
///
/// Captures the JT valve position and total heater load observed during a
/// stable baseline period. Runs are only valid while the plant stays near
/// this point, and all per-run heat loads are deltas against it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValveParams {
    /// Locked JT valve position, percent open.
    pub valve_position: f64,
    /// Total commanded heater power during the baseline, watts.
    pub ref_heat_load_commanded: f64,
    /// Total actual (readback) heater power during the baseline, watts.
    pub ref_heat_load_actual: f64,
}

impl ValveParams {
    /// Create a new reference operating point.
    pub fn new(valve_position: f64, commanded: f64, actual: f64) -> Self {
        Self {
            valve_position,
            ref_heat_load_commanded: commanded,
            ref_heat_load_actual: actual,
        }
    }
}

/// Classification of a telemetry run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RunKind {
    /// Commanded heater power differs from the reference; the fitted decay
    /// slope is a calibration data point.
    Heater,
    /// Heater power sits at the reference; the decay slope must be projected
    /// through a calibration model to recover the RF heat load.
    Rf,
}

/// Identifies the piece of hardware a session measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EquipmentId {
    /// Cryomodule number (facility numbering).
    pub cryomodule: u8,
    /// Cavity number within the cryomodule, or `None` for a
    /// cryomodule-level session.
    pub cavity: Option<u8>,
}

impl EquipmentId {
    /// Equipment id for a whole cryomodule.
    pub fn cryomodule(cryomodule: u8) -> Self {
        Self {
            cryomodule,
            cavity: None,
        }
    }

    /// Equipment id for a single cavity.
    pub fn cavity(cryomodule: u8, cavity: u8) -> Self {
        Self {
            cryomodule,
            cavity: Some(cavity),
        }
    }
}

impl std::fmt::Display for EquipmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.cavity {
            Some(cav) => write!(f, "CM{} cavity {}", self.cryomodule, cav),
            None => write!(f, "CM{}", self.cryomodule),
        }
    }
}
