//! Persistence index rows.
//!
//! One row is appended per completed session so later analysis can rebuild
//! the session from its identifying parameters alone. The schemas are
//! serde-serializable for the persistence collaborator; the CSV append
//! helper below covers the common flat-file case.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::session::{CalibrationSession, Q0Session};
use crate::types::{EquipmentId, TimeWindow, ValveParams};

/// Index row for a completed calibration session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationIndexRow {
    /// Hardware the session measured.
    pub equipment: EquipmentId,
    /// Reference heat load, commanded, watts.
    pub ref_heat_load_commanded: f64,
    /// Reference heat load, actual, watts.
    pub ref_heat_load_actual: f64,
    /// Locked JT valve position, percent.
    pub valve_position: f64,
    /// Acquisition window.
    pub window: TimeWindow,
}

impl CalibrationIndexRow {
    /// Row describing `session`.
    pub fn for_session(session: &CalibrationSession) -> Self {
        Self::new(session.core.equipment, session.core.valve, session.core.window)
    }

    /// Row from raw parts.
    pub fn new(equipment: EquipmentId, valve: ValveParams, window: TimeWindow) -> Self {
        Self {
            equipment,
            ref_heat_load_commanded: valve.ref_heat_load_commanded,
            ref_heat_load_actual: valve.ref_heat_load_actual,
            valve_position: valve.valve_position,
            window,
        }
    }

    /// CSV header for calibration index files.
    pub const HEADER: &'static [&'static str] = &[
        "Cryomodule",
        "Cavity",
        "Reference Heat Load (Des)",
        "Reference Heat Load (Act)",
        "JT Valve Position",
        "Start",
        "End",
        "Sample Interval",
    ];

    /// Render the row as CSV fields, matching [`Self::HEADER`].
    pub fn to_record(&self) -> Vec<String> {
        vec![
            self.equipment.cryomodule.to_string(),
            self.equipment
                .cavity
                .map(|c| c.to_string())
                .unwrap_or_default(),
            format_float(self.ref_heat_load_commanded),
            format_float(self.ref_heat_load_actual),
            format_float(self.valve_position),
            self.window.start_unix_s.to_string(),
            self.window.end_unix_s.to_string(),
            self.window.sample_interval_s.to_string(),
        ]
    }
}

/// Index row for a completed Q0 session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Q0IndexRow {
    /// Hardware the session measured.
    pub equipment: EquipmentId,
    /// Reference heat load, commanded, watts.
    pub ref_heat_load_commanded: f64,
    /// Reference heat load, actual, watts.
    pub ref_heat_load_actual: f64,
    /// Locked JT valve position, percent.
    pub valve_position: f64,
    /// Per-cavity target gradients, MV/m; zero for cavities not driven.
    pub cavity_gradients: [f64; 8],
    /// Acquisition window.
    pub window: TimeWindow,
}

impl Q0IndexRow {
    /// Row describing `session`. For a single-cavity session the target
    /// gradient lands in that cavity's slot.
    pub fn for_session(session: &Q0Session) -> Self {
        let mut cavity_gradients = [0.0; 8];
        if let Some(cav) = session.core.equipment.cavity {
            cavity_gradients[(cav - 1) as usize] = session.target_gradient;
        }

        Self {
            equipment: session.core.equipment,
            ref_heat_load_commanded: session.core.valve.ref_heat_load_commanded,
            ref_heat_load_actual: session.core.valve.ref_heat_load_actual,
            valve_position: session.core.valve.valve_position,
            cavity_gradients,
            window: session.core.window,
        }
    }

    /// CSV header for Q0 index files.
    pub const HEADER: &'static [&'static str] = &[
        "Cryomodule",
        "Cavity",
        "Reference Heat Load (Des)",
        "Reference Heat Load (Act)",
        "JT Valve Position",
        "Cavity 1 Gradient",
        "Cavity 2 Gradient",
        "Cavity 3 Gradient",
        "Cavity 4 Gradient",
        "Cavity 5 Gradient",
        "Cavity 6 Gradient",
        "Cavity 7 Gradient",
        "Cavity 8 Gradient",
        "Cumulative Gradient",
        "Start",
        "End",
        "Sample Interval",
    ];

    /// Render the row as CSV fields, matching [`Self::HEADER`].
    pub fn to_record(&self) -> Vec<String> {
        let mut record = vec![
            self.equipment.cryomodule.to_string(),
            self.equipment
                .cavity
                .map(|c| c.to_string())
                .unwrap_or_default(),
            format_float(self.ref_heat_load_commanded),
            format_float(self.ref_heat_load_actual),
            format_float(self.valve_position),
        ];
        record.extend(self.cavity_gradients.iter().map(|g| format_float(*g)));
        record.push(format_float(self.cavity_gradients.iter().sum()));
        record.push(self.window.start_unix_s.to_string());
        record.push(self.window.end_unix_s.to_string());
        record.push(self.window.sample_interval_s.to_string());
        record
    }
}

/// Append a record to a CSV index file, creating it with `header` first if
/// it does not exist yet. Creation is idempotent: an existing file never
/// gets a second header.
pub fn append_index_row(path: &Path, header: &[&str], record: &[String]) -> io::Result<()> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        writeln!(file, "{}", header.join(","))?;
    }

    let mut file = OpenOptions::new().append(true).open(path)?;
    writeln!(file, "{}", record.join(","))?;
    Ok(())
}

fn format_float(v: f64) -> String {
    // Trailing-zero-free but stable for integers.
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}
