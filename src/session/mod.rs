//! Measurement sessions: a time window's telemetry reduced to results.
//!
//! A session owns its buffer and runs exclusively; nothing is shared with
//! other sessions and nothing mutates after construction. The two variants
//! share [`SessionCore`] and differ in what they derive from their runs:
//! a calibration session fits a [`CalibrationModel`], a Q0 session projects
//! its RF runs through a calibration session's model.

mod cache;
mod key;

pub use cache::SessionCache;
pub use key::SessionKey;

use std::sync::Arc;

use tracing::info;

use crate::analysis::{
    average_heat_adjustment, evaluate_rf_run, extract_runs, fit_calibration, CalibrationModel,
    RfResult, Run, SessionProfile,
};
use crate::config::Config;
use crate::error::Error;
use crate::instrument::{CryomoduleChannels, TelemetryArchive};
use crate::telemetry::TelemetryBuffer;
use crate::types::{EquipmentId, RunKind, TimeWindow, ValveParams};

/// Fields common to both session variants.
#[derive(Debug, Clone)]
pub struct SessionCore {
    /// Acquisition window.
    pub window: TimeWindow,
    /// Reference operating point the runs are validated against.
    pub valve: ValveParams,
    /// Hardware the session measured.
    pub equipment: EquipmentId,
    /// The session's telemetry, owned exclusively.
    pub buffer: TelemetryBuffer,
    /// Segmented, trimmed, fitted runs in buffer order.
    pub runs: Vec<Run>,
}

impl SessionCore {
    fn build(
        window: TimeWindow,
        valve: ValveParams,
        equipment: EquipmentId,
        mut buffer: TelemetryBuffer,
        profile: SessionProfile,
        config: &Config,
    ) -> Self {
        buffer.smooth_level(config.median_filter_window);
        let runs = extract_runs(&buffer, &valve, profile, config);

        if runs.is_empty() {
            info!(%equipment, "session has no qualifying runs");
        }

        Self {
            window,
            valve,
            equipment,
            buffer,
            runs,
        }
    }

    /// Runs of the given kind, in order.
    pub fn runs_of_kind(&self, kind: RunKind) -> impl Iterator<Item = &Run> {
        self.runs.iter().filter(move |r| r.kind == kind)
    }
}

/// A heater calibration session and its fitted model.
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    /// Shared session state.
    pub core: SessionCore,
    /// Calibration curve fitted from the heater runs, if at least two
    /// distinct heat-load points qualified. A session with too few runs is
    /// still a valid (reported) session; it just cannot calibrate anything.
    pub model: Option<CalibrationModel>,
}

impl CalibrationSession {
    /// Fetch, segment, and fit a calibration session from the archive.
    pub fn build(
        window: TimeWindow,
        valve: ValveParams,
        equipment: EquipmentId,
        archive: &dyn TelemetryArchive,
        config: &Config,
    ) -> Result<Self, Error> {
        let channels = CryomoduleChannels::new(equipment.cryomodule);
        let table = archive.fetch_range(
            &channels.acquisition_channels(),
            window.start_unix_s,
            window.sample_count(),
            window.sample_interval_s,
        )?;
        let (buffer, _) = TelemetryBuffer::from_cryomodule_table(&table, &channels)?;
        Self::from_buffer(window, valve, equipment, buffer, config)
    }

    /// Build a calibration session from an already-ingested buffer.
    pub fn from_buffer(
        window: TimeWindow,
        valve: ValveParams,
        equipment: EquipmentId,
        buffer: TelemetryBuffer,
        config: &Config,
    ) -> Result<Self, Error> {
        let core = SessionCore::build(
            window,
            valve,
            equipment,
            buffer,
            SessionProfile::Calibration,
            config,
        );

        let model = if core.runs.is_empty() {
            None
        } else {
            Some(fit_calibration(&core.runs)?)
        };

        Ok(Self { core, model })
    }

    /// The fitted model, or a precondition fault when the session produced
    /// no usable calibration.
    pub fn require_model(&self) -> Result<&CalibrationModel, Error> {
        self.model.as_ref().ok_or(Error::Precondition(
            crate::error::PreconditionError::InsufficientCalibrationPoints { distinct: 0 },
        ))
    }

    /// This session's structural identity.
    pub fn key(&self) -> SessionKey {
        SessionKey::calibration(self.core.window, self.core.equipment)
    }

    /// Heater loads corrected by the model's heat adjustment, run order.
    pub fn adjusted_heat_loads(&self) -> Vec<f64> {
        let adjustment = self.model.map(|m| m.heat_adjustment).unwrap_or(0.0);
        self.core
            .runs_of_kind(RunKind::Heater)
            .map(|r| r.elec_heat_actual_w + adjustment)
            .collect()
    }
}

/// A Q0 measurement session projected through a calibration session.
#[derive(Debug, Clone)]
pub struct Q0Session {
    /// Shared session state.
    pub core: SessionCore,
    /// The calibration session whose model this session projects through.
    pub calibration: Arc<CalibrationSession>,
    /// Commanded gradient for the measurement, MV/m. Substituted for
    /// anomalous gradient samples.
    pub target_gradient: f64,
    /// Average valve-position correction from this session's own heater
    /// runs, watts.
    pub avg_heat_adjustment: f64,
    /// One result per RF run, in run order.
    pub rf_results: Vec<RfResult>,
}

impl Q0Session {
    /// Fetch, segment, and evaluate a Q0 session from the archive.
    pub fn build(
        window: TimeWindow,
        valve: ValveParams,
        equipment: EquipmentId,
        calibration: Arc<CalibrationSession>,
        target_gradient: f64,
        archive: &dyn TelemetryArchive,
        config: &Config,
    ) -> Result<Self, Error> {
        let channels = CryomoduleChannels::new(equipment.cryomodule);
        let acquisition = match equipment.cavity {
            Some(cav) => channels.cavity_acquisition_channels(cav),
            None => channels.acquisition_channels(),
        };
        let table = archive.fetch_range(
            &acquisition,
            window.start_unix_s,
            window.sample_count(),
            window.sample_interval_s,
        )?;
        let (buffer, _) = match equipment.cavity {
            Some(cav) => TelemetryBuffer::from_cavity_table(&table, &channels, cav)?,
            None => TelemetryBuffer::from_cryomodule_table(&table, &channels)?,
        };
        Self::from_buffer(
            window,
            valve,
            equipment,
            buffer,
            calibration,
            target_gradient,
            config,
        )
    }

    /// Build a Q0 session from an already-ingested buffer.
    pub fn from_buffer(
        window: TimeWindow,
        valve: ValveParams,
        equipment: EquipmentId,
        buffer: TelemetryBuffer,
        calibration: Arc<CalibrationSession>,
        target_gradient: f64,
        config: &Config,
    ) -> Result<Self, Error> {
        let model = *calibration.require_model()?;

        let core = SessionCore::build(
            window,
            valve,
            equipment,
            buffer,
            SessionProfile::Q0,
            config,
        );

        let avg_heat_adjustment = average_heat_adjustment(&core.runs, &model);

        let rf_results = core
            .runs_of_kind(RunKind::Rf)
            .map(|run| {
                evaluate_rf_run(
                    &core.buffer,
                    run,
                    &model,
                    avg_heat_adjustment,
                    target_gradient,
                )
            })
            .collect();

        Ok(Self {
            core,
            calibration,
            target_gradient,
            avg_heat_adjustment,
            rf_results,
        })
    }

    /// This session's structural identity.
    pub fn key(&self) -> SessionKey {
        SessionKey::q0(
            self.core.window,
            self.core.equipment,
            self.calibration.key(),
            self.target_gradient,
        )
    }

    /// RF runs paired with their results, run order.
    pub fn rf_runs(&self) -> impl Iterator<Item = (&Run, &RfResult)> {
        self.core
            .runs_of_kind(RunKind::Rf)
            .zip(self.rf_results.iter())
    }

    /// Mean Q0 over the session's RF runs, if any completed.
    pub fn mean_q0(&self) -> Option<f64> {
        if self.rf_results.is_empty() {
            return None;
        }
        Some(self.rf_results.iter().map(|r| r.q0).sum::<f64>() / self.rf_results.len() as f64)
    }
}
