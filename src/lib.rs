//! # q0meas
//!
//! Heat-load calibration and Q0 estimation for superconducting cryomodules.
//!
//! A cavity's quality factor is measured thermally: hold the RF gradient
//! while the 2 K helium bath boils off, and read the heat load out of the
//! liquid-level decay rate. This crate provides the numeric and control
//! core of that procedure:
//!
//! - Segmenting noisy multi-channel telemetry into stability-filtered runs
//! - An adaptive step-size controller that walks a setpoint to a target
//!   while screening every reading for a quench
//! - A heater calibration model mapping electric heat load to decay rate,
//!   with a correction for imperfect JT valve positioning
//! - A temperature-corrected formula turning an RF heat load into Q0
//! - Structural session deduplication, so repeated analysis of the same
//!   time window never refits
//!
//! Instrument access and the telemetry archive are collaborator traits
//! ([`instrument::Instrument`], [`instrument::TelemetryArchive`]); nothing
//! in this crate talks to hardware directly.
//!
//! ## Quick start
//!
//! ```ignore
//! use q0meas::{CalibrationSession, Config, EquipmentId, Q0Session, TimeWindow, ValveParams};
//! use std::sync::Arc;
//!
//! let config = Config::default();
//! let valve = ValveParams::new(17.5, 8.0, 7.6);
//!
//! let calibration = Arc::new(CalibrationSession::build(
//!     TimeWindow::new(start, end, 1),
//!     valve,
//!     EquipmentId::cryomodule(12),
//!     &archive,
//!     &config,
//! )?);
//!
//! let q0 = Q0Session::build(
//!     TimeWindow::new(rf_start, rf_end, 1),
//!     valve,
//!     EquipmentId::cavity(12, 2),
//!     Arc::clone(&calibration),
//!     16.0,
//!     &archive,
//!     &config,
//! )?;
//!
//! println!("{}", q0meas::output::format_q0_report(&q0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod config;
mod constants;
mod error;
mod types;

// Functional modules
pub mod analysis;
pub mod control;
pub mod instrument;
pub mod output;
pub mod session;
pub mod statistics;
pub mod telemetry;

// Re-exports for the public API
pub use analysis::{calc_q0, CalibrationModel, RfResult, Run, SessionProfile};
pub use config::Config;
pub use constants::{DESIGN_GRADIENT_MV_M, DESIGN_HEAT_LOAD_W, DESIGN_Q0};
pub use control::{LevelWindow, SetpointController};
pub use error::{Error, InstrumentError, InstrumentOp, PreconditionError};
pub use session::{CalibrationSession, Q0Session, SessionCache, SessionKey};
pub use telemetry::TelemetryBuffer;
pub use types::{EquipmentId, RunKind, TimeWindow, ValveParams};
