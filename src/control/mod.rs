//! Online feedback control for the measurement procedure.
//!
//! The controller is an explicit state machine: one reading in, one
//! decision out. Blocking drivers compose a controller with an
//! [`Instrument`](crate::instrument::Instrument) and a [`Settle`] policy;
//! the settle wait is the loop's only suspension point, and faults are
//! checked at the next reading, never mid-wait.

mod heaters;
mod reference;
mod setpoint;

pub use heaters::{plan_heater_walk, walk_heaters};
pub use reference::find_reference_operating_point;
pub use setpoint::{
    drive_to_setpoint, hold_setpoint, Adjustment, HoldOutcome, HoldReason, LevelWindow,
    SetpointController, Settle, ThreadSettle,
};
