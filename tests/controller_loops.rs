//! Closed-loop controller tests against a simulated plant.

use std::sync::Mutex;
use std::time::Duration;

use q0meas::control::{
    drive_to_setpoint, hold_setpoint, HoldReason, LevelWindow, Settle, SetpointController,
};
use q0meas::instrument::Instrument;
use q0meas::{Config, Error, InstrumentError};

const GRAD_CHANNEL: &str = "ACCL:L1B:0220:GACT";
const AMP_CHANNEL: &str = "ACCL:L1B:0220:ADES";
const LEVEL_CHANNEL: &str = "CLL:CM02:2301:DS:LVL";

/// Simulated cavity: the gradient tracks the amplitude request and the
/// liquid level boils off a little every read.
struct FakeCavity {
    state: Mutex<CavityState>,
}

struct CavityState {
    amplitude: f64,
    level: f64,
    level_decay_per_read: f64,
    /// Gradient forced on the next read, simulating a quench.
    forced_gradient: Option<f64>,
    reads: usize,
}

impl FakeCavity {
    fn new(amplitude: f64, level: f64, level_decay_per_read: f64) -> Self {
        Self {
            state: Mutex::new(CavityState {
                amplitude,
                level,
                level_decay_per_read,
                forced_gradient: None,
                reads: 0,
            }),
        }
    }

    fn force_gradient(&self, gradient: f64) {
        self.state.lock().unwrap().forced_gradient = Some(gradient);
    }
}

impl Instrument for FakeCavity {
    fn get(&self, channel: &str) -> Result<f64, InstrumentError> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        match channel {
            GRAD_CHANNEL => {
                if let Some(forced) = state.forced_gradient.take() {
                    return Ok(forced);
                }
                // The gradient follows the requested amplitude closely.
                Ok(state.amplitude)
            }
            AMP_CHANNEL => Ok(state.amplitude),
            LEVEL_CHANNEL => {
                state.level -= state.level_decay_per_read;
                Ok(state.level)
            }
            other => Err(InstrumentError {
                channel: other.to_string(),
                op: q0meas::InstrumentOp::Get,
                detail: "unknown channel".to_string(),
            }),
        }
    }

    fn set(&self, channel: &str, value: f64) -> Result<(), InstrumentError> {
        if channel != AMP_CHANNEL {
            return Err(InstrumentError {
                channel: channel.to_string(),
                op: q0meas::InstrumentOp::Set,
                detail: "unknown channel".to_string(),
            });
        }
        self.state.lock().unwrap().amplitude = value;
        Ok(())
    }
}

struct NoSettle;

impl Settle for NoSettle {
    fn wait(&self, _interval: Duration) {}
}

#[test]
fn drive_converges_from_below() {
    let cavity = FakeCavity::new(5.0, 95.0, 0.0);
    let config = Config::default();
    let mut controller = SetpointController::drive(16.0, &config);

    let iterations = drive_to_setpoint(
        &cavity,
        GRAD_CHANNEL,
        AMP_CHANNEL,
        &mut controller,
        &NoSettle,
        &config,
    )
    .unwrap();

    let final_gradient = cavity.state.lock().unwrap().amplitude;
    assert!((final_gradient - 16.0).abs() <= config.drive_tolerance);
    assert!(iterations > 0 && iterations < 200, "took {iterations} iterations");
}

#[test]
fn drive_converges_from_above() {
    let cavity = FakeCavity::new(19.0, 95.0, 0.0);
    let config = Config::default();
    let mut controller = SetpointController::drive(16.0, &config);

    drive_to_setpoint(
        &cavity,
        GRAD_CHANNEL,
        AMP_CHANNEL,
        &mut controller,
        &NoSettle,
        &config,
    )
    .unwrap();

    let final_gradient = cavity.state.lock().unwrap().amplitude;
    assert!((final_gradient - 16.0).abs() <= config.drive_tolerance);
}

#[test]
fn hold_ends_when_level_window_closes() {
    // Level starts at 95 and boils off 0.05% per read: the 4% target drop
    // arrives long before the 90% floor.
    let cavity = FakeCavity::new(16.0, 95.0, 0.05);
    let config = Config::default();
    let mut controller = SetpointController::hold(16.0, &config);
    let window = LevelWindow::begin(95.0, &config);

    let outcome = hold_setpoint(
        &cavity,
        GRAD_CHANNEL,
        AMP_CHANNEL,
        LEVEL_CHANNEL,
        &mut controller,
        &window,
        &NoSettle,
        &config,
    )
    .unwrap();

    assert_eq!(outcome.reason, HoldReason::TargetDropReached);
    assert!(95.0 - outcome.final_level >= config.target_level_drop);
    // The amplitude is still being held near the target when the window
    // closes.
    let amplitude = cavity.state.lock().unwrap().amplitude;
    assert!((amplitude - 16.0).abs() < 1.0);
}

#[test]
fn hold_ends_at_level_floor() {
    // Start just above the floor: the floor wins over the target drop.
    let cavity = FakeCavity::new(16.0, 91.0, 0.2);
    let config = Config::default();
    let mut controller = SetpointController::hold(16.0, &config);
    let window = LevelWindow::begin(91.0, &config);

    let outcome = hold_setpoint(
        &cavity,
        GRAD_CHANNEL,
        AMP_CHANNEL,
        LEVEL_CHANNEL,
        &mut controller,
        &window,
        &NoSettle,
        &config,
    )
    .unwrap();

    assert_eq!(outcome.reason, HoldReason::MinLevelReached);
    assert!(outcome.final_level <= config.min_downstream_level);
}

#[test]
fn quench_mid_drive_aborts_when_unprotected() {
    let cavity = FakeCavity::new(14.0, 95.0, 0.0);
    let config = Config::default();
    let mut controller = SetpointController::drive(16.0, &config).quench_protected(false);

    // First reading seeds the controller, then the gradient collapses.
    let first = cavity.get(GRAD_CHANNEL).unwrap();
    controller.observe(first).unwrap();
    cavity.force_gradient(first * 0.5);

    let result = drive_to_setpoint(
        &cavity,
        GRAD_CHANNEL,
        AMP_CHANNEL,
        &mut controller,
        &NoSettle,
        &config,
    );

    assert!(matches!(result, Err(Error::Quench { .. })));
}

#[test]
fn quench_mid_drive_continues_when_protected() {
    let cavity = FakeCavity::new(15.9, 95.0, 0.0);
    let config = Config::default();
    let mut controller = SetpointController::drive(16.0, &config).quench_protected(true);

    let first = cavity.get(GRAD_CHANNEL).unwrap();
    controller.observe(first).unwrap();
    cavity.force_gradient(first * 0.5);

    // The collapse is logged, the loop keeps going and still converges.
    let result = drive_to_setpoint(
        &cavity,
        GRAD_CHANNEL,
        AMP_CHANNEL,
        &mut controller,
        &NoSettle,
        &config,
    );

    assert!(result.is_ok());
}

#[test]
fn instrument_fault_propagates() {
    let cavity = FakeCavity::new(5.0, 95.0, 0.0);
    let config = Config::default();
    let mut controller = SetpointController::drive(16.0, &config);

    let result = drive_to_setpoint(
        &cavity,
        "BOGUS:CHANNEL",
        AMP_CHANNEL,
        &mut controller,
        &NoSettle,
        &config,
    );

    assert!(matches!(result, Err(Error::Instrument(_))));
}
