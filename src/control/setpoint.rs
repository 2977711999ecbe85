//! Adaptive step-size setpoint control.
//!
//! Drives a controlled output (cavity amplitude request or heater power)
//! toward a target with exponential step back-off: the step halves when the
//! controller closes in or overshoots, and grows 1.5x while it is still far
//! out. Every reading is screened for a quench before it is trusted.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::QUENCH_DROP_FRACTION;
use crate::error::Error;
use crate::instrument::Instrument;

/// Decision produced by one controller iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustment {
    /// Signed delta to add to the controlled output. Applied every
    /// iteration, including on-target ones; within tolerance the step is
    /// simply no longer adapted.
    pub delta: f64,
    /// True when the last reading sat within tolerance of the target.
    pub on_target: bool,
}

/// Adaptive step-size controller state.
///
/// One instance owns one controlled output for the lifetime of a procedure;
/// no two controllers may drive the same output concurrently.
#[derive(Debug, Clone)]
pub struct SetpointController {
    desired: f64,
    tolerance: f64,
    step: f64,
    prev_diff: Option<f64>,
    last_reading: Option<f64>,
    quench_protected: bool,
}

impl SetpointController {
    /// Controller for driving toward a distant setpoint (large initial
    /// step).
    pub fn drive(desired: f64, config: &Config) -> Self {
        Self::with_params(desired, config.drive_tolerance, config.drive_initial_step)
    }

    /// Controller for holding a setpoint against slow drift (small initial
    /// step).
    pub fn hold(desired: f64, config: &Config) -> Self {
        Self::with_params(desired, config.hold_tolerance, config.hold_initial_step)
    }

    /// Controller with explicit parameters. Hardware quench protection is
    /// assumed enabled until [`Self::quench_protected`] says otherwise.
    pub fn with_params(desired: f64, tolerance: f64, initial_step: f64) -> Self {
        assert!(tolerance > 0.0, "tolerance must be positive");
        assert!(initial_step > 0.0, "initial step must be positive");
        Self {
            desired,
            tolerance,
            step: initial_step,
            prev_diff: None,
            last_reading: None,
            quench_protected: true,
        }
    }

    /// Set whether the hardware quench interlock is active. When it is not,
    /// a detected quench becomes a fatal fault instead of a warning.
    pub fn quench_protected(mut self, protected: bool) -> Self {
        self.quench_protected = protected;
        self
    }

    /// Current step size.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Target value.
    pub fn desired(&self) -> f64 {
        self.desired
    }

    /// True once the most recent reading was within tolerance.
    pub fn on_target(&self) -> bool {
        matches!(self.prev_diff, Some(d) if d.abs() <= self.tolerance)
    }

    /// Ingest one reading and decide the next output adjustment.
    ///
    /// A reading below 90% of the previous one is a quench: fatal when the
    /// hardware interlock is bypassed, a logged warning otherwise.
    pub fn observe(&mut self, measured: f64) -> Result<Adjustment, Error> {
        if let Some(previous) = self.last_reading {
            if measured < previous * QUENCH_DROP_FRACTION {
                if !self.quench_protected {
                    return Err(Error::Quench { previous, measured });
                }
                warn!(previous, measured, "quench detected (hardware protection active)");
            }
        }
        self.last_reading = Some(measured);

        let diff = measured - self.desired;
        // Push up when short of the target, down when over it.
        let mult = if diff <= 0.0 { 1.0 } else { -1.0 };

        let overshot = match self.prev_diff {
            Some(prev) => (prev >= 0.0 && diff < 0.0) || (prev <= 0.0 && diff > 0.0),
            None => false,
        };

        if diff.abs() < self.tolerance {
            // Within tolerance: leave the step alone.
        } else if (diff.abs() < 2.0 * self.step || overshot) && self.step > self.tolerance {
            self.step *= 0.5;
        } else {
            self.step *= 1.5;
        }

        self.prev_diff = Some(diff);
        debug!(measured, diff, step = self.step, overshot, "setpoint iteration");

        Ok(Adjustment {
            delta: mult * self.step,
            on_target: diff.abs() <= self.tolerance,
        })
    }
}

/// Liquid-level boundary that ends a hold-mode data run.
///
/// The run is over when the level has dropped a target amount from its
/// value at hold-start, or has reached the hard minimum - a deliberate
/// data-collection boundary, not a fault.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelWindow {
    starting_level: f64,
    target_drop: f64,
    min_level: f64,
}

impl LevelWindow {
    /// Open a window at the current liquid level.
    pub fn begin(starting_level: f64, config: &Config) -> Self {
        Self {
            starting_level,
            target_drop: config.target_level_drop,
            min_level: config.min_downstream_level,
        }
    }

    /// True once `level` closes the window.
    pub fn complete(&self, level: f64) -> bool {
        self.starting_level - level >= self.target_drop || level <= self.min_level
    }

    /// Level at which the window opened.
    pub fn starting_level(&self) -> f64 {
        self.starting_level
    }
}

/// Why a hold loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// The level dropped the target amount from hold-start.
    TargetDropReached,
    /// The level hit the hard minimum.
    MinLevelReached,
}

/// Result of a completed hold loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldOutcome {
    /// Liquid level at the final reading.
    pub final_level: f64,
    /// Which boundary ended the hold.
    pub reason: HoldReason,
    /// Controller iterations performed.
    pub iterations: usize,
}

/// Settle policy between controller iterations.
///
/// Injected so tests can run the loops without wall-clock waits.
pub trait Settle {
    /// Block for the settle interval.
    fn wait(&self, interval: Duration);
}

/// Settle by sleeping the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSettle;

impl Settle for ThreadSettle {
    fn wait(&self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

/// Drive the output at `output_channel` until the reading at
/// `readback_channel` is within the controller's tolerance.
///
/// One instrument read, one decision, one write, then the settle wait; the
/// wait is the only suspension point and faults surface at the next read.
pub fn drive_to_setpoint(
    instrument: &dyn Instrument,
    readback_channel: &str,
    output_channel: &str,
    controller: &mut SetpointController,
    settle: &dyn Settle,
    config: &Config,
) -> Result<usize, Error> {
    let interval = Duration::from_secs_f64(config.controller_settle_s);
    let mut iterations = 0usize;

    loop {
        let measured = instrument.get(readback_channel)?;
        let adjustment = controller.observe(measured)?;

        if adjustment.on_target {
            info!(measured, iterations, "setpoint reached");
            return Ok(iterations);
        }

        let current = instrument.get(output_channel)?;
        instrument.set(output_channel, current + adjustment.delta)?;
        iterations += 1;

        settle.wait(interval);
    }
}

/// Hold the output near its setpoint until the liquid-level window closes.
///
/// Used while a data run collects: the cavity slowly heats and the gradient
/// sags, so the controller keeps nudging the amplitude while the level
/// drains through its measurement window.
pub fn hold_setpoint(
    instrument: &dyn Instrument,
    readback_channel: &str,
    output_channel: &str,
    level_channel: &str,
    controller: &mut SetpointController,
    window: &LevelWindow,
    settle: &dyn Settle,
    config: &Config,
) -> Result<HoldOutcome, Error> {
    let interval = Duration::from_secs_f64(config.controller_settle_s);
    let mut iterations = 0usize;

    loop {
        let level = instrument.get(level_channel)?;
        if window.complete(level) {
            let reason = if level <= window.min_level {
                HoldReason::MinLevelReached
            } else {
                HoldReason::TargetDropReached
            };
            info!(level, iterations, ?reason, "hold window closed");
            return Ok(HoldOutcome {
                final_level: level,
                reason,
                iterations,
            });
        }

        let measured = instrument.get(readback_channel)?;
        let adjustment = controller.observe(measured)?;

        let current = instrument.get(output_channel)?;
        instrument.set(output_channel, current + adjustment.delta)?;
        iterations += 1;

        settle.wait(interval);
    }
}
