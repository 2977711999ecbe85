//! Ramped heater walking.
//!
//! Heater setpoints move in bounded steps with a settle pause between
//! steps; slamming the full delta in at once disturbs the bath enough to
//! spoil the following run.

use std::time::Duration;

use tracing::info;

use crate::config::Config;
use crate::control::setpoint::Settle;
use crate::error::Error;
use crate::instrument::Instrument;

/// Split a per-heater delta into bounded per-step increments.
///
/// Steps are at most `max_step_w` in magnitude and all equal, so the walk
/// lands exactly on the requested delta. A zero delta yields no steps.
pub fn plan_heater_walk(per_heater_delta_w: f64, max_step_w: f64) -> Vec<f64> {
    assert!(max_step_w > 0.0, "max_step_w must be positive");

    if per_heater_delta_w == 0.0 {
        return Vec::new();
    }

    let steps = (per_heater_delta_w.abs() / max_step_w).ceil().max(1.0) as usize;
    vec![per_heater_delta_w / steps as f64; steps]
}

/// Walk every heater in `commanded_channels` by `per_heater_delta_w`,
/// pausing between steps.
pub fn walk_heaters(
    instrument: &dyn Instrument,
    commanded_channels: &[String],
    per_heater_delta_w: f64,
    settle: &dyn Settle,
    config: &Config,
) -> Result<(), Error> {
    let plan = plan_heater_walk(per_heater_delta_w, config.heater_step_w);
    if plan.is_empty() {
        return Ok(());
    }

    info!(
        delta_w = per_heater_delta_w,
        steps = plan.len(),
        heaters = commanded_channels.len(),
        "walking heaters"
    );

    let pause = Duration::from_secs_f64(config.heater_pause_s);

    for step in plan {
        for channel in commanded_channels {
            let current = instrument.get(channel)?;
            instrument.set(channel, current + step)?;
        }
        settle.wait(pause);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn plan_bounds_step_size() {
        let plan = plan_heater_walk(3.5, 1.0);
        assert_eq!(plan.len(), 4);
        assert!((plan.iter().sum::<f64>() - 3.5).abs() < 1e-12);
        assert!(plan.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn negative_and_fractional_deltas() {
        let down = plan_heater_walk(-2.5, 1.0);
        assert_eq!(down.len(), 3);
        assert!((down.iter().sum::<f64>() - -2.5).abs() < 1e-12);

        let small = plan_heater_walk(0.4, 1.0);
        assert_eq!(small.len(), 1);
        assert_eq!(small[0], 0.4);

        assert!(plan_heater_walk(0.0, 1.0).is_empty());
    }

    struct FakeHeaters {
        values: Mutex<std::collections::HashMap<String, f64>>,
    }

    impl Instrument for FakeHeaters {
        fn get(&self, channel: &str) -> Result<f64, crate::error::InstrumentError> {
            Ok(*self.values.lock().unwrap().get(channel).unwrap_or(&0.0))
        }

        fn set(&self, channel: &str, value: f64) -> Result<(), crate::error::InstrumentError> {
            self.values.lock().unwrap().insert(channel.to_string(), value);
            Ok(())
        }
    }

    struct NoSettle;
    impl Settle for NoSettle {
        fn wait(&self, _interval: Duration) {}
    }

    #[test]
    fn walk_lands_on_the_requested_delta() {
        let instrument = FakeHeaters {
            values: Mutex::new(std::collections::HashMap::new()),
        };
        let channels = vec!["H1".to_string(), "H2".to_string()];

        walk_heaters(&instrument, &channels, 2.5, &NoSettle, &Config::default()).unwrap();

        assert!((instrument.get("H1").unwrap() - 2.5).abs() < 1e-12);
        assert!((instrument.get("H2").unwrap() - 2.5).abs() < 1e-12);
    }
}
