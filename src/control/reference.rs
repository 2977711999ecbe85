//! Reference operating-point search.
//!
//! Before a measurement the JT valve has to be locked at a position that
//! balances the standing heat load. That position is read off history: the
//! search walks backwards through the archive looking for a window where
//! the downstream level was flat and nobody touched the heaters, then
//! averages the valve position and heater readings over that window.

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, PreconditionError};
use crate::instrument::{CryomoduleChannels, TelemetryArchive};
use crate::statistics::fit_line;
use crate::types::ValveParams;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Search the archive for a stable window and derive the reference
/// operating point from it.
///
/// `now_unix_s` anchors the search; windows are examined newest-first,
/// starting `search_offset_hours` back (newer samples may not have landed
/// in the archive yet) and stepping back `search_step_hours` at a time
/// until `search_range_hours` is exhausted.
///
/// On exhaustion the returned [`Error::Stability`] carries the retry
/// policy: cool down, then search again over a narrowed window. The wait
/// itself is the caller's to perform.
pub fn find_reference_operating_point(
    archive: &dyn TelemetryArchive,
    channels: &CryomoduleChannels,
    config: &Config,
    now_unix_s: i64,
) -> Result<ValveParams, Error> {
    let window_s = (config.stability_hours * SECONDS_PER_HOUR) as i64;
    let sample_count =
        (config.stability_hours * SECONDS_PER_HOUR / f64::from(config.archive_interval_s)) as usize;

    let newest = now_unix_s - (config.search_offset_hours * SECONDS_PER_HOUR) as i64;
    let mut search_start = half_hour_floor(newest - window_s);
    let step_s = (config.search_step_hours * SECONDS_PER_HOUR) as i64;
    let range_s = (config.search_range_hours * SECONDS_PER_HOUR) as i64;

    info!(now_unix_s, "searching for a stable reference window");

    while newest - search_start <= range_s {
        debug!(search_start, window_s, "checking window for level flatness");

        if let Some(params) = examine_window(archive, channels, config, search_start, sample_count)?
        {
            info!(
                valve = params.valve_position,
                heat_commanded = params.ref_heat_load_commanded,
                heat_actual = params.ref_heat_load_actual,
                "stable period found"
            );
            return Ok(params);
        }

        search_start -= step_s;
    }

    Err(Error::Stability {
        searched_hours: config.search_range_hours,
        retry_after_s: config.stability_cooldown_s,
        narrowed_window_hours: config.stability_hours + 0.5,
    })
}

/// Check one candidate window; `Ok(Some(...))` when it qualifies.
fn examine_window(
    archive: &dyn TelemetryArchive,
    channels: &CryomoduleChannels,
    config: &Config,
    start_unix_s: i64,
    sample_count: usize,
) -> Result<Option<ValveParams>, Error> {
    // First pass: just the level channel, cheap to fetch.
    let level_table = archive.fetch_range(
        &[channels.downstream_level()],
        start_unix_s,
        sample_count,
        config.archive_interval_s,
    )?;

    let Some(levels) = level_table.column(&channels.downstream_level()) else {
        return Err(Error::Precondition(PreconditionError::MissingArchiveData {
            channel: channels.downstream_level(),
        }));
    };

    let finite: Vec<f64> = levels.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return Err(Error::Precondition(PreconditionError::MissingArchiveData {
            channel: channels.downstream_level(),
        }));
    }

    let xs: Vec<f64> = (0..finite.len()).map(|i| i as f64).collect();
    let Some(fit) = fit_line(&xs, &finite) else {
        return Ok(None);
    };

    if fit.slope.abs().log10() >= config.flatness_log10_slope {
        return Ok(None);
    }

    // Flat enough; second pass fetches valve and heater channels.
    let mut signals = vec![channels.valve_position()];
    signals.extend(channels.all_heater_commanded());
    signals.extend(channels.all_heater_actual());

    let table = archive.fetch_range(
        &signals,
        start_unix_s,
        sample_count,
        config.archive_interval_s,
    )?;

    let valve = table
        .column(&channels.valve_position())
        .ok_or_else(|| PreconditionError::MissingArchiveData {
            channel: channels.valve_position(),
        })?;

    let commanded_totals = sum_columns(&table, &channels.all_heater_commanded())?;
    let actual_totals = sum_columns(&table, &channels.all_heater_actual())?;

    // The window only counts if nobody touched the heater settings in it.
    let first = commanded_totals.first().copied().unwrap_or(f64::NAN);
    if !commanded_totals.iter().all(|&v| v == first) {
        debug!(start_unix_s, "heater settings changed inside window; skipping");
        return Ok(None);
    }

    let mean = |vals: &[f64]| vals.iter().sum::<f64>() / vals.len() as f64;
    let valve_position = (mean(valve) * 10.0).round() / 10.0;

    Ok(Some(ValveParams::new(
        valve_position,
        first,
        mean(&actual_totals),
    )))
}

fn sum_columns(
    table: &crate::instrument::ArchiveTable,
    names: &[String],
) -> Result<Vec<f64>, Error> {
    let mut totals = vec![0.0; table.len()];
    for name in names {
        let col = table
            .column(name)
            .ok_or_else(|| PreconditionError::MissingArchiveData {
                channel: name.clone(),
            })?;
        for (total, v) in totals.iter_mut().zip(col) {
            *total += v;
        }
    }
    Ok(totals)
}

/// Round a unix timestamp down to the previous half hour.
fn half_hour_floor(unix_s: i64) -> i64 {
    unix_s - unix_s.rem_euclid(1800)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::ArchiveTable;

    /// Archive whose level is flat after `flat_after_unix` and sloped
    /// before it.
    struct FakeArchive {
        channels: CryomoduleChannels,
        flat_before_unix: i64,
    }

    impl TelemetryArchive for FakeArchive {
        fn fetch_range(
            &self,
            channels: &[String],
            start_unix_s: i64,
            sample_count: usize,
            interval_s: u32,
        ) -> Result<ArchiveTable, crate::error::InstrumentError> {
            let mut table = ArchiveTable {
                unix_time: (0..sample_count)
                    .map(|i| (start_unix_s + i as i64 * i64::from(interval_s)) as f64)
                    .collect(),
                ..Default::default()
            };

            let flat = start_unix_s + (sample_count as i64) < self.flat_before_unix;

            for name in channels {
                let values: Vec<f64> = if *name == self.channels.downstream_level() {
                    (0..sample_count)
                        .map(|i| {
                            if flat {
                                92.0
                            } else {
                                92.0 - 0.001 * i as f64
                            }
                        })
                        .collect()
                } else if *name == self.channels.valve_position() {
                    vec![17.52; sample_count]
                } else if name.contains("POWER_SETPT") {
                    vec![1.0; sample_count]
                } else {
                    vec![0.95; sample_count]
                };
                table.channels.push(name.clone());
                table.values.push(values);
            }

            Ok(table)
        }
    }

    fn search_config() -> Config {
        Config::default()
            .archive_interval_s(60) // keep the fake tables small
    }

    #[test]
    fn finds_stable_window_and_averages() {
        let channels = CryomoduleChannels::new(2);
        let now = 1_700_000_000;
        let archive = FakeArchive {
            channels,
            flat_before_unix: now, // everything is flat
        };

        let params =
            find_reference_operating_point(&archive, &channels, &search_config(), now).unwrap();

        assert!((params.valve_position - 17.5).abs() < 1e-9);
        assert!((params.ref_heat_load_commanded - 8.0).abs() < 1e-9);
        assert!((params.ref_heat_load_actual - 7.6).abs() < 1e-9);
    }

    #[test]
    fn exhausted_search_is_a_stability_fault() {
        let channels = CryomoduleChannels::new(2);
        let now = 1_700_000_000;
        let archive = FakeArchive {
            channels,
            flat_before_unix: 0, // nothing is ever flat
        };

        match find_reference_operating_point(&archive, &channels, &search_config(), now) {
            Err(Error::Stability {
                retry_after_s,
                narrowed_window_hours,
                ..
            }) => {
                assert_eq!(retry_after_s, 1800);
                assert!((narrowed_window_hours - 2.0).abs() < 1e-12);
            }
            other => panic!("expected stability fault, got {other:?}"),
        }
    }

    #[test]
    fn half_hour_floor_rounds_down() {
        // 1800-second grid.
        assert_eq!(half_hour_floor(3600), 3600);
        assert_eq!(half_hour_floor(3601), 3600);
        assert_eq!(half_hour_floor(5399), 3600);
        assert_eq!(half_hour_floor(5400), 5400);
    }
}
