//! The parallel-column telemetry buffer and archive ingestion.

use tracing::warn;

use crate::error::PreconditionError;
use crate::instrument::{ArchiveTable, CryomoduleChannels};
use crate::statistics::median_filter;

/// Ordered, time-aligned channel samples for one measurement session.
///
/// All columns have equal length. The buffer is owned exclusively by the
/// session that built it; after ingestion and smoothing, nothing mutates it
/// (run-boundary adjustment moves indices, not samples).
#[derive(Debug, Clone, Default)]
pub struct TelemetryBuffer {
    /// Sample timestamps, unix seconds.
    pub unix_time: Vec<f64>,
    /// JT valve position, percent open.
    pub valve_position: Vec<f64>,
    /// Downstream liquid level, percent.
    pub downstream_level: Vec<f64>,
    /// Upstream liquid level, percent.
    pub upstream_level: Vec<f64>,
    /// Total commanded heater power, watts.
    pub heater_commanded: Vec<f64>,
    /// Total actual heater power, watts.
    pub heater_actual: Vec<f64>,
    /// Cavity gradient, MV/m. Empty when the session has no RF channel.
    pub gradient: Vec<f64>,
    /// Downstream helium pressure, torr. Empty when not fetched.
    pub pressure: Vec<f64>,
    /// When true, `gradient` holds the sum of squared per-cavity gradients
    /// (a cryomodule-level session); take the square root at use.
    pub gradient_is_effective: bool,
}

/// Counters describing how ingestion treated the raw table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Samples ingested.
    pub samples: usize,
    /// Cells that were missing (`NaN`) and replaced by the previous finite
    /// value on the same channel.
    pub carried_forward: usize,
}

impl TelemetryBuffer {
    /// Number of samples in the buffer.
    pub fn len(&self) -> usize {
        self.unix_time.len()
    }

    /// True when the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.unix_time.is_empty()
    }

    /// True when the buffer carries a gradient channel.
    pub fn has_gradient(&self) -> bool {
        !self.gradient.is_empty()
    }

    /// Gradient at `idx` in MV/m, collapsing the effective form.
    ///
    /// Returns `None` when the buffer has no gradient channel.
    pub fn gradient_mv_m(&self, idx: usize) -> Option<f64> {
        if !self.has_gradient() {
            return None;
        }
        let raw = self.gradient[idx];
        Some(if self.gradient_is_effective {
            if raw > 0.0 {
                raw.sqrt()
            } else {
                raw
            }
        } else {
            raw
        })
    }

    /// Smooth the downstream level channel in place with a median filter.
    ///
    /// Level sensors spike when bubbles pass the probe; the spikes would
    /// otherwise break runs at the minimum-level condition.
    pub fn smooth_level(&mut self, window: usize) {
        self.downstream_level = median_filter(&self.downstream_level, window);
    }

    /// Build a buffer from an archive table fetched for a cryomodule-level
    /// session (effective gradient over all cavities).
    pub fn from_cryomodule_table(
        table: &ArchiveTable,
        channels: &CryomoduleChannels,
    ) -> Result<(Self, IngestStats), PreconditionError> {
        Self::ingest(table, channels, None)
    }

    /// Build a buffer from an archive table fetched for a single-cavity
    /// session (that cavity's gradient channel).
    pub fn from_cavity_table(
        table: &ArchiveTable,
        channels: &CryomoduleChannels,
        cavity: u8,
    ) -> Result<(Self, IngestStats), PreconditionError> {
        Self::ingest(table, channels, Some(cavity))
    }

    fn ingest(
        table: &ArchiveTable,
        channels: &CryomoduleChannels,
        cavity: Option<u8>,
    ) -> Result<(Self, IngestStats), PreconditionError> {
        if table.is_empty() {
            return Err(PreconditionError::MissingArchiveData {
                channel: channels.downstream_level(),
            });
        }
        if !table.is_rectangular() {
            return Err(PreconditionError::MalformedTelemetry {
                detail: "archive table columns differ in length".to_string(),
            });
        }

        let mut stats = IngestStats {
            samples: table.len(),
            carried_forward: 0,
        };

        let mut carried = 0usize;
        let mut take = |name: String| -> Result<Vec<f64>, PreconditionError> {
            let col = table
                .column(&name)
                .ok_or(PreconditionError::MissingArchiveData { channel: name.clone() })?;
            fill_gaps(&name, col, &mut carried)
        };

        let valve_position = take(channels.valve_position())?;
        let downstream_level = take(channels.downstream_level())?;
        let upstream_level = take(channels.upstream_level())?;

        // Per-cavity heater columns collapse into two total columns.
        let heater_commanded =
            collapse_sum(table, &channels.all_heater_commanded(), &mut carried)?;
        let heater_actual = collapse_sum(table, &channels.all_heater_actual(), &mut carried)?;

        // Pressure is optional in old captures.
        let pressure = match table.column(&channels.downstream_pressure()) {
            Some(col) => fill_gaps(&channels.downstream_pressure(), col, &mut carried)?,
            None => Vec::new(),
        };

        let (gradient, gradient_is_effective) = match cavity {
            Some(cav) => match table.column(&channels.gradient(cav)) {
                Some(col) => (fill_gaps(&channels.gradient(cav), col, &mut carried)?, false),
                None => (Vec::new(), false),
            },
            None => {
                // Effective gradient: sum of squares across cavities, when
                // any gradient channel was archived.
                let names = channels.all_gradients();
                if names.iter().any(|n| table.column(n).is_some()) {
                    (collapse_sum_of_squares(table, &names, &mut carried)?, true)
                } else {
                    (Vec::new(), false)
                }
            }
        };

        stats.carried_forward = carried;
        if stats.carried_forward > 0 {
            warn!(
                carried = stats.carried_forward,
                "archive table had missing cells; carried previous values forward"
            );
        }

        Ok((
            Self {
                unix_time: table.unix_time.clone(),
                valve_position,
                downstream_level,
                upstream_level,
                heater_commanded,
                heater_actual,
                gradient,
                pressure,
                gradient_is_effective,
            },
            stats,
        ))
    }
}

/// Replace `NaN` cells with the previous finite value on the channel.
///
/// A leading gap has nothing to carry and is a hard fault: the session
/// cannot know the channel's state at its own start.
fn fill_gaps(
    name: &str,
    col: &[f64],
    carried: &mut usize,
) -> Result<Vec<f64>, PreconditionError> {
    let mut out = Vec::with_capacity(col.len());
    let mut last_finite: Option<f64> = None;

    for &v in col {
        if v.is_finite() {
            last_finite = Some(v);
            out.push(v);
        } else {
            match last_finite {
                Some(prev) => {
                    *carried += 1;
                    out.push(prev);
                }
                None => {
                    return Err(PreconditionError::MissingArchiveData {
                        channel: name.to_string(),
                    })
                }
            }
        }
    }

    Ok(out)
}

fn collapse_sum(
    table: &ArchiveTable,
    names: &[String],
    carried: &mut usize,
) -> Result<Vec<f64>, PreconditionError> {
    collapse(table, names, carried, |acc, v| acc + v)
}

fn collapse_sum_of_squares(
    table: &ArchiveTable,
    names: &[String],
    carried: &mut usize,
) -> Result<Vec<f64>, PreconditionError> {
    collapse(table, names, carried, |acc, v| acc + v * v)
}

fn collapse(
    table: &ArchiveTable,
    names: &[String],
    carried: &mut usize,
    fold: impl Fn(f64, f64) -> f64,
) -> Result<Vec<f64>, PreconditionError> {
    let mut out = vec![0.0; table.len()];

    for name in names {
        let col = table
            .column(name)
            .ok_or(PreconditionError::MissingArchiveData {
                channel: name.clone(),
            })?;
        let filled = fill_gaps(name, col, carried)?;
        for (acc, v) in out.iter_mut().zip(filled) {
            *acc = fold(*acc, v);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_for(channels: &CryomoduleChannels, samples: usize) -> ArchiveTable {
        let mut table = ArchiveTable {
            unix_time: (0..samples).map(|i| i as f64).collect(),
            ..Default::default()
        };

        let mut push = |name: String, value: f64| {
            table.channels.push(name);
            table.values.push(vec![value; samples]);
        };

        push(channels.valve_position(), 17.5);
        push(channels.downstream_level(), 92.0);
        push(channels.upstream_level(), 75.0);
        push(channels.downstream_pressure(), 23.6);
        for name in channels.all_gradients() {
            push(name, 4.0);
        }
        for name in channels.all_heater_commanded() {
            push(name, 1.0);
        }
        for name in channels.all_heater_actual() {
            push(name, 0.95);
        }

        table
    }

    #[test]
    fn heater_columns_collapse_to_totals() {
        let channels = CryomoduleChannels::new(2);
        let table = table_for(&channels, 10);

        let (buffer, stats) = TelemetryBuffer::from_cryomodule_table(&table, &channels).unwrap();

        assert_eq!(buffer.len(), 10);
        assert_eq!(stats.carried_forward, 0);
        assert!((buffer.heater_commanded[0] - 8.0).abs() < 1e-12);
        assert!((buffer.heater_actual[0] - 7.6).abs() < 1e-12);
    }

    #[test]
    fn effective_gradient_is_sum_of_squares() {
        let channels = CryomoduleChannels::new(2);
        let table = table_for(&channels, 4);

        let (buffer, _) = TelemetryBuffer::from_cryomodule_table(&table, &channels).unwrap();

        assert!(buffer.gradient_is_effective);
        // 8 cavities at 4 MV/m: sum of squares 128, effective sqrt(128).
        assert!((buffer.gradient[0] - 128.0).abs() < 1e-12);
        assert!((buffer.gradient_mv_m(0).unwrap() - 128f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn cavity_table_uses_single_gradient_channel() {
        let channels = CryomoduleChannels::new(2);
        let table = table_for(&channels, 4);

        let (buffer, _) = TelemetryBuffer::from_cavity_table(&table, &channels, 3).unwrap();

        assert!(!buffer.gradient_is_effective);
        assert_eq!(buffer.gradient_mv_m(0), Some(4.0));
    }

    #[test]
    fn gaps_carry_forward() {
        let channels = CryomoduleChannels::new(2);
        let mut table = table_for(&channels, 5);
        let ds_idx = table
            .channels
            .iter()
            .position(|c| *c == channels.downstream_level())
            .unwrap();
        table.values[ds_idx][2] = f64::NAN;

        let (buffer, stats) = TelemetryBuffer::from_cryomodule_table(&table, &channels).unwrap();

        assert_eq!(buffer.downstream_level[2], 92.0);
        assert_eq!(stats.carried_forward, 1);
    }

    #[test]
    fn leading_gap_is_a_fault() {
        let channels = CryomoduleChannels::new(2);
        let mut table = table_for(&channels, 5);
        let ds_idx = table
            .channels
            .iter()
            .position(|c| *c == channels.downstream_level())
            .unwrap();
        table.values[ds_idx][0] = f64::NAN;

        assert!(TelemetryBuffer::from_cryomodule_table(&table, &channels).is_err());
    }

    #[test]
    fn smoothing_despikes_level() {
        let channels = CryomoduleChannels::new(2);
        let table = table_for(&channels, 5);
        let (mut buffer, _) = TelemetryBuffer::from_cryomodule_table(&table, &channels).unwrap();

        buffer.downstream_level[2] = 40.0;
        buffer.smooth_level(3);
        assert_eq!(buffer.downstream_level[2], 92.0);
    }
}
