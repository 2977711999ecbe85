//! Run segmentation and settle trimming.
//!
//! A "run" is a contiguous span of samples over which the operating
//! condition held still: constant commanded heater power, liquid level above
//! the floor, valve near its reference, and (for Q0 sessions) steady
//! gradient. Each run's downstream-level decay gets fitted with a line; the
//! slope is the dLL/dt that feeds calibration and Q0 estimation.

use tracing::{debug, warn};

use crate::analysis::q0::approx_heat_from_gradient;
use crate::config::Config;
use crate::statistics::{fit_line, LineFit};
use crate::telemetry::TelemetryBuffer;
use crate::types::{RunKind, ValveParams};

/// Which break conditions and run classifications apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionProfile {
    /// Heater calibration: every run is a heater run and the gradient
    /// channel is ignored.
    Calibration,
    /// Q0 measurement: gradient changes break runs, and runs at the
    /// reference heater load are RF runs.
    Q0,
}

/// A contiguous span of samples sharing one operating condition.
///
/// Indices are inclusive on both ends and refer to the owning session's
/// buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSpan {
    /// First sample index.
    pub start: usize,
    /// Last sample index (inclusive).
    pub end: usize,
    /// Heater or RF classification.
    pub kind: RunKind,
}

/// Fit diagnostics for a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunDiagnostics {
    /// Seconds trimmed off the run start for cryo settling.
    pub settle_cutoff_s: f64,
    /// Run duration after trimming, minutes.
    pub duration_min: f64,
    /// R-squared of the level fit; low values flag runs that were too short
    /// or too noisy.
    pub r_squared: f64,
}

/// A segmented, trimmed, and fitted run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Run {
    /// First sample index in the owning buffer.
    pub start: usize,
    /// Last sample index (inclusive).
    pub end: usize,
    /// Heater or RF classification.
    pub kind: RunKind,
    /// Commanded electric heat load as a delta from the reference, watts.
    pub elec_heat_commanded_w: f64,
    /// Actual electric heat load (mean readback over the run) as a delta
    /// from the reference, watts.
    pub elec_heat_actual_w: f64,
    /// Fitted liquid-level decay line; `fit.slope` is dLL/dt in %/s.
    pub fit: LineFit,
    /// Fit diagnostics.
    pub diagnostics: RunDiagnostics,
}

impl Run {
    /// Timestamps covered by this run.
    pub fn times<'a>(&self, buffer: &'a TelemetryBuffer) -> &'a [f64] {
        &buffer.unix_time[self.start..=self.end]
    }

    /// Downstream level samples covered by this run.
    pub fn levels<'a>(&self, buffer: &'a TelemetryBuffer) -> &'a [f64] {
        &buffer.downstream_level[self.start..=self.end]
    }

    /// Decay-rate slope of the run, %/s.
    pub fn slope(&self) -> f64 {
        self.fit.slope
    }
}

/// Segment, trim, and fit a buffer's runs in one pass.
pub fn extract_runs(
    buffer: &TelemetryBuffer,
    valve: &ValveParams,
    profile: SessionProfile,
    config: &Config,
) -> Vec<Run> {
    let mut spans = segment_spans(buffer, valve, profile, config);
    let cutoffs = trim_settle(buffer, &mut spans, valve, profile, config);
    fit_spans(buffer, &spans, &cutoffs, valve)
}

/// Scan the buffer and emit classified run spans.
///
/// The scan keeps a `run_start` cursor. A sample *breaks* the current span
/// when the commanded heater power changed, the downstream level fell below
/// the floor, commanded and actual heater power disagree beyond tolerance,
/// the valve left its reference band, the gradient jumped (Q0 only), or the
/// buffer ends (forced flush). On a break the span is emitted if it lasted
/// at least the minimum run duration, and the cursor advances regardless:
/// short spans are dropped, never merged into a neighbor.
pub fn segment_spans(
    buffer: &TelemetryBuffer,
    valve: &ValveParams,
    profile: SessionProfile,
    config: &Config,
) -> Vec<RunSpan> {
    let mut spans = Vec::new();
    let len = buffer.len();
    if len == 0 {
        return spans;
    }

    let check_gradient = profile == SessionProfile::Q0 && buffer.has_gradient();
    let mut run_start = 0usize;

    for idx in 0..len {
        // The first sample has no predecessor; treat "previous" as itself.
        let heater_changed =
            idx > 0 && buffer.heater_commanded[idx] != buffer.heater_commanded[idx - 1];
        let level_too_low = buffer.downstream_level[idx] < config.min_downstream_level;
        let heater_outside_tol = (buffer.heater_commanded[idx] - buffer.heater_actual[idx]).abs()
            >= config.heater_tolerance_w;
        let valve_outside_tol =
            (buffer.valve_position[idx] - valve.valve_position).abs()
                > config.valve_position_tolerance;
        let gradient_changed = check_gradient
            && idx > 0
            && (buffer.gradient[idx] - buffer.gradient[idx - 1]).abs()
                > config.gradient_tolerance;
        let is_last = idx == len - 1;

        let mid_run_break =
            heater_changed || level_too_low || heater_outside_tol || valve_outside_tol
                || gradient_changed;

        if !(mid_run_break || is_last) {
            continue;
        }

        // A pure end-of-buffer flush keeps the final sample; any real break
        // condition excludes the sample that violated it.
        let end = if mid_run_break { idx.checked_sub(1) } else { Some(idx) };
        let duration = buffer.unix_time[idx] - buffer.unix_time[run_start];

        match end {
            Some(end) if duration >= config.min_run_duration_s && end > run_start => {
                spans.push(RunSpan {
                    start: run_start,
                    end,
                    kind: classify(buffer, run_start, valve, profile),
                });
            }
            _ => {
                debug!(
                    start = run_start,
                    end = idx,
                    duration_s = duration,
                    "dropping short span"
                );
            }
        }

        run_start = idx;
    }

    spans
}

fn classify(
    buffer: &TelemetryBuffer,
    start: usize,
    valve: &ValveParams,
    profile: SessionProfile,
) -> RunKind {
    match profile {
        SessionProfile::Calibration => RunKind::Heater,
        SessionProfile::Q0 => {
            let delta = buffer.heater_commanded[start] - valve.ref_heat_load_commanded;
            if delta != 0.0 {
                RunKind::Heater
            } else {
                RunKind::Rf
            }
        }
    }
}

/// Trim each span's leading edge for cryo settling; returns the applied
/// cutoffs in seconds, parallel to `spans`.
///
/// After a heat-load step the helium bath takes a while to see the change
/// (there are intermediate structures with heat capacity), so the first
/// samples of each run are corrupted. The cutoff scales linearly with the
/// size of the step between consecutive runs, minus the wait already spent
/// after adjusting the setpoint, clamped at zero.
pub fn trim_settle(
    buffer: &TelemetryBuffer,
    spans: &mut [RunSpan],
    valve: &ValveParams,
    profile: SessionProfile,
    config: &Config,
) -> Vec<f64> {
    let mut cutoffs = Vec::with_capacity(spans.len());
    let mut prev_start: Option<usize> = None;

    for span in spans.iter_mut() {
        let heat_delta = total_heat_delta(buffer, span.start, prev_start, valve, profile);
        let cutoff_s =
            (heat_delta * config.settle_seconds_per_watt - config.post_adjust_wait_s).max(0.0);

        let t0 = buffer.unix_time[span.start];
        while span.start < span.end && buffer.unix_time[span.start] - t0 < cutoff_s {
            span.start += 1;
        }

        cutoffs.push(cutoff_s);
        prev_start = Some(span.start);
    }

    cutoffs
}

/// Total heat-load step into the run starting at `start`.
///
/// The first run steps from the reference operating point; later runs step
/// from the previous run's (trimmed) start. Q0 sessions add the
/// gradient-implied heat at the design point, since RF heat also has to
/// soak into the bath.
fn total_heat_delta(
    buffer: &TelemetryBuffer,
    start: usize,
    prev_start: Option<usize>,
    valve: &ValveParams,
    profile: SessionProfile,
) -> f64 {
    let grad_heat = |idx: usize| -> f64 {
        if profile == SessionProfile::Q0 {
            buffer
                .gradient_mv_m(idx)
                .map(approx_heat_from_gradient)
                .unwrap_or(0.0)
        } else {
            0.0
        }
    };

    match prev_start {
        None => {
            buffer.heater_commanded[start] - valve.ref_heat_load_commanded + grad_heat(start)
        }
        Some(prev) => {
            let elec = buffer.heater_commanded[start] - buffer.heater_commanded[prev];
            (elec + grad_heat(start) - grad_heat(prev)).abs()
        }
    }
}

fn fit_spans(
    buffer: &TelemetryBuffer,
    spans: &[RunSpan],
    cutoffs: &[f64],
    valve: &ValveParams,
) -> Vec<Run> {
    let mut runs = Vec::with_capacity(spans.len());

    for (span, &cutoff_s) in spans.iter().zip(cutoffs) {
        let times = &buffer.unix_time[span.start..=span.end];
        let levels = &buffer.downstream_level[span.start..=span.end];

        let Some(fit) = fit_line(times, levels) else {
            warn!(
                start = span.start,
                end = span.end,
                "run degenerate after settle trimming; discarding"
            );
            continue;
        };

        let actual = &buffer.heater_actual[span.start..=span.end];
        let mean_actual = actual.iter().sum::<f64>() / actual.len() as f64;

        runs.push(Run {
            start: span.start,
            end: span.end,
            kind: span.kind,
            elec_heat_commanded_w: buffer.heater_commanded[span.start]
                - valve.ref_heat_load_commanded,
            elec_heat_actual_w: mean_actual - valve.ref_heat_load_actual,
            fit,
            diagnostics: RunDiagnostics {
                settle_cutoff_s: cutoff_s,
                duration_min: (times[times.len() - 1] - times[0]) / 60.0,
                r_squared: fit.r_squared,
            },
        });
    }

    runs
}
