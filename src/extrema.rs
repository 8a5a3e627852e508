//! # High/Low Water Extraction
//!
//! Derives discrete high and low water events from the continuous
//! [`HarmonicModel`] by sampling it on a regular grid and picking out local
//! maxima and minima.
//!
//! ## Sampling Grid
//! The query window is widened by a padding on both sides (12 hours by default)
//! so an extreme sitting exactly on a requested boundary still has neighbours
//! on both sides. Samples are taken every `sample_interval` (300 s by default)
//! on a grid anchored to whole multiples of the interval since the Unix epoch.
//! Anchoring makes the sampled instants independent of the window, so two runs
//! whose windows overlap report the same instants for the same extremes.
//!
//! ## Classification
//! Consecutive samples with equal levels are collapsed into one plateau, which
//! reports its earliest sample. A plateau whose neighbours are both lower is a
//! high, both higher a low. A staircase (one neighbour equal-then-higher) is
//! neither, so consecutive results always alternate between high and low.
//!
//! ## Trade-off
//! Finding the roots of the analytic derivative would be more precise, but
//! sampling keeps the model a black box and exposes precision as a single knob:
//! the reported instant is within one `sample_interval` of the true extreme.
//! Cost is O(window / sample_interval) evaluations.

use crate::error::{Result, TideError};
use crate::harmonic::{HarmonicModel, HarmonicSeries};
use crate::{Extreme, ExtremeKind};
use chrono::{DateTime, Duration, TimeDelta, TimeZone, Utc};
use tracing::debug;

/// Default sampling step in seconds.
pub const DEFAULT_SAMPLE_INTERVAL_SECS: i64 = 300;

/// Default padding around the query window in hours.
pub const DEFAULT_PADDING_HOURS: i64 = 12;

const MAX_PREALLOCATED_SAMPLES: i64 = 1 << 20;

/// Sampling settings for the extrema search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtremaFinder {
    pub sample_interval: Duration,
    pub padding: Duration,
}

impl Default for ExtremaFinder {
    fn default() -> Self {
        Self {
            sample_interval: Duration::seconds(DEFAULT_SAMPLE_INTERVAL_SECS),
            padding: Duration::hours(DEFAULT_PADDING_HOURS),
        }
    }
}

impl ExtremaFinder {
    /// Out-of-range knobs saturate; [`ExtremaFinder::find`] then rejects them.
    pub fn new(sample_interval_seconds: i64, padding_hours: i64) -> Self {
        let saturate = |n: i64| if n < 0 { TimeDelta::MIN } else { TimeDelta::MAX };
        Self {
            sample_interval: TimeDelta::try_seconds(sample_interval_seconds)
                .unwrap_or_else(|| saturate(sample_interval_seconds)),
            padding: TimeDelta::try_hours(padding_hours).unwrap_or_else(|| saturate(padding_hours)),
        }
    }

    /// Extremes of `model` within `[start, end)`, in ascending time order.
    ///
    /// # Errors
    /// - [`TideError::InvalidWindow`] if `end <= start`, or the padded window
    ///   leaves the representable range
    /// - [`TideError::InvalidSampleInterval`] if the interval is not positive
    pub fn find(
        &self,
        model: &HarmonicModel,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Extreme>> {
        if end <= start {
            return Err(TideError::InvalidWindow { start, end });
        }
        let step = self.sample_interval.num_seconds();
        if step <= 0 {
            return Err(TideError::InvalidSampleInterval(step));
        }
        let padding = self.padding.max(Duration::zero());
        let (from, to) = match (
            start.checked_sub_signed(padding),
            end.checked_add_signed(padding),
        ) {
            (Some(from), Some(to)) => (from, to),
            _ => return Err(TideError::InvalidWindow { start, end }),
        };

        let samples = sample(model, from, to, step);
        let extremes: Vec<Extreme> = classify(&samples)
            .into_iter()
            .filter(|e| e.instant >= start && e.instant < end)
            .collect();

        debug!(
            samples = samples.len(),
            extremes = extremes.len(),
            %start,
            %end,
            "Extracted tide extremes"
        );

        Ok(extremes)
    }
}

/// Validate `series` and return its extremes within `[start, end)`.
///
/// Convenience wrapper over [`HarmonicModel::new`] and [`ExtremaFinder::find`].
pub fn find_extremes(
    series: &HarmonicSeries,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    sample_interval_seconds: i64,
    padding_hours: i64,
) -> Result<Vec<Extreme>> {
    let model = HarmonicModel::new(series.clone())?;
    ExtremaFinder::new(sample_interval_seconds, padding_hours).find(&model, start, end)
}

/// Evaluate the model on the epoch-anchored grid covering `[from, to]`.
fn sample(
    model: &HarmonicModel,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    step: i64,
) -> Vec<(DateTime<Utc>, f64)> {
    // First grid point at or after `from`
    let mut secs = from.timestamp();
    if from.timestamp_subsec_nanos() > 0 {
        secs += 1;
    }
    secs += (step - secs.rem_euclid(step)) % step;
    let last = to.timestamp();

    let expected = ((last - secs) / step + 1).clamp(0, MAX_PREALLOCATED_SAMPLES);
    let mut samples = Vec::with_capacity(expected as usize);
    while secs <= last {
        if let Some(instant) = Utc.timestamp_opt(secs, 0).single() {
            samples.push((instant, model.level_at(instant)));
        }
        secs = match secs.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    samples
}

/// Pick local maxima/minima out of an ordered sample sequence.
fn classify(samples: &[(DateTime<Utc>, f64)]) -> Vec<Extreme> {
    // Collapse equal-level runs, keeping the earliest sample of each
    let mut plateaus: Vec<(DateTime<Utc>, f64)> = Vec::with_capacity(samples.len());
    for &(instant, level) in samples {
        match plateaus.last() {
            Some(&(_, prev)) if prev == level => {}
            _ => plateaus.push((instant, level)),
        }
    }

    plateaus
        .windows(3)
        .filter_map(|w| {
            let (prev, (instant, level), next) = (w[0].1, w[1], w[2].1);
            let kind = if level > prev && level > next {
                ExtremeKind::High
            } else if level < prev && level < next {
                ExtremeKind::Low
            } else {
                return None;
            };
            Some(Extreme {
                instant,
                level,
                kind,
            })
        })
        .collect()
}
