//! # Harmonic Tide Model
//!
//! Predicts the water level at any instant as a superposition of known tidal
//! constituents:
//!
//! ```text
//! level(t) = offset + Σ amplitude_i · cos(speed_i · h(t) − phase_i)
//! ```
//!
//! where `h(t)` is the number of hours elapsed since the series epoch and all
//! angles are in degrees.
//!
//! ## Numerical Stability
//! Elapsed time is taken as whole milliseconds before converting to hours, and
//! each constituent's angle is reduced modulo 360° before the cosine is
//! evaluated. With `f64` this keeps sub-microdegree accuracy for spans of
//! several centuries, so predictions decades away from the epoch are as exact
//! as those next to it.
//!
//! ## Determinism
//! [`HarmonicModel::level_at`] is a pure function of the instant and the
//! constituent table. Identical inputs always produce bit-identical output,
//! which the extrema search relies on for stable event identifiers.

use crate::error::{Result, TideError};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One sinusoidal component of a tidal signal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Constituent {
    /// Conventional constituent name (M2, S2, K1, ...)
    pub name: String,
    /// Half the peak-to-trough range contributed, in metres
    pub amplitude: f64,
    /// Phase lag at the epoch in degrees (0-360)
    #[serde(alias = "phase_degrees")]
    pub phase: f64,
    /// Angular speed in degrees per hour
    #[serde(alias = "speed_degrees_per_hour")]
    pub speed: f64,
}

impl Constituent {
    pub fn new(name: impl Into<String>, amplitude: f64, phase: f64, speed: f64) -> Self {
        Self {
            name: name.into(),
            amplitude,
            phase,
            speed,
        }
    }
}

/// A location's tidal signature: its constituents plus the mean level they
/// oscillate around.
#[derive(Clone, Debug, PartialEq)]
pub struct HarmonicSeries {
    pub constituents: Vec<Constituent>,
    /// Mean water level above chart datum in metres
    pub mean_level: f64,
    /// Reference instant the constituent phases are expressed against
    pub epoch: DateTime<Utc>,
}

impl HarmonicSeries {
    /// Build a series referenced to the default epoch (see [`default_epoch`]).
    pub fn new(constituents: Vec<Constituent>, mean_level: f64) -> Self {
        Self {
            constituents,
            mean_level,
            epoch: default_epoch(),
        }
    }
}

/// Reference epoch for phases: 2000-01-01T00:00:00Z.
pub fn default_epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(946_684_800, 0).single().unwrap_or_default()
}

/// A validated [`HarmonicSeries`] ready for evaluation.
///
/// Construction is the only fallible step; once built, evaluating the level at
/// any instant cannot fail.
#[derive(Clone, Debug)]
pub struct HarmonicModel {
    series: HarmonicSeries,
}

impl HarmonicModel {
    /// Validate the constituent table.
    ///
    /// # Errors
    /// [`TideError::InvalidModel`] when the table is empty or a constituent has
    /// a non-positive (or non-finite) amplitude or speed, or a non-finite phase.
    pub fn new(series: HarmonicSeries) -> Result<Self> {
        if series.constituents.is_empty() {
            return Err(TideError::InvalidModel(
                "constituent table is empty".to_string(),
            ));
        }
        if !series.mean_level.is_finite() {
            return Err(TideError::InvalidModel(format!(
                "mean_level = {}",
                series.mean_level
            )));
        }

        for c in &series.constituents {
            if !(c.amplitude.is_finite() && c.amplitude > 0.0) {
                return Err(TideError::InvalidModel(format!(
                    "{}: amplitude = {}",
                    c.name, c.amplitude
                )));
            }
            if !(c.speed.is_finite() && c.speed > 0.0) {
                return Err(TideError::InvalidModel(format!(
                    "{}: speed = {}",
                    c.name, c.speed
                )));
            }
            if !c.phase.is_finite() {
                return Err(TideError::InvalidModel(format!(
                    "{}: phase = {}",
                    c.name, c.phase
                )));
            }
        }

        Ok(Self { series })
    }

    /// Water level in metres above chart datum at `instant`.
    pub fn level_at(&self, instant: DateTime<Utc>) -> f64 {
        let hours = hours_since(self.series.epoch, instant);

        self.series
            .constituents
            .iter()
            .fold(self.series.mean_level, |level, c| {
                // Reduce before subtracting the phase so the trig argument stays small
                let angle = ((c.speed * hours).rem_euclid(360.0) - c.phase).rem_euclid(360.0);
                level + c.amplitude * angle.to_radians().cos()
            })
    }
}

impl TryFrom<HarmonicSeries> for HarmonicModel {
    type Error = TideError;

    fn try_from(series: HarmonicSeries) -> Result<Self> {
        Self::new(series)
    }
}

fn hours_since(epoch: DateTime<Utc>, instant: DateTime<Utc>) -> f64 {
    (instant - epoch).num_milliseconds() as f64 / 3_600_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn single(amplitude: f64, phase: f64, speed: f64) -> HarmonicSeries {
        HarmonicSeries::new(vec![Constituent::new("M2", amplitude, phase, speed)], 5.0)
    }

    #[test]
    fn test_level_at_epoch_is_offset_plus_projected_amplitude() {
        let model = HarmonicModel::new(single(2.0, 0.0, 28.984_104_2)).unwrap();
        let level = model.level_at(default_epoch());
        assert!((level - 7.0).abs() < 1e-12, "got {level}");

        // A 90° lag puts the epoch at mean level
        let lagged = HarmonicModel::new(single(2.0, 90.0, 28.984_104_2)).unwrap();
        assert!((lagged.level_at(default_epoch()) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_level_follows_constituent_period() {
        // 30°/h → exactly 12 h period
        let model = HarmonicModel::new(single(1.5, 40.0, 30.0)).unwrap();
        let t0 = default_epoch() + Duration::hours(3);

        let half = model.level_at(t0 + Duration::hours(6));
        let full = model.level_at(t0 + Duration::hours(12));
        let now = model.level_at(t0);

        assert!((now - full).abs() < 1e-9);
        assert!(((now - 5.0) + (half - 5.0)).abs() < 1e-9, "half period should mirror");
    }

    #[test]
    fn test_level_is_deterministic() {
        let model = HarmonicModel::new(single(3.2, 179.2, 28.984_104_2)).unwrap();
        let t = Utc.with_ymd_and_hms(2025, 7, 8, 6, 0, 0).unwrap();
        let a = model.level_at(t);
        let b = model.level_at(t);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_stable_decades_from_epoch() {
        // 30°/h with zero phase is at its crest on every whole multiple of 12 h
        let model = HarmonicModel::new(single(1.0, 0.0, 30.0)).unwrap();
        let far = default_epoch() + Duration::hours(12 * 365 * 2 * 60);
        assert!((model.level_at(far) - 6.0).abs() < 1e-9);

        let before = default_epoch() - Duration::hours(12 * 365 * 2 * 30);
        assert!((model.level_at(before) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_empty_table() {
        let err = HarmonicModel::new(HarmonicSeries::new(vec![], 1.0)).unwrap_err();
        assert!(matches!(err, TideError::InvalidModel(_)));
    }

    #[test]
    fn test_rejects_non_positive_amplitude_or_speed() {
        let err = HarmonicModel::new(single(0.0, 10.0, 28.9)).unwrap_err();
        assert!(err.to_string().contains("amplitude = 0"), "{err}");

        let err = HarmonicModel::new(single(1.0, 10.0, -1.0)).unwrap_err();
        assert!(err.to_string().contains("speed = -1"), "{err}");

        let err = HarmonicModel::new(single(f64::NAN, 10.0, 28.9)).unwrap_err();
        assert!(matches!(err, TideError::InvalidModel(_)));
    }

    #[test]
    fn test_try_from_series() {
        let model: Result<HarmonicModel> = single(1.0, 0.0, 15.0).try_into();
        assert!(model.is_ok());
    }
}
