//! # Tide Calendar Core Library
//!
//! This library turns a location's tidal constituents (or raw high/low readings
//! from an external API) into calendar events, and keeps a persisted iCalendar
//! file incrementally up to date without duplicating or losing entries.
//!
//! ## Design Philosophy
//!
//! ### Pure Core
//! - **No hidden globals**: constituent tables arrive as configuration values, so
//!   several stations can be modelled side by side
//! - **No ambient time**: every operation that depends on "now" takes it as an
//!   argument, which keeps results reproducible after a restart
//! - **Owned results**: each call returns fresh data; inputs are never mutated
//!
//! ### Timezone Fidelity
//! Instants are stored in UTC and paired with an optional IANA zone. The zone is
//! only used to render wall-clock values into the calendar file and to read
//! them back, so a load/save cycle can never shift an event by an hour.
//!
//! ### Data Flow
//! 1. **Coverage**: [`coverage::compute_window`] decides how many days to fetch
//! 2. **Produce**: a [`provider::Provider`] returns candidate events, either from
//!    [`harmonic`] + [`extrema`] or from an external source
//! 3. **Merge**: [`merge::merge`] unions them with events decoded by [`ics`]
//! 4. **Persist**: [`ics::save_calendar`] rewrites the whole file
//!
//! [`sync::synchronize`] composes steps 1-3.
//!
//! ## Core Types
//! - [`Extreme`]: a local high or low of the modelled signal
//! - [`CalendarEvent`]: one persisted calendar entry, identified by its `id`

use chrono::{DateTime, SubsecRound, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

// Module declarations
pub mod config;
pub mod coverage;
pub mod error;
pub mod extrema;
pub mod harmonic;
pub mod ics;
pub mod logging;
pub mod merge;
pub mod provider;
pub mod sync;

pub use error::{Result, TideError};

/// Whether an extreme is a local maximum or minimum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtremeKind {
    High,
    Low,
}

impl ExtremeKind {
    /// Human label used in event summaries ("High" / "Low").
    pub fn label(self) -> &'static str {
        match self {
            ExtremeKind::High => "High",
            ExtremeKind::Low => "Low",
        }
    }
}

impl fmt::Display for ExtremeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A high or low water event.
///
/// Produced by [`extrema::find_extremes`] or parsed from an external source.
/// Immutable once created.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use tide_calendar::{Extreme, ExtremeKind};
///
/// let high = Extreme {
///     instant: Utc.with_ymd_and_hms(2025, 7, 15, 9, 16, 0).unwrap(),
///     level: 10.4,
///     kind: ExtremeKind::High,
/// };
/// assert_eq!(high.kind.label(), "High");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Extreme {
    /// When the extreme occurs
    pub instant: DateTime<Utc>,
    /// Water level in metres
    pub level: f64,
    /// High or low water
    pub kind: ExtremeKind,
}

/// One calendar entry.
///
/// Identity is the `id` field alone: two events with the same id are the same
/// event regardless of every other field. Start and end are UTC instants; the
/// optional `time_zone` says which wall-clock they should be rendered in.
///
/// # Example
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use tide_calendar::CalendarEvent;
///
/// let start = Utc.with_ymd_and_hms(2025, 7, 8, 6, 0, 0).unwrap();
/// let event = CalendarEvent::new("tide-1", "High Tide 10.0 m", start, start + Duration::minutes(1))
///     .with_location("St Helier, Jersey")
///     .with_time_zone(chrono_tz::Europe::Jersey);
///
/// assert_eq!(event.time_zone.map(|tz| tz.name()), Some("Europe/Jersey"));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct CalendarEvent {
    /// Stable unique key
    pub id: String,
    pub summary: String,
    pub start: DateTime<Utc>,
    /// Never before `start`
    pub end: DateTime<Utc>,
    pub description: Option<String>,
    pub location: Option<String>,
    /// Zone whose wall-clock the start/end are rendered in
    pub time_zone: Option<Tz>,
}

impl CalendarEvent {
    /// Create an event; an `end` earlier than `start` is clamped to `start`.
    ///
    /// Instants are truncated to whole seconds and line breaks in text are
    /// normalised to `\n`, matching what the calendar file can hold.
    pub fn new(
        id: impl Into<String>,
        summary: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        let start = start.trunc_subsecs(0);
        Self {
            id: id.into(),
            summary: normalize_line_breaks(summary.into()),
            start,
            end: end.trunc_subsecs(0).max(start),
            description: None,
            location: None,
            time_zone: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(normalize_line_breaks(description.into()));
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(normalize_line_breaks(location.into()));
        self
    }

    pub fn with_time_zone(mut self, time_zone: Tz) -> Self {
        self.time_zone = Some(time_zone);
        self
    }
}

fn normalize_line_breaks(text: String) -> String {
    if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_new_truncates_to_whole_seconds() {
        let start = Utc.with_ymd_and_hms(2025, 7, 15, 3, 39, 0).unwrap();
        let event = CalendarEvent::new(
            "e",
            "s",
            start + Duration::milliseconds(250),
            start + Duration::milliseconds(60_999),
        );
        assert_eq!(event.start, start);
        assert_eq!(event.end, start + Duration::seconds(60));
    }

    #[test]
    fn test_end_never_precedes_start() {
        let start = Utc.with_ymd_and_hms(2025, 7, 15, 3, 39, 0).unwrap();
        let event = CalendarEvent::new("e", "s", start, start - Duration::hours(1));
        assert_eq!(event.end, start);
    }

    #[test]
    fn test_carriage_returns_become_newlines() {
        let start = Utc.with_ymd_and_hms(2025, 7, 15, 3, 39, 0).unwrap();
        let event = CalendarEvent::new("e", "one\r\ntwo", start, start)
            .with_description("line1\r\nline2\rline3")
            .with_location("quay\r\nside");
        assert_eq!(event.summary, "one\ntwo");
        assert_eq!(event.description.as_deref(), Some("line1\nline2\nline3"));
        assert_eq!(event.location.as_deref(), Some("quay\nside"));
    }
}
