//! # Event Sources
//!
//! Anything that can produce calendar events for a span of days implements
//! [`EventSource`]. The concrete sources are tagged variants of [`Provider`],
//! selected by name at runtime with [`load_provider`]:
//!
//! | Name | Source |
//! |------|--------|
//! | `dummy` | one fixed event, for smoke tests |
//! | `tides` / `harmonic` | [`HarmonicProvider`]: highs and lows computed from the station's constituents |
//! | `stormglass` | [`StormGlassProvider`]: highs and lows fetched from the StormGlass API |
//!
//! Unknown names fall back to `dummy`.
//!
//! Tide sources format their events identically through [`tide_event`], so a
//! calendar can switch between them without duplicating entries.

pub mod dummy;
pub mod harmonic;
pub mod stormglass;

pub use dummy::DummyProvider;
pub use harmonic::HarmonicProvider;
pub use stormglass::StormGlassProvider;

use crate::config::Config;
use crate::error::Result;
use crate::{CalendarEvent, Extreme};
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// What a source is asked for: `days` days of events starting `offset_days`
/// after the run's reference instant `now`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub now: DateTime<Utc>,
    pub days: i64,
    pub offset_days: i64,
}

impl FetchRequest {
    pub fn new(now: DateTime<Utc>, days: i64) -> Self {
        Self {
            now,
            days,
            offset_days: 0,
        }
    }

    pub fn with_offset(mut self, offset_days: i64) -> Self {
        self.offset_days = offset_days;
        self
    }
}

/// Capability to produce calendar events.
#[allow(async_fn_in_trait)]
pub trait EventSource {
    async fn events(&self, request: FetchRequest) -> Result<Vec<CalendarEvent>>;
}

/// Runtime-selected event source.
#[derive(Clone, Debug)]
pub enum Provider {
    Dummy(DummyProvider),
    Harmonic(HarmonicProvider),
    StormGlass(StormGlassProvider),
}

impl Provider {
    /// Zone the calendar should declare for this source's events.
    pub fn time_zone(&self) -> Option<Tz> {
        match self {
            Provider::Dummy(_) => None,
            Provider::Harmonic(p) => Some(p.time_zone()),
            Provider::StormGlass(p) => Some(p.time_zone()),
        }
    }
}

impl EventSource for Provider {
    async fn events(&self, request: FetchRequest) -> Result<Vec<CalendarEvent>> {
        match self {
            Provider::Dummy(p) => p.events(request).await,
            Provider::Harmonic(p) => p.events(request).await,
            Provider::StormGlass(p) => p.events(request).await,
        }
    }
}

/// Select a source by name, falling back to the dummy source.
pub fn load_provider(name: &str, config: &Config) -> Provider {
    match name.trim().to_ascii_lowercase().as_str() {
        "dummy" => Provider::Dummy(DummyProvider),
        "tides" | "harmonic" => Provider::Harmonic(HarmonicProvider::from_config(config)),
        "stormglass" => Provider::StormGlass(StormGlassProvider::from_config(config)),
        other => {
            warn!(provider = %other, "Unknown provider, falling back to dummy");
            Provider::Dummy(DummyProvider)
        }
    }
}

/// Station details stamped onto every tide event.
#[derive(Clone, Debug, PartialEq)]
pub struct TideEventStyle {
    pub location: String,
    pub time_zone: Tz,
    /// Metres added to each extreme's level before reporting
    pub datum_offset: f64,
}

/// Turn one extreme into a one-minute calendar event.
///
/// ```text
/// id:          tide-2025-07-15T03:39:00.000Z
/// summary:     Low Tide 1.8 m
/// description: Height: 1.83 m
/// ```
pub fn tide_event(extreme: &Extreme, style: &TideEventStyle) -> CalendarEvent {
    let height = extreme.level + style.datum_offset;
    // Ids must match the whole-second start the calendar file can hold
    let start = extreme.instant.trunc_subsecs(0);

    CalendarEvent::new(
        format!(
            "tide-{}",
            start.to_rfc3339_opts(SecondsFormat::Millis, true)
        ),
        format!("{} Tide {:.1} m", extreme.kind.label(), height),
        start,
        start + Duration::minutes(1),
    )
    .with_description(format!("Height: {height:.2} m"))
    .with_location(style.location.clone())
    .with_time_zone(style.time_zone)
}
