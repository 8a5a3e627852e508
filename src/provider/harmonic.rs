//! Tide events computed locally from a station's harmonic constituents.
//!
//! The requested window runs from local midnight (station zone) of the
//! request's day, shifted by `offset_days`, for `days` calendar days. Because
//! the extrema grid is anchored to the Unix epoch, re-running over an
//! overlapping window reproduces the same instants and therefore the same ids.

use super::{tide_event, EventSource, FetchRequest, TideEventStyle};
use crate::config::Config;
use crate::error::{Result, TideError};
use crate::extrema::ExtremaFinder;
use crate::harmonic::{HarmonicModel, HarmonicSeries};
use crate::CalendarEvent;
use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct HarmonicProvider {
    series: HarmonicSeries,
    finder: ExtremaFinder,
    style: TideEventStyle,
}

impl HarmonicProvider {
    pub fn new(series: HarmonicSeries, finder: ExtremaFinder, style: TideEventStyle) -> Self {
        Self {
            series,
            finder,
            style,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.station.harmonic_series(),
            config.extrema.finder(),
            TideEventStyle {
                location: config.station.location.clone(),
                time_zone: config.station.zone(),
                datum_offset: config.station.datum_offset,
            },
        )
    }

    pub fn time_zone(&self) -> Tz {
        self.style.time_zone
    }

    /// `[start, end)` in UTC for a request.
    ///
    /// # Errors
    /// [`TideError::InvalidWindow`] when the day counts run past the calendar.
    pub fn window(&self, request: &FetchRequest) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let tz = self.style.time_zone;
        let today = request.now.with_timezone(&tz).date_naive();
        let first = add_days(today, request.offset_days);
        let last = first.and_then(|first| add_days(first, request.days));

        match (first, last) {
            (Some(first), Some(last)) => Ok((
                local_midnight(tz, first, request.now),
                local_midnight(tz, last, request.now),
            )),
            _ => Err(TideError::InvalidWindow {
                start: request.now,
                end: request.now,
            }),
        }
    }
}

impl EventSource for HarmonicProvider {
    async fn events(&self, request: FetchRequest) -> Result<Vec<CalendarEvent>> {
        let model = HarmonicModel::new(self.series.clone())?;
        let (start, end) = self.window(&request)?;

        let extremes = self.finder.find(&model, start, end)?;
        debug!(%start, %end, extremes = extremes.len(), "Computed harmonic tides");

        Ok(extremes
            .iter()
            .map(|extreme| tide_event(extreme, &self.style))
            .collect())
    }
}

fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    TimeDelta::try_days(days).and_then(|delta| date.checked_add_signed(delta))
}

/// First instant of `date` in `tz` (midnight, or the end of a DST gap at midnight).
fn local_midnight(tz: Tz, date: NaiveDate, fallback: DateTime<Utc>) -> DateTime<Utc> {
    (0..3)
        .filter_map(|hour| date.and_hms_opt(hour, 0, 0))
        .find_map(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TideError;
    use crate::harmonic::Constituent;
    use chrono::Duration;
    use chrono_tz::Europe::Jersey;

    fn provider() -> HarmonicProvider {
        HarmonicProvider::from_config(&Config::default())
    }

    fn summer_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 8, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_window_starts_at_local_midnight() {
        let (start, end) = provider()
            .window(&FetchRequest::new(summer_now(), 1))
            .unwrap();
        // Midnight BST is 23:00 UTC the day before
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 7, 7, 23, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 7, 8, 23, 0, 0).unwrap());

        let (start, _) = provider()
            .window(&FetchRequest::new(summer_now(), 1).with_offset(2))
            .unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 7, 9, 23, 0, 0).unwrap());
    }

    #[test]
    fn test_window_spans_dst_change() {
        // 2025-03-30 is only 23 hours long in Jersey
        let now = Utc.with_ymd_and_hms(2025, 3, 30, 12, 0, 0).unwrap();
        let (start, end) = provider().window(&FetchRequest::new(now, 1)).unwrap();
        assert_eq!(end - start, Duration::hours(23));
    }

    #[tokio::test]
    async fn test_one_day_of_harmonic_tides() {
        let request = FetchRequest::new(summer_now(), 1);
        let (start, end) = provider().window(&request).unwrap();
        let events = provider().events(request).await.unwrap();

        assert!((3..=4).contains(&events.len()), "got {}", events.len());
        for event in &events {
            assert!(event.start >= start && event.start < end);
            assert!(event.id.starts_with("tide-2025-07-"));
            assert_eq!(event.location.as_deref(), Some("St Helier, Jersey"));
            assert_eq!(event.time_zone, Some(Jersey));
            let description = event.description.as_deref().unwrap();
            assert!(description.starts_with("Height: ") && description.ends_with(" m"));
        }
    }

    #[tokio::test]
    async fn test_multiple_days_sorted_and_alternating() {
        let events = provider()
            .events(FetchRequest::new(summer_now(), 3))
            .await
            .unwrap();

        assert!(events.len() >= 10);
        for pair in events.windows(2) {
            assert!(pair[0].start < pair[1].start);
            let kind = |e: &CalendarEvent| e.summary.split(' ').next().map(str::to_owned);
            assert_ne!(kind(&pair[0]), kind(&pair[1]));
        }
    }

    #[tokio::test]
    async fn test_overlapping_runs_share_ids() {
        let today = provider()
            .events(FetchRequest::new(summer_now(), 3))
            .await
            .unwrap();
        let tomorrow = provider()
            .events(FetchRequest::new(summer_now() + Duration::days(1), 3))
            .await
            .unwrap();

        let shared = tomorrow
            .iter()
            .filter(|e| today.iter().any(|t| t.id == e.id))
            .count();
        assert!(shared >= 6, "two overlapping days should reproduce ids, got {shared}");
    }

    #[tokio::test]
    async fn test_oversized_window_is_an_error() {
        for days in [200_000_000, i64::MAX] {
            let err = provider()
                .events(FetchRequest::new(summer_now(), days))
                .await
                .unwrap_err();
            assert!(matches!(err, TideError::InvalidWindow { .. }), "days = {days}");
        }

        let err = provider()
            .window(&FetchRequest::new(summer_now(), 1).with_offset(i64::MIN))
            .unwrap_err();
        assert!(matches!(err, TideError::InvalidWindow { .. }));
    }

    #[tokio::test]
    async fn test_invalid_table_is_reported() {
        let mut config = Config::default();
        config.station.constituents = vec![Constituent::new("M2", -1.0, 0.0, 28.98)];
        let err = HarmonicProvider::from_config(&config)
            .events(FetchRequest::new(summer_now(), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, TideError::InvalidModel(_)));
    }
}
