//! # Coverage Calculation
//!
//! Decides how many days of events to fetch given what the calendar already
//! holds. The calendar always aims for [`MIN_COVERAGE`] days of lead time
//! beyond what is stored, never commits to more than [`MAX_COVERAGE`] days in
//! one run, and never fetches fewer days than the caller asked for.

use crate::CalendarEvent;
use chrono::{DateTime, Utc};

/// Minimum lead time, in days, kept ahead of the stored events.
pub const MIN_COVERAGE: i64 = 14;

/// Upper bound, in days, on the coverage target of a single run.
pub const MAX_COVERAGE: i64 = 40;

/// Result of a coverage calculation. Derived per run, never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoverageWindow {
    /// Whole days from now to the latest stored event end (never negative)
    pub existing_coverage_days: i64,
    /// Desired coverage after this run
    pub target_days: i64,
    /// Days to fetch, counted from now
    pub fetch_days: i64,
}

/// Compute the fetch window for a run at `now`.
///
/// `existing_coverage_days` counts whole days between `now` and the latest end
/// of `existing` (an end before its start counts as the start); partial days are
/// truncated. The target is that coverage plus [`MIN_COVERAGE`], clamped to
/// `MIN_COVERAGE..=MAX_COVERAGE`, and the fetch is the larger of the target and
/// `requested_days`.
pub fn compute_window(
    requested_days: i64,
    existing: &[CalendarEvent],
    now: DateTime<Utc>,
) -> CoverageWindow {
    let latest_end = existing
        .iter()
        .map(|event| event.end.max(event.start))
        .max()
        .unwrap_or(now)
        .max(now);

    let existing_coverage_days = (latest_end - now).num_days().max(0);
    let target_days = (existing_coverage_days + MIN_COVERAGE).clamp(MIN_COVERAGE, MAX_COVERAGE);
    let fetch_days = requested_days.max(target_days);

    CoverageWindow {
        existing_coverage_days,
        target_days,
        fetch_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 15, 0, 0, 0).unwrap()
    }

    fn ending_in(days: i64) -> Vec<CalendarEvent> {
        vec![CalendarEvent::new(
            "test-1",
            "Test Event",
            now(),
            now() + Duration::days(days),
        )]
    }

    #[test]
    fn test_no_existing_events() {
        let window = compute_window(7, &[], now());
        assert_eq!(
            window,
            CoverageWindow {
                existing_coverage_days: 0,
                target_days: 14,
                fetch_days: 14
            }
        );
    }

    #[test]
    fn test_existing_events_extend_target() {
        let window = compute_window(7, &ending_in(10), now());
        assert_eq!(window.existing_coverage_days, 10);
        assert_eq!(window.target_days, 24);
        assert_eq!(window.fetch_days, 24);
    }

    #[test]
    fn test_max_coverage_clamp() {
        let window = compute_window(7, &ending_in(50), now());
        assert_eq!(
            window,
            CoverageWindow {
                existing_coverage_days: 50,
                target_days: 40,
                fetch_days: 40
            }
        );
    }

    #[test]
    fn test_requested_days_dominate_target() {
        let window = compute_window(30, &ending_in(10), now());
        assert_eq!(
            window,
            CoverageWindow {
                existing_coverage_days: 10,
                target_days: 24,
                fetch_days: 30
            }
        );
    }

    #[test]
    fn test_end_before_start_falls_back_to_start() {
        let mut event = CalendarEvent::new(
            "test-1",
            "Test Event",
            now() + Duration::days(5),
            now() + Duration::days(5),
        );
        event.end = now();
        let window = compute_window(7, &[event], now());
        assert_eq!(window.existing_coverage_days, 5);
        assert_eq!(window.target_days, 19);
        assert_eq!(window.fetch_days, 19);
    }

    #[test]
    fn test_past_events_never_count_negative() {
        let past = vec![CalendarEvent::new(
            "old",
            "Old",
            now() - Duration::days(20),
            now() - Duration::days(19),
        )];
        let window = compute_window(3, &past, now());
        assert_eq!(window.existing_coverage_days, 0);
        assert_eq!(window.fetch_days, MIN_COVERAGE);
    }

    #[test]
    fn test_partial_days_are_truncated() {
        let events = vec![CalendarEvent::new(
            "t",
            "T",
            now(),
            now() + Duration::days(3) + Duration::hours(20),
        )];
        assert_eq!(compute_window(0, &events, now()).existing_coverage_days, 3);
    }
}
