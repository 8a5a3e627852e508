//! # Calendar Synchronisation
//!
//! One run of the calendar updater: decide how far ahead to look, ask the
//! event source for that many days, and fold the result into the events the
//! calendar already holds.

use crate::coverage::{compute_window, CoverageWindow};
use crate::error::Result;
use crate::merge::merge;
use crate::provider::{EventSource, FetchRequest};
use crate::CalendarEvent;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::info;

/// Result of a synchronisation run.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncOutcome {
    /// Merged events, ready to persist
    pub events: Vec<CalendarEvent>,
    pub window: CoverageWindow,
    /// Events in `events` that were not in the existing collection
    pub added: usize,
}

/// Fetch and merge fresh events into `existing`.
///
/// When `replace_existing` is set, coverage is computed as if the calendar were
/// empty and the existing events are dropped from the result. Source errors
/// are returned unchanged.
pub async fn synchronize<S: EventSource>(
    source: &S,
    existing: &[CalendarEvent],
    requested_days: i64,
    now: DateTime<Utc>,
    replace_existing: bool,
) -> Result<SyncOutcome> {
    let baseline: &[CalendarEvent] = if replace_existing { &[] } else { existing };
    let window = compute_window(requested_days, baseline, now);
    info!(
        coverage = window.existing_coverage_days,
        target = window.target_days,
        fetch = window.fetch_days,
        existing = existing.len(),
        replace = replace_existing,
        "Computed coverage window"
    );

    let fresh = source
        .events(FetchRequest::new(now, window.fetch_days))
        .await?;
    let events = merge(existing, &fresh, replace_existing);
    let known: HashSet<&str> = baseline.iter().map(|e| e.id.as_str()).collect();
    let added = events
        .iter()
        .filter(|e| !known.contains(e.id.as_str()))
        .count();

    info!(fetched = fresh.len(), added, total = events.len(), "Merged events");

    Ok(SyncOutcome {
        events,
        window,
        added,
    })
}
