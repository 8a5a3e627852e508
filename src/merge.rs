//! # Event Merging
//!
//! Unions freshly produced events into an existing collection, deduplicating
//! by `id`. Existing events always win: a fresh event whose id is already
//! stored is dropped, even if its other fields differ. Repeated ids inside
//! `existing` (a hand-edited file) collapse to their first occurrence.

use crate::CalendarEvent;
use std::collections::HashSet;

/// Combine `existing` with `fresh`.
///
/// - `replace_existing == false`: every distinct existing event, unchanged and
///   in order, followed by the fresh events whose id is not yet present.
/// - `replace_existing == true`: `fresh` alone, keeping the first occurrence of
///   each id.
///
/// No two events in the result share an id. Neither input is modified.
pub fn merge(
    existing: &[CalendarEvent],
    fresh: &[CalendarEvent],
    replace_existing: bool,
) -> Vec<CalendarEvent> {
    let base: &[CalendarEvent] = if replace_existing { &[] } else { existing };

    let mut seen: HashSet<&str> = HashSet::with_capacity(base.len() + fresh.len());
    let mut merged = Vec::with_capacity(base.len() + fresh.len());

    for event in base.iter().chain(fresh) {
        if seen.insert(event.id.as_str()) {
            merged.push(event.clone());
        }
    }

    merged
}
