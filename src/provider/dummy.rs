//! Fixed single-event source for smoke-testing the calendar pipeline.

use super::{EventSource, FetchRequest};
use crate::error::Result;
use crate::CalendarEvent;
use chrono::{TimeZone, Utc};

/// Returns the same hard-coded event whatever range is requested.
#[derive(Clone, Copy, Debug, Default)]
pub struct DummyProvider;

impl DummyProvider {
    pub fn event() -> CalendarEvent {
        CalendarEvent::new(
            "dummy-001",
            "Dummy Match",
            Utc.with_ymd_and_hms(2025, 7, 5, 14, 0, 0)
                .single()
                .unwrap_or_default(),
            Utc.with_ymd_and_hms(2025, 7, 5, 16, 0, 0)
                .single()
                .unwrap_or_default(),
        )
        .with_location("Dream Stadium")
    }
}

impl EventSource for DummyProvider {
    async fn events(&self, _request: FetchRequest) -> Result<Vec<CalendarEvent>> {
        Ok(vec![Self::event()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_one_event_regardless_of_range() {
        let now = Utc::now();
        let one = DummyProvider.events(FetchRequest::new(now, 1)).await.unwrap();
        let thirty = DummyProvider
            .events(FetchRequest::new(now, 30).with_offset(5))
            .await
            .unwrap();

        assert_eq!(one.len(), 1);
        assert_eq!(one, thirty);

        let event = &one[0];
        assert_eq!(event.id, "dummy-001");
        assert_eq!(event.summary, "Dummy Match");
        assert_eq!(event.location.as_deref(), Some("Dream Stadium"));
        assert_eq!(event.start, Utc.with_ymd_and_hms(2025, 7, 5, 14, 0, 0).unwrap());
        assert_eq!(event.end, Utc.with_ymd_and_hms(2025, 7, 5, 16, 0, 0).unwrap());
        assert!(event.end > event.start);
    }
}
