//! # StormGlass Tide Extremes
//!
//! Fetches high/low water times from the StormGlass tide API and formats them
//! like the harmonic source does.
//!
//! ## Request
//! `GET {base_url}/v2/tide/extremes/point?lat=..&lng=..&start=..&end=..` with
//! the API token in the `Authorization` header. The window starts at the
//! request's `now` shifted by `offset_days` and spans `days` days.
//!
//! ## Response
//! ```json
//! { "data": [ { "time": "2025-07-15T03:39:00+00:00", "type": "low", "height": 1.0 } ] }
//! ```
//! Older responses use `extremes` instead of `data`; both are accepted.
//!
//! ## Errors
//! Failures are surfaced unchanged and never retried here: a non-success
//! status becomes [`TideError::Upstream`] with the response body, transport
//! problems become [`TideError::Http`], unreadable bodies
//! [`TideError::MalformedRecords`].

use super::{tide_event, EventSource, FetchRequest, TideEventStyle};
use crate::config::Config;
use crate::error::{Result, TideError};
use crate::{CalendarEvent, Extreme, ExtremeKind};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use chrono_tz::Tz;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::{debug, info};

/// One raw extreme as delivered by the API.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RawExtreme {
    pub time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: ExtremeKind,
    pub height: f64,
}

impl From<RawExtreme> for Extreme {
    fn from(raw: RawExtreme) -> Self {
        Extreme {
            instant: raw.time,
            level: raw.height,
            kind: raw.kind,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExtremesResponse {
    data: Option<Vec<RawExtreme>>,
    extremes: Option<Vec<RawExtreme>>,
}

/// Parse an API response body into extremes, sorted by time.
pub fn parse_extremes(body: &str) -> Result<Vec<Extreme>> {
    let response: ExtremesResponse =
        serde_json::from_str(body).map_err(|e| TideError::MalformedRecords(e.to_string()))?;

    let mut extremes: Vec<Extreme> = response
        .data
        .or(response.extremes)
        .unwrap_or_default()
        .into_iter()
        .map(Extreme::from)
        .collect();
    extremes.sort_by_key(|e| e.instant);
    Ok(extremes)
}

#[derive(Clone, Debug)]
pub struct StormGlassProvider {
    base_url: String,
    token: Option<String>,
    latitude: f64,
    longitude: f64,
    timeout: std::time::Duration,
    style: TideEventStyle,
}

impl StormGlassProvider {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.stormglass.base_url.clone(),
            token: config.stormglass.resolve_token(),
            latitude: config.station.latitude,
            longitude: config.station.longitude,
            timeout: std::time::Duration::from_secs(config.stormglass.timeout_seconds),
            style: TideEventStyle {
                location: config.station.location.clone(),
                time_zone: config.station.zone(),
                datum_offset: config.station.datum_offset,
            },
        }
    }

    pub fn time_zone(&self) -> Tz {
        self.style.time_zone
    }

    /// Full request URL (without query) for the extremes endpoint.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v2/tide/extremes/point",
            self.base_url.trim_end_matches('/')
        )
    }

    /// `[start, end)` in UTC for a request.
    pub fn window(request: &FetchRequest) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let add = |from: DateTime<Utc>, days: i64| {
            TimeDelta::try_days(days).and_then(|delta| from.checked_add_signed(delta))
        };
        let start = add(request.now, request.offset_days);
        match start.and_then(|start| Some((start, add(start, request.days)?))) {
            Some(window) => Ok(window),
            None => Err(TideError::InvalidWindow {
                start: request.now,
                end: request.now,
            }),
        }
    }

    /// Format fetched extremes as calendar events.
    pub fn to_events(&self, extremes: &[Extreme]) -> Vec<CalendarEvent> {
        extremes
            .iter()
            .map(|extreme| tide_event(extreme, &self.style))
            .collect()
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<String> {
        let token = self.token.as_deref().ok_or(TideError::MissingToken)?;
        let (start, end) = Self::window(request)?;

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let query = [
            ("lat", self.latitude.to_string()),
            ("lng", self.longitude.to_string()),
            ("start", start.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ("end", end.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ];

        info!(url = %self.endpoint(), %start, %end, "Requesting StormGlass tide extremes");
        let res = client
            .get(self.endpoint())
            .query(&query)
            .header(AUTHORIZATION, token)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(TideError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(res.text().await?)
    }
}

impl EventSource for StormGlassProvider {
    async fn events(&self, request: FetchRequest) -> Result<Vec<CalendarEvent>> {
        let body = self.fetch(&request).await?;
        let extremes = parse_extremes(&body)?;
        debug!(extremes = extremes.len(), "Parsed StormGlass response");
        Ok(self.to_events(&extremes))
    }
}
