//! # iCalendar Persistence
//!
//! Reads and writes the persisted calendar as an RFC 5545 subset.
//!
//! ## Timezone Handling
//! Each event's start/end is written as a wall-clock value qualified by a
//! `TZID` parameter whenever the event carries its own zone or a
//! collection-level zone is supplied:
//!
//! ```text
//! DTSTART;TZID=Europe/Jersey:20250715T043900
//! ```
//!
//! Without any zone the UTC wall-clock is written with no qualifier. During a
//! daylight-saving fall-back the same wall-clock occurs twice; the second
//! occurrence is marked with `X-OCCURRENCE=LATER` so it reads back exactly.
//!
//! On decode, a naive time in a file that declares a collection zone
//! (`X-WR-TIMEZONE` / `TIMEZONE-ID`) is read as wall-clock in that zone, and
//! the event is tagged with it. This repairs older files written without
//! `TZID` on their events. Times are stored with whole-second precision.
//!
//! ## Failure Policy
//! A missing, empty or malformed calendar is treated as "no prior events":
//! [`decode`] and [`load_calendar`] log a warning and return an empty list, so a
//! first run and a run over a corrupted file both resynchronise fully.
//! [`try_decode`] exposes the underlying [`TideError::Decode`] for callers that
//! want it.

use crate::error::{Result, TideError};
use crate::CalendarEvent;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Product identifier written into every calendar.
pub const PRODID: &str = "-//Tide Tracker Team//tide-calendar//EN";

const DATE_TIME: &str = "%Y%m%dT%H%M%S";
const DATE: &str = "%Y%m%d";
const FOLD_OCTETS: usize = 75;
const LATER_OCCURRENCE: &str = "LATER";

/// A decoded calendar: its events plus the collection-level declarations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PersistedCalendar {
    pub name: Option<String>,
    pub time_zone: Option<Tz>,
    pub events: Vec<CalendarEvent>,
}

// -- Encoding --

/// Serialise `events` into calendar text, stamped with the current time.
pub fn encode(events: &[CalendarEvent], time_zone: Option<Tz>, name: Option<&str>) -> String {
    encode_at(events, time_zone, name, Utc::now())
}

/// Serialise `events` with an explicit `DTSTAMP`, for reproducible output.
pub fn encode_at(
    events: &[CalendarEvent],
    time_zone: Option<Tz>,
    name: Option<&str>,
    stamp: DateTime<Utc>,
) -> String {
    let mut w = Writer::default();

    w.line("BEGIN", "", "VCALENDAR");
    w.line("VERSION", "", "2.0");
    w.line("PRODID", "", PRODID);
    if let Some(name) = name {
        w.text("NAME", name);
        w.text("X-WR-CALNAME", name);
    }
    if let Some(tz) = time_zone {
        w.line("TIMEZONE-ID", "", tz.name());
        w.line("X-WR-TIMEZONE", "", tz.name());
    }

    let stamp = stamp.naive_utc().format(DATE_TIME).to_string() + "Z";
    for event in events {
        let zone = event.time_zone.or(time_zone);

        w.line("BEGIN", "", "VEVENT");
        w.text("UID", &event.id);
        w.line("SEQUENCE", "", "0");
        w.line("DTSTAMP", "", &stamp);
        w.time("DTSTART", event.start, zone);
        w.time("DTEND", event.end, zone);
        w.text("SUMMARY", &event.summary);
        if let Some(location) = &event.location {
            w.text("LOCATION", location);
        }
        if let Some(description) = &event.description {
            w.text("DESCRIPTION", description);
        }
        w.line("END", "", "VEVENT");
    }

    w.line("END", "", "VCALENDAR");
    w.out
}

#[derive(Default)]
struct Writer {
    out: String,
}

impl Writer {
    fn text(&mut self, name: &str, value: &str) {
        self.line(name, "", &escape(value));
    }

    fn time(&mut self, name: &str, instant: DateTime<Utc>, zone: Option<Tz>) {
        match zone {
            Some(tz) => {
                let local = instant.with_timezone(&tz).naive_local();
                let mut params = format!("TZID={}", tz.name());
                if is_later_occurrence(tz, &local, instant) {
                    params.push_str(";X-OCCURRENCE=");
                    params.push_str(LATER_OCCURRENCE);
                }
                self.line(name, &params, &local.format(DATE_TIME).to_string());
            }
            None => self.line(name, "", &instant.naive_utc().format(DATE_TIME).to_string()),
        }
    }

    /// Write one content line, folded at 75 octets.
    fn line(&mut self, name: &str, params: &str, value: &str) {
        let mut raw = String::with_capacity(name.len() + params.len() + value.len() + 2);
        raw.push_str(name);
        if !params.is_empty() {
            raw.push(';');
            raw.push_str(params);
        }
        raw.push(':');
        raw.push_str(value);

        let mut budget = FOLD_OCTETS;
        let mut used = 0;
        for ch in raw.chars() {
            if used + ch.len_utf8() > budget {
                self.out.push_str("\r\n ");
                // Continuation lines spend one octet on the leading space
                budget = FOLD_OCTETS - 1;
                used = 0;
            }
            self.out.push(ch);
            used += ch.len_utf8();
        }
        self.out.push_str("\r\n");
    }
}

fn is_later_occurrence(tz: Tz, local: &NaiveDateTime, instant: DateTime<Utc>) -> bool {
    let candidates = tz.from_local_datetime(local);
    match (candidates.earliest(), candidates.latest()) {
        (Some(early), Some(late)) => {
            early != late && late.with_timezone(&Utc) == instant.with_timezone(&Utc)
        }
        _ => false,
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            // CRLF collapses into the following \n; a lone CR is a line break
            '\r' if chars.peek() == Some(&'\n') => {}
            '\r' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out
}

// -- Decoding --

/// Decode calendar text into events.
///
/// Never fails: blank or malformed text yields an empty list (logged as a
/// warning when malformed).
pub fn decode(text: &str) -> Vec<CalendarEvent> {
    match try_decode(text) {
        Ok(calendar) => calendar.events,
        Err(err) => {
            warn!(error = %err, "Ignoring unreadable calendar; starting from no events");
            Vec::new()
        }
    }
}

/// Decode calendar text, reporting malformed content as [`TideError::Decode`].
///
/// Blank text decodes to an empty calendar.
pub fn try_decode(text: &str) -> Result<PersistedCalendar> {
    let lines = unfold(text);
    if lines.is_empty() {
        return Ok(PersistedCalendar::default());
    }

    let mut calendar = PersistedCalendar::default();
    let mut raw_events: Vec<Vec<Property>> = Vec::new();
    // Component stack below VCALENDAR (VEVENT, VALARM, VTIMEZONE, ...)
    let mut stack: Vec<String> = Vec::new();
    let mut opened = false;
    let mut closed = false;

    for (index, line) in lines.iter().enumerate() {
        let prop = Property::parse(line)
            .ok_or_else(|| decode_err(format!("line {}: malformed content line", index + 1)))?;

        if closed {
            return Err(decode_err("content after END:VCALENDAR"));
        }
        if !opened {
            if prop.name == "BEGIN" && prop.value.eq_ignore_ascii_case("VCALENDAR") {
                opened = true;
                continue;
            }
            return Err(decode_err("missing BEGIN:VCALENDAR"));
        }

        match prop.name.as_str() {
            "BEGIN" => {
                let component = prop.value.to_ascii_uppercase();
                if stack.is_empty() && component == "VEVENT" {
                    raw_events.push(Vec::new());
                }
                stack.push(component);
            }
            "END" => {
                let component = prop.value.to_ascii_uppercase();
                match stack.pop() {
                    Some(open) if open == component => {}
                    Some(open) => {
                        return Err(decode_err(format!(
                            "END:{component} does not close BEGIN:{open}"
                        )))
                    }
                    None if component == "VCALENDAR" => closed = true,
                    None => return Err(decode_err(format!("unexpected END:{component}"))),
                }
            }
            _ => match stack.as_slice() {
                [] => match prop.name.as_str() {
                    "NAME" | "X-WR-CALNAME" => {
                        calendar.name.get_or_insert_with(|| unescape(&prop.value));
                    }
                    "TIMEZONE-ID" | "X-WR-TIMEZONE" => {
                        if calendar.time_zone.is_none() {
                            calendar.time_zone = Some(parse_zone(&prop.value)?);
                        }
                    }
                    _ => {}
                },
                [only] if only == "VEVENT" => {
                    if let Some(props) = raw_events.last_mut() {
                        props.push(prop);
                    }
                }
                // Nested components (alarms, timezone definitions) are not retained
                _ => {}
            },
        }
    }

    if !closed {
        return Err(decode_err("missing END:VCALENDAR"));
    }

    calendar.events = raw_events
        .iter()
        .map(|props| {
            build_event(props, calendar.time_zone).inspect_err(|err| {
                let uid = props
                    .iter()
                    .find(|p| p.name == "UID")
                    .map(|p| unescape(&p.value));
                warn!(uid = uid.as_deref().unwrap_or("<missing>"), error = %err, "Unreadable calendar event");
            })
        })
        .collect::<Result<_>>()?;

    debug!(
        events = calendar.events.len(),
        zone = ?calendar.time_zone.map(|tz| tz.name()),
        "Decoded calendar"
    );
    Ok(calendar)
}

fn build_event(props: &[Property], calendar_zone: Option<Tz>) -> Result<CalendarEvent> {
    let find = |name: &str| props.iter().find(|p| p.name == name);

    let id = find("UID")
        .map(|p| unescape(&p.value))
        .ok_or_else(|| decode_err("event without UID"))?;
    let start_prop =
        find("DTSTART").ok_or_else(|| decode_err(format!("event {id:?}: no DTSTART")))?;

    let (start, start_zone) = parse_time(start_prop, calendar_zone)
        .map_err(|err| decode_err(format!("event {id:?}: DTSTART {err}")))?;
    let end = match find("DTEND") {
        Some(p) => {
            parse_time(p, calendar_zone)
                .map_err(|err| decode_err(format!("event {id:?}: DTEND {err}")))?
                .0
        }
        None => start,
    };

    Ok(CalendarEvent {
        summary: find("SUMMARY").map(|p| unescape(&p.value)).unwrap_or_default(),
        start,
        end: end.max(start),
        description: find("DESCRIPTION").map(|p| unescape(&p.value)),
        location: find("LOCATION").map(|p| unescape(&p.value)),
        time_zone: start_zone.or(calendar_zone),
        id,
    })
}

/// Resolve a DTSTART/DTEND property to a UTC instant and the zone it named.
fn parse_time(
    prop: &Property,
    calendar_zone: Option<Tz>,
) -> std::result::Result<(DateTime<Utc>, Option<Tz>), String> {
    let value = prop.value.trim();

    let naive = if prop.param("VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
        || value.len() == 8
    {
        NaiveDate::parse_from_str(value, DATE)
            .map_err(|_| format!("invalid date {value:?}"))?
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| format!("invalid date {value:?}"))?
    } else if let Some(utc) = value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
        let naive = NaiveDateTime::parse_from_str(utc, DATE_TIME)
            .map_err(|_| format!("invalid UTC time {value:?}"))?;
        return Ok((Utc.from_utc_datetime(&naive), None));
    } else {
        NaiveDateTime::parse_from_str(value, DATE_TIME)
            .map_err(|_| format!("invalid time {value:?}"))?
    };

    let zone = match prop.param("TZID") {
        Some(tzid) => Some(lookup_zone(tzid)?),
        None => calendar_zone,
    };

    match zone {
        Some(tz) => {
            let candidates = tz.from_local_datetime(&naive);
            let later = prop
                .param("X-OCCURRENCE")
                .is_some_and(|v| v.eq_ignore_ascii_case(LATER_OCCURRENCE));
            let local = if later {
                candidates.latest()
            } else {
                candidates.earliest()
            }
            .ok_or_else(|| format!("{value} does not exist in {}", tz.name()))?;
            Ok((local.with_timezone(&Utc), Some(tz)))
        }
        None => Ok((Utc.from_utc_datetime(&naive), None)),
    }
}

fn parse_zone(name: &str) -> Result<Tz> {
    lookup_zone(name).map_err(decode_err)
}

fn lookup_zone(name: &str) -> std::result::Result<Tz, String> {
    let name = name.trim().trim_matches('"');
    name.parse::<Tz>()
        .map_err(|_| format!("unknown time zone {name:?}"))
}

fn decode_err(message: impl Into<String>) -> TideError {
    TideError::Decode(message.into())
}

/// Join folded lines and drop blank ones. Accepts CRLF or bare LF.
fn unfold(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        match raw.strip_prefix([' ', '\t']) {
            Some(rest) if !lines.is_empty() => {
                if let Some(last) = lines.last_mut() {
                    last.push_str(rest);
                }
            }
            _ if raw.trim().is_empty() => {}
            _ => lines.push(raw.to_string()),
        }
    }
    lines
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// One unfolded content line: `NAME;PARAM=VALUE;...:value`.
#[derive(Debug)]
struct Property {
    name: String,
    params: HashMap<String, String>,
    value: String,
}

impl Property {
    fn parse(line: &str) -> Option<Self> {
        let mut in_quotes = false;
        let mut split = None;
        let mut sections = Vec::new();
        let mut section_start = 0;

        for (i, ch) in line.char_indices() {
            match ch {
                '"' => in_quotes = !in_quotes,
                ';' if !in_quotes => {
                    sections.push(&line[section_start..i]);
                    section_start = i + 1;
                }
                ':' if !in_quotes => {
                    sections.push(&line[section_start..i]);
                    split = Some(i);
                    break;
                }
                _ => {}
            }
        }

        let split = split?;
        let (name, params) = sections.split_first()?;
        if name.is_empty() {
            return None;
        }

        let params = params
            .iter()
            .filter_map(|p| {
                let (key, value) = p.split_once('=')?;
                Some((
                    key.trim().to_ascii_uppercase(),
                    value.trim().trim_matches('"').to_string(),
                ))
            })
            .collect();

        Some(Self {
            name: name.trim().to_ascii_uppercase(),
            params,
            value: line[split + 1..].to_string(),
        })
    }

    fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

// -- Files --

/// Load events from a calendar file.
///
/// A missing file is a first run and yields no events; unreadable or malformed
/// files are logged and also yield no events.
pub fn load_calendar<P: AsRef<Path>>(path: P) -> Vec<CalendarEvent> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(text) => {
            let events = decode(&text);
            debug!(path = %path.display(), events = events.len(), "Loaded calendar");
            events
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No existing calendar");
            Vec::new()
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Could not read calendar; starting from no events");
            Vec::new()
        }
    }
}

/// Replace the calendar file at `path` with `events`.
pub fn save_calendar<P: AsRef<Path>>(
    path: P,
    events: &[CalendarEvent],
    time_zone: Option<Tz>,
    name: Option<&str>,
) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, encode(events, time_zone, name))?;
    debug!(path = %path.display(), events = events.len(), "Saved calendar");
    Ok(())
}
