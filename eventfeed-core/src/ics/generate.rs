//! ICS feed generation.

use std::collections::{BTreeMap, HashSet};

use chrono::Datelike;
use chrono_tz::Tz;
use icalendar::{Calendar, Component, EventLike, Property, ValueType};

use crate::event::{Event, EventTime};
use crate::ics::content_line::{escape_text, fold_line, unfold};
use crate::ics::timezone::vtimezone_lines;
use crate::ics::{FeedError, FeedMetadata};

/// Render `events` as a calendar feed.
///
/// Events are written in the given order. Any event that is not internally
/// consistent fails the whole generation; a partial feed is never returned.
pub fn generate_feed(events: &[Event], meta: &FeedMetadata) -> Result<String, FeedError> {
    let default_tz: Tz = meta.timezone.parse().map_err(|_| FeedError::InvalidEvent {
        identity: String::new(),
        reason: format!("unknown feed timezone '{}'", meta.timezone),
    })?;

    let mut seen = HashSet::new();
    for event in events {
        validate_event(event)?;
        if !seen.insert(event.identity.as_str()) {
            return Err(invalid(event, "duplicate identity"));
        }
    }

    let mut cal = Calendar::new();
    for event in events {
        cal.push(build_vevent(event, meta, default_tz));
    }
    let cal = cal.done();

    Ok(assemble_feed(&cal.to_string(), &zone_years(events), meta))
}

fn build_vevent(event: &Event, meta: &FeedMetadata, default_tz: Tz) -> icalendar::Event {
    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&format!("{}@{}", event.identity, meta.uid_domain));

    // DTSTAMP - required by RFC 5545; derived from the start so regenerating
    // the same events yields the same bytes
    let dtstamp = event
        .start
        .instant(default_tz)
        .format("%Y%m%dT%H%M%SZ")
        .to_string();
    ics_event.add_property("DTSTAMP", &dtstamp);

    // Text values go in raw; the icalendar serializer escapes them
    ics_event.summary(&event.title);

    add_datetime_property(&mut ics_event, "DTSTART", &event.start);
    add_datetime_property(&mut ics_event, "DTEND", &event.end);

    if !event.description.is_empty() {
        ics_event.description(&event.description);
    }

    if !event.location.is_empty() {
        ics_event.location(&event.location);
    }

    if let Some(ref recurrence) = event.recurrence {
        ics_event.add_property("RRULE", &recurrence.to_rrule(&event.start));
    }

    if let Some(ref url) = event.source_url {
        ics_event.add_property("URL", url);
    }

    ics_event.add_property("CLASS", "PUBLIC");
    ics_event.add_property("STATUS", "CONFIRMED");

    ics_event.done()
}

/// Add a datetime property with proper formatting based on EventTime variant
fn add_datetime_property(ics_event: &mut icalendar::Event, name: &str, time: &EventTime) {
    match time {
        EventTime::Date(_) => {
            let mut prop = Property::new(name, time.to_ics_value());
            prop.append_parameter(ValueType::Date);
            ics_event.append_property(prop);
        }
        EventTime::Zoned { tzid, .. } => {
            let mut prop = Property::new(name, time.to_ics_value());
            prop.add_parameter("TZID", tzid);
            ics_event.append_property(prop);
        }
    }
}

fn validate_event(event: &Event) -> Result<(), FeedError> {
    if event.identity.is_empty() {
        return Err(invalid(event, "empty identity"));
    }
    if event.title.trim().is_empty() {
        return Err(invalid(event, "empty title"));
    }
    if !event.is_consistent() {
        return Err(invalid(event, "content hash does not match the event fields"));
    }

    match (&event.start, &event.end) {
        (EventTime::Date(start), EventTime::Date(end)) => {
            if end <= start {
                return Err(invalid(event, "all-day end is not after start"));
            }
        }
        (EventTime::Zoned { .. }, EventTime::Zoned { .. }) => {
            let (Some(start_tz), Some(_)) = (event.start.tz(), event.end.tz()) else {
                return Err(invalid(event, "unknown timezone"));
            };
            if event.end.instant(start_tz) < event.start.instant(start_tz) {
                return Err(invalid(event, "end is before start"));
            }
        }
        _ => return Err(invalid(event, "mixed all-day and timed bounds")),
    }

    Ok(())
}

fn invalid(event: &Event, reason: &str) -> FeedError {
    FeedError::InvalidEvent {
        identity: event.identity.clone(),
        reason: reason.to_string(),
    }
}

/// Years of timezone data emitted for a recurrence without a limit.
const OPEN_ENDED_YEARS: i32 = 10;

/// Year range each referenced zone has to cover, up to the end of the last
/// occurrence of a recurring event.
fn zone_years(events: &[Event]) -> BTreeMap<String, (Tz, i32, i32)> {
    let mut zones: BTreeMap<String, (Tz, i32, i32)> = BTreeMap::new();

    for event in events {
        let start_year = event.start.date().year();
        let end_year = event.end.date().year();
        let mut years = vec![start_year, end_year];
        if let Some(recurrence) = &event.recurrence {
            let last_start = recurrence
                .last_year(&event.start)
                .unwrap_or(start_year + OPEN_ENDED_YEARS);
            years.push(last_start + (end_year - start_year));
        }

        for time in [&event.start, &event.end] {
            let (EventTime::Zoned { tzid, .. }, Some(tz)) = (time, time.tz()) else {
                continue;
            };
            for year in &years {
                zones
                    .entry(tzid.clone())
                    .and_modify(|(_, first, last)| {
                        *first = (*first).min(*year);
                        *last = (*last).max(*year);
                    })
                    .or_insert((tz, *year, *year));
            }
        }
    }
    zones
}

/// Build the final document around the VEVENT blocks rendered by the
/// icalendar crate.
/// - Writes our own calendar header instead of the crate's defaults
/// - Inserts one VTIMEZONE per referenced zone
/// - Fixes the property order inside each VEVENT
/// - Refolds every line to 75 octets with CRLF endings
fn assemble_feed(
    rendered: &str,
    zones: &BTreeMap<String, (Tz, i32, i32)>,
    meta: &FeedMetadata,
) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{}", meta.prodid),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
        format!("X-WR-CALNAME:{}", escape_text(&meta.name)),
        format!("X-WR-CALDESC:{}", escape_text(&meta.description)),
        format!("X-WR-TIMEZONE:{}", meta.timezone),
    ];

    for (tz, first, last) in zones.values() {
        lines.extend(vtimezone_lines(*tz, *first, *last));
    }

    let mut body: Option<Vec<String>> = None;
    for line in unfold(rendered) {
        if line == "BEGIN:VEVENT" {
            body = Some(Vec::new());
        } else if line == "END:VEVENT" {
            if let Some(mut props) = body.take() {
                props.sort();
                lines.push("BEGIN:VEVENT".to_string());
                lines.extend(props);
                lines.push("END:VEVENT".to_string());
            }
        } else if let Some(props) = body.as_mut() {
            props.push(line);
        }
    }

    lines.push("END:VCALENDAR".to_string());

    let mut output = String::new();
    for line in &lines {
        output.push_str(&fold_line(line));
        output.push_str("\r\n");
    }
    output
}
