//! Canonical event entity.
//!
//! An [`Event`] carries two derived keys:
//! - `identity` answers "is this the same logical event as last run?" and only
//!   depends on the title, the local start date and the location.
//! - `content_hash` answers "did anything about it change?" and covers every
//!   mutable field except `source_url`.
//!
//! Both are recomputed whenever an event is built through the `with_*` methods,
//! so a constructed event is always self-consistent.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::recurrence::Recurrence;

/// Longest title slug kept in an identity before the date suffix.
const MAX_IDENTITY_SLUG_LEN: usize = 48;

/// A normalized event occurrence (or the master of a recurring series).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub identity: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub start: EventTime,
    pub end: EventTime,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    pub content_hash: String,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// Start or end of an event.
///
/// All-day events use `Date`; for an end value the date is exclusive, matching
/// how `DTEND;VALUE=DATE` works in ICS.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTime {
    Date(NaiveDate),
    Zoned {
        datetime: NaiveDateTime,
        tzid: String,
    },
}

impl Event {
    pub fn new(title: &str, start: EventTime, end: EventTime) -> Self {
        Event {
            identity: String::new(),
            title: title.to_string(),
            description: String::new(),
            location: String::new(),
            start,
            end,
            recurrence: None,
            content_hash: String::new(),
            source_url: None,
        }
        .refresh()
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self.refresh()
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self.refresh()
    }

    pub fn with_recurrence(mut self, recurrence: Option<Recurrence>) -> Self {
        self.recurrence = recurrence;
        self.refresh()
    }

    pub fn with_start(mut self, start: EventTime, end: EventTime) -> Self {
        self.start = start;
        self.end = end;
        self.refresh()
    }

    /// Provenance link. Does not take part in identity or content hash.
    pub fn with_source_url(mut self, url: Option<&str>) -> Self {
        self.source_url = url.map(String::from);
        self
    }

    fn refresh(mut self) -> Self {
        self.identity = derive_identity(&self.title, &self.start, &self.location);
        self.content_hash = self.compute_content_hash();
        self
    }

    /// SHA-256 over the canonical encoding of title, description, location,
    /// start, end and recurrence, in that order.
    ///
    /// Each field is written as `<byte length>:<value>` so no two different
    /// field tuples can produce the same byte stream.
    pub fn compute_content_hash(&self) -> String {
        let recurrence = self
            .recurrence
            .as_ref()
            .map(Recurrence::canonical)
            .unwrap_or_default();

        let start = self.start.canonical();
        let end = self.end.canonical();

        let mut hasher = Sha256::new();
        for field in [
            self.title.as_str(),
            self.description.as_str(),
            self.location.as_str(),
            start.as_str(),
            end.as_str(),
            recurrence.as_str(),
        ] {
            update_field(&mut hasher, field);
        }
        to_hex(&hasher.finalize())
    }

    /// Whether the stored content hash matches the event's fields.
    ///
    /// The identity is not re-derived: once assigned it is an opaque key and
    /// stays with the event when its start date moves.
    pub fn is_consistent(&self) -> bool {
        self.content_hash == self.compute_content_hash()
    }

    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// Time range for display (e.g. "2025-07-01 18:00 → 20:00").
    pub fn render_event_time(&self) -> String {
        match (&self.start, &self.end) {
            (EventTime::Date(start), EventTime::Date(end)) => {
                let last_day = end.pred_opt().unwrap_or(*end);
                if last_day <= *start {
                    format!("{} (all day)", start)
                } else {
                    format!("{} → {} (all day)", start, last_day)
                }
            }
            (
                EventTime::Zoned { datetime: s, .. },
                EventTime::Zoned { datetime: e, .. },
            ) if s.date() == e.date() => {
                format!("{} → {}", s.format("%Y-%m-%d %H:%M"), e.format("%H:%M"))
            }
            (start, end) => format!("{} → {}", start, end),
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity && self.content_hash == other.content_hash
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
        self.content_hash.hash(state);
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_empty() {
            write!(f, "{}", self.title)
        } else {
            write!(f, "{} @ {}", self.title, self.location)
        }
    }
}

impl EventTime {
    pub fn zoned(datetime: NaiveDateTime, tz: Tz) -> Self {
        EventTime::Zoned {
            datetime,
            tzid: tz.name().to_string(),
        }
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }

    /// Local calendar date of this value.
    pub fn date(&self) -> NaiveDate {
        match self {
            EventTime::Date(d) => *d,
            EventTime::Zoned { datetime, .. } => datetime.date(),
        }
    }

    /// The IANA zone of a zoned value, if it names a known zone.
    pub fn tz(&self) -> Option<Tz> {
        match self {
            EventTime::Date(_) => None,
            EventTime::Zoned { tzid, .. } => tzid.parse().ok(),
        }
    }

    /// Absolute instant of this value.
    ///
    /// Dates anchor at local midnight in `fallback`; zoned values use their own
    /// zone unless it is unknown.
    pub fn instant(&self, fallback: Tz) -> DateTime<Utc> {
        let (naive, tz) = match self {
            EventTime::Date(d) => (d.and_time(chrono::NaiveTime::MIN), fallback),
            EventTime::Zoned { datetime, .. } => (*datetime, self.tz().unwrap_or(fallback)),
        };

        tz.from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| naive.and_utc())
    }

    /// Stable textual form used for hashing.
    pub fn canonical(&self) -> String {
        match self {
            EventTime::Date(d) => d.format("%Y-%m-%d").to_string(),
            EventTime::Zoned { datetime, tzid } => {
                format!("{}[{}]", datetime.format("%Y-%m-%dT%H:%M:%S"), tzid)
            }
        }
    }

    /// ICS value without parameters (`20250701` or `20250701T180000`).
    pub fn to_ics_value(&self) -> String {
        match self {
            EventTime::Date(d) => d.format("%Y%m%d").to_string(),
            EventTime::Zoned { datetime, .. } => datetime.format("%Y%m%dT%H%M%S").to_string(),
        }
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            EventTime::Zoned { datetime, tzid } => {
                write!(f, "{} ({})", datetime.format("%Y-%m-%d %H:%M"), tzid)
            }
        }
    }
}

/// Derive the stable identity of an event: `<title-slug>-<date>-<8 hex>`.
///
/// Title and location are compared case-insensitively. Description, times of
/// day and the source URL are deliberately left out.
pub fn derive_identity(title: &str, start: &EventTime, location: &str) -> String {
    let date = start.date().format("%Y-%m-%d").to_string();

    let mut hasher = Sha256::new();
    update_field(&mut hasher, &title.to_lowercase());
    update_field(&mut hasher, &date);
    update_field(&mut hasher, &location.to_lowercase());
    let digest = hasher.finalize();

    let mut title_slug = slug::slugify(title);
    if title_slug.len() > MAX_IDENTITY_SLUG_LEN {
        title_slug.truncate(MAX_IDENTITY_SLUG_LEN);
        title_slug = title_slug.trim_end_matches('-').to_string();
    }
    if title_slug.is_empty() {
        title_slug = "event".to_string();
    }

    format!("{}-{}-{}", title_slug, date, to_hex(&digest[..4]))
}

fn update_field(hasher: &mut Sha256, value: &str) {
    hasher.update(value.len().to_string().as_bytes());
    hasher.update(b":");
    hasher.update(value.as_bytes());
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::{Frequency, Recurrence};
    use chrono_tz::Europe::Berlin;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> EventTime {
        let dt = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap();
        EventTime::zoned(dt, Berlin)
    }

    fn sommerfest() -> Event {
        Event::new("Sommerfest", at(2025, 7, 1, 18, 0), at(2025, 7, 1, 22, 0))
            .with_location("Stadtpark")
            .with_description("Musik und Essen")
    }

    #[test]
    fn test_identity_shape() {
        let event = sommerfest();
        assert!(
            event.identity.starts_with("sommerfest-2025-07-01-"),
            "unexpected identity {}",
            event.identity
        );
        assert_eq!(event.identity.len(), "sommerfest-2025-07-01-".len() + 8);
    }

    #[test]
    fn test_identity_ignores_description_and_time_of_day() {
        let a = sommerfest();
        let b = sommerfest()
            .with_description("Musik, Essen und Getränke")
            .with_start(at(2025, 7, 1, 19, 30), at(2025, 7, 1, 23, 0));
        assert_eq!(a.identity, b.identity);
        assert_ne!(a.content_hash, b.content_hash);
    }

    #[test]
    fn test_identity_depends_on_title_date_and_location() {
        let base = sommerfest();
        assert_ne!(base.identity, sommerfest().with_location("Rathaus").identity);
        assert_ne!(
            base.identity,
            Event::new("Herbstfest", at(2025, 7, 1, 18, 0), at(2025, 7, 1, 22, 0))
                .with_location("Stadtpark")
                .identity
        );
        assert_ne!(
            base.identity,
            sommerfest()
                .with_start(at(2025, 7, 2, 18, 0), at(2025, 7, 2, 22, 0))
                .identity
        );
    }

    #[test]
    fn test_identity_is_case_insensitive() {
        let a = Event::new("Sommerfest", at(2025, 7, 1, 18, 0), at(2025, 7, 1, 22, 0))
            .with_location("Stadtpark");
        let b = Event::new("SOMMERFEST", at(2025, 7, 1, 18, 0), at(2025, 7, 1, 22, 0))
            .with_location("stadtpark");
        assert_eq!(a.identity, b.identity);
    }

    #[test]
    fn test_identity_for_symbol_only_title() {
        let event = Event::new("???", at(2025, 7, 1, 18, 0), at(2025, 7, 1, 22, 0));
        assert!(event.identity.starts_with("event-2025-07-01-"));
    }

    #[test]
    fn test_content_hash_changes_with_every_mutable_field() {
        let base = sommerfest();
        let variants = [
            Event::new("Sommerfest 2025", at(2025, 7, 1, 18, 0), at(2025, 7, 1, 22, 0))
                .with_location("Stadtpark")
                .with_description("Musik und Essen"),
            sommerfest().with_description("Nur Musik"),
            sommerfest().with_location("Rathausplatz"),
            sommerfest().with_start(at(2025, 7, 1, 17, 0), at(2025, 7, 1, 22, 0)),
            sommerfest().with_start(at(2025, 7, 1, 18, 0), at(2025, 7, 1, 23, 0)),
            sommerfest().with_recurrence(Some(Recurrence::new(Frequency::Yearly))),
        ];

        for variant in variants {
            assert_ne!(base.content_hash, variant.content_hash, "{:?}", variant);
        }
    }

    #[test]
    fn test_source_url_does_not_affect_keys() {
        let a = sommerfest();
        let b = sommerfest().with_source_url(Some("https://www.buchloe.de/sommerfest/"));
        assert_eq!(a.identity, b.identity);
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_uses_identity_and_hash() {
        let a = sommerfest();
        let mut b = sommerfest();
        b.source_url = Some("x".into());
        assert_eq!(a, b);

        let c = sommerfest().with_description("anders");
        assert_ne!(a, c);
    }

    #[test]
    fn test_is_consistent_detects_tampering() {
        let mut event = sommerfest();
        assert!(event.is_consistent());
        event.title = "Winterfest".into();
        assert!(!event.is_consistent());
    }

    #[test]
    fn test_instant_of_all_day_anchors_at_local_midnight() {
        let date = EventTime::Date(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        let instant = date.instant(Berlin);
        assert_eq!(instant.to_rfc3339(), "2025-06-30T22:00:00+00:00");
    }

    #[test]
    fn test_render_event_time() {
        assert_eq!(sommerfest().render_event_time(), "2025-07-01 18:00 → 22:00");

        let d = |day| EventTime::Date(NaiveDate::from_ymd_opt(2025, 9, day).unwrap());
        let single = Event::new("Markt", d(14), d(15));
        assert_eq!(single.render_event_time(), "2025-09-14 (all day)");
        let multi = Event::new("Ausstellung", d(10), d(15));
        assert_eq!(multi.render_event_time(), "2025-09-10 → 2025-09-14 (all day)");
    }
}
