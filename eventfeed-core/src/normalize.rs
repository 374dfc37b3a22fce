//! Raw records to canonical events.
//!
//! A record that fails validation is skipped and reported; it never aborts the
//! batch. The returned events are sorted by start instant, ties broken by
//! identity, so the output order does not depend on scrape order.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{LocalResult, NaiveDate, NaiveDateTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;

use crate::datetime::{ParsedWhen, parse_when};
use crate::event::{Event, EventTime};
use crate::raw::{RawField, RawRecord};
use crate::recurrence::{Recurrence, RecurrenceError};
use crate::text;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    Missing(RawField),

    #[error("cannot parse {field} '{value}'")]
    Unparseable { field: RawField, value: String },

    #[error("{field} {datetime} does not exist in {tzid}")]
    NonexistentTime {
        field: RawField,
        datetime: NaiveDateTime,
        tzid: String,
    },

    #[error("end {end} is before start {start}")]
    EndBeforeStart { start: String, end: String },

    #[error("end '{end}' does not match the precision of start '{start}'")]
    MixedPrecision { start: String, end: String },

    #[error(transparent)]
    Recurrence(#[from] RecurrenceError),

    #[error("duplicate of record {first_index} ({identity})")]
    Duplicate { identity: String, first_index: usize },
}

impl ValidationError {
    /// The raw field the problem was found in.
    pub fn field(&self) -> RawField {
        match self {
            ValidationError::Missing(field) => *field,
            ValidationError::Unparseable { field, .. } => *field,
            ValidationError::NonexistentTime { field, .. } => *field,
            ValidationError::EndBeforeStart { .. } | ValidationError::MixedPrecision { .. } => {
                RawField::End
            }
            ValidationError::Recurrence(_) => RawField::Recurrence,
            ValidationError::Duplicate { .. } => RawField::Title,
        }
    }
}

/// A raw record that did not make it into the output.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    /// Position of the record in the input batch.
    pub index: usize,
    pub error: ValidationError,
}

/// Result of normalizing one batch.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub events: Vec<Event>,
    pub rejected: Vec<Rejected>,
}

/// Maps raw records into [`Event`]s in a fixed timezone.
#[derive(Debug, Clone)]
pub struct Normalizer {
    tz: Tz,
    default_duration: TimeDelta,
}

impl Normalizer {
    pub fn new(tz: Tz, default_duration: Duration) -> Self {
        Normalizer {
            tz,
            default_duration: TimeDelta::from_std(default_duration)
                .unwrap_or_else(|_| TimeDelta::hours(2)),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Normalize a whole batch, logging one warning per rejected record.
    pub fn normalize(&self, records: &[RawRecord]) -> Normalized {
        let mut out = Normalized::default();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (index, record) in records.iter().enumerate() {
            let result = self.normalize_record(record).and_then(|event| {
                match seen.get(&event.identity) {
                    Some(&first_index) => Err(ValidationError::Duplicate {
                        identity: event.identity,
                        first_index,
                    }),
                    None => {
                        seen.insert(event.identity.clone(), index);
                        Ok(event)
                    }
                }
            });

            match result {
                Ok(event) => out.events.push(event),
                Err(error) => {
                    tracing::warn!(
                        index,
                        field = %error.field(),
                        reason = %error,
                        "Skipping raw record"
                    );
                    out.rejected.push(Rejected { index, error });
                }
            }
        }

        let tz = self.tz;
        out.events.sort_by(|a, b| {
            a.start
                .instant(tz)
                .cmp(&b.start.instant(tz))
                .then_with(|| a.identity.cmp(&b.identity))
        });

        tracing::debug!(
            accepted = out.events.len(),
            rejected = out.rejected.len(),
            "Normalized raw records"
        );
        out
    }

    /// Validate and convert a single record.
    pub fn normalize_record(&self, record: &RawRecord) -> Result<Event, ValidationError> {
        let title = record
            .get(RawField::Title)
            .map(text::normalize_line)
            .filter(|t| !t.is_empty())
            .ok_or(ValidationError::Missing(RawField::Title))?;

        let start_raw = record
            .get(RawField::Start)
            .ok_or(ValidationError::Missing(RawField::Start))?;
        let start = self.resolve_start(start_raw)?;
        let end = self.resolve_end(&start, start_raw, record.get(RawField::End))?;

        let recurrence = match record.get(RawField::Recurrence) {
            Some(hint) => {
                let rule = Recurrence::parse_hint(hint)?;
                rule.validate(&start)?;
                Some(rule)
            }
            None => None,
        };

        let location = record
            .get(RawField::Location)
            .map(text::normalize_line)
            .unwrap_or_default();
        let description = record
            .get(RawField::Description)
            .map(text::normalize_description)
            .unwrap_or_default();

        Ok(Event::new(&title, start, end)
            .with_location(&location)
            .with_description(&description)
            .with_recurrence(recurrence)
            .with_source_url(record.get(RawField::Url).map(str::trim)))
    }

    fn resolve_start(&self, raw: &str) -> Result<EventTime, ValidationError> {
        let unparseable = || ValidationError::Unparseable {
            field: RawField::Start,
            value: raw.to_string(),
        };

        match parse_when(raw).ok_or_else(unparseable)? {
            ParsedWhen::Date(d) => Ok(EventTime::Date(d)),
            ParsedWhen::DateTime(ndt) => self.zoned(RawField::Start, ndt),
            ParsedWhen::Instant(dt) => {
                Ok(EventTime::zoned(dt.with_timezone(&self.tz).naive_local(), self.tz))
            }
            // A start needs a date
            ParsedWhen::Time(_) => Err(unparseable()),
        }
    }

    fn resolve_end(
        &self,
        start: &EventTime,
        start_raw: &str,
        end_raw: Option<&str>,
    ) -> Result<EventTime, ValidationError> {
        let Some(raw) = end_raw else {
            return Ok(self.default_end(start));
        };

        let parsed = parse_when(raw).ok_or_else(|| ValidationError::Unparseable {
            field: RawField::End,
            value: raw.to_string(),
        })?;
        let mixed = || ValidationError::MixedPrecision {
            start: start_raw.to_string(),
            end: raw.to_string(),
        };

        let end = match (start, parsed) {
            // Source end dates are the last day of the event; stored ends are exclusive
            (EventTime::Date(_), ParsedWhen::Date(d)) => EventTime::Date(next_day(d)),
            (EventTime::Date(_), _) => return Err(mixed()),
            (EventTime::Zoned { .. }, ParsedWhen::Date(_)) => return Err(mixed()),
            (EventTime::Zoned { .. }, ParsedWhen::DateTime(ndt)) => {
                self.zoned(RawField::End, ndt)?
            }
            (EventTime::Zoned { .. }, ParsedWhen::Instant(dt)) => {
                EventTime::zoned(dt.with_timezone(&self.tz).naive_local(), self.tz)
            }
            (EventTime::Zoned { datetime, .. }, ParsedWhen::Time(t)) => {
                let mut ndt = datetime.date().and_time(t);
                if ndt < *datetime {
                    ndt += TimeDelta::days(1);
                }
                self.zoned(RawField::End, ndt)?
            }
        };

        let before = match (start, &end) {
            (EventTime::Date(s), EventTime::Date(e)) => e <= s,
            _ => end.instant(self.tz) < start.instant(self.tz),
        };
        if before {
            return Err(ValidationError::EndBeforeStart {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        Ok(end)
    }

    fn default_end(&self, start: &EventTime) -> EventTime {
        match start {
            EventTime::Date(d) => EventTime::Date(next_day(*d)),
            EventTime::Zoned { .. } => {
                let end = start.instant(self.tz) + self.default_duration;
                EventTime::zoned(end.with_timezone(&self.tz).naive_local(), self.tz)
            }
        }
    }

    fn zoned(&self, field: RawField, ndt: NaiveDateTime) -> Result<EventTime, ValidationError> {
        match self.tz.from_local_datetime(&ndt) {
            LocalResult::None => Err(ValidationError::NonexistentTime {
                field,
                datetime: ndt,
                tzid: self.tz.name().to_string(),
            }),
            // Ambiguous values keep their wall clock time; instant() picks the earlier one
            _ => Ok(EventTime::zoned(ndt, self.tz)),
        }
    }
}

/// Normalize `records` with the given zone and default duration.
pub fn normalize(records: &[RawRecord], tz: Tz, default_duration: Duration) -> Normalized {
    Normalizer::new(tz, default_duration).normalize(records)
}

fn next_day(d: NaiveDate) -> NaiveDate {
    d.succ_opt().unwrap_or(d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::{Frequency, RecurrenceLimit};
    use chrono_tz::Europe::Berlin;

    fn normalizer() -> Normalizer {
        Normalizer::new(Berlin, Duration::from_secs(2 * 3600))
    }

    fn record(title: &str, start: &str) -> RawRecord {
        RawRecord {
            title: Some(title.to_string()),
            start: Some(start.to_string()),
            ..Default::default()
        }
    }

    fn ndt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_timed_event_gets_default_duration() {
        let event = normalizer()
            .normalize_record(&record("Sommerfest", "2025-07-01 18:00"))
            .unwrap();
        assert_eq!(event.start, EventTime::zoned(ndt(2025, 7, 1, 18, 0), Berlin));
        assert_eq!(event.end, EventTime::zoned(ndt(2025, 7, 1, 20, 0), Berlin));
    }

    #[test]
    fn test_default_duration_counts_elapsed_time_across_dst() {
        // 2025-03-30 02:00 CET jumps to 03:00 CEST
        let event = normalizer()
            .normalize_record(&record("Nachtwanderung", "2025-03-30 01:00"))
            .unwrap();
        assert_eq!(event.end, EventTime::zoned(ndt(2025, 3, 30, 4, 0), Berlin));
    }

    #[test]
    fn test_all_day_event_has_exclusive_end() {
        let event = normalizer()
            .normalize_record(&record("Flohmarkt", "14.09.2025"))
            .unwrap();
        assert_eq!(event.start, EventTime::Date(date(2025, 9, 14)));
        assert_eq!(event.end, EventTime::Date(date(2025, 9, 15)));
    }

    #[test]
    fn test_multi_day_end_date_is_inclusive_in_source() {
        let mut raw = record("Ausstellung", "10.09.2025");
        raw.end = Some("14.09.2025".into());
        let event = normalizer().normalize_record(&raw).unwrap();
        assert_eq!(event.end, EventTime::Date(date(2025, 9, 15)));
    }

    #[test]
    fn test_bare_end_time_uses_start_date_and_rolls_over() {
        let mut raw = record("Konzert", "14.09.2025 19:00 Uhr");
        raw.end = Some("22:00".into());
        let event = normalizer().normalize_record(&raw).unwrap();
        assert_eq!(event.end, EventTime::zoned(ndt(2025, 9, 14, 22, 0), Berlin));

        raw.end = Some("01:00 Uhr".into());
        let event = normalizer().normalize_record(&raw).unwrap();
        assert_eq!(event.end, EventTime::zoned(ndt(2025, 9, 15, 1, 0), Berlin));
    }

    #[test]
    fn test_rfc3339_start_is_converted_to_zone() {
        let event = normalizer()
            .normalize_record(&record("Lauf", "2025-07-01T16:00:00Z"))
            .unwrap();
        assert_eq!(event.start, EventTime::zoned(ndt(2025, 7, 1, 18, 0), Berlin));
    }

    #[test]
    fn test_text_fields_are_cleaned() {
        let mut raw = record("  Kinder &amp;  Jugend ", "2025-07-01");
        raw.location = Some(" Stadtpark\n Buchloe ".into());
        raw.description = Some("Erster  Absatz .\n\n\nZweiter Absatz".into());
        raw.url = Some(" https://www.buchloe.de/x/ ".into());

        let event = normalizer().normalize_record(&raw).unwrap();
        assert_eq!(event.title, "Kinder & Jugend");
        assert_eq!(event.location, "Stadtpark Buchloe");
        assert_eq!(event.description, "Erster Absatz.\n\nZweiter Absatz");
        assert_eq!(event.source_url.as_deref(), Some("https://www.buchloe.de/x/"));
    }

    #[test]
    fn test_recurrence_hint_is_parsed() {
        let mut raw = record("Wochenmarkt", "2025-07-02 08:00");
        raw.recurrence = Some("FREQ=WEEKLY;COUNT=10".into());
        let event = normalizer().normalize_record(&raw).unwrap();
        assert_eq!(
            event.recurrence,
            Some(Recurrence::new(Frequency::Weekly).with_limit(RecurrenceLimit::Count(10)))
        );
    }

    #[test]
    fn test_validation_errors() {
        let n = normalizer();

        let missing_title = RawRecord {
            start: Some("2025-07-01".into()),
            ..Default::default()
        };
        assert_eq!(
            n.normalize_record(&missing_title),
            Err(ValidationError::Missing(RawField::Title))
        );

        assert!(matches!(
            n.normalize_record(&record("X", "irgendwann")),
            Err(ValidationError::Unparseable { field: RawField::Start, .. })
        ));

        assert!(matches!(
            n.normalize_record(&record("X", "19:00")),
            Err(ValidationError::Unparseable { field: RawField::Start, .. })
        ));

        let mut end_before = record("X", "2025-07-01 18:00");
        end_before.end = Some("2025-07-01 17:00".into());
        assert!(matches!(
            n.normalize_record(&end_before),
            Err(ValidationError::EndBeforeStart { .. })
        ));

        let mut mixed = record("X", "2025-07-01");
        mixed.end = Some("2025-07-01 20:00".into());
        assert!(matches!(
            n.normalize_record(&mixed),
            Err(ValidationError::MixedPrecision { .. })
        ));

        let mut bad_rule = record("X", "2025-07-01");
        bad_rule.recurrence = Some("manchmal".into());
        let err = n.normalize_record(&bad_rule).unwrap_err();
        assert_eq!(err.field(), RawField::Recurrence);
    }

    #[test]
    fn test_dst_gap_is_rejected() {
        let err = normalizer()
            .normalize_record(&record("X", "2025-03-30 02:30"))
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::NonexistentTime { field: RawField::Start, .. }
        ));
    }

    #[test]
    fn test_ambiguous_time_is_accepted() {
        // 2025-10-26 02:30 occurs twice in Berlin
        let event = normalizer()
            .normalize_record(&record("X", "2025-10-26 02:30"))
            .unwrap();
        assert_eq!(
            event.start.instant(Berlin).to_rfc3339(),
            "2025-10-26T00:30:00+00:00"
        );
    }

    #[test]
    fn test_batch_skips_bad_records_and_sorts() {
        let records = vec![
            record("Spät", "2025-07-01 20:00"),
            RawRecord::default(),
            record("Früh", "2025-07-01 08:00"),
            record("Ganztags", "2025-07-01"),
        ];
        let result = normalizer().normalize(&records);

        let titles: Vec<&str> = result.events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Ganztags", "Früh", "Spät"]);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].index, 1);
    }

    #[test]
    fn test_duplicates_keep_first_record() {
        let mut first = record("Sommerfest", "2025-07-01 18:00");
        first.description = Some("erste".into());
        let mut second = record("sommerfest", "2025-07-01 19:00");
        second.description = Some("zweite".into());

        let result = normalizer().normalize(&[first, second]);
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].description, "erste");
        assert!(matches!(
            result.rejected[0].error,
            ValidationError::Duplicate { first_index: 0, .. }
        ));
    }

    #[test]
    fn test_output_order_is_independent_of_input_order() {
        let records = vec![
            record("B", "2025-07-01 18:00"),
            record("A", "2025-07-01 18:00"),
            record("C", "2025-06-01"),
        ];
        let mut reversed = records.clone();
        reversed.reverse();

        let a = normalizer().normalize(&records);
        let b = normalizer().normalize(&reversed);
        let ids = |n: &Normalized| n.events.iter().map(|e| e.identity.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
    }
}
