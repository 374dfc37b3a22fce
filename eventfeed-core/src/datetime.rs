//! Parsing of the date and time strings found on the source site.
//!
//! The listing mixes ISO dates, German numeric dates (`14.09.2025`) and German
//! textual dates (`Sonntag, 14. Sept. 2025`), optionally followed by a time of
//! day (`19:00 Uhr`). Parsing here is purely syntactic; attaching a timezone
//! happens in the normalizer.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

static NUMERIC_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})(?:[,\s]+(?:um\s+)?(\d{1,2})(?:[:.](\d{2}))?)?$")
        .expect("valid numeric date regex")
});

static TEXTUAL_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[a-zäöü]+\.?,?\s+)?(\d{1,2})\.?\s+([a-zäöü]+)\.?\s+(\d{4})(?:[,\s]+(?:um\s+)?(\d{1,2})(?:[:.](\d{2}))?)?$",
    )
    .expect("valid textual date regex")
});

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?:[:.](\d{2}))?$").expect("valid time regex")
});

const LABELS: [&str; 4] = ["uhrzeit:", "datum:", "beginn:", "ende:"];

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Result of parsing a source date/time string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedWhen {
    /// Date without time of day: an all-day value.
    Date(NaiveDate),
    /// Local civil date-time without zone information.
    DateTime(NaiveDateTime),
    /// Date-time carrying an explicit UTC offset.
    Instant(DateTime<FixedOffset>),
    /// Bare time of day, only meaningful relative to a start date.
    Time(NaiveTime),
}

/// Parse a source date/time string. Returns `None` for anything unrecognized.
pub fn parse_when(input: &str) -> Option<ParsedWhen> {
    let cleaned = clean(input);
    if cleaned.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&cleaned) {
        return Some(ParsedWhen::Instant(dt));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, format) {
            return Some(ParsedWhen::DateTime(dt));
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(&cleaned, "%Y-%m-%d") {
        return Some(ParsedWhen::Date(d));
    }

    let lower = cleaned.to_lowercase();

    if let Some(caps) = NUMERIC_DATE_RE.captures(&lower) {
        let date = NaiveDate::from_ymd_opt(
            caps[3].parse().ok()?,
            caps[2].parse().ok()?,
            caps[1].parse().ok()?,
        )?;
        return with_optional_time(date, caps.get(4), caps.get(5));
    }

    if let Some(caps) = TEXTUAL_DATE_RE.captures(&lower) {
        let month = german_month(&caps[2])?;
        let date = NaiveDate::from_ymd_opt(caps[3].parse().ok()?, month, caps[1].parse().ok()?)?;
        return with_optional_time(date, caps.get(4), caps.get(5));
    }

    let caps = TIME_RE.captures(&lower)?;
    let time = build_time(caps.get(1), caps.get(2))?;
    Some(ParsedWhen::Time(time))
}

/// Parse a bare time of day such as `19:00`, `19.30` or `19 Uhr`.
pub fn parse_time(input: &str) -> Option<NaiveTime> {
    match parse_when(input)? {
        ParsedWhen::Time(t) => Some(t),
        _ => None,
    }
}

/// Month number for German (and a few English) month names and abbreviations.
pub fn german_month(name: &str) -> Option<u32> {
    let month = match name.trim_end_matches('.') {
        "jan" | "januar" | "jänner" | "january" => 1,
        "feb" | "februar" | "february" => 2,
        "mär" | "märz" | "maerz" | "mar" | "march" => 3,
        "apr" | "april" => 4,
        "mai" | "may" => 5,
        "jun" | "juni" | "june" => 6,
        "jul" | "juli" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "okt" | "oktober" | "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dez" | "dezember" | "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

fn clean(input: &str) -> String {
    let mut value = input.trim();

    if let Some(label) = LABELS
        .iter()
        .find(|l| value.get(..l.len()).is_some_and(|p| p.eq_ignore_ascii_case(l)))
    {
        value = value[label.len()..].trim();
    }

    let suffix = value.len().saturating_sub(3);
    if value.get(suffix..).is_some_and(|s| s.eq_ignore_ascii_case("uhr")) {
        value = &value[..suffix];
    }

    crate::text::collapse_whitespace(value)
}

fn with_optional_time(
    date: NaiveDate,
    hour: Option<regex::Match<'_>>,
    minute: Option<regex::Match<'_>>,
) -> Option<ParsedWhen> {
    match hour {
        None => Some(ParsedWhen::Date(date)),
        Some(_) => Some(ParsedWhen::DateTime(date.and_time(build_time(hour, minute)?))),
    }
}

fn build_time(hour: Option<regex::Match<'_>>, minute: Option<regex::Match<'_>>) -> Option<NaiveTime> {
    let hour: u32 = hour?.as_str().parse().ok()?;
    let minute: u32 = match minute {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn datetime(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn test_iso_formats() {
        assert_eq!(parse_when("2025-07-01"), Some(ParsedWhen::Date(date(2025, 7, 1))));
        assert_eq!(
            parse_when("2025-07-01T18:00"),
            Some(ParsedWhen::DateTime(datetime(2025, 7, 1, 18, 0)))
        );
        assert_eq!(
            parse_when("2025-07-01 18:30:00"),
            Some(ParsedWhen::DateTime(datetime(2025, 7, 1, 18, 30)))
        );
    }

    #[test]
    fn test_rfc3339_keeps_offset() {
        match parse_when("2025-07-01T18:00:00+02:00") {
            Some(ParsedWhen::Instant(dt)) => {
                assert_eq!(dt.offset().local_minus_utc(), 2 * 3600);
                assert_eq!(dt.naive_local(), datetime(2025, 7, 1, 18, 0));
            }
            other => panic!("expected instant, got {:?}", other),
        }
    }

    #[test]
    fn test_german_numeric_dates() {
        assert_eq!(parse_when("14.09.2025"), Some(ParsedWhen::Date(date(2025, 9, 14))));
        assert_eq!(
            parse_when("14.09.2025 19:00 Uhr"),
            Some(ParsedWhen::DateTime(datetime(2025, 9, 14, 19, 0)))
        );
        assert_eq!(
            parse_when("1.9.2025, 9.30"),
            Some(ParsedWhen::DateTime(datetime(2025, 9, 1, 9, 30)))
        );
    }

    #[test]
    fn test_german_textual_dates() {
        assert_eq!(
            parse_when("14. Sept. 2025"),
            Some(ParsedWhen::Date(date(2025, 9, 14)))
        );
        assert_eq!(
            parse_when("Dienstag, 17. Juni 2025"),
            Some(ParsedWhen::Date(date(2025, 6, 17)))
        );
        assert_eq!(
            parse_when("Sonntag 14 Sept 2025 19:00"),
            Some(ParsedWhen::DateTime(datetime(2025, 9, 14, 19, 0)))
        );
        assert_eq!(
            parse_when("3. März 2026 um 20 Uhr"),
            Some(ParsedWhen::DateTime(datetime(2026, 3, 3, 20, 0)))
        );
    }

    #[test]
    fn test_bare_times() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(parse_when("22:00"), Some(ParsedWhen::Time(t(22, 0))));
        assert_eq!(parse_when("Uhrzeit: 19:00 Uhr"), Some(ParsedWhen::Time(t(19, 0))));
        assert_eq!(parse_when("19 Uhr"), Some(ParsedWhen::Time(t(19, 0))));
        assert_eq!(parse_time("7.15"), Some(t(7, 15)));
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_when(""), None);
        assert_eq!(parse_when("demnächst"), None);
        assert_eq!(parse_when("31.02.2025"), None);
        assert_eq!(parse_when("14. Brumaire 2025"), None);
        assert_eq!(parse_when("25:00"), None);
    }

    #[test]
    fn test_german_month_names() {
        assert_eq!(german_month("mär"), Some(3));
        assert_eq!(german_month("okt."), Some(10));
        assert_eq!(german_month("dezember"), Some(12));
        assert_eq!(german_month("foo"), None);
    }
}
