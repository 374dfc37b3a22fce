//! Recurrence rules for repeating events.
//!
//! The model is deliberately small: a frequency, an interval and an optional
//! limit. It is rendered as a single RRULE and validated by running it through
//! the `rrule` crate once, so a rule that can never produce an occurrence is
//! rejected during normalization instead of reaching the feed.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;
use rrule::RRuleSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::EventTime;

static EVERY_N_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:every|alle)\s+(\d+)\s+([a-zäöü]+)$").expect("valid recurrence regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceLimit {
    /// Last local date on which an occurrence may start (inclusive).
    Until(NaiveDate),
    /// Total number of occurrences, including the first.
    Count(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recurrence {
    pub frequency: Frequency,
    pub interval: u32,
    #[serde(default)]
    pub limit: Option<RecurrenceLimit>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecurrenceError {
    #[error("unsupported recurrence hint '{0}'")]
    Unsupported(String),

    #[error("invalid recurrence rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("recurrence rule '{0}' produces no occurrences")]
    NoOccurrences(String),
}

impl Frequency {
    pub fn as_rrule(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }

    fn from_rrule(value: &str) -> Option<Self> {
        match value {
            "DAILY" => Some(Frequency::Daily),
            "WEEKLY" => Some(Frequency::Weekly),
            "MONTHLY" => Some(Frequency::Monthly),
            "YEARLY" => Some(Frequency::Yearly),
            _ => None,
        }
    }

    fn from_unit(unit: &str) -> Option<Self> {
        match unit {
            "day" | "days" | "tag" | "tage" | "tagen" => Some(Frequency::Daily),
            "week" | "weeks" | "woche" | "wochen" => Some(Frequency::Weekly),
            "month" | "months" | "monat" | "monate" | "monaten" => Some(Frequency::Monthly),
            "year" | "years" | "jahr" | "jahre" | "jahren" => Some(Frequency::Yearly),
            _ => None,
        }
    }
}

impl Recurrence {
    pub fn new(frequency: Frequency) -> Self {
        Recurrence {
            frequency,
            interval: 1,
            limit: None,
        }
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_limit(mut self, limit: RecurrenceLimit) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Parse a free-form recurrence hint from the source.
    ///
    /// Accepts RRULE syntax restricted to FREQ, INTERVAL, COUNT and UNTIL, or
    /// an English/German keyword such as `weekly`, `monatlich` or
    /// `alle 2 Wochen`.
    pub fn parse_hint(hint: &str) -> Result<Self, RecurrenceError> {
        let trimmed = hint.trim();
        if trimmed.contains('=') {
            return Self::parse_rrule(trimmed);
        }

        let lower = trimmed.to_lowercase();
        let keyword = match lower.as_str() {
            "daily" | "täglich" | "taeglich" | "jeden tag" => Some(Recurrence::new(Frequency::Daily)),
            "weekly" | "wöchentlich" | "woechentlich" | "jede woche" => {
                Some(Recurrence::new(Frequency::Weekly))
            }
            "biweekly" | "every other week" | "14-tägig" | "14-taegig" | "vierzehntägig"
            | "alle zwei wochen" => Some(Recurrence::new(Frequency::Weekly).with_interval(2)),
            "monthly" | "monatlich" | "jeden monat" => Some(Recurrence::new(Frequency::Monthly)),
            "yearly" | "annually" | "jährlich" | "jaehrlich" | "jedes jahr" => {
                Some(Recurrence::new(Frequency::Yearly))
            }
            _ => None,
        };
        if let Some(recurrence) = keyword {
            return Ok(recurrence);
        }

        let caps = EVERY_N_RE
            .captures(&lower)
            .ok_or_else(|| RecurrenceError::Unsupported(trimmed.to_string()))?;
        let interval: u32 = caps[1]
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| RecurrenceError::Unsupported(trimmed.to_string()))?;
        let frequency = Frequency::from_unit(&caps[2])
            .ok_or_else(|| RecurrenceError::Unsupported(trimmed.to_string()))?;

        Ok(Recurrence::new(frequency).with_interval(interval))
    }

    fn parse_rrule(rule: &str) -> Result<Self, RecurrenceError> {
        let body = rule
            .strip_prefix("RRULE:")
            .or_else(|| rule.strip_prefix("rrule:"))
            .unwrap_or(rule);
        let unsupported = || RecurrenceError::Unsupported(rule.to_string());

        let mut frequency = None;
        let mut interval = 1;
        let mut count = None;
        let mut until = None;

        for part in body.split(';').filter(|p| !p.trim().is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(unsupported)?;
            let value = value.trim();
            match key.trim().to_uppercase().as_str() {
                "FREQ" => {
                    frequency = Some(
                        Frequency::from_rrule(&value.to_uppercase()).ok_or_else(unsupported)?,
                    )
                }
                "INTERVAL" => {
                    interval = value
                        .parse()
                        .ok()
                        .filter(|n: &u32| *n > 0)
                        .ok_or_else(unsupported)?
                }
                "COUNT" => {
                    count = Some(
                        value
                            .parse()
                            .ok()
                            .filter(|n: &u32| *n > 0)
                            .ok_or_else(unsupported)?,
                    )
                }
                "UNTIL" => until = Some(parse_until(value).ok_or_else(unsupported)?),
                _ => return Err(unsupported()),
            }
        }

        let limit = match (count, until) {
            (Some(_), Some(_)) => return Err(unsupported()),
            (Some(n), None) => Some(RecurrenceLimit::Count(n)),
            (None, Some(d)) => Some(RecurrenceLimit::Until(d)),
            (None, None) => None,
        };

        Ok(Recurrence {
            frequency: frequency.ok_or_else(unsupported)?,
            interval,
            limit,
        })
    }

    /// Fixed-order rule text used for content hashing. Always spells out the
    /// interval so `weekly` and `FREQ=WEEKLY;INTERVAL=1` hash the same.
    pub fn canonical(&self) -> String {
        let mut rule = format!(
            "FREQ={};INTERVAL={}",
            self.frequency.as_rrule(),
            self.interval
        );
        match &self.limit {
            Some(RecurrenceLimit::Count(n)) => rule.push_str(&format!(";COUNT={}", n)),
            Some(RecurrenceLimit::Until(d)) => {
                rule.push_str(&format!(";UNTIL={}", d.format("%Y-%m-%d")))
            }
            None => {}
        }
        rule
    }

    /// RRULE value for the feed, shaped for the given DTSTART.
    ///
    /// All-day series get a date-only UNTIL; timed series get UNTIL as the end
    /// of the last local day expressed in UTC, as RFC 5545 requires for
    /// DTSTART values carrying a TZID.
    pub fn to_rrule(&self, start: &EventTime) -> String {
        let mut rule = format!("FREQ={}", self.frequency.as_rrule());
        if self.interval > 1 {
            rule.push_str(&format!(";INTERVAL={}", self.interval));
        }
        match &self.limit {
            Some(RecurrenceLimit::Count(n)) => rule.push_str(&format!(";COUNT={}", n)),
            Some(RecurrenceLimit::Until(d)) => {
                rule.push_str(&format!(";UNTIL={}", until_value(*d, start)))
            }
            None => {}
        }
        rule
    }

    /// Check the rule with the `rrule` crate and make sure it yields at least
    /// one occurrence from `start`.
    pub fn validate(&self, start: &EventTime) -> Result<(), RecurrenceError> {
        let rrule_str = build_rrule_string(start, self);

        let rrule_set: RRuleSet =
            rrule_str
                .parse()
                .map_err(|e: rrule::RRuleError| RecurrenceError::InvalidRule {
                    rule: self.canonical(),
                    reason: e.to_string(),
                })?;

        if rrule_set.all(1).dates.is_empty() {
            return Err(RecurrenceError::NoOccurrences(self.canonical()));
        }

        Ok(())
    }

    /// Year in which the last occurrence from `start` begins, or `None` for
    /// a rule without a limit.
    pub fn last_year(&self, start: &EventTime) -> Option<i32> {
        match self.limit.as_ref()? {
            RecurrenceLimit::Until(until) => Some(until.year()),
            RecurrenceLimit::Count(count) => {
                let rrule_set: RRuleSet = build_rrule_string(start, self).parse().ok()?;
                let limit = u16::try_from(*count).unwrap_or(u16::MAX);
                rrule_set.all(limit).dates.last().map(|last| last.year())
            }
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

fn parse_until(value: &str) -> Option<NaiveDate> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).take(8).collect();
    NaiveDate::parse_from_str(&digits, "%Y%m%d").ok()
}

fn until_value(until: NaiveDate, start: &EventTime) -> String {
    match start {
        EventTime::Date(_) => until.format("%Y%m%d").to_string(),
        EventTime::Zoned { .. } => {
            let last_second = until.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN));
            let utc = match start.tz() {
                Some(tz) => tz
                    .from_local_datetime(&last_second)
                    .latest()
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|| last_second.and_utc()),
                None => Utc.from_utc_datetime(&last_second),
            };
            utc.format("%Y%m%dT%H%M%SZ").to_string()
        }
    }
}

/// Build an iCalendar-format rule set string for the rrule crate parser.
fn build_rrule_string(start: &EventTime, recurrence: &Recurrence) -> String {
    match start {
        // The rrule crate needs a datetime, so all-day dates become midnight UTC
        // and the date-only UNTIL becomes the last second of that day.
        EventTime::Date(d) => {
            let mut rule = format!("FREQ={}", recurrence.frequency.as_rrule());
            rule.push_str(&format!(";INTERVAL={}", recurrence.interval));
            match &recurrence.limit {
                Some(RecurrenceLimit::Count(n)) => rule.push_str(&format!(";COUNT={}", n)),
                Some(RecurrenceLimit::Until(u)) => {
                    rule.push_str(&format!(";UNTIL={}T235959Z", u.format("%Y%m%d")))
                }
                None => {}
            }
            format!("DTSTART:{}T000000Z\nRRULE:{}", d.format("%Y%m%d"), rule)
        }
        EventTime::Zoned { datetime, tzid } => format!(
            "DTSTART;TZID={}:{}\nRRULE:{}",
            tzid,
            datetime.format("%Y%m%dT%H%M%S"),
            recurrence.to_rrule(start)
        ),
    }
}
