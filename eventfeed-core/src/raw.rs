//! Raw records as produced by the HTML parser.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One scraped listing entry before validation.
///
/// Every field is optional here; the normalizer decides what is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    pub title: Option<String>,
    /// Date or date-time string in one of the supported source formats.
    pub start: Option<String>,
    /// Date, date-time or bare time (same day as `start`).
    pub end: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    /// Free-form recurrence hint (`wöchentlich`, `FREQ=WEEKLY;COUNT=4`, ...).
    pub recurrence: Option<String>,
}

/// Name of a raw record field, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawField {
    Title,
    Start,
    End,
    Location,
    Description,
    Url,
    Recurrence,
}

impl RawRecord {
    /// Build a record from an untyped key/value bag. Unknown keys are ignored.
    pub fn from_fields(fields: &BTreeMap<String, String>) -> Self {
        let get = |key: &str| fields.get(key).cloned();
        RawRecord {
            title: get("title"),
            start: get("start"),
            end: get("end"),
            location: get("location"),
            description: get("description"),
            url: get("url"),
            recurrence: get("recurrence"),
        }
    }

    /// The value of `field`, treating blank strings as missing.
    pub fn get(&self, field: RawField) -> Option<&str> {
        let value = match field {
            RawField::Title => &self.title,
            RawField::Start => &self.start,
            RawField::End => &self.end,
            RawField::Location => &self.location,
            RawField::Description => &self.description,
            RawField::Url => &self.url,
            RawField::Recurrence => &self.recurrence,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }
}

impl fmt::Display for RawField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RawField::Title => "title",
            RawField::Start => "start",
            RawField::End => "end",
            RawField::Location => "location",
            RawField::Description => "description",
            RawField::Url => "url",
            RawField::Recurrence => "recurrence",
        };
        write!(f, "{}", name)
    }
}
