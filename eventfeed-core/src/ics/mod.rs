//! Calendar feed generation.
//!
//! The feed is an RFC 5545 document with one VEVENT per event and one
//! VTIMEZONE per referenced zone. For identical input the output is
//! byte-identical: nothing in it depends on the wall clock. The generation
//! time is kept next to the feed in a [`FeedStamp`] instead.

mod content_line;
mod generate;
mod timezone;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use content_line::{escape_text, fold_line, unfold};
pub use generate::generate_feed;
pub use timezone::vtimezone_lines;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("Invalid event '{identity}': {reason}")]
    InvalidEvent { identity: String, reason: String },
}

/// Calendar-level properties of the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedMetadata {
    pub prodid: String,
    pub name: String,
    pub description: String,
    /// IANA zone announced in `X-WR-TIMEZONE`.
    pub timezone: String,
    /// Right-hand side of every UID (`<identity>@<uid_domain>`).
    pub uid_domain: String,
}

impl Default for FeedMetadata {
    fn default() -> Self {
        FeedMetadata {
            prodid: "-//Buchloe//Veranstaltungskalender//DE".to_string(),
            name: "Buchloe Veranstaltungskalender".to_string(),
            description: "Veranstaltungen der Stadt Buchloe".to_string(),
            timezone: "Europe/Berlin".to_string(),
            uid_domain: "buchloe.de".to_string(),
        }
    }
}

/// Out-of-band record of when a feed was generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedStamp {
    pub generated_at: DateTime<Utc>,
    /// Hex SHA-256 of the feed bytes, usable as an HTTP ETag.
    pub etag: String,
    pub events: usize,
}

impl FeedStamp {
    pub fn new(feed: &str, events: usize, generated_at: DateTime<Utc>) -> Self {
        FeedStamp {
            generated_at,
            etag: crate::event::to_hex(&Sha256::digest(feed.as_bytes())),
            events,
        }
    }

    /// Whether `feed` is the document this stamp was made for.
    pub fn matches(&self, feed: &str) -> bool {
        self.etag == crate::event::to_hex(&Sha256::digest(feed.as_bytes()))
    }
}
