//! Error types for the eventfeed pipeline.

use thiserror::Error;

use crate::ics::FeedError;
use crate::snapshot::SnapshotError;

/// Errors that abort a pipeline run.
///
/// Per-record problems never show up here; they are reported as
/// [`crate::normalize::Rejected`] entries and the run continues.
#[derive(Error, Debug)]
pub enum EventFeedError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("Feed generation error: {0}")]
    Feed(#[from] FeedError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Scrape produced no valid events ({rejected} records rejected)")]
    EmptyScrape { rejected: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for eventfeed operations.
pub type EventFeedResult<T> = Result<T, EventFeedError>;
