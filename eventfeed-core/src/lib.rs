//! Core of the eventfeed pipeline.
//!
//! Scraped listing entries ([`RawRecord`]) are normalized into [`Event`]s,
//! compared against the previous [`Snapshot`] and rendered as an RFC 5545
//! feed. Nothing in this crate touches the network or the filesystem except
//! configuration loading.

pub mod config;
pub mod context;
pub mod datetime;
pub mod diff;
pub mod error;
pub mod event;
pub mod ics;
pub mod normalize;
pub mod pipeline;
pub mod raw;
pub mod recurrence;
pub mod snapshot;
pub mod text;

pub use config::Settings;
pub use context::RunContext;
pub use diff::{DeltaCounts, DeltaReport, DiffKind, EventDiff, detect_changes};
pub use error::{EventFeedError, EventFeedResult};
pub use event::{Event, EventTime};
pub use ics::{FeedError, FeedMetadata, FeedStamp, generate_feed};
pub use normalize::{Normalized, Normalizer, Rejected, ValidationError, normalize};
pub use pipeline::{PriorSnapshot, RunOutput, run};
pub use raw::{RawField, RawRecord};
pub use recurrence::{Frequency, Recurrence, RecurrenceLimit};
pub use snapshot::{Snapshot, SnapshotError};
