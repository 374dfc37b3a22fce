//! On-disk layout of the data directory.
//!
//! ```text
//! <data_dir>/
//!   snapshots/snapshot_20250701_060000.json
//!   public/events.ics
//!   public/events.json     (FeedStamp of events.ics)
//!   archive/events_20250701_060000.ics
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use eventfeed_core::{FeedStamp, PriorSnapshot, Snapshot};

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub struct Store {
    root: PathBuf,
}

/// Whether publishing changed the served feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    Written,
    Unchanged,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Store { root: root.into() }
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join("snapshots")
    }

    pub fn feed_path(&self) -> PathBuf {
        self.root.join("public").join("events.ics")
    }

    pub fn stamp_path(&self) -> PathBuf {
        self.root.join("public").join("events.json")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join("archive")
    }

    fn snapshot_path(&self, captured_at: DateTime<Utc>) -> PathBuf {
        self.snapshots_dir()
            .join(format!("snapshot_{}.json", captured_at.format(TIMESTAMP_FORMAT)))
    }

    /// Most recent snapshot file. Names sort chronologically.
    pub fn latest_snapshot_path(&self) -> Result<Option<PathBuf>> {
        let dir = self.snapshots_dir();
        if !dir.exists() {
            return Ok(None);
        }

        let entries = std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to read snapshot directory {}", dir.display()))?;

        let latest = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("snapshot_") && name.ends_with(".json"))
            })
            .max();

        Ok(latest)
    }

    /// The snapshot the next run compares against.
    pub fn load_prior(&self) -> Result<PriorSnapshot> {
        let Some(path) = self.latest_snapshot_path()? else {
            return Ok(PriorSnapshot::Missing);
        };

        tracing::debug!(path = %path.display(), "Loading previous snapshot");
        match std::fs::read_to_string(&path) {
            Ok(json) => Ok(PriorSnapshot::from_json(Some(&json))),
            Err(e) => Ok(PriorSnapshot::Unreadable(format!("{}: {}", path.display(), e))),
        }
    }

    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        let path = self.snapshot_path(snapshot.captured_at);
        let json = snapshot.to_json().context("Failed to serialize snapshot")?;
        write_atomic(&path, json.as_bytes())?;
        tracing::info!(path = %path.display(), events = snapshot.len(), "Saved snapshot");
        Ok(path)
    }

    /// Write the served feed and its stamp. Both are left alone when the
    /// feed bytes are unchanged, so HTTP caches keep their validators.
    ///
    /// The two files are renamed separately. A stamp that is missing or
    /// does not describe the served feed is rewritten even when the feed
    /// itself is unchanged.
    pub fn publish_feed(&self, feed: &str, stamp: &FeedStamp) -> Result<Publish> {
        let feed_path = self.feed_path();

        let existing = std::fs::read_to_string(&feed_path).ok();
        if existing.as_deref() == Some(feed) {
            let current = self.load_stamp().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring unreadable feed stamp");
                None
            });
            if current.is_some_and(|current| current.matches(feed)) {
                tracing::info!(path = %feed_path.display(), "Feed unchanged");
            } else {
                tracing::warn!(path = %self.stamp_path().display(), "Feed stamp out of date, rewriting it");
                self.write_stamp(stamp)?;
            }
            return Ok(Publish::Unchanged);
        }

        write_atomic(&feed_path, feed.as_bytes())?;
        self.write_stamp(stamp)?;

        tracing::info!(path = %feed_path.display(), etag = %stamp.etag, "Published feed");
        Ok(Publish::Written)
    }

    fn write_stamp(&self, stamp: &FeedStamp) -> Result<()> {
        let json = serde_json::to_string_pretty(stamp).context("Failed to serialize feed stamp")?;
        write_atomic(&self.stamp_path(), json.as_bytes())
    }

    pub fn load_stamp(&self) -> Result<Option<FeedStamp>> {
        let path = self.stamp_path();
        if !path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let stamp = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(stamp))
    }

    /// Keep a dated copy of a published feed.
    pub fn archive_feed(&self, feed: &str, generated_at: DateTime<Utc>) -> Result<PathBuf> {
        let path = self
            .archive_dir()
            .join(format!("events_{}.ics", generated_at.format(TIMESTAMP_FORMAT)));
        write_atomic(&path, feed.as_bytes())?;
        Ok(path)
    }
}

/// Write to a sibling temp file, then rename over the target.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Invalid file path {}", path.display()))?;
    let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp_path, contents)
        .with_context(|| format!("Failed to write temp file at {}", temp_path.display()))?;

    std::fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to {}", path.display()))?;

    Ok(())
}
