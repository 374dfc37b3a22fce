//! Persisted result of one scrape run.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::Event;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Content hash mismatch for '{identity}': stored {stored}, computed {computed}")]
    HashMismatch {
        identity: String,
        stored: String,
        computed: String,
    },

    #[error("Event '{title}' has no identity")]
    MissingIdentity { title: String },

    #[error("Identity '{identity}' appears more than once")]
    DuplicateIdentity { identity: String },
}

/// Ordered events of one run plus the time they were captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    pub events: Vec<Event>,
}

impl Snapshot {
    pub fn new(captured_at: DateTime<Utc>, events: Vec<Event>) -> Self {
        Snapshot {
            captured_at,
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, identity: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.identity == identity)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a snapshot and check that every event has a unique identity
    /// and a content hash matching its fields.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        snapshot.verify()?;
        Ok(snapshot)
    }

    pub fn verify(&self) -> Result<(), SnapshotError> {
        let mut seen = HashSet::new();
        for event in &self.events {
            if event.identity.is_empty() {
                return Err(SnapshotError::MissingIdentity {
                    title: event.title.clone(),
                });
            }
            if !seen.insert(event.identity.as_str()) {
                return Err(SnapshotError::DuplicateIdentity {
                    identity: event.identity.clone(),
                });
            }

            let computed = event.compute_content_hash();
            if computed != event.content_hash {
                return Err(SnapshotError::HashMismatch {
                    identity: event.identity.clone(),
                    stored: event.content_hash.clone(),
                    computed,
                });
            }
        }
        Ok(())
    }
}
