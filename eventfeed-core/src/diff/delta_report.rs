use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diff::{DiffKind, EventDiff};

/// Classification of every identity in the previous or current snapshot.
///
/// Entries follow the current snapshot's order, then removed events in the
/// previous snapshot's order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeltaReport {
    pub entries: Vec<EventDiff>,
}

/// Number of entries per [`DiffKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaCounts {
    pub added: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub modified: usize,
}

impl DeltaReport {
    pub fn of_kind(&self, kind: DiffKind) -> impl Iterator<Item = &EventDiff> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }

    pub fn added(&self) -> impl Iterator<Item = &EventDiff> {
        self.of_kind(DiffKind::Added)
    }

    pub fn removed(&self) -> impl Iterator<Item = &EventDiff> {
        self.of_kind(DiffKind::Removed)
    }

    pub fn unchanged(&self) -> impl Iterator<Item = &EventDiff> {
        self.of_kind(DiffKind::Unchanged)
    }

    pub fn modified(&self) -> impl Iterator<Item = &EventDiff> {
        self.of_kind(DiffKind::Modified)
    }

    /// Kind assigned to `identity`, if it appears on either side.
    pub fn kind_of(&self, identity: &str) -> Option<DiffKind> {
        self.entries
            .iter()
            .find(|d| d.identity() == identity)
            .map(|d| d.kind)
    }

    pub fn counts(&self) -> DeltaCounts {
        let mut counts = DeltaCounts::default();
        for diff in &self.entries {
            match diff.kind {
                DiffKind::Added => counts.added += 1,
                DiffKind::Removed => counts.removed += 1,
                DiffKind::Unchanged => counts.unchanged += 1,
                DiffKind::Modified => counts.modified += 1,
            }
        }
        counts
    }

    /// True if anything was added, removed or modified.
    pub fn has_changes(&self) -> bool {
        self.entries.iter().any(|d| d.kind != DiffKind::Unchanged)
    }
}

impl DeltaCounts {
    pub fn total(&self) -> usize {
        self.added + self.removed + self.unchanged + self.modified
    }
}

impl fmt::Display for DeltaCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} removed, {} modified, {} unchanged",
            self.added, self.removed, self.modified, self.unchanged
        )
    }
}
