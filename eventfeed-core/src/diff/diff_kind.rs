use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of one identity between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Added,
    Removed,
    Unchanged,
    Modified,
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffKind::Added => write!(f, "+"),
            DiffKind::Removed => write!(f, "-"),
            DiffKind::Unchanged => write!(f, "="),
            DiffKind::Modified => write!(f, "~"),
        }
    }
}
