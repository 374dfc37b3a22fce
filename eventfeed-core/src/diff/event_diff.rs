use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diff::DiffKind;
use crate::event::Event;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDiff {
    pub kind: DiffKind,
    pub old: Option<Event>,
    pub new: Option<Event>,
}

impl fmt::Display for EventDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.event())
    }
}

impl EventDiff {
    /// Classify one identity given its previous and current version.
    ///
    /// Returns `None` only when neither side exists.
    pub fn get_diff(old_event: Option<Event>, new_event: Option<Event>) -> Option<EventDiff> {
        let kind = match (&old_event, &new_event) {
            (None, Some(_)) => DiffKind::Added,
            (Some(_), None) => DiffKind::Removed,
            (Some(old), Some(new)) if old.content_hash == new.content_hash => DiffKind::Unchanged,
            (Some(_), Some(_)) => DiffKind::Modified,
            (None, None) => return None,
        };

        Some(EventDiff {
            kind,
            old: old_event,
            new: new_event,
        })
    }

    /// Get the event (prefer new, fallback to old)
    pub fn event(&self) -> &Event {
        self.new
            .as_ref()
            .or(self.old.as_ref())
            .expect("EventDiff must have at least one event")
    }

    pub fn identity(&self) -> &str {
        &self.event().identity
    }

    /// Whether the start moved between the two versions.
    pub fn is_rescheduled(&self) -> bool {
        match (&self.old, &self.new) {
            (Some(old), Some(new)) => old.start != new.start || old.end != new.end,
            _ => false,
        }
    }
}
