//! Change detection between two snapshots.

mod delta_report;
mod diff_kind;
mod event_diff;

use std::collections::{HashMap, HashSet};

pub use delta_report::{DeltaCounts, DeltaReport};
pub use diff_kind::DiffKind;
pub use event_diff::EventDiff;

use crate::event::Event;
use crate::snapshot::Snapshot;

/// Compare `current` against `previous` and return the delta report together
/// with the snapshot to persist, which is always `current`.
///
/// With no previous snapshot every current event is [`DiffKind::Added`].
pub fn detect_changes(previous: Option<&Snapshot>, current: Snapshot) -> (DeltaReport, Snapshot) {
    let previous_by_identity: HashMap<&str, &Event> = previous
        .map(|p| p.events.iter().map(|e| (e.identity.as_str(), e)).collect())
        .unwrap_or_default();

    let mut entries: Vec<EventDiff> = current
        .events
        .iter()
        .filter_map(|event| {
            let old = previous_by_identity.get(event.identity.as_str()).copied();
            EventDiff::get_diff(old.cloned(), Some(event.clone()))
        })
        .collect();

    if let Some(previous) = previous {
        let current_ids: HashSet<&str> = current.events.iter().map(|e| e.identity.as_str()).collect();
        entries.extend(
            previous
                .events
                .iter()
                .filter(|e| !current_ids.contains(e.identity.as_str()))
                .filter_map(|e| EventDiff::get_diff(Some(e.clone()), None)),
        );
    }

    (DeltaReport { entries }, current)
}
