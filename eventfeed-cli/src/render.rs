//! Colored terminal rendering of change reports.

use eventfeed_core::{DeltaCounts, DeltaReport, DiffKind, Event, EventDiff, Rejected};
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

impl Render for DiffKind {
    fn render(&self) -> String {
        colorize_diff(*self, &self.to_string())
    }
}

fn colorize_diff(kind: DiffKind, text: &str) -> String {
    match kind {
        DiffKind::Added => text.green().to_string(),
        DiffKind::Modified => text.yellow().to_string(),
        DiffKind::Removed => text.red().to_string(),
        DiffKind::Unchanged => text.dimmed().to_string(),
    }
}

impl Render for EventDiff {
    fn render(&self) -> String {
        let event = self.event();
        let summary = colorize_diff(self.kind, &event.to_string());
        let time = event.render_event_time();

        format!("{} {} {}", self.kind.render(), summary, time.dimmed())
    }
}

impl Render for DeltaCounts {
    fn render(&self) -> String {
        format!(
            "{} {}  {} {}  {} {}  {} {}",
            "+".green(),
            self.added,
            "~".yellow(),
            self.modified,
            "-".red(),
            self.removed,
            "=".dimmed(),
            self.unchanged
        )
    }
}

impl Render for Rejected {
    fn render(&self) -> String {
        format!("{} record {}: {}", "!".red(), self.index, self.error)
    }
}

/// Above this many entries of one kind, show a count instead of each event.
const COMPACT_THRESHOLD: usize = 5;

/// Render the changed entries of a report. Unchanged events are never listed.
pub fn render_report(report: &DeltaReport, verbose: bool) -> String {
    if !report.has_changes() {
        return "   No changes".dimmed().to_string();
    }

    let mut lines = Vec::new();
    for kind in [DiffKind::Added, DiffKind::Modified, DiffKind::Removed] {
        let diffs: Vec<&EventDiff> = report.of_kind(kind).collect();
        render_diff_list(kind, &diffs, verbose, &mut lines);
    }
    lines.join("\n")
}

fn render_diff_list(kind: DiffKind, diffs: &[&EventDiff], verbose: bool, lines: &mut Vec<String>) {
    if diffs.is_empty() {
        return;
    }

    if verbose || diffs.len() <= COMPACT_THRESHOLD {
        for diff in diffs {
            lines.push(format!("   {}", diff.render()));
            if diff.kind == DiffKind::Modified {
                lines.extend(render_field_diffs(diff).into_iter().map(|l| format!("      {}", l)));
            }
        }
    } else {
        let verb = match kind {
            DiffKind::Added => "new",
            DiffKind::Modified => "changed",
            DiffKind::Removed => "removed",
            DiffKind::Unchanged => "unchanged",
        };
        let label = format!("({} {} {})", diffs.len(), verb, pluralize("event", diffs.len()));
        lines.push(format!("   {} {}", kind.render(), colorize_diff(kind, &label)));
    }
}

fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

/// Field-by-field differences of a modified event.
fn render_field_diffs(diff: &EventDiff) -> Vec<String> {
    let mut lines = Vec::new();

    if let (Some(old), Some(new)) = (&diff.old, &diff.new) {
        if old.title != new.title {
            lines.push(render_change("title", &old.title, &new.title));
        }
        if old.description != new.description {
            lines.push(render_change(
                "description",
                &preview(&old.description),
                &preview(&new.description),
            ));
        }
        if old.location != new.location {
            lines.push(render_change("location", &old.location, &new.location));
        }
        if old.start != new.start {
            lines.push(render_change("start", &old.start.to_string(), &new.start.to_string()));
        }
        if old.end != new.end {
            lines.push(render_change("end", &old.end.to_string(), &new.end.to_string()));
        }
        if old.recurrence != new.recurrence {
            lines.push(render_change("recurrence", &recurrence(old), &recurrence(new)));
        }
    }

    lines
}

fn render_change(field: &str, old: &str, new: &str) -> String {
    let old = if old.is_empty() { "(none)" } else { old };
    let new = if new.is_empty() { "(none)" } else { new };
    format!("{}: {} → {}", field.dimmed(), old.red(), new.green())
}

fn recurrence(event: &Event) -> String {
    event
        .recurrence
        .as_ref()
        .map(|r| r.to_string())
        .unwrap_or_default()
}

/// First line of a long text, shortened to 60 characters.
fn preview(text: &str) -> String {
    let first = text.lines().next().unwrap_or_default();
    if first.chars().count() > 60 || text.lines().nth(1).is_some() {
        let short: String = first.chars().take(60).collect();
        format!("{short}…")
    } else {
        first.to_string()
    }
}
