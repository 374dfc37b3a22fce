use std::path::Path;

use anyhow::Result;
use owo_colors::OwoColorize;

use super::read_snapshot;
use crate::render::{Render, render_report};

/// Show the delta between two stored snapshots.
pub fn run(previous: &Path, current: &Path, verbose: bool) -> Result<()> {
    let previous = read_snapshot(previous)?;
    let current = read_snapshot(current)?;

    println!(
        "{} {} → {}",
        "Changes".bold(),
        previous.captured_at.format("%Y-%m-%d %H:%M"),
        current.captured_at.format("%Y-%m-%d %H:%M")
    );

    let (report, _) = eventfeed_core::detect_changes(Some(&previous), current);
    println!("{}", render_report(&report, verbose));
    println!("\n{}", report.counts().render());

    Ok(())
}
