use std::path::{Path, PathBuf};

use anyhow::Result;
use eventfeed_core::{Settings, generate_feed};

use super::read_snapshot;
use crate::store::write_atomic;

/// Regenerate the feed for a stored snapshot.
pub fn run(settings: &Settings, snapshot: &Path, output: Option<PathBuf>) -> Result<()> {
    let snapshot = read_snapshot(snapshot)?;
    let feed = generate_feed(&snapshot.events, &settings.feed_metadata())?;

    match output {
        Some(path) => {
            write_atomic(&path, feed.as_bytes())?;
            println!("Wrote {} events to {}", snapshot.len(), path.display());
        }
        None => print!("{feed}"),
    }

    Ok(())
}
