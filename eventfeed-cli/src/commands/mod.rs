pub mod diff;
pub mod feed;
pub mod init;
pub mod run;
pub mod scrape;

use std::path::Path;

use anyhow::{Context, Result};
use eventfeed_core::Snapshot;

/// Read and verify a snapshot file.
fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    Snapshot::from_json(&json).with_context(|| format!("Invalid snapshot {}", path.display()))
}
