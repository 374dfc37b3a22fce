use std::path::PathBuf;

use anyhow::{Context, Result};
use eventfeed_core::Settings;

use crate::fetch::Fetcher;
use crate::store::write_atomic;

/// Fetch and parse the listing, then dump the raw records as JSON.
pub async fn run(settings: &Settings, output: Option<PathBuf>) -> Result<()> {
    let fetcher = Fetcher::new(&settings.source, settings.request_timeout()?)?;
    let records = fetcher.scrape().await?;

    let json = serde_json::to_string_pretty(&records).context("Failed to serialize raw records")?;

    match output {
        Some(path) => {
            write_atomic(&path, json.as_bytes())?;
            println!("Wrote {} records to {}", records.len(), path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}
