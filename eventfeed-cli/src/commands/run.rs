use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use eventfeed_core::{RawRecord, RunContext, Settings};
use owo_colors::OwoColorize;

use crate::fetch::Fetcher;
use crate::render::{Render, render_report};
use crate::store::{Publish, Store};

pub struct RunArgs {
    /// Raw records captured earlier with `eventfeed scrape`, instead of fetching.
    pub input: Option<PathBuf>,
    pub dry_run: bool,
    pub allow_empty: bool,
    pub verbose: bool,
}

pub async fn run(settings: &Settings, args: RunArgs) -> Result<()> {
    let ctx = RunContext::from_settings(settings, Utc::now())?
        .with_allow_empty(settings.allow_empty || args.allow_empty);

    let records = match &args.input {
        Some(path) => read_records(path)?,
        None => {
            let fetcher = Fetcher::new(&settings.source, settings.request_timeout()?)?;
            fetcher.scrape().await?
        }
    };

    let store = Store::new(settings.data_path());
    let prior = store.load_prior()?;

    let output = eventfeed_core::run(&ctx, &records, prior)?;

    for rejected in &output.rejected {
        println!("{}", rejected.render());
    }
    println!("{}", render_report(&output.report, args.verbose));
    println!("\n{} events: {}", output.snapshot.len(), output.report.counts().render());

    if args.dry_run {
        println!("{}", "Dry run, nothing written".dimmed());
        return Ok(());
    }

    store.save_snapshot(&output.snapshot)?;
    match store.publish_feed(&output.feed, &output.stamp)? {
        Publish::Written => println!("Published {}", store.feed_path().display()),
        Publish::Unchanged => {
            let since = store
                .load_stamp()?
                .map(|stamp| format!(" since {}", stamp.generated_at.format("%Y-%m-%d %H:%M")))
                .unwrap_or_default();
            println!("{}", format!("Feed unchanged{since}").dimmed());
        }
    }
    store.archive_feed(&output.feed, output.stamp.generated_at)?;

    Ok(())
}

pub fn read_records(path: &std::path::Path) -> Result<Vec<RawRecord>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read raw records {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid raw records in {}", path.display()))
}
