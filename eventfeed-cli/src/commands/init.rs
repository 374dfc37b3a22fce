use std::path::PathBuf;

use anyhow::Result;
use eventfeed_core::Settings;
use owo_colors::OwoColorize;

/// Write a commented default config file unless one exists.
pub fn run(path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => Settings::config_path()?,
    };

    if path.exists() {
        println!("{} {}", "Config already exists:".yellow(), path.display());
        return Ok(());
    }

    Settings::create_default_config(&path)?;
    println!("Created {}", path.display());
    Ok(())
}
