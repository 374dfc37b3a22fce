mod commands;
mod fetch;
mod logging;
mod parse;
mod render;
mod store;
mod utils;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use eventfeed_core::Settings;

use crate::logging::{LogFormat, LoggingConfig, init_logging};

#[derive(Parser)]
#[command(name = "eventfeed")]
#[command(about = "Scrape the Buchloe event listing, track changes and publish an ICS feed")]
struct Cli {
    /// Config file (default: ./eventfeed.toml, then the user config file)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape, detect changes, and publish the feed
    Run {
        /// Use raw records from a file instead of scraping
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Show what would change without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Publish even if no valid events were found
        #[arg(long)]
        allow_empty: bool,
    },
    /// Scrape the listing and print the raw records as JSON
    Scrape {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the changes between two snapshot files
    Diff { previous: PathBuf, current: PathBuf },
    /// Regenerate the feed from a snapshot file
    Feed {
        snapshot: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a commented default config file
    Init {
        /// Where to write it (default: the user config file)
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LoggingConfig::from_verbosity(cli.verbose, cli.log_format))?;

    let config = cli.config.as_deref();
    let verbose = cli.verbose > 0;

    match cli.command {
        Commands::Run {
            input,
            dry_run,
            allow_empty,
        } => {
            let settings = Settings::load(config)?;
            let args = commands::run::RunArgs {
                input,
                dry_run,
                allow_empty,
                verbose,
            };
            commands::run::run(&settings, args).await
        }
        Commands::Scrape { output } => {
            let settings = Settings::load(config)?;
            commands::scrape::run(&settings, output).await
        }
        Commands::Diff { previous, current } => commands::diff::run(&previous, &current, verbose),
        Commands::Feed { snapshot, output } => {
            let settings = Settings::load(config)?;
            commands::feed::run(&settings, &snapshot, output)
        }
        Commands::Init { path } => commands::init::run(path),
    }
}
