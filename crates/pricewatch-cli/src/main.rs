//! `pricewatch` — collect subscription listing snapshots and surface deals.
//!
//! # Usage
//!
//! ```
//! pricewatch scrape --list-id 12345
//! pricewatch deals
//! pricewatch history --days 14
//! pricewatch user alice
//! ```
//!
//! Requires a browser already running with its DevTools port open and a
//! logged-in session; `pricewatch config` shows the resolved settings.

mod commands;
mod config;
mod export;
mod surface;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use commands::Exit;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
  name = "pricewatch",
  version,
  about = "Track subscription listing prices and surface deals"
)]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "pricewatch.toml", global = true)]
  config: PathBuf,

  /// Enable verbose/debug logging.
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Scrape a list into the store and analyze the results
  Scrape {
    /// List id to scrape (defaults to the configured default list)
    #[arg(short, long)]
    list_id: Option<String>,

    /// Skip the post-scrape analysis pass
    #[arg(long)]
    no_analyze: bool,
  },
  /// Show store statistics
  Stats,
  /// Show current deals: free accounts, lows, fresh drops, tag issues
  Deals,
  /// Show recent price changes
  History {
    /// Trailing window in days
    #[arg(long, default_value_t = 30)]
    days: i64,
  },
  /// Show one entity's full price history
  User {
    /// Entity handle (profile username)
    handle: String,
  },
  /// Export the full history as CSV
  Export {
    /// Output file path
    file: PathBuf,
  },
  /// Show the resolved configuration
  Config,
}

/// Conventional exit code for a user-requested interrupt (128 + SIGINT).
const EXIT_INTERRUPTED: i32 = 130;

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
  let cli = Cli::parse();

  let default_level =
    if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy(),
    )
    .init();

  let result = run(cli).await;

  match result {
    Ok(Exit::Ok) => {}
    Ok(Exit::Interrupted) => std::process::exit(EXIT_INTERRUPTED),
    Err(e) => {
      eprintln!("error: {e:#}");
      std::process::exit(1);
    }
  }
}

async fn run(cli: Cli) -> anyhow::Result<Exit> {
  let cfg = config::load(&cli.config)?;

  match cli.command {
    Commands::Scrape { list_id, no_analyze } => {
      commands::scrape(&cfg, list_id.as_deref(), no_analyze).await
    }
    Commands::Stats => commands::stats(&cfg).await,
    Commands::Deals => commands::deals(&cfg).await,
    Commands::History { days } => commands::history(&cfg, days).await,
    Commands::User { handle } => commands::user(&cfg, &handle).await,
    Commands::Export { file } => commands::export(&cfg, &file).await,
    Commands::Config => commands::show_config(&cfg, &cli.config).await,
  }
}
