//! Hoist CLI - move GitLab projects to GitHub.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use crate::config::{Settings, StrategyKind};

/// Hoist - resumable GitLab to GitHub migration
#[derive(Parser, Debug)]
#[command(name = "hoist")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (default: ./hoist.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Migrate every project that is not yet in the ledger
    Migrate {
        /// Transfer strategy
        #[arg(long, value_enum)]
        strategy: Option<StrategyKind>,
        /// Strip blobs larger than this many megabytes (filtered strategy)
        #[arg(long)]
        max_blob_mb: Option<u64>,
        /// Create new repositories as private
        #[arg(long, conflicts_with = "public")]
        private: bool,
        /// Create new repositories as public
        #[arg(long)]
        public: bool,
        /// Ledger file
        #[arg(long)]
        ledger: Option<PathBuf>,
        /// Directory for temporary working copies
        #[arg(long)]
        work_dir: Option<PathBuf>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List source projects and their migration state
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show projects recorded as migrated
    Ledger,

    /// Show version information
    Version,
}

/// Exit status when the batch ran but some projects failed.
const EXIT_PARTIAL_FAILURE: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let dotenv = dotenvy::dotenv();

    // Initialize tracing
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("hoist={log_level},hoist_migrate={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    match run(cli).await {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    if matches!(cli.command, Commands::Version) {
        println!("hoist {}", env!("CARGO_PKG_VERSION"));
        return Ok(0);
    }

    let settings =
        Settings::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Migrate {
            strategy,
            max_blob_mb,
            private,
            public,
            ledger,
            work_dir,
            json,
        } => {
            let overrides = commands::MigrateOverrides {
                strategy,
                max_blob_mb,
                private: match (private, public) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
                ledger,
                work_dir,
            };
            let all_succeeded = commands::migrate(settings, overrides, json).await?;
            Ok(if all_succeeded { 0 } else { EXIT_PARTIAL_FAILURE })
        }
        Commands::List { json } => {
            commands::list(settings, json).await?;
            Ok(0)
        }
        Commands::Ledger => {
            commands::ledger(&settings)?;
            Ok(0)
        }
        Commands::Version => Ok(0),
    }
}
