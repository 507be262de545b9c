//! CLI command implementations.

use crate::config::{Settings, StrategyKind};

use console::style;
use hoist_migrate::progress::logging_callback;
use hoist_migrate::{
    BatchOrchestrator, BatchProgress, BatchSummary, ConsoleProgressReporter, GitLabEnumerator,
    GitRunner, MigrationError, MigrationLedger, SourceEnumerator, SystemGit, TransferStrategy,
};
use std::path::PathBuf;
use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Per-run overrides for `migrate`.
#[derive(Debug, Default)]
pub struct MigrateOverrides {
    pub strategy: Option<StrategyKind>,
    pub max_blob_mb: Option<u64>,
    pub private: Option<bool>,
    pub ledger: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
}

impl MigrateOverrides {
    /// Apply flags on top of loaded settings.
    pub fn apply(self, settings: &mut Settings) {
        if let Some(strategy) = self.strategy {
            settings.transfer.strategy = strategy;
        }
        if let Some(max_blob_mb) = self.max_blob_mb {
            settings.transfer.max_blob_mb = max_blob_mb;
        }
        if let Some(private) = self.private {
            settings.github.private = private;
        }
        if let Some(ledger) = self.ledger {
            settings.ledger.path = ledger;
        }
        if let Some(work_dir) = self.work_dir {
            settings.transfer.work_dir = work_dir;
        }
    }
}

/// Run a migration batch. Returns whether every project succeeded.
pub async fn migrate(
    mut settings: Settings,
    overrides: MigrateOverrides,
    json: bool,
) -> Result<bool> {
    overrides.apply(&mut settings);
    let config = settings.into_migration_config()?;
    check_git(config.strategy).await?;

    tracing::info!(
        source = %config.source.url,
        destination = %config.destination.owner,
        strategy = %config.strategy,
        ledger = %config.ledger_path.display(),
        "Starting migration"
    );

    let show_bar = !json && console::Term::stderr().is_term();
    let reporter = show_bar.then(ConsoleProgressReporter::new);
    let progress = match &reporter {
        Some(reporter) => BatchProgress::with_callback(reporter.callback()),
        None => BatchProgress::with_callback(logging_callback()),
    };

    let orchestrator = BatchOrchestrator::from_config(&config)?.with_progress(progress);
    let summary = orchestrator.run().await;
    if let Some(reporter) = &reporter {
        reporter.finish("done");
    }
    let summary = summary?;

    print_summary(&summary, json)?;
    Ok(summary.is_successful())
}

/// List source projects and whether each is already migrated.
pub async fn list(settings: Settings, json: bool) -> Result<()> {
    settings.check_source()?;
    let ledger = MigrationLedger::open(&settings.ledger.path)?;
    let enumerator = GitLabEnumerator::new(&settings.source_config())?;
    let projects = enumerator.list_projects().await?;

    if json {
        let rows: Vec<serde_json::Value> = projects
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "description": p.description,
                    "clone_url": p.source_clone_locator,
                    "migrated": ledger.is_completed(&p.name),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut pending = 0;
    for project in &projects {
        let done = ledger.is_completed(&project.name);
        if !done {
            pending += 1;
        }
        let mark = if done {
            style("✓").green()
        } else {
            style("·").dim()
        };
        println!("{mark} {:<40} {}", project.name, project.source_clone_locator);
    }
    println!(
        "\n{} projects, {} already migrated, {pending} pending",
        projects.len(),
        projects.len() - pending
    );
    Ok(())
}

/// Print the names recorded in the ledger.
pub fn ledger(settings: &Settings) -> Result<()> {
    let ledger = MigrationLedger::open(&settings.ledger.path)?;
    for name in ledger.entries() {
        println!("{name}");
    }
    eprintln!(
        "{} projects recorded in {}",
        ledger.len(),
        ledger.path().display()
    );
    Ok(())
}

/// Fail before touching any project if the required git tooling is missing.
async fn check_git(strategy: TransferStrategy) -> Result<()> {
    let git = SystemGit::new();
    let Some(version) = git.version().await else {
        return Err(MigrationError::Configuration("git executable not found on PATH".into()).into());
    };
    tracing::debug!(%version, "Found git");

    if matches!(strategy, TransferStrategy::Filtered { .. }) {
        let available = git
            .run(None, &["filter-repo".to_string(), "--version".to_string()])
            .await
            .is_ok_and(|output| output.success);
        if !available {
            return Err(MigrationError::Configuration(
                "the filtered strategy needs git-filter-repo installed".into(),
            )
            .into());
        }
    }
    Ok(())
}

fn print_summary(summary: &BatchSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        summary.print_summary();
    }
    Ok(())
}
