//! Batch orchestration.
//!
//! Each enumerated project moves through
//! `Pending -> Skipped | Resolving -> Transferring -> Completed | Failed`.
//! Projects are processed one at a time in listing order. Only a listing
//! failure aborts the batch; everything else is recorded per project.

use crate::error::{MigrationError, Result};
use crate::github::{DestinationResolver, GitHubResolver};
use crate::gitlab::{GitLabEnumerator, SourceEnumerator};
use crate::ledger::MigrationLedger;
use crate::progress::{BatchProgress, MigrationPhase};
use crate::transfer::{GitTransporter, HistoryTransporter};
use crate::types::{BatchSummary, MigrationConfig, ProjectDescriptor, TransferOutcome};

use tracing::{error, info, warn};

/// Outcome of one project within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ProjectOutcome {
    Skipped,
    Succeeded { recorded: bool },
    Failed(String),
}

/// Drives a migration batch from listing to summary.
pub struct BatchOrchestrator<S, R, T> {
    enumerator: S,
    resolver: R,
    transporter: T,
    ledger: MigrationLedger,
    progress: BatchProgress,
}

impl BatchOrchestrator<GitLabEnumerator, GitHubResolver, GitTransporter> {
    /// Build the GitLab to GitHub pipeline from a configuration.
    pub fn from_config(config: &MigrationConfig) -> Result<Self> {
        Ok(Self::new(
            GitLabEnumerator::new(&config.source)?,
            GitHubResolver::new(&config.destination)?,
            GitTransporter::new(config),
            MigrationLedger::open(&config.ledger_path)?,
        ))
    }
}

impl<S, R, T> BatchOrchestrator<S, R, T>
where
    S: SourceEnumerator,
    R: DestinationResolver,
    T: HistoryTransporter,
{
    /// Create an orchestrator from its components.
    pub fn new(enumerator: S, resolver: R, transporter: T, ledger: MigrationLedger) -> Self {
        Self {
            enumerator,
            resolver,
            transporter,
            ledger,
            progress: BatchProgress::new(),
        }
    }

    /// Set a progress tracker.
    pub fn with_progress(mut self, progress: BatchProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Run the batch.
    ///
    /// Returns an error only when the project listing fails, in which case
    /// no project has been touched.
    pub async fn run(&self) -> Result<BatchSummary> {
        self.progress.report(MigrationPhase::Listing, None, None);
        let projects = self.enumerator.list_projects().await.map_err(|e| {
            error!(error = %e, "Project listing failed; aborting batch");
            e
        })?;

        info!(
            total = projects.len(),
            completed_before = self.ledger.len(),
            "Starting migration batch"
        );
        self.progress.set_total(projects.len() as u64);

        let mut summary = BatchSummary::new(projects.len());
        for project in &projects {
            match self.migrate_project(project).await {
                ProjectOutcome::Skipped => summary.record_skipped(),
                ProjectOutcome::Succeeded { recorded } => {
                    summary.record_succeeded();
                    if !recorded {
                        summary.record_unrecorded(&project.name);
                    }
                }
                ProjectOutcome::Failed(reason) => summary.record_failed(&project.name, reason),
            }
        }

        info!(
            succeeded = summary.succeeded_count,
            skipped = summary.skipped_count,
            failed = summary.failed_count(),
            "Migration batch finished"
        );
        self.progress.report(MigrationPhase::Finished, None, None);
        Ok(summary)
    }

    async fn migrate_project(&self, project: &ProjectDescriptor) -> ProjectOutcome {
        let name = project.name.as_str();

        if self.ledger.is_completed(name) {
            info!(project = %name, "Already migrated, skipping");
            self.progress.report(MigrationPhase::Skipped, Some(name), None);
            return ProjectOutcome::Skipped;
        }

        self.progress.report(MigrationPhase::Resolving, Some(name), None);
        let destination = match self.resolver.resolve(name, &project.description).await {
            Ok(destination) => destination,
            Err(e) => {
                let reason = e.to_string();
                warn!(project = %name, error = %reason, "Destination resolution failed");
                self.progress
                    .report(MigrationPhase::Failed, Some(name), Some(reason.as_str()));
                return ProjectOutcome::Failed(reason);
            }
        };

        self.progress.report(
            MigrationPhase::Transferring,
            Some(name),
            destination.existed.then_some("existing repository"),
        );
        if let TransferOutcome::Failure(failure) =
            self.transporter.transfer(project, &destination).await
        {
            let stage = failure.stage;
            let reason = MigrationError::Transfer(failure).to_string();
            warn!(project = %name, ?stage, error = %reason, "Transfer failed");
            self.progress
                .report(MigrationPhase::Failed, Some(name), Some(reason.as_str()));
            return ProjectOutcome::Failed(reason);
        }

        let recorded = match self.ledger.mark_completed(name) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    project = %name,
                    error = %e,
                    "Transferred but not recorded; the next run will transfer it again"
                );
                false
            }
        };

        info!(project = %name, existed = destination.existed, "Project migrated");
        self.progress.report(
            MigrationPhase::Completed,
            Some(name),
            (!recorded).then_some("not recorded in ledger"),
        );
        ProjectOutcome::Succeeded { recorded }
    }
}
