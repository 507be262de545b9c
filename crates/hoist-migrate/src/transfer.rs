//! History transfer between source and destination.

use crate::git::{redact, with_credentials, GitRunner, SystemGit};
use crate::types::{
    DestinationRepository, MigrationConfig, ProjectDescriptor, TransferFailure, TransferOutcome,
    TransferStage, TransferStrategy,
};
use crate::workarea::WorkingArea;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Username GitLab expects alongside a personal access token.
const GITLAB_TOKEN_USER: &str = "oauth2";

/// Moves one project's history to its destination.
#[async_trait]
pub trait HistoryTransporter: Send + Sync {
    /// Transfer `project` into `destination`.
    ///
    /// Any local working state is gone by the time this returns.
    async fn transfer(
        &self,
        project: &ProjectDescriptor,
        destination: &DestinationRepository,
    ) -> TransferOutcome;
}

/// Transfers history with the git command line.
pub struct GitTransporter<G = SystemGit> {
    git: G,
    strategy: TransferStrategy,
    work_dir: PathBuf,
    source_token: String,
    destination_owner: String,
    destination_token: String,
}

impl GitTransporter<SystemGit> {
    /// Create a transporter that runs the system git.
    pub fn new(config: &MigrationConfig) -> Self {
        Self::with_runner(config, SystemGit::new())
    }
}

impl<G: GitRunner> GitTransporter<G> {
    /// Create a transporter with a custom git runner.
    pub fn with_runner(config: &MigrationConfig, git: G) -> Self {
        Self {
            git,
            strategy: config.strategy,
            work_dir: config.work_dir.clone(),
            source_token: config.source.token.clone(),
            destination_owner: config.destination.owner.clone(),
            destination_token: config.destination.token.clone(),
        }
    }

    async fn mirror(
        &self,
        project: &ProjectDescriptor,
        destination: &DestinationRepository,
        area: &Path,
    ) -> Result<(), TransferFailure> {
        let source = self.source_url(project);
        self.git(
            None,
            TransferStage::Clone,
            &["clone", "--mirror", source.as_str(), path_arg(area).as_str()],
        )
        .await?;
        self.forget_credentials(project, area).await?;

        let target = self.destination_url(destination);
        self.git(Some(area), TransferStage::Push, &["push", "--mirror", target.as_str()])
            .await?;
        Ok(())
    }

    async fn filtered(
        &self,
        project: &ProjectDescriptor,
        destination: &DestinationRepository,
        area: &Path,
        max_blob_mb: u64,
    ) -> Result<(), TransferFailure> {
        let source = self.source_url(project);
        self.git(
            None,
            TransferStage::Clone,
            &["clone", source.as_str(), path_arg(area).as_str()],
        )
        .await?;
        self.forget_credentials(project, area).await?;

        let before = self.count_commits(area).await?;
        let threshold = format!("{max_blob_mb}M");
        self.git(
            Some(area),
            TransferStage::Filter,
            &[
                "filter-repo",
                "--force",
                "--strip-blobs-bigger-than",
                threshold.as_str(),
                "--prune-empty",
                "never",
                "--prune-degenerate",
                "never",
            ],
        )
        .await?;
        let after = self.count_commits(area).await?;
        if before != after {
            return Err(TransferFailure::new(
                TransferStage::Filter,
                format!("commit count changed from {before} to {after}"),
            ));
        }
        debug!(project = %project.name, commits = after, "History rewritten");

        let target = self.destination_url(destination);
        self.git(Some(area), TransferStage::Push, &["push", "--all", target.as_str()])
            .await?;
        self.git(Some(area), TransferStage::Push, &["push", "--tags", target.as_str()])
            .await?;
        Ok(())
    }

    /// Point `origin` at the plain source locator so no token stays in the
    /// local git config.
    async fn forget_credentials(
        &self,
        project: &ProjectDescriptor,
        area: &Path,
    ) -> Result<(), TransferFailure> {
        self.git(
            Some(area),
            TransferStage::Clone,
            &["remote", "set-url", "origin", project.source_clone_locator.as_str()],
        )
        .await?;
        Ok(())
    }

    async fn count_commits(&self, area: &Path) -> Result<u64, TransferFailure> {
        let stdout = self
            .git(Some(area), TransferStage::Filter, &["rev-list", "--all", "--count"])
            .await?;
        stdout.trim().parse().map_err(|_| {
            TransferFailure::new(
                TransferStage::Filter,
                format!("unexpected commit count output: {}", stdout.trim()),
            )
        })
    }

    fn source_url(&self, project: &ProjectDescriptor) -> String {
        with_credentials(
            &project.source_clone_locator,
            GITLAB_TOKEN_USER,
            &self.source_token,
        )
    }

    fn destination_url(&self, destination: &DestinationRepository) -> String {
        with_credentials(
            &destination.clone_locator,
            &self.destination_owner,
            &self.destination_token,
        )
    }

    /// Run git and map a failed invocation to `stage`.
    async fn git(
        &self,
        cwd: Option<&Path>,
        stage: TransferStage,
        args: &[&str],
    ) -> Result<String, TransferFailure> {
        let args: Vec<String> = args.iter().map(|a| (*a).to_string()).collect();
        let output = self
            .git
            .run(cwd, &args)
            .await
            .map_err(|e| TransferFailure::new(stage, format!("could not run git: {e}")))?;

        if output.success {
            Ok(output.stdout)
        } else {
            let detail = redact(output.stderr.trim());
            debug!(stage = ?stage, command = args.first().map(String::as_str), stderr = %detail, "git failed");
            Err(TransferFailure::new(stage, detail))
        }
    }
}

#[async_trait]
impl<G: GitRunner> HistoryTransporter for GitTransporter<G> {
    async fn transfer(
        &self,
        project: &ProjectDescriptor,
        destination: &DestinationRepository,
    ) -> TransferOutcome {
        let area = match WorkingArea::acquire(&self.work_dir, &project.name) {
            Ok(area) => area,
            Err(e) => {
                return TransferFailure::new(TransferStage::WorkingArea, e.to_string()).into();
            }
        };

        info!(project = %project.name, strategy = %self.strategy, "Transferring history");
        let result = match self.strategy {
            TransferStrategy::Mirror => self.mirror(project, destination, area.path()).await,
            TransferStrategy::Filtered { max_blob_mb } => {
                self.filtered(project, destination, area.path(), max_blob_mb)
                    .await
            }
        };

        let area_path = area.path().to_path_buf();
        if let Err(e) = area.release() {
            warn!(
                project = %project.name,
                path = %area_path.display(),
                error = %e,
                "Working area left behind; it will be removed on the next run"
            );
        }

        match result {
            Ok(()) => TransferOutcome::Success,
            Err(failure) => TransferOutcome::Failure(failure),
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
