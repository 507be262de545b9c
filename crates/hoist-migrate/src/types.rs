//! Common types for migration operations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default GitLab instance.
pub const DEFAULT_GITLAB_URL: &str = "https://gitlab.com";

/// Default GitHub REST API base.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Default blob size threshold for the filtered strategy, in megabytes.
///
/// GitHub rejects files of 100 MB and above.
pub const DEFAULT_MAX_BLOB_MB: u64 = 99;

/// A project discovered on the source host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    /// Project path, reused as the destination repository name.
    pub name: String,

    /// Free-form description, empty when the source has none.
    #[serde(default)]
    pub description: String,

    /// Locator used to clone the project from the source.
    pub source_clone_locator: String,
}

impl ProjectDescriptor {
    /// Create a new project descriptor.
    pub fn new(name: impl Into<String>, source_clone_locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            source_clone_locator: source_clone_locator.into(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A destination repository resolved for a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationRepository {
    /// Locator to push history to.
    pub clone_locator: String,

    /// Whether the repository was present before this run.
    pub existed: bool,
}

/// Stage of a history transfer that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStage {
    /// The local working area could not be prepared.
    WorkingArea,
    /// Cloning from the source.
    Clone,
    /// Rewriting history to drop oversized blobs.
    Filter,
    /// Pushing to the destination.
    Push,
}

impl std::fmt::Display for TransferStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WorkingArea => write!(f, "working area unavailable"),
            Self::Clone => write!(f, "source unreachable or auth rejected"),
            Self::Filter => write!(f, "filter step failed"),
            Self::Push => write!(f, "destination rejected push"),
        }
    }
}

/// A classified transfer failure with redacted diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFailure {
    /// Stage that failed.
    pub stage: TransferStage,

    /// Diagnostic output, with credentials removed.
    pub detail: String,
}

impl TransferFailure {
    /// Create a new transfer failure.
    pub fn new(stage: TransferStage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let detail = self.detail.trim();
        if detail.is_empty() {
            write!(f, "{}", self.stage)
        } else {
            write!(f, "{}: {detail}", self.stage)
        }
    }
}

/// Result of transferring one project's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// All refs reached the destination.
    Success,
    /// The transfer failed; the working area has already been released.
    Failure(TransferFailure),
}

impl TransferOutcome {
    /// Check if the transfer succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<TransferFailure> for TransferOutcome {
    fn from(failure: TransferFailure) -> Self {
        Self::Failure(failure)
    }
}

/// Visibility of newly created destination repositories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Visible to everyone.
    #[default]
    Public,
    /// Visible to the owner and collaborators.
    Private,
}

impl Visibility {
    /// Whether this visibility is private.
    pub fn is_private(self) -> bool {
        matches!(self, Self::Private)
    }
}

/// How history is moved from source to destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferStrategy {
    /// Exact copy of every ref.
    #[default]
    Mirror,
    /// Branches and tags with blobs above the threshold removed from history.
    Filtered {
        /// Blob size threshold in megabytes.
        max_blob_mb: u64,
    },
}

impl std::fmt::Display for TransferStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mirror => write!(f, "mirror"),
            Self::Filtered { max_blob_mb } => write!(f, "filtered (>{max_blob_mb}M stripped)"),
        }
    }
}

/// Which source clone URL to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloneProtocol {
    /// `http_url_to_repo`, authenticated with the source token.
    #[default]
    Http,
    /// `ssh_url_to_repo`, authenticated by the local SSH agent.
    Ssh,
}

/// Source host settings.
#[derive(Clone)]
pub struct SourceConfig {
    /// GitLab instance URL (e.g., "https://gitlab.com").
    pub url: String,

    /// Personal access token.
    pub token: String,

    /// User whose projects are listed; the token owner when unset.
    pub username: Option<String>,

    /// Clone URL flavor.
    pub protocol: CloneProtocol,
}

impl SourceConfig {
    /// Create source settings for a GitLab instance.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            username: None,
            protocol: CloneProtocol::default(),
        }
    }

    /// List projects of this user instead of the token owner.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the clone protocol.
    pub fn with_protocol(mut self, protocol: CloneProtocol) -> Self {
        self.protocol = protocol;
        self
    }
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("url", &self.url)
            .field("token", &"***")
            .field("username", &self.username)
            .field("protocol", &self.protocol)
            .finish()
    }
}

/// Destination host settings.
#[derive(Clone)]
pub struct DestinationConfig {
    /// REST API base URL.
    pub api_url: String,

    /// Account that owns the destination repositories.
    pub owner: String,

    /// Personal access token with repository scope.
    pub token: String,

    /// Visibility for repositories created by this run.
    pub visibility: Visibility,
}

impl DestinationConfig {
    /// Create destination settings for a GitHub account.
    pub fn new(owner: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_GITHUB_API_URL.to_string(),
            owner: owner.into(),
            token: token.into(),
            visibility: Visibility::default(),
        }
    }

    /// Set the API base URL.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Set the visibility of created repositories.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

impl std::fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationConfig")
            .field("api_url", &self.api_url)
            .field("owner", &self.owner)
            .field("token", &"***")
            .field("visibility", &self.visibility)
            .finish()
    }
}

/// Immutable settings for one migration run.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Source host.
    pub source: SourceConfig,

    /// Destination host.
    pub destination: DestinationConfig,

    /// Transfer strategy.
    pub strategy: TransferStrategy,

    /// Directory under which per-project working areas are created.
    pub work_dir: PathBuf,

    /// Path of the migration ledger.
    pub ledger_path: PathBuf,
}

impl MigrationConfig {
    /// Create a new migration configuration.
    pub fn new(source: SourceConfig, destination: DestinationConfig) -> Self {
        Self {
            source,
            destination,
            strategy: TransferStrategy::default(),
            work_dir: PathBuf::from("hoist-work"),
            ledger_path: PathBuf::from("migrated.txt"),
        }
    }

    /// Set the transfer strategy.
    pub fn with_strategy(mut self, strategy: TransferStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the working directory root.
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Set the ledger path.
    pub fn with_ledger_path(mut self, ledger_path: impl Into<PathBuf>) -> Self {
        self.ledger_path = ledger_path.into();
        self
    }
}

/// A project that failed during a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectFailure {
    /// Project name.
    pub name: String,

    /// Human-readable reason.
    pub reason: String,
}

/// Aggregate result of a batch run.
///
/// Every enumerated project lands in exactly one of succeeded, skipped, or
/// failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Number of projects enumerated.
    pub total: usize,

    /// Projects transferred during this run.
    pub succeeded_count: usize,

    /// Projects already in the ledger.
    pub skipped_count: usize,

    /// Names of failed projects in enumeration order.
    pub failed_names: Vec<String>,

    /// Failure reasons, parallel to `failed_names`.
    pub failures: Vec<ProjectFailure>,

    /// Succeeded projects whose ledger entry could not be written.
    pub unrecorded: Vec<String>,
}

impl BatchSummary {
    /// Create an empty summary for a batch of `total` projects.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Record a project skipped because it is already completed.
    pub fn record_skipped(&mut self) {
        self.skipped_count += 1;
    }

    /// Record a project transferred during this run.
    pub fn record_succeeded(&mut self) {
        self.succeeded_count += 1;
    }

    /// Record a failed project.
    pub fn record_failed(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        let name = name.into();
        self.failed_names.push(name.clone());
        self.failures.push(ProjectFailure {
            name,
            reason: reason.into(),
        });
    }

    /// Record a succeeded project that is missing from the ledger.
    pub fn record_unrecorded(&mut self, name: impl Into<String>) {
        self.unrecorded.push(name.into());
    }

    /// Number of failed projects.
    pub fn failed_count(&self) -> usize {
        self.failed_names.len()
    }

    /// Check if no project failed.
    pub fn is_successful(&self) -> bool {
        self.failed_names.is_empty()
    }

    /// Check that the three outcome groups cover the batch exactly.
    pub fn is_partition(&self) -> bool {
        self.succeeded_count + self.skipped_count + self.failed_count() == self.total
    }

    /// Print summary to stdout.
    pub fn print_summary(&self) {
        println!("\n=== Migration Summary ===\n");
        println!("Projects found:        {}", self.total);
        println!("Successfully migrated: {}", self.succeeded_count);
        println!("Already migrated:      {}", self.skipped_count);
        println!("Failed:                {}", self.failed_count());

        if !self.failures.is_empty() {
            println!("\nFailed projects ({}):", self.failures.len());
            for failure in &self.failures {
                println!("  ✗ {}: {}", failure.name, failure.reason);
            }
        }

        if !self.unrecorded.is_empty() {
            println!("\nMigrated but not recorded in the ledger:");
            for name in &self.unrecorded {
                println!("  - {name}");
            }
        }

        let status = if self.is_successful() {
            "✓ SUCCESS"
        } else {
            "✗ COMPLETED WITH FAILURES"
        };
        println!("\nOverall Status: {status}");
    }
}
