//! Configuration loading for hoist.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables prefixed with `HOIST_`, using `__` between
//!    sections (e.g., `HOIST_GITHUB__TOKEN`)
//! 3. Config file (`./hoist.toml`, or the path given with `--config`)
//! 4. Unprefixed variables `ACCESS_TOKEN`, `GITLAB_URL`, `GITLAB_USERNAME`,
//!    `GITHUB_USERNAME` and `GITHUB_TOKEN`, also read from `.env`
//! 5. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [gitlab]
//! url = "https://gitlab.com"
//! token = "glpat-..."
//! username = "octo"       # omit to migrate the token owner's projects
//! protocol = "http"       # or "ssh"
//!
//! [github]
//! username = "octo"
//! token = "ghp_..."
//! private = false
//!
//! [transfer]
//! strategy = "mirror"     # or "filtered"
//! max_blob_mb = 99
//! work_dir = "./hoist-work"
//!
//! [ledger]
//! path = "./migrated.txt"
//! ```

use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use hoist_migrate::{
    CloneProtocol, DestinationConfig, MigrationConfig, MigrationError, SourceConfig,
    TransferStrategy, Visibility, DEFAULT_GITHUB_API_URL, DEFAULT_GITLAB_URL, DEFAULT_MAX_BLOB_MB,
};
use serde::Deserialize;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "hoist.toml";

/// Unprefixed environment variables and the keys they set.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("GITLAB_URL", "gitlab.url"),
    ("ACCESS_TOKEN", "gitlab.token"),
    ("GITLAB_USERNAME", "gitlab.username"),
    ("GITHUB_USERNAME", "github.username"),
    ("GITHUB_TOKEN", "github.token"),
];

/// Top-level configuration.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    /// Source GitLab instance.
    #[validate(nested)]
    pub gitlab: GitLabSettings,
    /// Destination GitHub account.
    #[validate(nested)]
    pub github: GitHubSettings,
    /// History transfer options.
    #[validate(nested)]
    pub transfer: TransferSettings,
    /// Migration ledger.
    pub ledger: LedgerSettings,
}

/// GitLab configuration.
#[derive(Debug, Deserialize, Validate)]
#[serde(default)]
pub struct GitLabSettings {
    /// Instance URL.
    #[validate(url(message = "must be a valid URL"))]
    pub url: String,
    /// Personal access token.
    #[validate(length(min = 1, message = "is required (ACCESS_TOKEN or HOIST_GITLAB__TOKEN)"))]
    pub token: String,
    /// User whose projects are migrated.
    pub username: Option<String>,
    /// Clone URL flavor.
    pub protocol: CloneProtocol,
}

impl Default for GitLabSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_GITLAB_URL.to_string(),
            token: String::new(),
            username: None,
            protocol: CloneProtocol::default(),
        }
    }
}

/// GitHub configuration.
#[derive(Debug, Deserialize, Validate)]
#[serde(default)]
pub struct GitHubSettings {
    /// REST API base URL.
    #[validate(url(message = "must be a valid URL"))]
    pub api_url: String,
    /// Account receiving the repositories.
    #[validate(length(min = 1, message = "is required (GITHUB_USERNAME or HOIST_GITHUB__USERNAME)"))]
    pub username: String,
    /// Personal access token.
    #[validate(length(min = 1, message = "is required (GITHUB_TOKEN or HOIST_GITHUB__TOKEN)"))]
    pub token: String,
    /// Create new repositories as private.
    pub private: bool,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_GITHUB_API_URL.to_string(),
            username: String::new(),
            token: String::new(),
            private: false,
        }
    }
}

/// Transfer strategy names accepted in files, env and flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Exact mirror of every ref.
    #[default]
    Mirror,
    /// Strip oversized blobs, then push branches and tags.
    Filtered,
}

/// Transfer configuration.
#[derive(Debug, Deserialize, Validate)]
#[serde(default)]
pub struct TransferSettings {
    /// Strategy for every project.
    pub strategy: StrategyKind,
    /// Blob size threshold for the filtered strategy.
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub max_blob_mb: u64,
    /// Root directory for per-project working areas.
    pub work_dir: PathBuf,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            max_blob_mb: DEFAULT_MAX_BLOB_MB,
            work_dir: PathBuf::from("hoist-work"),
        }
    }
}

/// Ledger configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Ledger file path.
    pub path: PathBuf,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("migrated.txt"),
        }
    }
}

impl Settings {
    /// Load configuration from the environment and config files.
    ///
    /// `explicit` must exist when given; `./hoist.toml` is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = with_legacy_env(Config::builder(), |key| std::env::var(key).ok())?;

        match explicit {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
            }
            None => {
                let local = PathBuf::from(LOCAL_CONFIG_FILE);
                if local.exists() {
                    tracing::debug!("Loading config from ./{LOCAL_CONFIG_FILE}");
                    builder = builder.add_source(File::from(local).format(FileFormat::Toml).required(false));
                }
            }
        }

        Self::from_builder(builder.add_source(prefixed_env()))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }

    /// Check the whole configuration, reporting every problem at once.
    pub fn check(&self) -> Result<(), MigrationError> {
        self.validate().map_err(|e| configuration_error(&e))
    }

    /// Check only what listing source projects needs.
    pub fn check_source(&self) -> Result<(), MigrationError> {
        self.gitlab.validate().map_err(|e| configuration_error(&e))
    }

    /// Transfer strategy described by these settings.
    pub fn strategy(&self) -> TransferStrategy {
        match self.transfer.strategy {
            StrategyKind::Mirror => TransferStrategy::Mirror,
            StrategyKind::Filtered => TransferStrategy::Filtered {
                max_blob_mb: self.transfer.max_blob_mb,
            },
        }
    }

    /// Source half of the migration configuration.
    pub fn source_config(&self) -> SourceConfig {
        let mut source = SourceConfig::new(&self.gitlab.url, &self.gitlab.token)
            .with_protocol(self.gitlab.protocol);
        if let Some(username) = self.gitlab.username.as_deref().filter(|u| !u.is_empty()) {
            source = source.with_username(username);
        }
        source
    }

    /// Validate and convert into the immutable migration configuration.
    pub fn into_migration_config(self) -> Result<MigrationConfig, MigrationError> {
        self.check()?;

        let visibility = if self.github.private {
            Visibility::Private
        } else {
            Visibility::Public
        };
        let destination = DestinationConfig::new(&self.github.username, &self.github.token)
            .with_api_url(&self.github.api_url)
            .with_visibility(visibility);

        Ok(MigrationConfig::new(self.source_config(), destination)
            .with_strategy(self.strategy())
            .with_work_dir(self.transfer.work_dir)
            .with_ledger_path(self.ledger.path))
    }
}

/// Seed defaults from unprefixed variables so every other source overrides them.
fn with_legacy_env(
    mut builder: ConfigBuilder<DefaultState>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    for (var, key) in LEGACY_ENV {
        if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
            builder = builder.set_default(*key, value)?;
        }
    }
    Ok(builder)
}

fn prefixed_env() -> Environment {
    Environment::with_prefix("HOIST")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn configuration_error(errors: &ValidationErrors) -> MigrationError {
    let mut problems = Vec::new();
    collect_problems(errors, "", &mut problems);
    problems.sort();
    MigrationError::Configuration(problems.join("; "))
}

fn collect_problems(errors: &ValidationErrors, prefix: &str, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                for e in errs {
                    let message = e
                        .message
                        .as_ref()
                        .map_or_else(|| format!("failed {} check", e.code), ToString::to_string);
                    out.push(format!("{path} {message}"));
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_problems(nested, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_problems(nested, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}
