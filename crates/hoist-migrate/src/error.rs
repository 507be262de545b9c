//! Error types for migration operations.

use crate::types::TransferFailure;
use thiserror::Error;

/// Migration-specific errors.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The source project listing could not be retrieved in full.
    ///
    /// Fatal for the whole batch.
    #[error("Project listing failed: {0}")]
    RemoteListing(String),

    /// The destination repository could not be probed or created.
    #[error("Repository creation failed for {name}: {message}")]
    RepositoryCreation {
        /// Project name the destination was resolved for.
        name: String,
        /// Description of the failure.
        message: String,
    },

    /// History transfer failed at one of its stages.
    #[error("Transfer failed: {0}")]
    Transfer(TransferFailure),

    /// Completion could not be appended to the ledger.
    #[error("Ledger write failed for {name}: {source}")]
    LedgerWrite {
        /// Project name that was being recorded.
        name: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Missing or invalid startup configuration.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrationError {
    /// Build a repository creation error.
    pub fn creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RepositoryCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Whether this error aborts the whole batch rather than a single project.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RemoteListing(_) | Self::Configuration(_))
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;
