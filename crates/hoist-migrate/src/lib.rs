//! # Hoist Migration Engine
//!
//! This crate moves every project a GitLab user owns to same-named GitHub
//! repositories, one project at a time, and records each completed project
//! in a ledger so an interrupted batch can simply be run again.
//!
//! ## Features
//!
//! - **Enumeration**: paginated listing of GitLab projects
//! - **Destination resolution**: reuse or create GitHub repositories
//! - **History transfer**: full mirror, or filtered to strip oversized blobs
//! - **Resumability**: append-only ledger of completed projects
//! - **Progress Tracking**: console progress bar or structured log events
//!
//! ## Example
//!
//! ```rust,ignore
//! use hoist_migrate::{
//!     BatchOrchestrator, DestinationConfig, MigrationConfig, SourceConfig, TransferStrategy,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = MigrationConfig::new(
//!         SourceConfig::new("https://gitlab.com", "glpat_xxx").with_username("octo"),
//!         DestinationConfig::new("octo", "ghp_xxx"),
//!     )
//!     .with_strategy(TransferStrategy::Filtered { max_blob_mb: 99 })
//!     .with_ledger_path("migrated.txt");
//!
//!     let summary = BatchOrchestrator::from_config(&config)?.run().await?;
//!
//!     summary.print_summary();
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod error;
pub mod git;
pub mod github;
pub mod gitlab;
pub mod ledger;
pub mod progress;
pub mod transfer;
pub mod types;
pub mod workarea;

// Re-export main types
pub use batch::BatchOrchestrator;
pub use error::{MigrationError, Result};
pub use git::{GitRunner, SystemGit};
pub use github::{DestinationResolver, GitHubResolver};
pub use gitlab::{GitLabEnumerator, SourceEnumerator};
pub use ledger::MigrationLedger;
pub use progress::{BatchProgress, ConsoleProgressReporter, MigrationPhase, ProgressCallback};
pub use transfer::{GitTransporter, HistoryTransporter};
pub use types::*;
pub use workarea::WorkingArea;

/// Version of the migration engine.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
