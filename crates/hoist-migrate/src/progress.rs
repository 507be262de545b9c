//! Progress tracking for batch migrations.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Progress update information.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current phase.
    pub phase: MigrationPhase,

    /// Project the update refers to.
    pub project: Option<String>,

    /// Projects finished so far, whatever their outcome.
    pub completed: u64,

    /// Projects in the batch.
    pub total: u64,

    /// Optional message.
    pub message: Option<String>,
}

/// Phases reported during a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    /// Listing source projects.
    Listing,
    /// Project already in the ledger.
    Skipped,
    /// Finding or creating the destination repository.
    Resolving,
    /// Moving history.
    Transferring,
    /// Project transferred and recorded.
    Completed,
    /// Project failed.
    Failed,
    /// All projects processed.
    Finished,
}

impl std::fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Listing => write!(f, "Listing projects"),
            Self::Skipped => write!(f, "Already migrated"),
            Self::Resolving => write!(f, "Resolving destination"),
            Self::Transferring => write!(f, "Transferring history"),
            Self::Completed => write!(f, "Migrated"),
            Self::Failed => write!(f, "Failed"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}

impl MigrationPhase {
    /// Whether this phase ends a project.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Skipped | Self::Completed | Self::Failed)
    }
}

/// Progress tracker for a batch.
pub struct BatchProgress {
    completed: AtomicU64,
    total: AtomicU64,
    callback: Option<ProgressCallback>,
}

impl BatchProgress {
    /// Create a new progress tracker.
    pub fn new() -> Self {
        Self {
            completed: AtomicU64::new(0),
            total: AtomicU64::new(0),
            callback: None,
        }
    }

    /// Create a progress tracker with a callback.
    pub fn with_callback(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            ..Self::new()
        }
    }

    /// Set the number of projects in the batch.
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
    }

    /// Report a phase, counting the project as done if the phase is terminal.
    pub fn report(&self, phase: MigrationPhase, project: Option<&str>, message: Option<&str>) {
        if phase.is_terminal() {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        self.notify(phase, project, message);
    }

    /// Projects finished so far.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    fn notify(&self, phase: MigrationPhase, project: Option<&str>, message: Option<&str>) {
        if let Some(callback) = &self.callback {
            callback(ProgressUpdate {
                phase,
                project: project.map(str::to_string),
                completed: self.completed(),
                total: self.total.load(Ordering::SeqCst),
                message: message.map(str::to_string),
            });
        }
    }
}

impl Default for BatchProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Console progress reporter using indicatif.
pub struct ConsoleProgressReporter {
    progress_bar: indicatif::ProgressBar,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter.
    pub fn new() -> Self {
        let progress_bar = indicatif::ProgressBar::new(0);
        let style = indicatif::ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
            .progress_chars("#>-");
        progress_bar.set_style(style);

        Self { progress_bar }
    }

    /// Create a progress callback that drives the bar.
    pub fn callback(&self) -> ProgressCallback {
        let pb = self.progress_bar.clone();
        Box::new(move |update: ProgressUpdate| {
            pb.set_length(update.total);
            pb.set_position(update.completed);

            let mut msg = update.phase.to_string();
            if let Some(project) = &update.project {
                msg = format!("{msg}: {project}");
            }
            if let Some(message) = &update.message {
                msg = format!("{msg} - {message}");
            }

            if update.phase == MigrationPhase::Failed {
                pb.println(format!("{} {msg}", console::style("✗").red()));
            } else if update.phase == MigrationPhase::Completed {
                pb.println(format!("{} {msg}", console::style("✓").green()));
            }
            pb.set_message(msg);
        })
    }

    /// Finish the progress bar.
    pub fn finish(&self, message: &str) {
        self.progress_bar.finish_with_message(message.to_string());
    }
}

impl Default for ConsoleProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress callback that writes each update to the log instead of a bar.
pub fn logging_callback() -> ProgressCallback {
    Box::new(|update: ProgressUpdate| {
        let project = update.project.as_deref().unwrap_or("-");
        match &update.message {
            Some(message) => info!(
                phase = %update.phase,
                project,
                completed = update.completed,
                total = update.total,
                "{message}"
            ),
            None => info!(
                phase = %update.phase,
                project,
                completed = update.completed,
                total = update.total,
                "progress"
            ),
        }
    })
}
