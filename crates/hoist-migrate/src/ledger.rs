//! Durable record of completed projects.
//!
//! The ledger is a plain text file with one project name per line. It is
//! only ever appended to. A snapshot is read once when the ledger is opened
//! and all skip decisions for the run are made against that snapshot.

use crate::error::{MigrationError, Result};

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Append-only set of completed project names.
#[derive(Debug)]
pub struct MigrationLedger {
    path: PathBuf,
    snapshot: HashSet<String>,
}

impl MigrationLedger {
    /// Open the ledger at `path`, reading its current contents.
    ///
    /// A missing file is treated as an empty ledger.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let snapshot = match std::fs::read_to_string(&path) {
            Ok(contents) => contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(MigrationError::Io(e)),
        };

        debug!(path = %path.display(), entries = snapshot.len(), "Loaded migration ledger");
        Ok(Self { path, snapshot })
    }

    /// Path of the ledger file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `name` was completed before this run started.
    pub fn is_completed(&self, name: &str) -> bool {
        self.snapshot.contains(name)
    }

    /// Number of names in the snapshot.
    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Snapshot entries in sorted order.
    pub fn entries(&self) -> Vec<&str> {
        let mut entries: Vec<&str> = self.snapshot.iter().map(String::as_str).collect();
        entries.sort_unstable();
        entries
    }

    /// Append `name` and flush it to stable storage before returning.
    ///
    /// The in-memory snapshot is left untouched.
    pub fn mark_completed(&self, name: &str) -> Result<()> {
        self.append(name).map_err(|source| MigrationError::LedgerWrite {
            name: name.to_string(),
            source,
        })
    }

    fn append(&self, name: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;

        let mut line = String::with_capacity(name.len() + 2);
        if !ends_with_newline(&mut file)? {
            line.push('\n');
        }
        line.push_str(name);
        line.push('\n');

        file.write_all(line.as_bytes())?;
        file.sync_all()?;

        debug!(project = %name, path = %self.path.display(), "Recorded completion");
        Ok(())
    }
}

/// True for empty files and files whose last byte is a newline.
fn ends_with_newline(file: &mut std::fs::File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = MigrationLedger::open(dir.path().join("migrated.txt")).unwrap();

        assert!(ledger.is_empty());
        assert!(!ledger.is_completed("alpha"));
    }

    #[test]
    fn test_mark_completed_appends_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("migrated.txt");
        let ledger = MigrationLedger::open(&path).unwrap();

        ledger.mark_completed("alpha").unwrap();
        ledger.mark_completed("beta").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "alpha\nbeta\n");
    }

    #[test]
    fn test_snapshot_is_fixed_for_the_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("migrated.txt");
        let ledger = MigrationLedger::open(&path).unwrap();

        ledger.mark_completed("alpha").unwrap();
        assert!(!ledger.is_completed("alpha"));

        let reopened = MigrationLedger::open(&path).unwrap();
        assert!(reopened.is_completed("alpha"));
    }

    #[test]
    fn test_existing_entries_are_preserved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("migrated.txt");
        std::fs::write(&path, "alpha\n\n  beta  \n").unwrap();

        let ledger = MigrationLedger::open(&path).unwrap();
        assert_eq!(ledger.entries(), vec!["alpha", "beta"]);

        ledger.mark_completed("gamma").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("alpha\n\n  beta  \n"));
        assert!(contents.ends_with("gamma\n"));
    }

    #[test]
    fn test_missing_trailing_newline_is_repaired() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("migrated.txt");
        std::fs::write(&path, "alpha").unwrap();

        let ledger = MigrationLedger::open(&path).unwrap();
        ledger.mark_completed("beta").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "alpha\nbeta\n");
        let reopened = MigrationLedger::open(&path).unwrap();
        assert!(reopened.is_completed("alpha"));
        assert!(reopened.is_completed("beta"));
    }

    #[test]
    fn test_write_failure_names_project() {
        let dir = TempDir::new().unwrap();
        // A directory at the ledger path cannot be opened for appending.
        let path = dir.path().join("ledger");
        std::fs::create_dir(&path).unwrap();

        let ledger = MigrationLedger {
            path,
            snapshot: HashSet::new(),
        };
        let err = ledger.mark_completed("alpha").unwrap_err();
        assert!(matches!(err, MigrationError::LedgerWrite { ref name, .. } if name == "alpha"));
    }
}
