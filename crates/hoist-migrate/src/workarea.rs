//! Scoped per-project working areas.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A local directory reserved for one project's transfer.
///
/// The directory itself is not created, since `git clone` expects to create
/// it. Whatever exists at the path when the guard is dropped is removed.
#[derive(Debug)]
pub struct WorkingArea {
    path: PathBuf,
    released: bool,
}

impl WorkingArea {
    /// Reserve `<root>/<name>`, removing any leftover from an earlier run.
    pub fn acquire(root: &Path, name: &str) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let path = root.join(name);

        if path.exists() {
            debug!(path = %path.display(), "Removing stale working area");
            remove_tree(&path)?;
        }

        Ok(Self {
            path,
            released: false,
        })
    }

    /// Path of the working area.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the working area now and report any error.
    pub fn release(mut self) -> std::io::Result<()> {
        self.released = true;
        if self.path.exists() {
            remove_tree(&self.path)?;
        }
        Ok(())
    }
}

impl Drop for WorkingArea {
    fn drop(&mut self) {
        if self.released || !self.path.exists() {
            return;
        }
        if let Err(e) = remove_tree(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove working area");
        }
    }
}

/// Remove a directory tree, clearing read-only flags and retrying once if
/// the first attempt is refused.
fn remove_tree(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            debug!(path = %path.display(), "Clearing read-only flags before retry");
            clear_readonly(path);
            std::fs::remove_dir_all(path)
        }
        other => other,
    }
}

#[allow(clippy::permissions_set_readonly_false)]
fn clear_readonly(path: &Path) {
    for entry in WalkDir::new(path).into_iter().filter_map(std::result::Result::ok) {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let mut permissions = metadata.permissions();
        if permissions.readonly() {
            permissions.set_readonly(false);
            let _ = std::fs::set_permissions(entry.path(), permissions);
        }
    }
}
