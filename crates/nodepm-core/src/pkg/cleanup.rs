//! Process-exit safety net for temp package directories.
//!
//! [`TempCleanup::run`](super::temp::TempCleanup::run) is the primary cleanup
//! path. Directories still registered here when the process shuts down are
//! removed by [`ExitCleanupGuard`] instead.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{debug, warn};

fn registry() -> MutexGuard<'static, BTreeSet<PathBuf>> {
    static PENDING: OnceLock<Mutex<BTreeSet<PathBuf>>> = OnceLock::new();
    PENDING
        .get_or_init(|| Mutex::new(BTreeSet::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Track `dir` for removal at exit.
pub fn register(dir: &Path) {
    registry().insert(dir.to_path_buf());
}

/// Stop tracking `dir`. Returns whether it was registered.
pub fn deregister(dir: &Path) -> bool {
    registry().remove(dir)
}

/// Directories currently awaiting exit cleanup.
#[must_use]
pub fn pending() -> Vec<PathBuf> {
    registry().iter().cloned().collect()
}

/// Remove every registered directory, best effort.
///
/// Runs synchronously so it also works from `Drop` after the async runtime is
/// gone. Returns how many directories were removed.
pub fn remove_pending() -> usize {
    let dirs = std::mem::take(&mut *registry());
    let mut removed = 0;
    for dir in dirs {
        match nodepm_util::fs::remove_dir_all_if_exists(&dir) {
            Ok(()) => {
                debug!(dir = %dir.display(), "removed leftover temp package");
                removed += 1;
            }
            Err(e) => warn!(dir = %dir.display(), error = %e, "failed to remove temp package"),
        }
    }
    removed
}

/// Removes pending temp directories when dropped.
///
/// Hold one for the lifetime of the process (e.g. in `main`).
#[derive(Debug)]
#[must_use = "leftover temp packages are removed when the guard is dropped"]
pub struct ExitCleanupGuard {
    _private: (),
}

impl Drop for ExitCleanupGuard {
    fn drop(&mut self) {
        remove_pending();
    }
}

/// Create the exit guard.
pub fn install_exit_guard() -> ExitCleanupGuard {
    ExitCleanupGuard { _private: () }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_register_and_deregister() {
        let dir = PathBuf::from("/nodepm-test/not-real");
        register(&dir);
        assert!(pending().contains(&dir));

        assert!(deregister(&dir));
        assert!(!deregister(&dir));
        assert!(!pending().contains(&dir));
    }

    #[test]
    #[serial]
    fn test_guard_removes_leftovers() {
        let root = tempfile::tempdir().unwrap();
        let leftover = root.path().join("pkg");
        std::fs::create_dir_all(leftover.join("node_modules")).unwrap();
        std::fs::write(leftover.join("package.json"), "{}").unwrap();
        let already_gone = root.path().join("gone");

        register(&leftover);
        register(&already_gone);
        drop(install_exit_guard());

        assert!(!leftover.exists());
        assert!(!pending().contains(&leftover));
        assert!(!pending().contains(&already_gone));
    }
}
