//! Package manager discovery.
//!
//! Walks up from a starting directory looking for lockfiles. Every lockfile of
//! one directory is probed concurrently; the next directory up is only probed
//! once the current one is fully known. The walk stops at the first directory
//! holding any recognized lockfile, at a `.git` boundary, or at the
//! filesystem root.

use super::descriptor::{PackageManagerName, PRECEDENCE};
use crate::host::{is_present, Host};
use futures::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Marker of a repository boundary.
const REPOSITORY_MARKER: &str = ".git";

/// A package manager inferred from a lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredPackageManager {
    pub name: PackageManagerName,
    /// Directory holding the lockfile.
    pub directory: PathBuf,
    /// The winning lockfile's name.
    pub lockfile: &'static str,
}

/// Find the package manager governing `start_dir`.
///
/// Never fails: unreadable paths count as absent.
pub async fn discover(host: &dyn Host, start_dir: &Path) -> Option<PackageManagerName> {
    find_package_manager(host, start_dir)
        .await
        .map(|found| found.name)
}

/// Like [`discover`], also reporting where the decisive lockfile was.
pub async fn find_package_manager(
    host: &dyn Host,
    start_dir: &Path,
) -> Option<DiscoveredPackageManager> {
    let mut current = start_dir.to_path_buf();

    loop {
        if let Some(found) = detect_in_directory(host, &current).await {
            debug!(
                manager = %found.name,
                lockfile = found.lockfile,
                dir = %current.display(),
                "discovered package manager"
            );
            return Some(found);
        }

        if is_present(host, &current.join(REPOSITORY_MARKER)).await {
            debug!(dir = %current.display(), "no lockfile up to repository boundary");
            return None;
        }

        match current.parent() {
            Some(parent) if parent != current => current = parent.to_path_buf(),
            _ => {
                debug!("no lockfile up to filesystem root");
                return None;
            }
        }
    }
}

/// Probe one directory, resolving ties through [`PRECEDENCE`].
async fn detect_in_directory(host: &dyn Host, dir: &Path) -> Option<DiscoveredPackageManager> {
    let probes = PRECEDENCE.iter().flat_map(|&name| {
        name.descriptor()
            .lockfiles
            .iter()
            .map(move |&lockfile| (name, lockfile))
    });

    let checks = probes.map(|(name, lockfile)| async move {
        let present = is_present(host, &dir.join(lockfile)).await;
        trace!(dir = %dir.display(), lockfile, present, "probed lockfile");
        (name, lockfile, present)
    });

    let found: Vec<(PackageManagerName, &'static str)> = join_all(checks)
        .await
        .into_iter()
        .filter(|&(_, _, present)| present)
        .map(|(name, lockfile, _)| (name, lockfile))
        .collect();

    PRECEDENCE.iter().find_map(|&winner| {
        found
            .iter()
            .find(|(name, _)| *name == winner)
            .map(|&(name, lockfile)| DiscoveredPackageManager {
                name,
                directory: dir.to_path_buf(),
                lockfile,
            })
    })
}
