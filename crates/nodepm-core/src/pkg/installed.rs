//! Inspection of the project's installed dependencies.

use super::manager::PackageManager;
use crate::error::Error;
use crate::host::{FileStat, Host};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// `package.json` sections whose entries may be installed.
const DEPENDENCY_FIELDS: &[&str] = &[
    "dependencies",
    "devDependencies",
    "optionalDependencies",
    "peerDependencies",
];

/// A dependency resolved to a directory on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    /// The package directory.
    pub path: PathBuf,
}

#[derive(Deserialize)]
struct InstalledManifest {
    #[serde(default)]
    version: String,
}

impl PackageManager {
    /// Locate `name` the way Node resolves it: `node_modules/<name>` in the
    /// project directory, then in each ancestor.
    pub async fn get_installed_package(&self, name: &str) -> Result<Option<InstalledPackage>, Error> {
        self.ensure_installed()?;
        find_installed(self.host.as_ref(), &self.cwd, name).await
    }

    /// Installed packages for every dependency the project's `package.json`
    /// declares. Declared but missing packages are left out.
    pub async fn get_project_dependencies(
        &self,
    ) -> Result<BTreeMap<String, InstalledPackage>, Error> {
        self.ensure_installed()?;
        let host = self.host.as_ref();

        let manifest = self.cwd.join("package.json");
        let contents = match host.read_file(&manifest).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(Error::io(&manifest, e)),
        };
        let value: Value = serde_json::from_str(&contents)
            .map_err(|e| Error::json(manifest.display().to_string(), e))?;

        let names: BTreeSet<&str> = DEPENDENCY_FIELDS
            .iter()
            .filter_map(|field| value.get(*field)?.as_object())
            .flat_map(|deps| deps.keys().map(String::as_str))
            .collect();

        let lookups = names
            .iter()
            .map(|name| find_installed(host, &self.cwd, name));
        let mut installed = BTreeMap::new();
        for package in join_all(lookups).await {
            if let Some(package) = package? {
                installed.insert(package.name.clone(), package);
            }
        }
        Ok(installed)
    }
}

async fn find_installed(
    host: &dyn Host,
    project: &Path,
    name: &str,
) -> Result<Option<InstalledPackage>, Error> {
    for dir in project.ancestors() {
        let package_dir = dir.join("node_modules").join(name);
        let manifest = package_dir.join("package.json");
        if !matches!(host.stat(&manifest).await, Ok(Some(FileStat { is_file: true, .. }))) {
            continue;
        }

        let contents = host
            .read_file(&manifest)
            .await
            .map_err(|e| Error::io(&manifest, e))?;
        let parsed: InstalledManifest = serde_json::from_str(&contents)
            .map_err(|e| Error::json(manifest.display().to_string(), e))?;
        return Ok(Some(InstalledPackage {
            name: name.to_string(),
            version: parsed.version,
            path: package_dir,
        }));
    }
    Ok(None)
}
