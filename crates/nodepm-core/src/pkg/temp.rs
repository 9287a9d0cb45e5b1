//! Scoped temp packages.
//!
//! A temp package is a throwaway directory with a placeholder `package.json`
//! into which one specifier is installed. The caller owns the directory
//! until it runs [`TempCleanup::run`]; the [`cleanup`](super::cleanup)
//! registry removes it at exit otherwise.

use super::cleanup;
use super::manager::{push_flag, read_manifest, to_args, PackageManager};
use super::registry::PackageManifest;
use super::spec::PackageSpecifier;
use crate::error::Error;
use crate::host::{is_present, Host, RunOptions};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Keeps the package manager from warning about a missing manifest.
const PLACEHOLDER_MANIFEST: &str = "{\n  \"private\": true\n}\n";

/// Options for [`PackageManager::acquire_temp_package`].
#[derive(Debug, Clone, Default)]
pub struct TempPackageOptions {
    pub registry: Option<String>,
    pub ignore_scripts: bool,
    pub timeout: Option<Duration>,
}

/// An acquired temp package.
#[derive(Debug)]
pub struct TempPackage {
    /// Directory the specifier was installed into.
    pub working_directory: PathBuf,
    pub cleanup: TempCleanup,
}

/// Idempotent removal of a temp package directory.
#[derive(Debug, Clone)]
pub struct TempCleanup {
    inner: Arc<CleanupState>,
}

#[derive(Debug)]
struct CleanupState {
    host: Arc<dyn Host>,
    path: PathBuf,
    /// Held across the delete so concurrent callers see its outcome.
    done: Mutex<bool>,
}

impl TempCleanup {
    fn new(host: Arc<dyn Host>, path: PathBuf) -> Self {
        Self {
            inner: Arc::new(CleanupState {
                host,
                path,
                done: Mutex::new(false),
            }),
        }
    }

    /// Delete the directory. Later calls are no-ops once one has succeeded.
    ///
    /// A call made while another is deleting waits for it; after a failed
    /// delete the next call tries again.
    pub async fn run(&self) -> Result<(), Error> {
        let state = &self.inner;
        let mut done = state.done.lock().await;
        if *done {
            return Ok(());
        }

        // On failure the path stays registered so the exit guard retries
        state
            .host
            .delete_directory(&state.path)
            .await
            .map_err(|e| Error::io(&state.path, e))?;
        *done = true;
        cleanup::deregister(&state.path);
        debug!(dir = %state.path.display(), "removed temp package");
        Ok(())
    }

    /// Whether a delete has succeeded. `false` while one is in flight.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.inner.done.try_lock().is_ok_and(|done| *done)
    }
}

#[derive(Deserialize)]
struct TempManifest {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

impl PackageManager {
    /// Install `specifier` into a fresh temp directory.
    ///
    /// On failure the directory is already removed and the install error returned.
    #[instrument(skip_all, fields(manager = %self.descriptor.name, specifier = specifier))]
    pub async fn acquire_temp_package(
        &self,
        specifier: &str,
        options: &TempPackageOptions,
    ) -> Result<TempPackage, Error> {
        self.ensure_installed()?;
        let parsed = PackageSpecifier::parse(specifier, &self.cwd)?;
        self.acquire(&parsed, options).await
    }

    async fn acquire(
        &self,
        specifier: &PackageSpecifier,
        options: &TempPackageOptions,
    ) -> Result<TempPackage, Error> {
        let base = self.options.temp_directory.as_deref();
        let dir = self
            .host
            .create_temp_directory(base)
            .await
            .map_err(|e| Error::io(base.map_or_else(std::env::temp_dir, Path::to_path_buf), e))?;
        cleanup::register(&dir);

        let package = TempPackage {
            working_directory: dir.clone(),
            cleanup: TempCleanup::new(self.host.clone(), dir),
        };

        if let Err(e) = self.populate(&package.working_directory, specifier, options).await {
            if let Err(cleanup_error) = package.cleanup.run().await {
                warn!(error = %cleanup_error, "failed to remove temp package after error");
            }
            return Err(e);
        }
        Ok(package)
    }

    async fn populate(
        &self,
        dir: &Path,
        specifier: &PackageSpecifier,
        options: &TempPackageOptions,
    ) -> Result<(), Error> {
        let manifest = dir.join("package.json");
        self.host
            .write_file(&manifest, PLACEHOLDER_MANIFEST)
            .await
            .map_err(|e| Error::io(&manifest, e))?;

        for file in self.descriptor.config_files {
            let from = self.cwd.join(file);
            if is_present(self.host.as_ref(), &from).await {
                let to = dir.join(file);
                self.host
                    .copy_file(&from, &to)
                    .await
                    .map_err(|e| Error::io(&from, e))?;
            }
        }

        let d = self.descriptor;
        let mut args = to_args(d.add_command);
        args.push(specifier.install_arg());
        args.extend(d.temp_prefix_args(dir));
        push_flag(&mut args, d.no_lockfile_flag, true);
        push_flag(&mut args, d.ignore_scripts_flag, options.ignore_scripts);
        let mut env = self.apply_registry(options.registry.as_deref(), &mut args);
        env.extend(d.temp_env.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())));

        let run = RunOptions {
            cwd: Some(dir.to_path_buf()),
            env,
            timeout: options.timeout,
        };
        self.run(args, run).await.map(|_| ())
    }

    /// Install a non-registry specifier into a temp package and read its manifest.
    pub(super) async fn manifest_from_temp(
        &self,
        specifier: &PackageSpecifier,
        registry: Option<String>,
    ) -> Result<Option<Arc<PackageManifest>>, Error> {
        let options = TempPackageOptions {
            registry,
            ignore_scripts: true,
            timeout: None,
        };
        let package = self.acquire(specifier, &options).await?;
        let manifest = self
            .installed_manifest(&package.working_directory, specifier.name())
            .await;

        if let Err(e) = package.cleanup.run().await {
            warn!(error = %e, "failed to remove temp package");
        }
        manifest
    }

    async fn installed_manifest(
        &self,
        dir: &Path,
        name: Option<&str>,
    ) -> Result<Option<Arc<PackageManifest>>, Error> {
        let name = match name {
            Some(name) => Some(name.to_string()),
            None => self.installed_name(dir).await?,
        };
        let Some(name) = name else {
            return Ok(None);
        };
        let path = dir.join("node_modules").join(&name).join("package.json");
        read_manifest(self.host.as_ref(), &path).await
    }

    /// Name the package manager saved into the placeholder manifest, else the
    /// single package found in `node_modules`.
    async fn installed_name(&self, dir: &Path) -> Result<Option<String>, Error> {
        let manifest = dir.join("package.json");
        let contents = self
            .host
            .read_file(&manifest)
            .await
            .map_err(|e| Error::io(&manifest, e))?;
        let parsed: TempManifest = serde_json::from_str(&contents)
            .map_err(|e| Error::json(manifest.display().to_string(), e))?;
        if let Some(name) = parsed.dependencies.into_keys().next() {
            return Ok(Some(name));
        }

        let modules = dir.join("node_modules");
        let Ok(entries) = self.host.read_dir(&modules).await else {
            return Ok(None);
        };
        for entry in entries.into_iter().filter(|e| e.is_dir) {
            if entry.name.starts_with('.') {
                continue;
            }
            if !entry.name.starts_with('@') {
                return Ok(Some(entry.name));
            }
            let scope = modules.join(&entry.name);
            if let Ok(scoped) = self.host.read_dir(&scope).await {
                if let Some(inner) = scoped.into_iter().find(|e| e.is_dir) {
                    return Ok(Some(format!("{}/{}", entry.name, inner.name)));
                }
            }
        }
        Ok(None)
    }
}
