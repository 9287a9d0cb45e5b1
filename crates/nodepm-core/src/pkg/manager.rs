//! The package manager strategy object.
//!
//! One [`PackageManager`] binds a [`Host`], a project directory and a
//! descriptor for its whole lifetime. Every operation that needs the binary
//! first calls [`PackageManager::ensure_installed`], which raises the
//! initialization error recorded by the factory, if any.

use super::cache::{CacheKey, RegistryCache};
use super::descriptor::{PackageManagerDescriptor, PackageManagerName, SaveStrategy};
use super::factory::PackageManagerSource;
use super::registry::{
    is_not_found, parse_query_output, PackageManifest, PackageMetadata, MANIFEST_FIELDS,
    METADATA_FIELDS,
};
use super::spec::PackageSpecifier;
use super::version::{query_version, VERSION_PROBE_TIMEOUT};
use crate::error::{Error, InitializationError};
use crate::host::{command_line, is_present, CommandOutput, Host, RunOptions};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, trace};

/// Options for [`PackageManager::add`].
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    pub save: SaveStrategy,
    /// Save as a dev dependency.
    pub dev: bool,
    pub no_lockfile: bool,
    pub ignore_scripts: bool,
    pub registry: Option<String>,
}

/// Options for [`PackageManager::install`].
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub timeout: Option<Duration>,
    pub force: bool,
    pub registry: Option<String>,
    pub ignore_scripts: bool,
    pub ignore_peer_dependencies: bool,
}

/// Options for registry lookups.
#[derive(Debug, Clone, Default)]
pub struct RegistryOptions {
    pub timeout: Option<Duration>,
    pub registry: Option<String>,
    /// Skip the cache lookup. The fresh result still replaces the cached one.
    pub bypass_cache: bool,
}

/// Runtime options fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct ManagerOptions {
    /// Log project-mutating commands instead of running them.
    pub dry_run: bool,
    /// Base directory for temp packages; the system temp dir when `None`.
    pub temp_directory: Option<PathBuf>,
    /// Registry used when an operation does not name one.
    pub registry: Option<String>,
    /// Version already known to the caller.
    pub version: Option<String>,
    pub initialization_error: Option<InitializationError>,
}

/// A package manager bound to one project.
#[derive(Debug)]
pub struct PackageManager {
    pub(super) host: Arc<dyn Host>,
    pub(super) cwd: PathBuf,
    pub(super) descriptor: &'static PackageManagerDescriptor,
    source: PackageManagerSource,
    pub(super) options: ManagerOptions,
    version: OnceCell<String>,
    cache: RegistryCache,
}

impl PackageManager {
    #[must_use]
    pub fn new(
        host: Arc<dyn Host>,
        cwd: impl Into<PathBuf>,
        name: PackageManagerName,
        source: PackageManagerSource,
        mut options: ManagerOptions,
    ) -> Self {
        let version = match options.version.take() {
            Some(version) => OnceCell::new_with(Some(version)),
            None => OnceCell::new(),
        };
        Self {
            host,
            cwd: cwd.into(),
            descriptor: name.descriptor(),
            source,
            options,
            version,
            cache: RegistryCache::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> PackageManagerName {
        self.descriptor.name
    }

    #[must_use]
    pub fn descriptor(&self) -> &'static PackageManagerDescriptor {
        self.descriptor
    }

    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// How the manager was chosen.
    #[must_use]
    pub fn source(&self) -> PackageManagerSource {
        self.source
    }

    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    /// The deferred initialization error, if the binary could not be probed.
    #[must_use]
    pub fn initialization_error(&self) -> Option<&InitializationError> {
        self.options.initialization_error.as_ref()
    }

    /// Fail with the deferred initialization error, if any.
    pub fn ensure_installed(&self) -> Result<(), Error> {
        match &self.options.initialization_error {
            Some(error) => Err(Error::Initialization(error.clone())),
            None => Ok(()),
        }
    }

    /// Add one package to the project.
    #[instrument(skip_all, fields(manager = %self.descriptor.name, package = package))]
    pub async fn add(&self, package: &str, options: &AddOptions) -> Result<(), Error> {
        self.ensure_installed()?;
        let d = self.descriptor;

        let mut args = to_args(d.add_command);
        args.push(package.to_string());
        if let Some(flag) = d.save_flag(options.save) {
            args.push(flag.to_string());
        }
        if options.dev {
            args.push(d.save_dev_flag.to_string());
        }
        push_flag(&mut args, d.no_lockfile_flag, options.no_lockfile);
        push_flag(&mut args, d.ignore_scripts_flag, options.ignore_scripts);

        let env = self.apply_registry(options.registry.as_deref(), &mut args);
        let run = RunOptions {
            cwd: Some(self.cwd.clone()),
            env,
            timeout: None,
        };
        self.run_mutating(args, run).await
    }

    /// Install the project's full dependency tree.
    #[instrument(skip_all, fields(manager = %self.descriptor.name, cwd = %self.cwd.display()))]
    pub async fn install(&self, options: &InstallOptions) -> Result<(), Error> {
        self.ensure_installed()?;
        let d = self.descriptor;

        let mut args = to_args(d.install_command);
        push_flag(&mut args, d.force_flag, options.force);
        push_flag(&mut args, d.ignore_scripts_flag, options.ignore_scripts);
        push_flag(
            &mut args,
            d.ignore_peer_dependencies_flag,
            options.ignore_peer_dependencies,
        );

        let env = self.apply_registry(options.registry.as_deref(), &mut args);
        let run = RunOptions {
            cwd: Some(self.cwd.clone()),
            env,
            timeout: options.timeout,
        };
        self.run_mutating(args, run).await
    }

    /// The binary's version, probed once and memoized.
    pub async fn get_version(&self) -> Result<String, Error> {
        self.ensure_installed()?;
        self.version
            .get_or_try_init(|| {
                query_version(
                    self.host.as_ref(),
                    self.descriptor,
                    &self.cwd,
                    Some(VERSION_PROBE_TIMEOUT),
                )
            })
            .await
            .cloned()
    }

    /// Package-level registry metadata, or `None` if the package does not exist.
    #[instrument(skip_all, fields(manager = %self.descriptor.name, package = name))]
    pub async fn get_registry_metadata(
        &self,
        name: &str,
        options: &RegistryOptions,
    ) -> Result<Option<Arc<PackageMetadata>>, Error> {
        self.ensure_installed()?;
        let registry = self.registry(options.registry.as_deref());
        let key = CacheKey::metadata(name, registry);

        if !options.bypass_cache {
            if let Some(hit) = self.cache.metadata(&key) {
                trace!(package = name, "registry metadata cache hit");
                return Ok(hit);
            }
        }

        let value = self
            .query_registry(name, METADATA_FIELDS, registry, options.timeout)
            .await?;
        let metadata = decode::<PackageMetadata>(value, name)?.map(Arc::new);
        self.cache.insert_metadata(key, metadata.clone());
        Ok(metadata)
    }

    /// One version's manifest, or `None` if no version matches.
    ///
    /// `version` may be an exact version, a range or a dist-tag.
    #[instrument(skip_all, fields(manager = %self.descriptor.name, package = name, version = version))]
    pub async fn get_registry_manifest(
        &self,
        name: &str,
        version: &str,
        options: &RegistryOptions,
    ) -> Result<Option<Arc<PackageManifest>>, Error> {
        self.ensure_installed()?;
        let registry = self.registry(options.registry.as_deref());
        let key = CacheKey::manifest(name, version, registry);

        if !options.bypass_cache {
            if let Some(hit) = self.cache.manifest(&key) {
                trace!(package = name, version, "registry manifest cache hit");
                return Ok(hit);
            }
        }

        let spec = format!("{name}@{version}");
        let value = self
            .query_registry(&spec, MANIFEST_FIELDS, registry, options.timeout)
            .await?;
        let manifest = decode::<PackageManifest>(value, &spec)?.map(Arc::new);
        self.cache.insert_manifest(key, manifest.clone());
        Ok(manifest)
    }

    /// Resolve the manifest of any specifier.
    ///
    /// Registry specs go through [`Self::get_registry_manifest`] and its cache.
    /// Local directories are read in place. Tarballs and git sources are
    /// installed into a temp package which is removed afterwards.
    #[instrument(skip_all, fields(manager = %self.descriptor.name, specifier = specifier))]
    pub async fn get_manifest(
        &self,
        specifier: &str,
        options: &RegistryOptions,
    ) -> Result<Option<Arc<PackageManifest>>, Error> {
        let parsed = PackageSpecifier::parse(specifier, &self.cwd)?;
        if let Some(spec) = parsed.registry_spec() {
            return self
                .get_registry_manifest(&spec.name, spec.range_or_latest(), options)
                .await;
        }

        // A local directory is read in place and needs no binary
        if let PackageSpecifier::Directory { path, .. } = &parsed {
            return read_manifest(self.host.as_ref(), &path.join("package.json")).await;
        }

        self.ensure_installed()?;
        self.manifest_from_temp(&parsed, options.registry.clone())
            .await
    }

    /// Registry for an operation: its own override, else the manager default.
    fn registry<'a>(&'a self, registry: Option<&'a str>) -> Option<&'a str> {
        registry.or(self.options.registry.as_deref())
    }

    /// Add registry arguments; returns the environment it needs.
    pub(super) fn apply_registry(
        &self,
        registry: Option<&str>,
        args: &mut Vec<String>,
    ) -> Vec<(String, String)> {
        let mut env = Vec::new();
        if let Some(registry) = self.registry(registry) {
            self.descriptor.apply_registry(registry, args, &mut env);
        }
        env
    }

    pub(super) async fn run(
        &self,
        args: Vec<String>,
        options: RunOptions,
    ) -> Result<CommandOutput, Error> {
        debug!(command = %command_line(self.descriptor.binary, &args), "running");
        self.host
            .run_command(self.descriptor.binary, &args, options)
            .await
    }

    /// Run a command that changes the project, unless this is a dry run.
    async fn run_mutating(&self, args: Vec<String>, options: RunOptions) -> Result<(), Error> {
        if self.options.dry_run {
            info!(
                command = %command_line(self.descriptor.binary, &args),
                "dry run: skipping"
            );
            return Ok(());
        }
        self.run(args, options).await.map(|_| ())
    }

    async fn query_registry(
        &self,
        spec: &str,
        fields: &[&str],
        registry: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Option<Value>, Error> {
        let d = self.descriptor;
        let mut args = to_args(d.manifest_command);
        args.push(spec.to_string());
        d.apply_fields(fields, &mut args);

        let mut env = Vec::new();
        if let Some(registry) = registry {
            d.apply_registry(registry, &mut args, &mut env);
        }

        let options = RunOptions {
            cwd: Some(self.cwd.clone()),
            env,
            timeout,
        };
        match self.run(args, options).await {
            Ok(output) => parse_query_output(d.output_format, &output.stdout),
            Err(e) if is_not_found(&e) => {
                debug!(spec, "not found in registry");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

pub(super) fn to_args(command: &[&str]) -> Vec<String> {
    command.iter().map(ToString::to_string).collect()
}

pub(super) fn push_flag(args: &mut Vec<String>, flag: Option<&str>, enabled: bool) {
    match flag {
        Some(flag) if enabled => args.push(flag.to_string()),
        None if enabled => trace!("flag not supported by this package manager; skipped"),
        _ => {}
    }
}

fn decode<T: DeserializeOwned>(value: Option<Value>, context: &str) -> Result<Option<T>, Error> {
    value
        .map(|value| serde_json::from_value(value).map_err(|e| Error::json(context, e)))
        .transpose()
}

/// Read a `package.json`; a missing file is `None`.
pub(super) async fn read_manifest(
    host: &dyn Host,
    path: &Path,
) -> Result<Option<Arc<PackageManifest>>, Error> {
    if !is_present(host, path).await {
        return Ok(None);
    }
    let contents = host
        .read_file(path)
        .await
        .map_err(|e| Error::io(path, e))?;
    let manifest: PackageManifest = serde_json::from_str(&contents)
        .map_err(|e| Error::json(path.display().to_string(), e))?;
    Ok(Some(Arc::new(manifest)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InitializationErrorKind;
    use crate::host::{CommandInvocation, MemoryHost};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager(host: &Arc<MemoryHost>, name: PackageManagerName) -> PackageManager {
        manager_with(host, name, ManagerOptions::default())
    }

    fn manager_with(
        host: &Arc<MemoryHost>,
        name: PackageManagerName,
        options: ManagerOptions,
    ) -> PackageManager {
        PackageManager::new(
            host.clone(),
            "/repo",
            name,
            PackageManagerSource::Discovered,
            options,
        )
    }

    fn failed(inv: &CommandInvocation, stdout: &str, stderr: &str) -> Error {
        Error::CommandFailed {
            command: inv.command_line(),
            exit_code: Some(1),
            signal: None,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_translates_flags_per_manager() {
        let host = Arc::new(MemoryHost::new());
        host.on_command(|_, _| Ok(CommandOutput::default()));
        let options = AddOptions {
            save: SaveStrategy::Exact,
            dev: true,
            no_lockfile: true,
            ignore_scripts: true,
            registry: Some("https://r.example/".to_string()),
        };

        for name in PackageManagerName::ALL {
            manager(&host, name).add("left-pad", &options).await.unwrap();
        }

        let lines: Vec<String> = host
            .invocations()
            .iter()
            .map(CommandInvocation::command_line)
            .collect();
        assert_eq!(
            lines,
            [
                "npm install left-pad --save-exact --save-dev --no-package-lock --ignore-scripts --registry https://r.example/",
                "yarn add left-pad --exact --dev --mode=skip-build",
                "yarn add left-pad --exact --dev --no-lockfile --ignore-scripts --registry https://r.example/",
                "pnpm add left-pad --save-exact --save-dev --no-lockfile --ignore-scripts --registry https://r.example/",
            ]
        );

        let yarn = &host.invocations()[1];
        assert_eq!(
            yarn.env,
            [(
                "YARN_NPM_REGISTRY_SERVER".to_string(),
                "https://r.example/".to_string()
            )]
        );
        assert_eq!(yarn.cwd.as_deref(), Some(Path::new("/repo")));
    }

    #[tokio::test]
    async fn test_install_flags_and_timeout() {
        let host = Arc::new(MemoryHost::new());
        host.on_command(|_, _| Ok(CommandOutput::default()));

        let options = InstallOptions {
            timeout: Some(Duration::from_secs(90)),
            force: true,
            ignore_peer_dependencies: true,
            ..InstallOptions::default()
        };
        manager(&host, PackageManagerName::Npm)
            .install(&options)
            .await
            .unwrap();
        manager(&host, PackageManagerName::Yarn)
            .install(&options)
            .await
            .unwrap();

        let invocations = host.invocations();
        assert_eq!(
            invocations[0].command_line(),
            "npm install --force --legacy-peer-deps"
        );
        // Modern yarn has neither flag
        assert_eq!(invocations[1].command_line(), "yarn install");
    }

    #[tokio::test]
    async fn test_default_registry_applies_when_not_overridden() {
        let host = Arc::new(MemoryHost::new());
        host.on_command(|_, _| Ok(CommandOutput::default()));
        let pm = manager_with(
            &host,
            PackageManagerName::Pnpm,
            ManagerOptions {
                registry: Some("https://default.example/".to_string()),
                ..ManagerOptions::default()
            },
        );

        pm.install(&InstallOptions::default()).await.unwrap();
        pm.install(&InstallOptions {
            registry: Some("https://other.example/".to_string()),
            ..InstallOptions::default()
        })
        .await
        .unwrap();

        let invocations = host.invocations();
        assert_eq!(
            invocations[0].command_line(),
            "pnpm install --registry https://default.example/"
        );
        assert_eq!(
            invocations[1].command_line(),
            "pnpm install --registry https://other.example/"
        );
    }

    #[tokio::test]
    async fn test_dry_run_skips_mutations() {
        let host = Arc::new(MemoryHost::new());
        host.on_command(|_, _| Ok(CommandOutput::stdout("10.2.0")));
        let pm = manager_with(
            &host,
            PackageManagerName::Npm,
            ManagerOptions {
                dry_run: true,
                ..ManagerOptions::default()
            },
        );

        pm.add("react", &AddOptions::default()).await.unwrap();
        pm.install(&InstallOptions::default()).await.unwrap();
        assert!(host.invocations().is_empty());

        // Read-only queries still run
        assert_eq!(pm.get_version().await.unwrap(), "10.2.0");
        assert_eq!(host.invocations().len(), 1);
    }

    #[tokio::test]
    async fn test_deferred_error_blocks_operations() {
        let host = Arc::new(MemoryHost::new());
        let error = InitializationError::new(
            InitializationErrorKind::DefaultMissing,
            PackageManagerName::Npm,
            "program not found",
        );
        let pm = manager_with(
            &host,
            PackageManagerName::Npm,
            ManagerOptions {
                initialization_error: Some(error),
                ..ManagerOptions::default()
            },
        );

        // Name stays available
        assert_eq!(pm.name(), PackageManagerName::Npm);

        let err = pm.add("react", &AddOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::Initialization(_)));
        assert!(pm.get_version().await.is_err());
        assert!(pm
            .get_registry_metadata("react", &RegistryOptions::default())
            .await
            .is_err());
        assert!(host.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_command_failure_carries_output() {
        let host = Arc::new(MemoryHost::new());
        host.on_command(|_, inv| Err(failed(inv, "", "npm ERR! code ERESOLVE")));

        let err = manager(&host, PackageManagerName::Npm)
            .install(&InstallOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.captured_output(), Some(("", "npm ERR! code ERESOLVE")));
    }

    #[tokio::test]
    async fn test_version_is_memoized() {
        let host = Arc::new(MemoryHost::new());
        host.on_command(|_, _| Ok(CommandOutput::stdout("8.15.4\n")));
        let pm = manager(&host, PackageManagerName::Pnpm);

        assert_eq!(pm.get_version().await.unwrap(), "8.15.4");
        assert_eq!(pm.get_version().await.unwrap(), "8.15.4");
        assert_eq!(host.invocations().len(), 1);

        let known = manager_with(
            &host,
            PackageManagerName::Pnpm,
            ManagerOptions {
                version: Some("9.0.0".to_string()),
                ..ManagerOptions::default()
            },
        );
        assert_eq!(known.get_version().await.unwrap(), "9.0.0");
        assert_eq!(host.invocations().len(), 1);
    }

    #[tokio::test]
    async fn test_metadata_cache_and_bypass() {
        let host = Arc::new(MemoryHost::new());
        let fetches = Arc::new(AtomicUsize::new(0));
        let counter = fetches.clone();
        host.on_command(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(CommandOutput::stdout(
                r#"{"name":"react","dist-tags":{"latest":"18.2.0"},"versions":["18.2.0"]}"#,
            ))
        });
        let pm = manager(&host, PackageManagerName::Npm);

        let cached = RegistryOptions::default();
        let first = pm.get_registry_metadata("react", &cached).await.unwrap();
        let second = pm.get_registry_metadata("react", &cached).await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(first.unwrap().latest(), Some("18.2.0"));
        assert!(second.is_some());

        let bypass = RegistryOptions {
            bypass_cache: true,
            ..RegistryOptions::default()
        };
        pm.get_registry_metadata("react", &bypass).await.unwrap();
        pm.get_registry_metadata("react", &bypass).await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 3);

        assert_eq!(
            host.invocations()[0].command_line(),
            "npm view --json react name dist-tags versions time"
        );
    }

    #[tokio::test]
    async fn test_cache_is_keyed_by_registry() {
        let host = Arc::new(MemoryHost::new());
        host.on_command(|_, _| Ok(CommandOutput::stdout(r#"{"name":"react","version":"18.2.0"}"#)));
        let pm = manager(&host, PackageManagerName::Pnpm);

        let a = RegistryOptions {
            registry: Some("https://a.example/".to_string()),
            ..RegistryOptions::default()
        };
        let b = RegistryOptions {
            registry: Some("https://b.example/".to_string()),
            ..RegistryOptions::default()
        };
        pm.get_registry_manifest("react", "18.2.0", &a).await.unwrap();
        pm.get_registry_manifest("react", "18.2.0", &b).await.unwrap();
        pm.get_registry_manifest("react", "18.2.0", &a).await.unwrap();

        assert_eq!(host.invocations().len(), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_none_and_cached() {
        let host = Arc::new(MemoryHost::new());
        host.on_command(|_, inv| {
            Err(failed(
                inv,
                r#"{"error":{"code":"E404","summary":"Not Found"}}"#,
                "",
            ))
        });
        let pm = manager(&host, PackageManagerName::Npm);

        let options = RegistryOptions::default();
        assert!(pm
            .get_registry_manifest("no-such-pkg", "1.0.0", &options)
            .await
            .unwrap()
            .is_none());
        assert!(pm
            .get_registry_manifest("no-such-pkg", "1.0.0", &options)
            .await
            .unwrap()
            .is_none());
        assert_eq!(host.invocations().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let host = Arc::new(MemoryHost::new());
        host.on_command(|_, inv| Err(failed(inv, "", "npm ERR! code ECONNREFUSED")));
        let pm = manager(&host, PackageManagerName::Npm);

        let err = pm
            .get_registry_metadata("react", &RegistryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_manifest_query_per_manager() {
        let host = Arc::new(MemoryHost::new());
        host.on_command(|_, inv| {
            let out = if inv.program == "yarn" && inv.args[0] == "info" {
                r#"{"type":"inspect","data":{"name":"lodash","version":"4.17.21"}}"#
            } else {
                r#"{"name":"lodash","version":"4.17.21"}"#
            };
            Ok(CommandOutput::stdout(out))
        });

        for name in PackageManagerName::ALL {
            let manifest = manager(&host, name)
                .get_registry_manifest("lodash", "^4", &RegistryOptions::default())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(manifest.version, "4.17.21", "{name}");
        }

        let fields = MANIFEST_FIELDS.join(" ");
        let lines: Vec<String> = host
            .invocations()
            .iter()
            .map(CommandInvocation::command_line)
            .collect();
        assert_eq!(lines[0], format!("npm view --json lodash@^4 {fields}"));
        assert_eq!(
            lines[1],
            format!(
                "yarn npm info --json lodash@^4 --fields {}",
                MANIFEST_FIELDS.join(",")
            )
        );
        assert_eq!(lines[2], "yarn info --json lodash@^4");
        assert_eq!(lines[3], format!("pnpm info --json lodash@^4 {fields}"));
    }

    #[tokio::test]
    async fn test_get_manifest_routes_registry_and_directory() {
        let host = Arc::new(MemoryHost::new());
        host.add_file(
            "/repo/packages/ui/package.json",
            r#"{"name":"@acme/ui","version":"0.3.0","private":true}"#,
        );
        host.on_command(|_, _| Ok(CommandOutput::stdout(r#"{"name":"react","version":"18.2.0"}"#)));
        let pm = manager(&host, PackageManagerName::Npm);
        let options = RegistryOptions::default();

        let local = pm
            .get_manifest("./packages/ui", &options)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(local.name, "@acme/ui");
        assert!(host.invocations().is_empty());

        let alias = pm
            .get_manifest("my-react@npm:react@18", &options)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alias.version, "18.2.0");
        assert!(host.invocations()[0].args.contains(&"react@18".to_string()));

        // Registry results share the registry manifest cache
        pm.get_registry_manifest("react", "18", &options)
            .await
            .unwrap();
        assert_eq!(host.invocations().len(), 1);

        assert!(pm
            .get_manifest("./missing", &options)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_get_manifest_rejects_invalid_specifier() {
        let host = Arc::new(MemoryHost::new());
        let err = manager(&host, PackageManagerName::Npm)
            .get_manifest("not a package", &RegistryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSpecifier { .. }));
    }

    #[tokio::test]
    async fn test_directory_manifest_without_binary() {
        let host = Arc::new(MemoryHost::new());
        host.add_file(
            "/repo/packages/ui/package.json",
            r#"{"name":"@acme/ui","version":"0.3.0"}"#,
        );
        let pm = manager_with(
            &host,
            PackageManagerName::Pnpm,
            ManagerOptions {
                initialization_error: Some(InitializationError::new(
                    InitializationErrorKind::DiscoveredMissing,
                    PackageManagerName::Pnpm,
                    "program not found",
                )),
                ..ManagerOptions::default()
            },
        );
        let options = RegistryOptions::default();

        let local = pm
            .get_manifest("./packages/ui", &options)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(local.version, "0.3.0");

        // Anything that needs the binary still fails
        for specifier in ["react@18", "github:acme/widget", "./widget-1.0.0.tgz"] {
            let err = pm.get_manifest(specifier, &options).await.unwrap_err();
            assert!(matches!(err, Error::Initialization(_)), "{specifier}");
        }
        assert!(host.invocations().is_empty());
    }
}
