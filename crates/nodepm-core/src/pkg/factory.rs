//! Choosing and constructing a [`PackageManager`].
//!
//! The manager comes from configuration, else from lockfile discovery, else
//! the default. Construction never fails: a binary that cannot be probed is
//! recorded as a deferred [`InitializationError`] so that callers which only
//! need the name keep working.

use super::descriptor::{self, PackageManagerName, DEFAULT_PACKAGE_MANAGER};
use super::discovery::discover;
use super::manager::{ManagerOptions, PackageManager};
use super::version::{parse_major, query_version, VERSION_PROBE_TIMEOUT};
use crate::config::{Config, ConfiguredPackageManager};
use crate::error::{InitializationError, InitializationErrorKind};
use crate::host::Host;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How the package manager was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManagerSource {
    Configured,
    Discovered,
    Default,
}

impl PackageManagerSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configured => "configured",
            Self::Discovered => "discovered",
            Self::Default => "default",
        }
    }

    fn missing_kind(self) -> InitializationErrorKind {
        match self {
            Self::Configured => InitializationErrorKind::ConfiguredMissing,
            Self::Discovered => InitializationErrorKind::DiscoveredMissing,
            Self::Default => InitializationErrorKind::DefaultMissing,
        }
    }
}

impl fmt::Display for PackageManagerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to [`create_package_manager`].
#[derive(Debug, Clone, Default)]
pub struct FactoryOptions {
    pub configured: Option<ConfiguredPackageManager>,
    pub dry_run: bool,
    pub temp_directory: Option<PathBuf>,
    pub registry: Option<String>,
    /// Limit for the version probe; [`VERSION_PROBE_TIMEOUT`] when `None`.
    pub version_timeout: Option<Duration>,
}

impl FactoryOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            configured: config.package_manager.clone(),
            dry_run: config.dry_run,
            temp_directory: config.temp_directory.clone(),
            registry: config.registry.clone(),
            version_timeout: None,
        }
    }
}

/// Resolve the package manager for `cwd` and bind it.
///
/// `cwd` must be absolute.
///
/// # Panics
/// Panics if the yarn and yarn-classic descriptors stop sharing their
/// version query, which would make the classic/modern split unsound.
pub async fn create_package_manager(
    host: Arc<dyn Host>,
    cwd: impl Into<PathBuf>,
    options: FactoryOptions,
) -> PackageManager {
    descriptor::assert_yarn_version_query_shared();
    let cwd = cwd.into();

    let (mut name, mut version, source) = match options.configured {
        Some(configured) => (
            configured.name,
            configured.version,
            PackageManagerSource::Configured,
        ),
        None => match discover(host.as_ref(), &cwd).await {
            Some(name) => (name, None, PackageManagerSource::Discovered),
            None => (DEFAULT_PACKAGE_MANAGER, None, PackageManagerSource::Default),
        },
    };

    let mut initialization_error = None;
    if version.is_none() && !options.dry_run {
        let timeout = options.version_timeout.unwrap_or(VERSION_PROBE_TIMEOUT);
        match query_version(host.as_ref(), name.descriptor(), &cwd, Some(timeout)).await {
            Ok(probed) => version = Some(probed),
            Err(e) => {
                warn!(manager = %name, %source, error = %e, "package manager is not usable");
                initialization_error =
                    Some(InitializationError::new(source.missing_kind(), name, &e));
            }
        }
    }

    // One probe serves both yarns; split them by major version
    if name == PackageManagerName::Yarn {
        if let Some(major) = version.as_deref().and_then(parse_major) {
            if major < 2 {
                name = PackageManagerName::YarnClassic;
            }
        }
    }

    debug!(
        manager = %name,
        %source,
        version = version.as_deref().unwrap_or("unknown"),
        "resolved package manager"
    );

    PackageManager::new(
        host,
        cwd,
        name,
        source,
        ManagerOptions {
            dry_run: options.dry_run,
            temp_directory: options.temp_directory,
            registry: options.registry,
            version,
            initialization_error,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::host::{CommandOutput, MemoryHost};
    use crate::pkg::manager::AddOptions;
    use std::path::Path;

    fn answering(version: &'static str) -> Arc<MemoryHost> {
        let host = Arc::new(MemoryHost::new());
        host.on_command(move |_, _| Ok(CommandOutput::stdout(version)));
        host
    }

    async fn create(host: &Arc<MemoryHost>, cwd: &str, options: FactoryOptions) -> PackageManager {
        create_package_manager(host.clone(), cwd, options).await
    }

    #[tokio::test]
    async fn test_yarn_classic_split() {
        let host = answering("1.22.19\n");
        host.add_file("/repo/yarn.lock", "");
        let pm = create(&host, "/repo", FactoryOptions::default()).await;
        assert_eq!(pm.name(), PackageManagerName::YarnClassic);
        assert_eq!(pm.source(), PackageManagerSource::Discovered);

        let host = answering("3.6.0\n");
        host.add_file("/repo/yarn.lock", "");
        let pm = create(&host, "/repo", FactoryOptions::default()).await;
        assert_eq!(pm.name(), PackageManagerName::Yarn);

        // A single probe decided both
        assert_eq!(host.invocations().len(), 1);
        assert_eq!(host.invocations()[0].command_line(), "yarn --version");
    }

    #[tokio::test]
    async fn test_unparseable_yarn_version_is_modern() {
        let host = answering("berry-nightly\n");
        host.add_file("/repo/yarn.lock", "");
        let pm = create(&host, "/repo", FactoryOptions::default()).await;
        assert_eq!(pm.name(), PackageManagerName::Yarn);
        assert_eq!(pm.get_version().await.unwrap(), "berry-nightly");
    }

    #[tokio::test]
    async fn test_dry_run_skips_probe_and_assumes_modern_yarn() {
        let host = answering("1.22.19");
        host.add_file("/repo/yarn.lock", "");
        let pm = create(
            &host,
            "/repo",
            FactoryOptions {
                dry_run: true,
                ..FactoryOptions::default()
            },
        )
        .await;
        assert_eq!(pm.name(), PackageManagerName::Yarn);
        assert!(pm.initialization_error().is_none());
        assert!(host.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_configured_wins_over_discovery() {
        let host = answering("9.0.0");
        host.add_file("/repo/pnpm-lock.yaml", "");
        let pm = create(
            &host,
            "/repo",
            FactoryOptions {
                configured: Some("npm".parse().unwrap()),
                ..FactoryOptions::default()
            },
        )
        .await;
        assert_eq!(pm.name(), PackageManagerName::Npm);
        assert_eq!(pm.source(), PackageManagerSource::Configured);
        // Discovery did not run
        assert!(host.stat_calls().is_empty());
    }

    #[tokio::test]
    async fn test_configured_version_is_used_without_probe() {
        let host = answering("unused");
        let pm = create(
            &host,
            "/repo",
            FactoryOptions {
                configured: Some("yarn@1.22.19".parse().unwrap()),
                ..FactoryOptions::default()
            },
        )
        .await;
        assert_eq!(pm.name(), PackageManagerName::YarnClassic);
        assert_eq!(pm.get_version().await.unwrap(), "1.22.19");
        assert!(host.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_default_when_nothing_found() {
        let host = answering("10.2.4");
        host.add_dir("/a/b");
        let pm = create(&host, "/a/b", FactoryOptions::default()).await;
        assert_eq!(pm.name(), DEFAULT_PACKAGE_MANAGER);
        assert_eq!(pm.source(), PackageManagerSource::Default);
        assert_eq!(pm.get_version().await.unwrap(), "10.2.4");
    }

    #[tokio::test]
    async fn test_deferred_error_wording_by_source() {
        // No command handler: every binary is missing
        let host = Arc::new(MemoryHost::new());
        host.add_dir("/empty");
        let default = create(&host, "/empty", FactoryOptions::default()).await;

        host.add_file("/repo/pnpm-lock.yaml", "");
        let discovered = create(&host, "/repo", FactoryOptions::default()).await;

        let configured = create(
            &host,
            "/repo",
            FactoryOptions {
                configured: Some("pnpm".parse().unwrap()),
                ..FactoryOptions::default()
            },
        )
        .await;

        // Construction succeeded and the name is readable
        assert_eq!(default.name(), PackageManagerName::Npm);
        assert_eq!(discovered.name(), PackageManagerName::Pnpm);

        let default_err = default
            .add("react", &AddOptions::default())
            .await
            .unwrap_err();
        let discovered_err = discovered
            .add("react", &AddOptions::default())
            .await
            .unwrap_err();
        let configured_err = configured
            .add("react", &AddOptions::default())
            .await
            .unwrap_err();

        let Error::Initialization(init) = &default_err else {
            panic!("expected initialization error, got {default_err:?}");
        };
        assert_eq!(init.kind(), InitializationErrorKind::DefaultMissing);
        assert!(init.to_string().contains("default package manager 'npm'"));

        assert_ne!(default_err.to_string(), configured_err.to_string());
        assert_ne!(discovered_err.to_string(), configured_err.to_string());
        assert!(configured_err.to_string().contains("configured to use 'pnpm'"));
        assert!(discovered_err.to_string().contains("detected to use 'pnpm'"));
        assert_eq!(default_err.code(), "PM_NOT_INSTALLED");
    }

    #[tokio::test]
    async fn test_failed_version_probe_with_output() {
        let host = Arc::new(MemoryHost::new());
        host.add_file("/repo/package-lock.json", "{}");
        host.on_command(|_, inv| {
            Err(Error::CommandFailed {
                command: inv.command_line(),
                exit_code: Some(1),
                signal: None,
                stdout: String::new(),
                stderr: "Corepack must currently be enabled".to_string(),
            })
        });

        let pm = create(&host, "/repo", FactoryOptions::default()).await;
        let init = pm.initialization_error().unwrap();
        assert_eq!(init.kind(), InitializationErrorKind::DiscoveredMissing);
        assert!(init.cause().contains("Corepack must currently be enabled"));
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = Config::new(PathBuf::from("/repo"))
            .with_dry_run(true)
            .with_registry(Some("https://r.example/".to_string()));
        let options = FactoryOptions::from_config(&config);
        assert!(options.dry_run);
        assert_eq!(options.registry.as_deref(), Some("https://r.example/"));

        let host = answering("unused");
        let pm = create_package_manager(host.clone(), Path::new("/repo"), options).await;
        assert!(pm.is_dry_run());
    }
}
