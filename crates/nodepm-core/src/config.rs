use crate::error::Error;
use crate::host::{is_present, Host};
use crate::pkg::descriptor::PackageManagerName;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Environment variable naming the package manager (`name` or `name@version`).
pub const PACKAGE_MANAGER_ENV: &str = "NODEPM_PACKAGE_MANAGER";

/// Environment variable overriding the registry URL.
pub const REGISTRY_ENV: &str = "NODEPM_REGISTRY";

/// Environment variable overriding the temp package base directory.
pub const TEMP_DIR_ENV: &str = "NODEPM_TEMP_DIR";

/// Runtime configuration for the nodepm CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,

    /// Log project-mutating commands instead of running them.
    pub dry_run: bool,

    /// Explicit package manager; discovery runs when `None`.
    pub package_manager: Option<ConfiguredPackageManager>,

    /// Registry URL passed to every command.
    pub registry: Option<String>,

    /// Base directory for temp packages.
    pub temp_directory: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
            dry_run: false,
            package_manager: None,
            registry: None,
            temp_directory: None,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn with_package_manager(mut self, package_manager: Option<ConfiguredPackageManager>) -> Self {
        self.package_manager = package_manager;
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Option<String>) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_temp_directory(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_directory = dir;
        self
    }

    /// Fill an unset package manager from the nearest `package.json`.
    pub async fn resolve_package_manager(mut self, host: &dyn Host) -> Result<Self, Error> {
        if self.package_manager.is_none() {
            self.package_manager = read_package_manager_field(host, &self.cwd).await?;
        }
        Ok(self)
    }
}

/// A package manager named by configuration rather than discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredPackageManager {
    pub name: PackageManagerName,
    pub version: Option<String>,
}

impl FromStr for ConfiguredPackageManager {
    type Err = Error;

    /// Parse `name` or corepack's `name@version[+sha...]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, version) = match s.split_once('@') {
            Some((name, version)) => {
                let version = version.split('+').next().unwrap_or(version).trim();
                if version.is_empty() {
                    return Err(Error::InvalidConfig(format!(
                        "missing version in package manager '{s}'"
                    )));
                }
                (name, Some(version.to_string()))
            }
            None => (s, None),
        };

        let name = name.parse::<PackageManagerName>().map_err(Error::InvalidConfig)?;
        Ok(Self { name, version })
    }
}

impl fmt::Display for ConfiguredPackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{version}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// The `packageManager` field of the nearest `package.json` that has one.
///
/// Searches from `start` upward, stopping after a directory holding `.git`.
pub async fn read_package_manager_field(
    host: &dyn Host,
    start: &Path,
) -> Result<Option<ConfiguredPackageManager>, Error> {
    for dir in start.ancestors() {
        let manifest = dir.join("package.json");
        if is_present(host, &manifest).await {
            let contents = host
                .read_file(&manifest)
                .await
                .map_err(|e| Error::io(&manifest, e))?;
            let value: Value = serde_json::from_str(&contents)
                .map_err(|e| Error::json(manifest.display().to_string(), e))?;
            if let Some(field) = value.get("packageManager").and_then(Value::as_str) {
                debug!(manifest = %manifest.display(), field, "package manager from package.json");
                return field.parse().map(Some);
            }
        }

        if is_present(host, &dir.join(".git")).await {
            break;
        }
    }
    Ok(None)
}
