//! Package manager descriptor table.
//!
//! The four supported managers differ only in binary name, lockfiles and the
//! spelling of their flags, so each one is an immutable
//! [`PackageManagerDescriptor`] value rather than its own type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Supported package managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageManagerName {
    Npm,
    /// Yarn 2 and later ("berry").
    Yarn,
    /// Yarn 1.x.
    YarnClassic,
    Pnpm,
}

impl PackageManagerName {
    pub const ALL: [Self; 4] = [Self::Npm, Self::Yarn, Self::YarnClassic, Self::Pnpm];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::YarnClassic => "yarn-classic",
            Self::Pnpm => "pnpm",
        }
    }

    /// Get the descriptor for this manager.
    #[must_use]
    pub fn descriptor(self) -> &'static PackageManagerDescriptor {
        match self {
            Self::Npm => &NPM,
            Self::Yarn => &YARN,
            Self::YarnClassic => &YARN_CLASSIC,
            Self::Pnpm => &PNPM,
        }
    }
}

impl fmt::Display for PackageManagerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageManagerName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| {
                format!("unknown package manager '{s}' (expected npm, yarn, yarn-classic or pnpm)")
            })
    }
}

/// Tie-break order when one directory holds lockfiles for several managers.
///
/// `yarn-classic` is absent: it shares `yarn.lock` with `yarn` and is only
/// split off by the factory after probing the version.
pub const PRECEDENCE: [PackageManagerName; 3] = [
    PackageManagerName::Pnpm,
    PackageManagerName::Yarn,
    PackageManagerName::Npm,
];

/// Manager used when nothing is configured or discovered.
pub const DEFAULT_PACKAGE_MANAGER: PackageManagerName = PackageManagerName::Npm;

/// How a registry override is passed to the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryOption {
    /// A flag followed by the URL, e.g. `--registry <url>`.
    Flag(&'static str),
    /// An environment variable holding the URL.
    Env(&'static str),
}

/// How registry queries select the fields they need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSelection {
    /// Field names as trailing positional arguments (`npm view x name version`).
    Positional,
    /// A single comma-separated flag value (`--fields name,version`).
    Flag(&'static str),
    /// The query always prints the whole document.
    Unsupported,
}

/// Shape of the registry query's stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// A JSON document; an array when a range matched several versions.
    Json,
    /// Newline-delimited events; the payload is the `data` of the `inspect` event.
    YarnClassic,
    /// Newline-delimited JSON objects; the last one is the payload.
    YarnModern,
}

/// How a temporary install is pointed at its scratch directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempPrefix {
    /// A flag taking the scratch directory itself; the tool appends `node_modules`.
    Flag(&'static str),
    /// A flag taking `<scratch>/node_modules`; the tool does not append it.
    ModulesFolder(&'static str),
    /// The working directory of the command selects the target.
    WorkingDirectory,
}

/// Immutable invocation shape of one package manager.
#[derive(Debug, PartialEq, Eq)]
pub struct PackageManagerDescriptor {
    pub name: PackageManagerName,
    pub binary: &'static str,
    /// Lockfiles whose presence identifies this manager.
    pub lockfiles: &'static [&'static str],
    /// Project files that carry registry/auth settings for this manager.
    pub config_files: &'static [&'static str],
    pub version_command: &'static [&'static str],
    pub install_command: &'static [&'static str],
    pub add_command: &'static [&'static str],
    pub save_exact_flag: &'static str,
    pub save_tilde_flag: &'static str,
    pub save_dev_flag: &'static str,
    pub no_lockfile_flag: Option<&'static str>,
    pub ignore_scripts_flag: Option<&'static str>,
    pub ignore_peer_dependencies_flag: Option<&'static str>,
    pub force_flag: Option<&'static str>,
    pub registry_option: RegistryOption,
    pub manifest_command: &'static [&'static str],
    pub field_selection: FieldSelection,
    pub output_format: OutputFormat,
    pub temp_prefix: TempPrefix,
    /// Environment for temp installs, which must produce a `node_modules` tree.
    pub temp_env: &'static [(&'static str, &'static str)],
    /// Remediation text used in "not installed" errors.
    pub install_hint: &'static str,
}

const VERSION_COMMAND: &[&str] = &["--version"];
const INSTALL_COMMAND: &[&str] = &["install"];

static NPM: PackageManagerDescriptor = PackageManagerDescriptor {
    name: PackageManagerName::Npm,
    binary: "npm",
    lockfiles: &["package-lock.json", "npm-shrinkwrap.json"],
    config_files: &[".npmrc"],
    version_command: VERSION_COMMAND,
    install_command: INSTALL_COMMAND,
    add_command: &["install"],
    save_exact_flag: "--save-exact",
    save_tilde_flag: "--save-tilde",
    save_dev_flag: "--save-dev",
    no_lockfile_flag: Some("--no-package-lock"),
    ignore_scripts_flag: Some("--ignore-scripts"),
    ignore_peer_dependencies_flag: Some("--legacy-peer-deps"),
    force_flag: Some("--force"),
    registry_option: RegistryOption::Flag("--registry"),
    manifest_command: &["view", "--json"],
    field_selection: FieldSelection::Positional,
    output_format: OutputFormat::Json,
    temp_prefix: TempPrefix::Flag("--prefix"),
    temp_env: &[],
    install_hint: "Node.js, which ships npm (https://nodejs.org/)",
};

static YARN: PackageManagerDescriptor = PackageManagerDescriptor {
    name: PackageManagerName::Yarn,
    binary: "yarn",
    lockfiles: &["yarn.lock"],
    config_files: &[".yarnrc.yml", ".yarnrc.yaml"],
    version_command: VERSION_COMMAND,
    install_command: INSTALL_COMMAND,
    add_command: &["add"],
    save_exact_flag: "--exact",
    save_tilde_flag: "--tilde",
    save_dev_flag: "--dev",
    no_lockfile_flag: None,
    ignore_scripts_flag: Some("--mode=skip-build"),
    ignore_peer_dependencies_flag: None,
    force_flag: None,
    registry_option: RegistryOption::Env("YARN_NPM_REGISTRY_SERVER"),
    manifest_command: &["npm", "info", "--json"],
    field_selection: FieldSelection::Flag("--fields"),
    output_format: OutputFormat::YarnModern,
    temp_prefix: TempPrefix::WorkingDirectory,
    temp_env: &[("YARN_NODE_LINKER", "node-modules")],
    install_hint: "yarn with `corepack enable` (https://yarnpkg.com/getting-started/install)",
};

static YARN_CLASSIC: PackageManagerDescriptor = PackageManagerDescriptor {
    name: PackageManagerName::YarnClassic,
    binary: "yarn",
    lockfiles: &["yarn.lock"],
    config_files: &[".yarnrc", ".npmrc"],
    version_command: VERSION_COMMAND,
    install_command: INSTALL_COMMAND,
    add_command: &["add"],
    save_exact_flag: "--exact",
    save_tilde_flag: "--tilde",
    save_dev_flag: "--dev",
    no_lockfile_flag: Some("--no-lockfile"),
    ignore_scripts_flag: Some("--ignore-scripts"),
    ignore_peer_dependencies_flag: None,
    force_flag: Some("--force"),
    registry_option: RegistryOption::Flag("--registry"),
    manifest_command: &["info", "--json"],
    field_selection: FieldSelection::Unsupported,
    output_format: OutputFormat::YarnClassic,
    temp_prefix: TempPrefix::ModulesFolder("--modules-folder"),
    temp_env: &[],
    install_hint: "yarn with `npm install -g yarn`",
};

static PNPM: PackageManagerDescriptor = PackageManagerDescriptor {
    name: PackageManagerName::Pnpm,
    binary: "pnpm",
    lockfiles: &["pnpm-lock.yaml"],
    config_files: &[".npmrc", "pnpm-workspace.yaml"],
    version_command: VERSION_COMMAND,
    install_command: INSTALL_COMMAND,
    add_command: &["add"],
    save_exact_flag: "--save-exact",
    save_tilde_flag: "--save-tilde",
    save_dev_flag: "--save-dev",
    no_lockfile_flag: Some("--no-lockfile"),
    ignore_scripts_flag: Some("--ignore-scripts"),
    ignore_peer_dependencies_flag: Some("--strict-peer-dependencies=false"),
    force_flag: Some("--force"),
    registry_option: RegistryOption::Flag("--registry"),
    manifest_command: &["info", "--json"],
    field_selection: FieldSelection::Positional,
    output_format: OutputFormat::Json,
    temp_prefix: TempPrefix::Flag("--dir"),
    temp_env: &[],
    install_hint: "pnpm with `corepack enable` or `npm install -g pnpm`",
};

/// Version spec strategy written into `package.json` by `add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStrategy {
    Exact,
    Tilde,
    /// The manager's own default (usually a caret range).
    #[default]
    None,
}

impl PackageManagerDescriptor {
    /// Flag selecting `strategy`, if it needs one.
    #[must_use]
    pub fn save_flag(&self, strategy: SaveStrategy) -> Option<&'static str> {
        match strategy {
            SaveStrategy::Exact => Some(self.save_exact_flag),
            SaveStrategy::Tilde => Some(self.save_tilde_flag),
            SaveStrategy::None => None,
        }
    }

    /// Apply a registry override as either arguments or environment.
    pub fn apply_registry(
        &self,
        registry: &str,
        args: &mut Vec<String>,
        env: &mut Vec<(String, String)>,
    ) {
        match self.registry_option {
            RegistryOption::Flag(flag) => {
                args.push(flag.to_string());
                args.push(registry.to_string());
            }
            RegistryOption::Env(var) => env.push((var.to_string(), registry.to_string())),
        }
    }

    /// Append the field selection for a registry query.
    pub fn apply_fields(&self, fields: &[&str], args: &mut Vec<String>) {
        match self.field_selection {
            FieldSelection::Positional => args.extend(fields.iter().map(ToString::to_string)),
            FieldSelection::Flag(flag) => {
                args.push(flag.to_string());
                args.push(fields.join(","));
            }
            FieldSelection::Unsupported => {}
        }
    }

    /// Arguments that point an install at `dir` instead of the project.
    #[must_use]
    pub fn temp_prefix_args(&self, dir: &Path) -> Vec<String> {
        match self.temp_prefix {
            TempPrefix::Flag(flag) => vec![flag.to_string(), dir.display().to_string()],
            TempPrefix::ModulesFolder(flag) => vec![
                flag.to_string(),
                dir.join("node_modules").display().to_string(),
            ],
            TempPrefix::WorkingDirectory => Vec::new(),
        }
    }
}

/// Check that `yarn` and `yarn-classic` probe their version identically.
///
/// The factory runs one generic version probe for `yarn` and only then decides
/// whether the result is classic or modern yarn, which is only sound while both
/// descriptors share the same version-query arguments.
///
/// # Panics
/// Panics if the two descriptors diverge.
pub fn assert_yarn_version_query_shared() {
    assert_eq!(
        YARN.version_command, YARN_CLASSIC.version_command,
        "yarn and yarn-classic must share their version query"
    );
    assert_eq!(YARN.binary, YARN_CLASSIC.binary);
}
