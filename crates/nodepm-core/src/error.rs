//! Error taxonomy for package manager operations.
//!
//! Discovery never produces errors; the factory records binary failures as a
//! deferred [`InitializationError`]; everything else propagates as [`Error`].

use crate::pkg::descriptor::PackageManagerName;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Stable error codes.
pub mod codes {
    pub const PM_NOT_INSTALLED: &str = "PM_NOT_INSTALLED";
    pub const PM_COMMAND_FAILED: &str = "PM_COMMAND_FAILED";
    pub const PM_COMMAND_TIMEOUT: &str = "PM_COMMAND_TIMEOUT";
    pub const PM_SPAWN_FAILED: &str = "PM_SPAWN_FAILED";
    pub const PM_VERSION_UNAVAILABLE: &str = "PM_VERSION_UNAVAILABLE";
    pub const PM_IO_ERROR: &str = "PM_IO_ERROR";
    pub const PM_INVALID_JSON: &str = "PM_INVALID_JSON";
    pub const PM_SPEC_INVALID: &str = "PM_SPEC_INVALID";
    pub const PM_CONFIG_INVALID: &str = "PM_CONFIG_INVALID";
}

/// How the package manager that failed to initialize was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitializationErrorKind {
    /// Nothing was configured or discovered and the default manager is missing.
    DefaultMissing,
    /// The project configuration names a manager that cannot be run.
    ConfiguredMissing,
    /// A lockfile names a manager that cannot be run.
    DiscoveredMissing,
}

/// A binary-presence failure captured at construction time and raised on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct InitializationError {
    kind: InitializationErrorKind,
    manager: PackageManagerName,
    message: String,
    cause: String,
}

impl InitializationError {
    /// Build the error for `manager`, wording the remediation by `kind`.
    #[must_use]
    pub fn new(
        kind: InitializationErrorKind,
        manager: PackageManagerName,
        cause: impl fmt::Display,
    ) -> Self {
        let descriptor = manager.descriptor();
        let cause = cause.to_string();
        let message = match kind {
            InitializationErrorKind::DefaultMissing => format!(
                "No package manager is configured or detected for this project, and the \
                 default package manager '{manager}' could not be run ({cause}). \
                 Install {}.",
                descriptor.install_hint
            ),
            InitializationErrorKind::ConfiguredMissing => format!(
                "This project is configured to use '{manager}', but `{}` could not be run \
                 ({cause}). Install {} or change the configured package manager.",
                descriptor.binary, descriptor.install_hint
            ),
            InitializationErrorKind::DiscoveredMissing => format!(
                "This project was detected to use '{manager}' from its lockfile, but `{}` \
                 could not be run ({cause}). Install {}.",
                descriptor.binary, descriptor.install_hint
            ),
        };

        Self {
            kind,
            manager,
            message,
            cause,
        }
    }

    #[must_use]
    pub fn kind(&self) -> InitializationErrorKind {
        self.kind
    }

    #[must_use]
    pub fn manager(&self) -> PackageManagerName {
        self.manager
    }

    /// The underlying failure text (spawn error, exit status, ...).
    #[must_use]
    pub fn cause(&self) -> &str {
        &self.cause
    }
}

/// Core error type for package manager operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Initialization(#[from] InitializationError),

    /// A package manager command exited unsuccessfully.
    #[error("`{command}` failed with {}{}", describe_status(.exit_code, .signal), format_output(.stdout, .stderr))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        signal: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// A package manager command exceeded its timeout and was terminated.
    #[error("`{command}` timed out after {}{}", describe_timeout(.timeout), format_output(.stdout, .stderr))]
    Timeout {
        command: String,
        timeout: Duration,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` did not report a version")]
    VersionUnavailable { command: String },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON from {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid package specifier '{specifier}': {reason}")]
    InvalidSpecifier { specifier: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Wrap an IO error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a JSON error with a description of where the JSON came from.
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    pub fn invalid_specifier(specifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSpecifier {
            specifier: specifier.into(),
            reason: reason.into(),
        }
    }

    /// Get the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Initialization(_) => codes::PM_NOT_INSTALLED,
            Self::CommandFailed { .. } => codes::PM_COMMAND_FAILED,
            Self::Timeout { .. } => codes::PM_COMMAND_TIMEOUT,
            Self::Spawn { .. } => codes::PM_SPAWN_FAILED,
            Self::VersionUnavailable { .. } => codes::PM_VERSION_UNAVAILABLE,
            Self::Io { .. } => codes::PM_IO_ERROR,
            Self::Json { .. } => codes::PM_INVALID_JSON,
            Self::InvalidSpecifier { .. } => codes::PM_SPEC_INVALID,
            Self::InvalidConfig(_) => codes::PM_CONFIG_INVALID,
        }
    }

    /// Captured `(stdout, stderr)` of a failed or timed-out command.
    #[must_use]
    pub fn captured_output(&self) -> Option<(&str, &str)> {
        match self {
            Self::CommandFailed { stdout, stderr, .. } | Self::Timeout { stdout, stderr, .. } => {
                Some((stdout, stderr))
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

fn describe_status(exit_code: &Option<i32>, signal: &Option<i32>) -> String {
    match (*exit_code, *signal) {
        (Some(code), _) => format!("exit code {code}"),
        (None, Some(signal)) => format!("signal {signal}"),
        (None, None) => "an unknown status".to_string(),
    }
}

fn describe_timeout(timeout: &Duration) -> String {
    format!("{}s", timeout.as_secs_f64())
}

fn format_output(stdout: &str, stderr: &str) -> String {
    let mut out = String::new();
    for stream in [stderr.trim_end(), stdout.trim_end()] {
        if !stream.is_empty() {
            out.push('\n');
            out.push_str(stream);
        }
    }
    out
}
