//! Package manager version probing.

use super::descriptor::PackageManagerDescriptor;
use crate::error::Error;
use crate::host::{command_line, Host, RunOptions};
use semver::Version;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default limit for a `--version` probe.
pub const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Run the descriptor's version query in `cwd` and return the trimmed output.
///
/// # Errors
/// Returns the spawn/command error, or [`Error::VersionUnavailable`] when the
/// binary printed nothing.
pub async fn query_version(
    host: &dyn Host,
    descriptor: &PackageManagerDescriptor,
    cwd: &Path,
    timeout: Option<Duration>,
) -> Result<String, Error> {
    let args: Vec<String> = descriptor
        .version_command
        .iter()
        .map(ToString::to_string)
        .collect();

    let output = host
        .run_command(
            descriptor.binary,
            &args,
            RunOptions::in_dir(cwd).with_timeout(timeout),
        )
        .await?;

    // Corepack and yarn may print notices before the version itself.
    let version = output
        .stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or_default()
        .to_string();

    if version.is_empty() {
        return Err(Error::VersionUnavailable {
            command: command_line(descriptor.binary, &args),
        });
    }

    debug!(manager = %descriptor.name, %version, "probed version");
    Ok(version)
}

/// Extract the major version from `--version` output.
///
/// Accepts strict semver as well as loose forms such as `v8` or `1.22`.
#[must_use]
pub fn parse_major(version: &str) -> Option<u64> {
    let version = version.trim().trim_start_matches('v');
    if let Ok(parsed) = Version::parse(version) {
        return Some(parsed.major);
    }

    let digits: String = version.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}
