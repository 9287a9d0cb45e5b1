//! Registry documents and package manager query output parsing.
//!
//! Registry data is fetched through the package manager binary itself
//! (`npm view`, `yarn info`, `pnpm info`, `yarn npm info`) so that project
//! `.npmrc`/`.yarnrc` settings such as auth tokens and scoped registries apply.

use super::descriptor::OutputFormat;
use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fields requested for a version manifest.
pub const MANIFEST_FIELDS: &[&str] = &[
    "name",
    "version",
    "deprecated",
    "dependencies",
    "peerDependencies",
    "devDependencies",
    "homepage",
    "schematics",
    "ng-add",
    "ng-update",
];

/// Fields requested for package metadata.
pub const METADATA_FIELDS: &[&str] = &["name", "dist-tags", "versions", "time"];

/// A single version's manifest, restricted to [`MANIFEST_FIELDS`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, deserialize_with = "deprecation_notice")]
    pub deprecated: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub schematics: Option<String>,
    #[serde(default, rename = "ng-add")]
    pub ng_add: Option<Value>,
    #[serde(default, rename = "ng-update")]
    pub ng_update: Option<Value>,
}

/// Package-level registry metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    #[serde(default, rename = "dist-tags")]
    pub dist_tags: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub versions: Vec<String>,
    #[serde(default)]
    pub time: BTreeMap<String, String>,
}

impl PackageMetadata {
    /// Version the `latest` dist-tag points at.
    #[must_use]
    pub fn latest(&self) -> Option<&str> {
        self.dist_tags.get("latest").map(String::as_str)
    }
}

/// `deprecated` is a message string, but some packuments carry booleans.
fn deprecation_notice<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(message) => Some(message),
        Value::Bool(true) => Some(String::new()),
        _ => None,
    })
}

/// npm prints a bare string when a package has exactly one version.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Map(BTreeMap<String, Value>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(v)) => vec![v],
        Some(OneOrMany::Many(vs)) => vs,
        // Full packuments key versions by number
        Some(OneOrMany::Map(map)) => map.into_keys().collect(),
    })
}

/// Extract the JSON payload from a registry query's stdout.
///
/// Returns `None` when the manager printed nothing, which is how `npm view`
/// reports a version that does not exist.
///
/// # Errors
/// Returns an error if the output is not the JSON the format promises.
pub fn parse_query_output(format: OutputFormat, stdout: &str) -> Result<Option<Value>, Error> {
    let stdout = stdout.trim();
    if stdout.is_empty() {
        return Ok(None);
    }

    match format {
        OutputFormat::Json => {
            let value: Value =
                serde_json::from_str(stdout).map_err(|e| Error::json("registry query", e))?;
            Ok(match value {
                // A range matching several versions; the last is the highest
                Value::Array(items) => items.into_iter().last(),
                Value::Null => None,
                other => Some(other),
            })
        }
        OutputFormat::YarnClassic => {
            for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
                let event: Value =
                    serde_json::from_str(line).map_err(|e| Error::json("yarn info", e))?;
                if event.get("type").and_then(Value::as_str) == Some("inspect") {
                    return Ok(event.get("data").cloned().filter(|d| !d.is_null()));
                }
            }
            Ok(None)
        }
        OutputFormat::YarnModern => {
            let mut payload = None;
            for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
                let value: Value =
                    serde_json::from_str(line).map_err(|e| Error::json("yarn npm info", e))?;
                payload = Some(value);
            }
            Ok(payload)
        }
    }
}

/// Whether a failed query means "no such package or version".
#[must_use]
pub fn is_not_found(error: &Error) -> bool {
    let Some((stdout, stderr)) = error.captured_output() else {
        return false;
    };
    if error.is_timeout() {
        return false;
    }

    [stdout, stderr].iter().any(|text| {
        let lower = text.to_lowercase();
        text.contains("E404")
            || text.contains("ERR_PNPM_FETCH_404")
            || (lower.contains("404") && lower.contains("not found"))
            || lower.contains(": not found")
    })
}
