//! Package specifier parsing.
//!
//! Registry specs:
//! - `react`
//! - `react@18.2.0`
//! - `react@^18.0.0`
//! - `@types/node@^20`
//! - `my-react@npm:react@18` (alias)
//!
//! Everything else names a source outside the registry: `file:` and plain
//! paths, git URLs and hosted shorthands, and `http(s)://` tarballs. Each of
//! those may be prefixed with `name@`.

use crate::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Tag queried when a registry spec has no range.
pub const DEFAULT_TAG: &str = "latest";

const ALIAS_PREFIX: &str = "npm:";
const FILE_PREFIX: &str = "file:";
const TARBALL_EXTENSIONS: &[&str] = &[".tgz", ".tar.gz", ".tar"];
const GIT_PREFIXES: &[&str] = &[
    "git+", "git://", "ssh://", "github:", "gitlab:", "bitbucket:", "gist:",
];

/// A registry package spec: a name plus an optional range or tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Full package name (e.g., "@scope/name" or "name").
    pub name: String,
    /// Scope without the @ prefix, if scoped.
    pub scope: Option<String>,
    /// Version, range or tag (None means latest).
    pub range: Option<String>,
}

impl PackageSpec {
    /// Parse a registry spec.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSpecifier`] if the spec is malformed.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let input = input.trim();

        if input.is_empty() {
            return Err(Error::invalid_specifier(input, "empty package spec"));
        }

        if input.starts_with('@') {
            Self::parse_scoped(input)
        } else {
            Self::parse_unscoped(input)
        }
    }

    fn parse_scoped(input: &str) -> Result<Self, Error> {
        let Some(slash_pos) = input.find('/') else {
            return Err(Error::invalid_specifier(input, "scoped name is missing '/'"));
        };

        if slash_pos == 1 {
            return Err(Error::invalid_specifier(input, "empty scope"));
        }

        let scope = &input[1..slash_pos];
        let after_slash = &input[slash_pos + 1..];
        validate_name(input, scope)?;

        let (pkg_name, range) = match after_slash.split_once('@') {
            Some((name, range)) => (name, Some(range)),
            None => (after_slash, None),
        };

        if pkg_name.is_empty() {
            return Err(Error::invalid_specifier(input, "empty package name"));
        }
        validate_name(input, pkg_name)?;
        let range = validate_range(input, range)?;

        Ok(Self {
            name: format!("@{scope}/{pkg_name}"),
            scope: Some(scope.to_string()),
            range,
        })
    }

    fn parse_unscoped(input: &str) -> Result<Self, Error> {
        let (name, range) = match input.split_once('@') {
            Some((name, range)) => (name, Some(range)),
            None => (input, None),
        };

        if name.is_empty() {
            return Err(Error::invalid_specifier(input, "empty package name"));
        }
        validate_name(input, name)?;
        let range = validate_range(input, range)?;

        Ok(Self {
            name: name.to_string(),
            scope: None,
            range,
        })
    }

    /// The range to query, defaulting to [`DEFAULT_TAG`].
    #[must_use]
    pub fn range_or_latest(&self) -> &str {
        self.range.as_deref().unwrap_or(DEFAULT_TAG)
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{}@{range}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

fn validate_name(input: &str, name: &str) -> Result<(), Error> {
    if name.starts_with('.') || name.starts_with('_') {
        return Err(Error::invalid_specifier(
            input,
            format!("name '{name}' cannot start with '.' or '_'"),
        ));
    }

    for c in name.chars() {
        if !c.is_alphanumeric() && !matches!(c, '-' | '_' | '.' | '~') {
            return Err(Error::invalid_specifier(
                input,
                format!("invalid character '{c}' in package name '{name}'"),
            ));
        }
    }

    Ok(())
}

fn validate_range(input: &str, range: Option<&str>) -> Result<Option<String>, Error> {
    match range {
        Some("") => Err(Error::invalid_specifier(input, "empty version range")),
        range => Ok(range.map(str::to_string)),
    }
}

/// Where a package comes from, in `npm-package-arg` terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSpecifier {
    /// A registry name with an optional range or tag.
    Registry(PackageSpec),
    /// `alias@npm:target`: installed under `alias`, fetched as `target`.
    Alias { alias: String, target: PackageSpec },
    /// A local tarball.
    File { name: Option<String>, path: PathBuf },
    /// A local package directory.
    Directory { name: Option<String>, path: PathBuf },
    /// A git URL or hosted shorthand.
    Git { name: Option<String>, url: String },
    /// A remote tarball URL.
    Remote { name: Option<String>, url: Url },
}

impl PackageSpecifier {
    /// Parse `input`, resolving relative paths against `base_dir`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSpecifier`] if the input cannot be classified.
    pub fn parse(input: &str, base_dir: &Path) -> Result<Self, Error> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::invalid_specifier(input, "empty package spec"));
        }

        if let Some((name, rest)) = split_name(input).filter(|(name, _)| is_bare_name(name)) {
            if let Some(target) = rest.strip_prefix(ALIAS_PREFIX) {
                return Ok(Self::Alias {
                    alias: name.to_string(),
                    target: PackageSpec::parse(target)?,
                });
            }
            if let Some(source) = parse_source(rest, Some(name), base_dir)? {
                return Ok(source);
            }
        }

        if let Some(source) = parse_source(input, None, base_dir)? {
            return Ok(source);
        }

        PackageSpec::parse(input).map(Self::Registry)
    }

    /// The registry package this resolves to, following aliases.
    ///
    /// Only these specifiers are answered from the registry cache.
    #[must_use]
    pub fn registry_spec(&self) -> Option<&PackageSpec> {
        match self {
            Self::Registry(spec) | Self::Alias { target: spec, .. } => Some(spec),
            _ => None,
        }
    }

    /// The explicit package name, if the spec carries one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Registry(spec) => Some(&spec.name),
            Self::Alias { alias, .. } => Some(alias),
            Self::File { name, .. }
            | Self::Directory { name, .. }
            | Self::Git { name, .. }
            | Self::Remote { name, .. } => name.as_deref(),
        }
    }

    /// The argument handed to a package manager's add command.
    ///
    /// Paths are made absolute so the argument works from any directory.
    #[must_use]
    pub fn install_arg(&self) -> String {
        let (name, source) = match self {
            Self::Registry(spec) => return spec.to_string(),
            Self::Alias { alias, target } => return format!("{alias}@{ALIAS_PREFIX}{target}"),
            Self::File { name, path } | Self::Directory { name, path } => {
                (name, format!("{FILE_PREFIX}{}", path.display()))
            }
            Self::Git { name, url } => (name, url.clone()),
            Self::Remote { name, url } => (name, url.to_string()),
        };
        match name {
            Some(name) => format!("{name}@{source}"),
            None => source,
        }
    }
}

/// A package name without a range, usable in front of `@<source>`.
fn is_bare_name(name: &str) -> bool {
    PackageSpec::parse(name).is_ok_and(|spec| spec.range.is_none())
}

/// Split `name@rest`, skipping a leading scope `@`.
fn split_name(input: &str) -> Option<(&str, &str)> {
    let search_from = usize::from(input.starts_with('@'));
    let at = input[search_from..].find('@')? + search_from;
    let (name, rest) = (&input[..at], &input[at + 1..]);
    (!name.is_empty() && !rest.is_empty()).then_some((name, rest))
}

fn parse_source(
    input: &str,
    name: Option<&str>,
    base_dir: &Path,
) -> Result<Option<PackageSpecifier>, Error> {
    let name = name.map(str::to_string);

    if let Some(path) = input.strip_prefix(FILE_PREFIX) {
        return Ok(Some(local(name, path, base_dir)));
    }

    if is_git(input) {
        return Ok(Some(PackageSpecifier::Git {
            name,
            url: input.to_string(),
        }));
    }

    if input.starts_with("http://") || input.starts_with("https://") {
        let url = Url::parse(input)
            .map_err(|e| Error::invalid_specifier(input, format!("invalid URL: {e}")))?;
        return Ok(Some(PackageSpecifier::Remote { name, url }));
    }

    if is_path(input) || is_tarball(input) {
        return Ok(Some(local(name, input, base_dir)));
    }

    if is_hosted_shorthand(input) {
        return Ok(Some(PackageSpecifier::Git {
            name,
            url: format!("github:{input}"),
        }));
    }

    Ok(None)
}

fn local(name: Option<String>, path: &str, base_dir: &Path) -> PackageSpecifier {
    let path = base_dir.join(path);
    if is_tarball(&path.to_string_lossy()) {
        PackageSpecifier::File { name, path }
    } else {
        PackageSpecifier::Directory { name, path }
    }
}

fn is_git(input: &str) -> bool {
    if GIT_PREFIXES.iter().any(|prefix| input.starts_with(prefix)) {
        return true;
    }
    // scp-like `git@github.com:user/repo.git`
    if let Some(rest) = input.strip_prefix("git@") {
        return rest.contains(':');
    }
    let without_ref = input.split('#').next().unwrap_or(input);
    (input.starts_with("http://") || input.starts_with("https://"))
        && without_ref.ends_with(".git")
}

fn is_path(input: &str) -> bool {
    input.starts_with("./")
        || input.starts_with("../")
        || input.starts_with('/')
        || input.starts_with(".\\")
        || input.starts_with("..\\")
        || input == "."
        || input == ".."
        || has_drive_prefix(input)
}

fn has_drive_prefix(input: &str) -> bool {
    let bytes = input.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

fn is_tarball(input: &str) -> bool {
    TARBALL_EXTENSIONS.iter().any(|ext| input.ends_with(ext))
}

/// `user/repo` or `user/repo#ref`.
fn is_hosted_shorthand(input: &str) -> bool {
    if input.starts_with('@') || input.contains('@') || input.contains(':') {
        return false;
    }
    let repo = input.split('#').next().unwrap_or(input);
    match repo.split_once('/') {
        Some((user, project)) => {
            !user.is_empty()
                && !project.is_empty()
                && !project.contains('/')
                && !repo.contains(char::is_whitespace)
        }
        None => false,
    }
}
