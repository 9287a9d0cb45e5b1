//! The I/O boundary.
//!
//! Everything above [`Host`] is pure logic: discovery, the factory and
//! [`PackageManager`](crate::pkg::PackageManager) only touch the filesystem or
//! spawn processes through it, so the whole layer runs against [`MemoryHost`]
//! in tests and [`NodeHost`] in production.

mod memory;
mod node;

pub use memory::{CommandHandler, CommandInvocation, MemoryHost};
pub use node::NodeHost;

use crate::error::Error;
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Result of a successful [`Host::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_file: bool,
    pub is_dir: bool,
    pub len: u64,
}

/// One entry of [`Host::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Options for [`Host::run_command`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Working directory; the host's own when `None`.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables layered over the inherited environment.
    pub env: Vec<(String, String)>,
    /// Terminate the process after this long.
    pub timeout: Option<Duration>,
}

impl RunOptions {
    #[must_use]
    pub fn in_dir(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Captured output of a command that exited successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Filesystem and process primitives used by the package manager layer.
#[async_trait]
pub trait Host: fmt::Debug + Send + Sync {
    /// Stat a path. A missing path is `Ok(None)`, never an error.
    async fn stat(&self, path: &Path) -> io::Result<Option<FileStat>>;

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    async fn read_file(&self, path: &Path) -> io::Result<String>;

    async fn write_file(&self, path: &Path, contents: &str) -> io::Result<()>;

    async fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Create a fresh, uniquely named directory under `base` (or the system temp dir).
    async fn create_temp_directory(&self, base: Option<&Path>) -> io::Result<PathBuf>;

    /// Recursively delete a directory. Deleting a missing directory succeeds.
    async fn delete_directory(&self, path: &Path) -> io::Result<()>;

    /// Run `program` with `args`.
    ///
    /// A non-zero exit is [`Error::CommandFailed`] and an expired timeout is
    /// [`Error::Timeout`]; both carry the output captured so far.
    async fn run_command(
        &self,
        program: &str,
        args: &[String],
        options: RunOptions,
    ) -> Result<CommandOutput, Error>;
}

/// Whether `path` exists. Any stat failure counts as absent.
pub async fn is_present(host: &dyn Host, path: &Path) -> bool {
    matches!(host.stat(path).await, Ok(Some(_)))
}

/// Render a command line for logs and error messages.
#[must_use]
pub fn command_line(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            line.push('"');
            line.push_str(arg);
            line.push('"');
        } else {
            line.push_str(arg);
        }
    }
    line
}
