//! In-memory [`Host`] for tests.

use super::{command_line, CommandOutput, DirEntry, FileStat, Host, RunOptions};
use crate::error::Error;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Root under which [`MemoryHost`] places its temp directories.
///
/// Deliberately not a real temp location so the process-wide cleanup
/// registry never touches real files for in-memory paths.
const MEMORY_TEMP_ROOT: &str = "/nodepm-memory/tmp";

/// A command as seen by [`MemoryHost::run_command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandInvocation {
    /// `program arg1 arg2 ...`
    #[must_use]
    pub fn command_line(&self) -> String {
        command_line(&self.program, &self.args)
    }
}

/// Scripted response to a command.
pub type CommandHandler =
    Arc<dyn Fn(&MemoryHost, &CommandInvocation) -> Result<CommandOutput, Error> + Send + Sync>;

#[derive(Default)]
struct State {
    files: BTreeMap<PathBuf, String>,
    dirs: BTreeSet<PathBuf>,
    stat_failures: BTreeMap<PathBuf, io::ErrorKind>,
    invocations: Vec<CommandInvocation>,
    stat_calls: Vec<PathBuf>,
    next_temp: u32,
}

/// Fake host with an in-memory filesystem and scripted commands.
///
/// Commands fail with a spawn error (as if the binary were missing) until a
/// handler is installed with [`MemoryHost::on_command`].
#[derive(Default)]
pub struct MemoryHost {
    state: Mutex<State>,
    handler: Mutex<Option<CommandHandler>>,
}

impl fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryHost")
            .field("files", &state.files.len())
            .field("dirs", &state.dirs.len())
            .field("invocations", &state.invocations.len())
            .finish()
    }
}

impl MemoryHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a file, creating its parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>, contents: impl Into<String>) {
        let path = path.as_ref();
        let mut state = self.lock();
        if let Some(parent) = path.parent() {
            add_ancestors(&mut state.dirs, parent);
        }
        state.files.insert(path.to_path_buf(), contents.into());
    }

    /// Add a directory and its ancestors.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        add_ancestors(&mut self.lock().dirs, path.as_ref());
    }

    /// Make `stat` of `path` fail with `kind`.
    pub fn fail_stat(&self, path: impl AsRef<Path>, kind: io::ErrorKind) {
        self.lock()
            .stat_failures
            .insert(path.as_ref().to_path_buf(), kind);
    }

    /// Install the handler answering every `run_command`.
    pub fn on_command<F>(&self, handler: F)
    where
        F: Fn(&MemoryHost, &CommandInvocation) -> Result<CommandOutput, Error>
            + Send
            + Sync
            + 'static,
    {
        *self.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    /// Whether a file or directory exists at `path`.
    #[must_use]
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let state = self.lock();
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    /// Contents of the file at `path`.
    #[must_use]
    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        self.lock().files.get(path.as_ref()).cloned()
    }

    /// Every command run so far, in order.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.lock().invocations.clone()
    }

    /// Every path passed to `stat` so far, in order.
    #[must_use]
    pub fn stat_calls(&self) -> Vec<PathBuf> {
        self.lock().stat_calls.clone()
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no such file or directory: {}", path.display()),
        )
    }
}

fn add_ancestors(dirs: &mut BTreeSet<PathBuf>, path: &Path) {
    for ancestor in path.ancestors() {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        dirs.insert(ancestor.to_path_buf());
    }
}

#[async_trait]
impl Host for MemoryHost {
    async fn stat(&self, path: &Path) -> io::Result<Option<FileStat>> {
        let mut state = self.lock();
        state.stat_calls.push(path.to_path_buf());
        if let Some(kind) = state.stat_failures.get(path) {
            return Err(io::Error::new(*kind, format!("stat failed: {}", path.display())));
        }
        if let Some(contents) = state.files.get(path) {
            return Ok(Some(FileStat {
                is_file: true,
                is_dir: false,
                len: contents.len() as u64,
            }));
        }
        if state.dirs.contains(path) {
            return Ok(Some(FileStat {
                is_file: false,
                is_dir: true,
                len: 0,
            }));
        }
        Ok(None)
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let state = self.lock();
        if !state.dirs.contains(path) {
            return Err(Self::not_found(path));
        }
        let dirs = state
            .dirs
            .iter()
            .filter(|d| d.parent() == Some(path))
            .map(|d| (d, true));
        let files = state
            .files
            .keys()
            .filter(|f| f.parent() == Some(path))
            .map(|f| (f, false));
        let mut entries: Vec<DirEntry> = dirs
            .chain(files)
            .filter_map(|(p, is_dir)| {
                Some(DirEntry {
                    name: p.file_name()?.to_string_lossy().into_owned(),
                    is_dir,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read_file(&self, path: &Path) -> io::Result<String> {
        self.lock()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| Self::not_found(path))
    }

    async fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        let mut state = self.lock();
        let parent_exists = path.parent().map_or(true, |p| state.dirs.contains(p));
        if !parent_exists {
            return Err(Self::not_found(path));
        }
        state.files.insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        let contents = self.read_file(from).await?;
        self.add_file(to, contents);
        Ok(())
    }

    async fn create_temp_directory(&self, base: Option<&Path>) -> io::Result<PathBuf> {
        let mut state = self.lock();
        let base = base.map_or_else(|| PathBuf::from(MEMORY_TEMP_ROOT), Path::to_path_buf);
        let dir = loop {
            let candidate = base.join(format!("nodepm-{}", state.next_temp));
            state.next_temp += 1;
            if !state.dirs.contains(&candidate) {
                break candidate;
            }
        };
        add_ancestors(&mut state.dirs, &dir);
        Ok(dir)
    }

    async fn delete_directory(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock();
        state.dirs.retain(|d| !d.starts_with(path));
        state.files.retain(|f, _| !f.starts_with(path));
        Ok(())
    }

    async fn run_command(
        &self,
        program: &str,
        args: &[String],
        options: RunOptions,
    ) -> Result<CommandOutput, Error> {
        let invocation = CommandInvocation {
            program: program.to_string(),
            args: args.to_vec(),
            cwd: options.cwd,
            env: options.env,
        };
        self.lock().invocations.push(invocation.clone());

        // Clone the handler out so it may call back into the host.
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match handler {
            Some(handler) => handler(self, &invocation),
            None => Err(Error::Spawn {
                program: program.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "program not found"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_files_create_parent_dirs() {
        let host = MemoryHost::new();
        host.add_file("/repo/app/package.json", "{}");

        let stat = host.stat(Path::new("/repo/app")).await.unwrap().unwrap();
        assert!(stat.is_dir);
        let stat = host
            .stat(Path::new("/repo/app/package.json"))
            .await
            .unwrap()
            .unwrap();
        assert!(stat.is_file);
        assert_eq!(stat.len, 2);
        assert!(host.stat(Path::new("/repo/other")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_dir_lists_direct_children() {
        let host = MemoryHost::new();
        host.add_file("/p/node_modules/react/package.json", "{}");
        host.add_file("/p/node_modules/@types/node/package.json", "{}");
        host.add_file("/p/node_modules/.package-lock.json", "{}");

        let entries = host.read_dir(Path::new("/p/node_modules")).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, [".package-lock.json", "@types", "react"]);
        assert!(!entries[0].is_dir);
        assert!(entries[1].is_dir);

        assert!(host.read_dir(Path::new("/missing")).await.is_err());
    }

    #[tokio::test]
    async fn test_temp_directories_are_unique_and_deletable() {
        let host = MemoryHost::new();
        let a = host.create_temp_directory(None).await.unwrap();
        let b = host.create_temp_directory(None).await.unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with(MEMORY_TEMP_ROOT));

        host.write_file(&a.join("package.json"), "{}").await.unwrap();
        host.delete_directory(&a).await.unwrap();
        assert!(!host.exists(&a));
        assert!(!host.exists(a.join("package.json")));
        assert!(host.exists(&b));

        // Deleting twice is fine
        host.delete_directory(&a).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_requires_parent() {
        let host = MemoryHost::new();
        let err = host
            .write_file(Path::new("/nowhere/package.json"), "{}")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_commands_without_handler_look_missing() {
        let host = MemoryHost::new();
        let err = host
            .run_command("pnpm", &["--version".to_string()], RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
        assert_eq!(host.invocations().len(), 1);
        assert_eq!(host.invocations()[0].command_line(), "pnpm --version");
    }

    #[tokio::test]
    async fn test_handler_can_write_back_into_host() {
        let host = MemoryHost::new();
        host.add_dir("/work");
        host.on_command(|host, inv| {
            let dir = inv.cwd.clone().unwrap_or_default();
            host.add_file(dir.join("node_modules/left-pad/package.json"), "{}");
            Ok(CommandOutput::stdout("added 1 package"))
        });

        let out = host
            .run_command(
                "npm",
                &["install".to_string(), "left-pad".to_string()],
                RunOptions::in_dir("/work"),
            )
            .await
            .unwrap();
        assert_eq!(out.stdout, "added 1 package");
        assert!(host.exists("/work/node_modules/left-pad/package.json"));
    }
}
