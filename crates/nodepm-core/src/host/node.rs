//! [`Host`] backed by the real filesystem and child processes.

use super::{command_line, CommandOutput, DirEntry, FileStat, Host, RunOptions};
use crate::error::Error;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Prefix for scratch directories created by [`NodeHost::create_temp_directory`].
pub const TEMP_DIR_PREFIX: &str = "nodepm-";

/// How long to keep draining pipes once the direct child is gone.
///
/// Grandchildren (lifecycle scripts, a background store server) may hold the
/// pipes open after the child exited or was killed.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Production host.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeHost;

impl NodeHost {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

async fn blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(io::Error::other)?
}

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

/// Copy a pipe into a shared buffer so partial output survives a timeout.
fn drain<R>(reader: Option<R>) -> (SharedBuffer, Option<JoinHandle<()>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buffer = SharedBuffer::default();
    let handle = reader.map(|mut reader| {
        let buffer = Arc::clone(&buffer);
        tokio::spawn(async move {
            let mut chunk = [0u8; 8192];
            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => buffer
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]),
                }
            }
        })
    });
    (buffer, handle)
}

async fn collect(buffer: &SharedBuffer, handle: Option<JoinHandle<()>>, grace: Duration) -> String {
    if let Some(mut handle) = handle {
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            handle.abort();
        }
    }
    let bytes = buffer.lock().unwrap_or_else(PoisonError::into_inner);
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> Option<i32> {
    None
}

#[async_trait]
impl Host for NodeHost {
    async fn stat(&self, path: &Path) -> io::Result<Option<FileStat>> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(Some(FileStat {
                is_file: meta.is_file(),
                is_dir: meta.is_dir(),
                len: meta.len(),
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read_file(&self, path: &Path) -> io::Result<String> {
        let path = path.to_path_buf();
        blocking(move || nodepm_util::fs::read_to_string_lossy(&path)).await
    }

    async fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        let path = path.to_path_buf();
        let contents = contents.to_string();
        blocking(move || nodepm_util::fs::atomic_write(&path, contents.as_bytes())).await
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        let from = from.to_path_buf();
        let to = to.to_path_buf();
        blocking(move || nodepm_util::fs::copy_file(&from, &to)).await
    }

    async fn create_temp_directory(&self, base: Option<&Path>) -> io::Result<PathBuf> {
        let base = base.map_or_else(std::env::temp_dir, Path::to_path_buf);
        blocking(move || {
            std::fs::create_dir_all(&base)?;
            let dir = tempfile::Builder::new()
                .prefix(TEMP_DIR_PREFIX)
                .tempdir_in(&base)?;
            Ok(dir.keep())
        })
        .await
    }

    async fn delete_directory(&self, path: &Path) -> io::Result<()> {
        let path = path.to_path_buf();
        blocking(move || nodepm_util::fs::remove_dir_all_if_exists(&path)).await
    }

    async fn run_command(
        &self,
        program: &str,
        args: &[String],
        options: RunOptions,
    ) -> Result<CommandOutput, Error> {
        let command = command_line(program, args);

        // `which` also resolves the `.cmd` shims npm, yarn and pnpm use on Windows.
        let resolved = which::which(program).map_err(|e| Error::Spawn {
            program: program.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, e.to_string()),
        })?;

        let mut cmd = Command::new(&resolved);
        cmd.args(args)
            .envs(options.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }

        debug!(command = %command, cwd = ?options.cwd, "spawning");
        let mut child = cmd.spawn().map_err(|source| Error::Spawn {
            program: program.to_string(),
            source,
        })?;

        let (stdout_buf, stdout_task) = drain(child.stdout.take());
        let (stderr_buf, stderr_task) = drain(child.stderr.take());

        let wait_err = |source| Error::Spawn {
            program: program.to_string(),
            source,
        };
        let status = match options.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => Some(status.map_err(wait_err)?),
                Err(_) => {
                    debug!(command = %command, ?limit, "timed out, killing");
                    let _ = child.kill().await;
                    None
                }
            },
            None => Some(child.wait().await.map_err(wait_err)?),
        };

        let stdout = collect(&stdout_buf, stdout_task, DRAIN_GRACE).await;
        let stderr = collect(&stderr_buf, stderr_task, DRAIN_GRACE).await;

        match status {
            None => Err(Error::Timeout {
                command,
                timeout: options.timeout.unwrap_or_default(),
                stdout,
                stderr,
            }),
            Some(status) if status.success() => {
                trace!(command = %command, "finished");
                Ok(CommandOutput { stdout, stderr })
            }
            Some(status) => Err(Error::CommandFailed {
                command,
                exit_code: status.code(),
                signal: exit_signal(status),
                stdout,
                stderr,
            }),
        }
    }
}
