//! Process execution primitives.
//!
//! Spawns a game executable and hands back its identifier together with a
//! future that resolves when the process exits.

use arcade_common::{ProcessError, ProcessResult};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Future resolving once the spawned process has exited.
pub type ExitFuture = Pin<Box<dyn Future<Output = ProcessExit> + Send + 'static>>;

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessExit {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal, if the process was killed by one (Unix only).
    pub signal: Option<i32>,
}

impl ProcessExit {
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => write!(f, "unknown status"),
        }
    }
}

/// A freshly started process.
pub struct SpawnedProcess {
    /// OS identifier; `None` when the platform did not report one.
    pub pid: Option<u32>,
    /// Resolves when the process exits.
    pub exit: ExitFuture,
}

impl fmt::Debug for SpawnedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnedProcess")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

/// Starts executables on behalf of the launch coordinator.
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    async fn spawn(&self, path: &Path) -> ProcessResult<SpawnedProcess>;
}

/// Spawner backed by `tokio::process::Command`.
#[derive(Debug, Default, Clone)]
pub struct CommandSpawner;

impl CommandSpawner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessSpawner for CommandSpawner {
    async fn spawn(&self, path: &Path) -> ProcessResult<SpawnedProcess> {
        execute_command(path)
    }
}

/// Launch the executable at `path` with no arguments.
///
/// The working directory is the executable's own directory, since games
/// commonly load assets relative to it. Stdin is detached so the launcher's
/// own input stream is never shared with the game.
pub fn execute_command(path: &Path) -> ProcessResult<SpawnedProcess> {
    let mut command = Command::new(path);
    command.stdin(Stdio::null());

    if let Some(dir) = path.parent().filter(|dir| dir.is_dir()) {
        command.current_dir(dir);
    }

    let mut child = command
        .spawn()
        .map_err(|e| ProcessError::spawn_failed(path.display().to_string(), e.to_string()))?;

    let pid = child.id();
    info!("Spawned {} (PID: {:?})", path.display(), pid);

    let label = path.display().to_string();
    let exit: ExitFuture = Box::pin(async move {
        match child.wait().await {
            Ok(status) => {
                let exit = ProcessExit::from_status(status);
                debug!("Process {} exited with {}", label, exit);
                exit
            }
            Err(e) => {
                warn!("Failed to wait for {}: {}", label, e);
                ProcessExit::default()
            }
        }
    });

    Ok(SpawnedProcess { pid, exit })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_missing_executable_fails() {
        let err = execute_command(Path::new("/nonexistent/arcade/game.exe")).unwrap_err();
        assert!(matches!(err, ProcessError::SpawnFailed { .. }));
        assert!(err.to_string().contains("/nonexistent/arcade/game.exe"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_reports_pid_and_exit_code() {
        let spawned = CommandSpawner::new()
            .spawn(Path::new("false"))
            .await
            .unwrap();
        assert!(spawned.pid.is_some());

        let exit = spawned.exit.await;
        assert_eq!(exit.code, Some(1));
        assert_eq!(exit.to_string(), "exit code 1");
    }

    #[test]
    fn test_process_exit_display() {
        assert_eq!(ProcessExit::with_code(0).to_string(), "exit code 0");
        let killed = ProcessExit {
            code: None,
            signal: Some(9),
        };
        assert_eq!(killed.to_string(), "signal 9");
        assert_eq!(ProcessExit::default().to_string(), "unknown status");
    }
}
