//! Process termination primitives.
//!
//! Termination works on an image name, not a PID: every process carrying the
//! name is targeted, which also covers children and relaunched instances of
//! the game. Both phases report completion of the *request*; confirming that
//! the process is gone is left to exit events and the existence probe.

use arcade_common::{ImageName, ProcessResult};
use async_trait::async_trait;

/// Platform-specific two-phase termination by image name.
#[async_trait]
pub trait KillStrategy: Send + Sync {
    /// Ask every matching process to close (SIGTERM on Unix, window close
    /// request on Windows). Finding nothing to close is not an error.
    async fn request_close(&self, image: &ImageName) -> ProcessResult<()>;

    /// Forcibly terminate every matching process and its process tree
    /// (SIGKILL on Unix, `taskkill /F /T` on Windows).
    async fn force_kill(&self, image: &ImageName) -> ProcessResult<()>;
}

/// Kill strategy for the platform the launcher was built for.
#[derive(Debug, Default, Clone)]
pub struct PlatformKillStrategy;

impl PlatformKillStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl KillStrategy for PlatformKillStrategy {
    async fn request_close(&self, image: &ImageName) -> ProcessResult<()> {
        #[cfg(unix)]
        {
            unix::signal_image(image, nix::sys::signal::Signal::SIGTERM, false).await
        }

        #[cfg(windows)]
        {
            crate::terminate_windows::taskkill_image(image, false).await
        }
    }

    async fn force_kill(&self, image: &ImageName) -> ProcessResult<()> {
        #[cfg(unix)]
        {
            unix::signal_image(image, nix::sys::signal::Signal::SIGKILL, true).await
        }

        #[cfg(windows)]
        {
            crate::terminate_windows::taskkill_image(image, true).await
        }
    }
}

/// Force kill a single process (SIGKILL).
///
/// Returns `Ok(false)` when no such process exists.
#[cfg(unix)]
pub fn force_kill(pid: u32) -> nix::Result<bool> {
    unix::send_signal(pid, nix::sys::signal::Signal::SIGKILL)
}

#[cfg(unix)]
mod unix {
    use crate::check::{matching_pids, process_snapshot, with_descendants};
    use arcade_common::{ImageName, ProcessError, ProcessResult};
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use tracing::{debug, info, warn};

    /// Deliver `signal` to `pid`; a vanished process is reported as `Ok(false)`.
    pub(super) fn send_signal(pid: u32, signal: Signal) -> nix::Result<bool> {
        match kill(Pid::from_raw(pid as i32), signal) {
            Ok(()) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Signal every process matching `image`, optionally with descendants.
    pub(super) async fn signal_image(
        image: &ImageName,
        signal: Signal,
        include_tree: bool,
    ) -> ProcessResult<()> {
        let lookup = image.clone();
        let targets = tokio::task::spawn_blocking(move || {
            let system = process_snapshot();
            let roots = matching_pids(&system, &lookup);
            if include_tree {
                with_descendants(&system, &roots)
            } else {
                roots
            }
        })
        .await
        .map_err(|e| failure(image, signal, format!("process listing task failed: {}", e)))?;

        if targets.is_empty() {
            debug!("No running process matches {} ({})", image, signal);
            return Ok(());
        }

        info!("Sending {} to {} process(es) matching {}: {:?}", signal, targets.len(), image, targets);

        let mut failures = Vec::new();
        for pid in targets {
            match send_signal(pid, signal) {
                Ok(true) => {}
                Ok(false) => debug!("PID {} exited before {} was delivered", pid, signal),
                Err(e) => {
                    warn!("Failed to send {} to PID {} ({}): {}", signal, pid, image, e);
                    failures.push(format!("pid {}: {}", pid, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failure(image, signal, failures.join(", ")))
        }
    }

    fn failure(image: &ImageName, signal: Signal, reason: String) -> ProcessError {
        if signal == Signal::SIGKILL {
            ProcessError::forced_kill_failed(image.as_str(), reason)
        } else {
            ProcessError::graceful_kill_failed(image.as_str(), reason)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_signal_to_missing_pid_is_not_an_error() {
        // Far above any default pid_max.
        assert_eq!(force_kill(999_999_999).ok(), Some(false));
    }

    #[tokio::test]
    async fn test_kill_unknown_image_is_noop() {
        let strategy = PlatformKillStrategy::new();
        let image = ImageName::new("arcade-no-such-game-91c2");
        assert!(strategy.request_close(&image).await.is_ok());
        assert!(strategy.force_kill(&image).await.is_ok());
    }
}
