// E2E test helpers for the arcade kiosk launcher
//
// Games are small shell scripts staged in a temp dir under a unique file
// name. On Linux a script started through its shebang carries the script's
// file name as its process name, so name-based probing and killing see it
// exactly like a real game executable.

use arcade_common::ImageName;
use arcade_monitoring::{KillStatus, LauncherEvent};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use sysinfo::System;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

static GAME_COUNTER: AtomicU32 = AtomicU32::new(0);

/// A staged game script. Every process carrying its name is killed on drop.
pub struct StagedGame {
    _dir: TempDir,
    pub path: PathBuf,
    pub image: ImageName,
}

impl StagedGame {
    /// Stage a script whose body is `body` (shell, after the shebang).
    pub fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");

        // Process names are truncated to 15 bytes; stay well below.
        let n = GAME_COUNTER.fetch_add(1, Ordering::SeqCst);
        let name = format!("gm{}{}.sh", std::process::id() % 100_000, n);
        let path = dir.path().join(&name);

        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write game script");
        make_executable(&path);

        Self {
            _dir: dir,
            image: ImageName::new(name),
            path,
        }
    }

    /// A game that runs for `secs` and then exits on its own.
    pub fn exiting_after(secs: u64) -> Self {
        Self::new(&format!("sleep {}", secs))
    }

    /// A game that ignores the close request and only dies to a forced kill.
    pub fn stubborn() -> Self {
        Self::new("trap '' TERM\nwhile true; do sleep 1; done")
    }

    /// Identifiers of every running process with this game's name.
    pub fn running_pids(&self) -> Vec<u32> {
        let mut system = System::new();
        system.refresh_processes();
        system
            .processes()
            .iter()
            .filter(|(_, process)| self.image.matches(process.name()))
            .map(|(pid, _)| pid.as_u32())
            .collect()
    }

    pub fn is_running(&self) -> bool {
        !self.running_pids().is_empty()
    }
}

impl Drop for StagedGame {
    fn drop(&mut self) {
        kill_all(&self.running_pids());
    }
}

#[cfg(unix)]
fn kill_all(pids: &[u32]) {
    for pid in pids {
        let _ = arcade_process::force_kill(*pid);
    }
}

#[cfg(not(unix))]
fn kill_all(_pids: &[u32]) {}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)
        .expect("Failed to stat game script")
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("Failed to chmod game script");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

/// Poll `check` every 50ms until it returns true or `limit` expires.
pub async fn wait_until<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check().await
}

/// Collect kill statuses from `events` for up to `limit`, stopping early
/// once `killed` was seen.
pub async fn collect_kill_statuses(
    events: &mut mpsc::UnboundedReceiver<LauncherEvent>,
    limit: Duration,
) -> Vec<KillStatus> {
    let mut statuses = Vec::new();
    let deadline = Instant::now() + limit;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, events.recv()).await {
            Ok(Some(LauncherEvent::Kill(notification))) => {
                statuses.push(notification.status);
                if notification.status == KillStatus::Killed {
                    break;
                }
            }
            Ok(Some(LauncherEvent::IdleUpdate(_))) => {}
            Ok(None) | Err(_) => break,
        }
    }
    statuses
}
