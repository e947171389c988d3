//! Internal command protocol for the monitor registry actor.
//!
//! These types are NOT exposed outside the registry module; external code
//! goes through `Launcher` methods.

use super::types::LaunchResult;
use arcade_common::{MonitorKey, ProcessResult};
use arcade_monitoring::MonitorInfo;
use std::path::PathBuf;
use tokio::sync::oneshot;

/// Command messages for the registry actor.
pub(super) enum RegistryCommand {
    /// Spawn an executable and register an idle monitor for it
    Launch {
        path: PathBuf,
        resp: oneshot::Sender<ProcessResult<LaunchResult>>,
    },
    /// User input observed; re-arm every monitor's check timer
    ReportActivity { resp: oneshot::Sender<usize> },
    /// Remove and clear one monitor
    Unregister {
        key: MonitorKey,
        resp: oneshot::Sender<bool>,
    },
    /// Snapshot of every registered monitor
    ActiveMonitors {
        resp: oneshot::Sender<Vec<MonitorInfo>>,
    },
    /// Number of registered monitors
    MonitorCount { resp: oneshot::Sender<usize> },
    /// Clear every monitor and refuse further launches
    Shutdown { resp: oneshot::Sender<usize> },
}
