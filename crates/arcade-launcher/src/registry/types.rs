//! Shared data types for the monitor registry.

use arcade_common::{ImageName, MonitorKey, ProcessResult};
use arcade_process::SpawnedProcess;
use std::path::PathBuf;
use tokio::sync::oneshot;

/// Registry lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Running,
    Stopped,
}

/// Outcome of a successful launch.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchResult {
    /// Registry key of the monitor watching the new process.
    pub key: MonitorKey,
    /// OS identifier, if the platform reported one.
    pub pid: Option<u32>,
    pub image_name: ImageName,
}

/// Spawn outcome handed back to the actor by a launch task.
pub(super) struct LaunchCompleted {
    pub path: PathBuf,
    pub result: ProcessResult<SpawnedProcess>,
    pub resp: oneshot::Sender<ProcessResult<LaunchResult>>,
}
