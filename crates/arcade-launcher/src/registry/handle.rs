//! Launcher handle - public API for launching games and feeding activity.
//!
//! `Launcher` is a lightweight handle that can be cloned and shared across
//! tasks. Every method sends a command to the registry actor and awaits its
//! reply.

use super::commands::RegistryCommand;
use super::types::LaunchResult;
use arcade_common::{MonitorKey, ProcessError, ProcessResult};
use arcade_monitoring::{ChannelObserver, KillObserver, LauncherEvent, MonitorInfo, ObserverSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

#[derive(Clone)]
pub struct Launcher {
    pub(super) cmd_tx: mpsc::Sender<RegistryCommand>,
    pub(super) observers: ObserverSet,
}

impl Launcher {
    fn map_send_err(operation: &str) -> ProcessError {
        ProcessError::registry_unavailable(format!("{} (channel closed)", operation))
    }

    fn map_recv_err(operation: &str) -> ProcessError {
        ProcessError::registry_unavailable(format!("{} (response dropped)", operation))
    }

    async fn request<T>(
        &self,
        operation: &str,
        make: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> ProcessResult<T> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| Self::map_send_err(operation))?;
        rx.await.map_err(|_| Self::map_recv_err(operation))
    }

    /// Start the executable at `path` and put it under idle monitoring.
    ///
    /// Exactly one monitor is registered per started process. If the process
    /// reports no identifier it is still monitored, by image name only, under
    /// a `MonitorKey::Detached` key.
    ///
    /// # Errors
    /// - `SpawnFailed` if no process could be started; nothing is registered
    /// - `RegistryUnavailable` after `shutdown`
    pub async fn launch(&self, path: impl AsRef<Path>) -> ProcessResult<LaunchResult> {
        let path = path.as_ref().to_path_buf();
        self.request("launch", |resp| RegistryCommand::Launch { path, resp })
            .await?
    }

    /// Report user activity. Returns how many monitors re-armed their timer.
    pub async fn report_activity(&self) -> ProcessResult<usize> {
        self.request("report_activity", |resp| RegistryCommand::ReportActivity {
            resp,
        })
        .await
    }

    /// Stop monitoring `key`. Returns `false` if it was not registered.
    pub async fn unregister(&self, key: MonitorKey) -> ProcessResult<bool> {
        self.request("unregister", |resp| RegistryCommand::Unregister { key, resp })
            .await
    }

    pub async fn active_monitors(&self) -> ProcessResult<Vec<MonitorInfo>> {
        self.request("active_monitors", |resp| RegistryCommand::ActiveMonitors {
            resp,
        })
        .await
    }

    pub async fn monitor_count(&self) -> ProcessResult<usize> {
        self.request("monitor_count", |resp| RegistryCommand::MonitorCount { resp })
            .await
    }

    /// Clear every monitor and refuse further launches.
    ///
    /// Kill sequences already in flight still finish and notify. Returns the
    /// number of monitors that were cleared.
    pub async fn shutdown(&self) -> ProcessResult<usize> {
        self.request("shutdown", |resp| RegistryCommand::Shutdown { resp })
            .await
    }

    /// Add an observer for kill and idle notifications.
    pub fn subscribe(&self, observer: Arc<dyn KillObserver>) {
        self.observers.add(observer);
    }

    /// Subscribe a channel observer and return its receiving end.
    pub fn events(&self, name: &str) -> mpsc::UnboundedReceiver<LauncherEvent> {
        let (observer, rx) = ChannelObserver::channel(name);
        self.subscribe(Arc::new(observer));
        rx
    }
}
