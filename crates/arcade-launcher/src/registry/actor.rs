//! MonitorRegistryActor - internal actor that owns every idle monitor
//!
//! The actor runs in a single task. It is the only place where monitors are
//! created, transitioned, and removed, so registry membership and each
//! monitor's `cleared` flag always change together.

use super::commands::RegistryCommand;
use super::types::{LaunchCompleted, LaunchResult, RegistryState};
use arcade_common::{MonitorKey, ProcessError, ProcessRecord, ProcessResult};
use arcade_monitoring::{CheckOutcome, IdleMonitor, MonitorContext, MonitorInfo, MonitorSignal};
use arcade_process::{ExitFuture, ProcessSpawner};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Capacity of the launch completion channel
pub(super) const LAUNCH_QUEUE_CAPACITY: usize = 16;

pub(super) struct MonitorRegistryActor {
    ctx: MonitorContext,
    spawner: Arc<dyn ProcessSpawner>,
    monitors: HashMap<MonitorKey, IdleMonitor>,
    state: RegistryState,
    launch_tx: mpsc::Sender<LaunchCompleted>,
    /// Sequence for monitors whose process reported no identifier
    next_detached: u64,
}

impl MonitorRegistryActor {
    pub(super) fn new(
        ctx: MonitorContext,
        spawner: Arc<dyn ProcessSpawner>,
        launch_tx: mpsc::Sender<LaunchCompleted>,
    ) -> Self {
        Self {
            ctx,
            spawner,
            monitors: HashMap::new(),
            state: RegistryState::Running,
            launch_tx,
            next_detached: 1,
        }
    }

    /// Main event loop for the actor.
    ///
    /// Monitor signals have priority over launch completions, and both over
    /// commands, so a queued exit or kill completion is applied before any
    /// query observes the registry. The loop ends once every `Launcher`
    /// handle is dropped; monitors still registered at that point are cleared.
    pub(super) async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<RegistryCommand>,
        mut signal_rx: mpsc::Receiver<MonitorSignal>,
        mut launch_rx: mpsc::Receiver<LaunchCompleted>,
    ) {
        loop {
            tokio::select! {
                biased;

                // The actor keeps a sender in `ctx`, so this channel never closes.
                Some(signal) = signal_rx.recv() => self.handle_signal(signal),

                Some(completed) = launch_rx.recv() => self.handle_launch_completed(completed),

                maybe_cmd = cmd_rx.recv() => match maybe_cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        info!("All launcher handles dropped; clearing monitors");
                        self.clear_all("launcher dropped");
                        break;
                    }
                },
            }
        }

        info!("Monitor registry actor terminated");
    }

    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Launch { path, resp } => self.handle_launch(path, resp),
            RegistryCommand::ReportActivity { resp } => {
                let _ = resp.send(self.handle_report_activity());
            }
            RegistryCommand::Unregister { key, resp } => {
                let _ = resp.send(self.unregister(key, "unregistered by caller"));
            }
            RegistryCommand::ActiveMonitors { resp } => {
                let _ = resp.send(self.active_monitors());
            }
            RegistryCommand::MonitorCount { resp } => {
                let _ = resp.send(self.monitors.len());
            }
            RegistryCommand::Shutdown { resp } => {
                let cleared = self.clear_all("launcher shutdown");
                if self.state != RegistryState::Stopped {
                    info!("Launcher stopped ({} monitor(s) cleared)", cleared);
                }
                self.state = RegistryState::Stopped;
                let _ = resp.send(cleared);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Launch
    // -------------------------------------------------------------------------

    /// Spawning runs in its own task so a slow process start never stalls
    /// timers or activity for the games already running.
    fn handle_launch(
        &mut self,
        path: PathBuf,
        resp: oneshot::Sender<ProcessResult<LaunchResult>>,
    ) {
        if self.state == RegistryState::Stopped {
            let _ = resp.send(Err(ProcessError::registry_unavailable("launch")));
            return;
        }

        info!("Launching {}", path.display());
        let spawner = Arc::clone(&self.spawner);
        let tx = self.launch_tx.clone();
        tokio::spawn(async move {
            let result = spawner.spawn(&path).await;
            let _ = tx.send(LaunchCompleted { path, result, resp }).await;
        });
    }

    fn handle_launch_completed(&mut self, completed: LaunchCompleted) {
        let LaunchCompleted { path, result, resp } = completed;

        let spawned = match result {
            Ok(spawned) => spawned,
            Err(e) => {
                error!("{}", e);
                let _ = resp.send(Err(e));
                return;
            }
        };

        if self.state == RegistryState::Stopped {
            warn!(
                "{} started after shutdown (PID: {:?}); it will not be monitored",
                path.display(),
                spawned.pid
            );
            let _ = resp.send(Err(ProcessError::registry_unavailable("launch")));
            return;
        }

        let record = ProcessRecord::new(path, spawned.pid);
        let image_name = record.image_name.clone();
        let key = self.register(record, spawned.exit);
        let _ = resp.send(Ok(LaunchResult {
            key,
            pid: spawned.pid,
            image_name,
        }));
    }

    // -------------------------------------------------------------------------
    // Registry operations
    // -------------------------------------------------------------------------

    /// Create, start and store a monitor for `record`.
    ///
    /// A monitor already stored under the same key is cleared and replaced.
    fn register(&mut self, record: ProcessRecord, exit: ExitFuture) -> MonitorKey {
        let key = match record.pid {
            Some(pid) => MonitorKey::Pid(pid),
            None => {
                warn!(
                    "{}; falling back to name-based monitoring of {}",
                    ProcessError::identifier_unavailable(record.path_display()),
                    record.image_name
                );
                let key = MonitorKey::Detached(self.next_detached);
                self.next_detached += 1;
                key
            }
        };

        if let Some(mut previous) = self.monitors.remove(&key) {
            warn!("Replacing existing monitor for {}", key);
            previous.clear("replaced by a new launch");
        }

        let mut monitor = IdleMonitor::new(key, record, self.ctx.clone());
        monitor.start();

        spawn_exit_watch(key, monitor.instance(), exit, self.ctx.signals.clone());

        self.monitors.insert(key, monitor);
        debug!("Registry now holds {} monitor(s)", self.monitors.len());
        key
    }

    /// Remove and clear a monitor. Returns `false` if none was registered.
    fn unregister(&mut self, key: MonitorKey, reason: &str) -> bool {
        match self.monitors.remove(&key) {
            Some(mut monitor) => monitor.clear(reason),
            None => {
                debug!("No monitor registered for {}", key);
                false
            }
        }
    }

    /// Activity fans out to every monitor; each decides for itself whether it
    /// can still be re-armed.
    fn handle_report_activity(&mut self) -> usize {
        self.ctx.clock.record_activity();
        let rearmed = self
            .monitors
            .values_mut()
            .map(|monitor| monitor.reset())
            .filter(|rearmed| *rearmed)
            .count();
        debug!(
            "Activity re-armed {} of {} monitor(s)",
            rearmed,
            self.monitors.len()
        );
        rearmed
    }

    fn active_monitors(&self) -> Vec<MonitorInfo> {
        let mut infos: Vec<MonitorInfo> = self.monitors.values().map(|m| m.info()).collect();
        infos.sort_by_key(|info| info.launched_at);
        infos
    }

    fn clear_all(&mut self, reason: &str) -> usize {
        let mut cleared = 0;
        for (_, mut monitor) in self.monitors.drain() {
            if monitor.clear(reason) {
                cleared += 1;
            }
        }
        cleared
    }

    // -------------------------------------------------------------------------
    // Monitor signals
    // -------------------------------------------------------------------------

    /// Monitor registered under `key` that was created as `instance`.
    fn monitor_mut(&mut self, key: MonitorKey, instance: u64) -> Option<&mut IdleMonitor> {
        self.monitors
            .get_mut(&key)
            .filter(|monitor| monitor.instance() == instance)
    }

    fn remove_instance(&mut self, key: MonitorKey, instance: u64, reason: &str) {
        if self.monitor_mut(key, instance).is_some() {
            self.unregister(key, reason);
        } else {
            debug!("Ignoring '{}' for {}: monitor already gone", reason, key);
        }
    }

    fn handle_signal(&mut self, signal: MonitorSignal) {
        match signal {
            MonitorSignal::CheckDue {
                key,
                instance,
                generation,
            } => {
                let Some(monitor) = self.monitor_mut(key, instance) else {
                    debug!("Check for {} arrived after the monitor was removed", key);
                    return;
                };
                match monitor.on_check_due(generation) {
                    CheckOutcome::Stale => {}
                    CheckOutcome::Rearmed { idle } => {
                        debug!("{} idle for {:?}; check re-armed", key, idle)
                    }
                    CheckOutcome::KillStarted { idle } => {
                        info!("{} idle for {:?}; kill sequence started", key, idle)
                    }
                }
            }
            MonitorSignal::ForcePhaseStarted { key, instance } => {
                if let Some(monitor) = self.monitor_mut(key, instance) {
                    monitor.on_force_phase();
                }
            }
            MonitorSignal::KillCompleted { key, instance } => {
                self.remove_instance(key, instance, "kill sequence completed");
            }
            MonitorSignal::ImageGone { key, instance } => {
                self.remove_instance(key, instance, "no process with the image name is running");
            }
            MonitorSignal::ProcessExited {
                key,
                instance,
                exit,
            } => {
                let reason = format!("process exited ({})", exit);
                self.remove_instance(key, instance, &reason);
            }
        }
    }
}

/// Forward the process exit to the actor as a `ProcessExited` signal.
fn spawn_exit_watch(
    key: MonitorKey,
    instance: u64,
    exit: ExitFuture,
    signals: mpsc::Sender<MonitorSignal>,
) {
    tokio::spawn(async move {
        let exit = exit.await;
        let _ = signals
            .send(MonitorSignal::ProcessExited {
                key,
                instance,
                exit,
            })
            .await;
    });
}
