//! Monitor registry - actor-based ownership of every idle monitor
//!
//! - A single actor task owns the `MonitorKey -> IdleMonitor` map
//! - `RegistryCommand` messages carry requests from `Launcher` handles
//! - Monitor timers, watchers, kill sequences and exit watchers report back
//!   to the same actor as `MonitorSignal`s
//! - Process spawning runs in a separate task and is handed back as a
//!   launch completion, so the actor never awaits anything itself
//!
//! ## Actor Lifecycle
//!
//! After `shutdown()` the actor keeps answering queries but refuses launches.
//! It terminates once every `Launcher` handle is dropped, clearing any
//! monitor still registered.
//!
//! ## Late messages
//!
//! Signals carry the monitor instance they were issued for. A signal for a
//! key that is gone, or that now belongs to a newer monitor, is dropped.

mod actor;
mod commands;
mod handle;
mod types;


pub use handle::Launcher;
pub use types::LaunchResult;

use crate::config::LauncherConfig;
use actor::{MonitorRegistryActor, LAUNCH_QUEUE_CAPACITY};
use arcade_monitoring::{KillObserver, MonitorContext, MonitorSettings, ObserverSet};
use arcade_process::{
    CommandSpawner, IdleClock, KillStrategy, PlatformKillStrategy, ProcessProbe, ProcessSpawner,
    SystemIdleClock, SystemProcessProbe,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Capacity of the handle -> actor command channel
const COMMAND_CAPACITY: usize = 32;

/// Capacity of the monitor -> actor signal channel
const SIGNAL_CAPACITY: usize = 256;

/// Assembles a `Launcher` from its collaborators.
///
/// Every collaborator defaults to the platform implementation.
pub struct LauncherBuilder {
    settings: MonitorSettings,
    clock: Option<Arc<dyn IdleClock>>,
    probe: Option<Arc<dyn ProcessProbe>>,
    killer: Option<Arc<dyn KillStrategy>>,
    spawner: Option<Arc<dyn ProcessSpawner>>,
    observers: ObserverSet,
}

impl LauncherBuilder {
    pub fn new(settings: MonitorSettings) -> Self {
        Self {
            settings,
            clock: None,
            probe: None,
            killer: None,
            spawner: None,
            observers: ObserverSet::new(),
        }
    }

    pub fn clock(mut self, clock: Arc<dyn IdleClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn ProcessProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn killer(mut self, killer: Arc<dyn KillStrategy>) -> Self {
        self.killer = Some(killer);
        self
    }

    pub fn spawner(mut self, spawner: Arc<dyn ProcessSpawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn observer(self, observer: Arc<dyn KillObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    /// Spawn the registry actor and return a handle to it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Launcher {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_CAPACITY);
        let (launch_tx, launch_rx) = mpsc::channel(LAUNCH_QUEUE_CAPACITY);
        let settings = self.settings.clamped();

        let ctx = MonitorContext {
            settings,
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(SystemIdleClock::new())),
            probe: self
                .probe
                .unwrap_or_else(|| Arc::new(SystemProcessProbe::new())),
            killer: self
                .killer
                .unwrap_or_else(|| Arc::new(PlatformKillStrategy::new())),
            observers: self.observers.clone(),
            signals: signal_tx,
        };
        let spawner = self
            .spawner
            .unwrap_or_else(|| Arc::new(CommandSpawner::new()));

        info!(
            "Starting launcher (idle limit: {:?}, grace delay: {:?}, watch interval: {:?})",
            settings.idle_limit, settings.grace_delay, settings.watch_interval
        );

        let actor = MonitorRegistryActor::new(ctx, spawner, launch_tx);
        tokio::spawn(actor.run(cmd_rx, signal_rx, launch_rx));

        Launcher {
            cmd_tx,
            observers: self.observers,
        }
    }
}

impl Launcher {
    pub fn builder(settings: MonitorSettings) -> LauncherBuilder {
        LauncherBuilder::new(settings)
    }

    /// Launcher with platform collaborators and the given timing.
    pub fn new(settings: MonitorSettings) -> Self {
        LauncherBuilder::new(settings).build()
    }

    pub fn from_config(config: &LauncherConfig) -> Self {
        Self::new(config.monitor_settings())
    }
}
