//! Idle Monitor - per-process idle tracking with a graceful-then-forced kill
//!
//! One monitor exists per launched game. It owns:
//! - a check timer that fires `idle_limit` after it was (re-)armed
//! - a fallback watcher that polls every `watch_interval` whether any process
//!   with the game's image name still exists
//!
//! State machine:
//!
//! ```text
//! Active --timer--> CheckPending --idle < limit--> Active (timer re-armed)
//!                                \--idle >= limit--> KillAttempting
//! KillAttempting --grace delay--> KillAttemptingForce --forced kill issued--> Cleared
//! any state --exit event / image gone / shutdown--> Cleared
//! ```
//!
//! The monitor itself never blocks. Timers, the watcher and the kill sequence
//! run as tokio tasks and report back through `MonitorSignal`s; whoever owns
//! the monitors feeds those signals back in. Signals carry the monitor's
//! instance id (and timers a generation), so a signal from a timer that was
//! re-armed or from a monitor that was replaced is recognised and dropped.
//!
//! The kill sequence, once started, always runs to the forced phase and
//! always delivers exactly one `killed` notification. Clearing the monitor
//! (e.g. because the game exited after the graceful close) cancels its timer
//! and watcher but never the kill sequence.

use crate::notification::{IdleUpdate, KillNotification, KillStatus, ObserverSet};
use crate::settings::{MonitorSettings, MIN_PERIOD};
use arcade_common::{ImageName, MonitorKey, ProcessRecord};
use arcade_process::{IdleClock, KillStrategy, ProcessExit, ProcessProbe};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Monitor instance id generator
static INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Timer generation generator, shared by all monitors
static GENERATION_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_instance() -> u64 {
    INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed)
}

fn next_generation() -> u64 {
    GENERATION_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Lifecycle state of an idle monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    /// Check timer running, process presumed alive.
    Active,
    /// Timer fired, idle time being evaluated.
    CheckPending,
    /// Idle threshold reached, graceful close requested.
    KillAttempting,
    /// Grace delay elapsed, forced kill in progress.
    KillAttemptingForce,
    /// Terminal. Every further transition is a no-op.
    Cleared,
}

impl MonitorState {
    pub fn is_killing(&self) -> bool {
        matches!(
            self,
            MonitorState::KillAttempting | MonitorState::KillAttemptingForce
        )
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorState::Active => write!(f, "active"),
            MonitorState::CheckPending => write!(f, "check_pending"),
            MonitorState::KillAttempting => write!(f, "kill_attempting"),
            MonitorState::KillAttemptingForce => write!(f, "kill_attempting_force"),
            MonitorState::Cleared => write!(f, "cleared"),
        }
    }
}

/// Events reported back by a monitor's background tasks.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorSignal {
    /// The check timer of `generation` fired.
    CheckDue {
        key: MonitorKey,
        instance: u64,
        generation: u64,
    },
    /// The fallback watcher found no process with the monitored image name.
    ImageGone { key: MonitorKey, instance: u64 },
    /// The grace delay elapsed and the forced phase is starting.
    ForcePhaseStarted { key: MonitorKey, instance: u64 },
    /// The forced phase was issued and `killed` was broadcast.
    KillCompleted { key: MonitorKey, instance: u64 },
    /// The directly spawned process exited.
    ProcessExited {
        key: MonitorKey,
        instance: u64,
        exit: ProcessExit,
    },
}

/// Result of feeding a `CheckDue` signal to a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Signal belonged to a superseded timer or a finished monitor.
    Stale,
    /// Idle time below the limit; timer re-armed for a full interval.
    Rearmed { idle: Duration },
    /// Idle limit reached; the kill sequence is running.
    KillStarted { idle: Duration },
}

/// Collaborators shared by every monitor.
#[derive(Clone)]
pub struct MonitorContext {
    pub settings: MonitorSettings,
    pub clock: Arc<dyn IdleClock>,
    pub probe: Arc<dyn ProcessProbe>,
    pub killer: Arc<dyn KillStrategy>,
    pub observers: ObserverSet,
    pub signals: mpsc::Sender<MonitorSignal>,
}

/// Point-in-time view of a monitor, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorInfo {
    pub key: MonitorKey,
    pub path: String,
    pub image_name: String,
    pub pid: Option<u32>,
    pub state: MonitorState,
    pub launched_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Idle monitor for one launched process.
pub struct IdleMonitor {
    key: MonitorKey,
    instance: u64,
    record: ProcessRecord,
    ctx: MonitorContext,
    state: MonitorState,
    cleared: bool,
    generation: u64,
    pending_timer: Option<JoinHandle<()>>,
    watcher: Option<JoinHandle<()>>,
    launched_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl IdleMonitor {
    /// Create a monitor. Nothing is scheduled until `start` is called.
    pub fn new(key: MonitorKey, record: ProcessRecord, ctx: MonitorContext) -> Self {
        let now = Utc::now();
        Self {
            key,
            instance: next_instance(),
            record,
            ctx,
            state: MonitorState::Active,
            cleared: false,
            generation: 0,
            pending_timer: None,
            watcher: None,
            launched_at: now,
            last_activity: now,
        }
    }

    pub fn key(&self) -> MonitorKey {
        self.key
    }

    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn record(&self) -> &ProcessRecord {
        &self.record
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// Whether a check timer is outstanding.
    pub fn has_pending_timer(&self) -> bool {
        self.pending_timer.is_some()
    }

    pub fn info(&self) -> MonitorInfo {
        MonitorInfo {
            key: self.key,
            path: self.record.path_display(),
            image_name: self.record.image_name.to_string(),
            pid: self.record.pid,
            state: self.state,
            launched_at: self.launched_at,
            last_activity: self.last_activity,
        }
    }

    /// Arm the first check and start the fallback watcher.
    pub fn start(&mut self) {
        if self.cleared || self.watcher.is_some() {
            warn!("Idle monitor {} already started", self.key);
            return;
        }

        info!(
            "Idle monitor started for {} ({}, image: {}, limit: {:?}, watch: {:?})",
            self.record.path_display(),
            self.key,
            self.record.image_name,
            self.ctx.settings.idle_limit,
            self.ctx.settings.watch_interval
        );

        self.schedule_check();
        self.watcher = Some(self.spawn_watcher());
    }

    /// User activity: re-arm the check timer for a full interval from now.
    ///
    /// Ignored once the kill sequence has started or the monitor is cleared.
    /// Returns whether the timer was re-armed.
    pub fn reset(&mut self) -> bool {
        if self.cleared || self.state.is_killing() {
            debug!("Ignoring activity for {} in state {}", self.key, self.state);
            return false;
        }

        self.last_activity = Utc::now();
        self.schedule_check();
        debug!("Idle timer re-armed for {} after activity", self.key);
        true
    }

    /// Handle a fired check timer.
    pub fn on_check_due(&mut self, generation: u64) -> CheckOutcome {
        if self.cleared || self.state.is_killing() || generation != self.generation {
            debug!(
                "Stale check for {} (generation {} vs {}, state {})",
                self.key, generation, self.generation, self.state
            );
            return CheckOutcome::Stale;
        }

        self.pending_timer = None;
        self.state = MonitorState::CheckPending;

        let idle = match self.ctx.clock.idle_duration() {
            Ok(idle) => idle,
            Err(e) => {
                warn!("{} while checking {}; treating as active", e, self.key);
                Duration::ZERO
            }
        };

        if idle < self.ctx.settings.idle_limit {
            debug!(
                "Idle check for {}: {:?} < {:?}, re-polling",
                self.key, idle, self.ctx.settings.idle_limit
            );
            self.ctx.observers.notify_idle(&IdleUpdate {
                exe_path: self.record.path_display(),
                pid: self.record.pid,
                idle_sec: idle.as_secs(),
                idle_limit_sec: self.ctx.settings.idle_limit_secs(),
            });
            self.state = MonitorState::Active;
            self.schedule_check();
            return CheckOutcome::Rearmed { idle };
        }

        self.begin_kill(idle);
        CheckOutcome::KillStarted { idle }
    }

    /// The forced phase started; purely a state update.
    pub fn on_force_phase(&mut self) {
        if self.state == MonitorState::KillAttempting {
            self.state = MonitorState::KillAttemptingForce;
        }
    }

    /// Tear the monitor down: cancel timer and watcher, enter `Cleared`.
    ///
    /// Idempotent; returns `false` if the monitor was already cleared. An
    /// in-flight kill sequence is not cancelled.
    pub fn clear(&mut self, reason: &str) -> bool {
        if self.cleared {
            return false;
        }
        self.cleared = true;
        self.state = MonitorState::Cleared;

        if let Some(timer) = self.pending_timer.take() {
            timer.abort();
        }
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }

        info!(
            "Idle monitor cleared for {} ({}): {}",
            self.record.path_display(),
            self.key,
            reason
        );
        true
    }

    /// Cancel any pending check and schedule a fresh one `idle_limit` from now.
    fn schedule_check(&mut self) {
        if let Some(timer) = self.pending_timer.take() {
            timer.abort();
        }

        let generation = next_generation();
        self.generation = generation;

        let signal = MonitorSignal::CheckDue {
            key: self.key,
            instance: self.instance,
            generation,
        };
        let delay = self.ctx.settings.idle_limit;
        let tx = self.ctx.signals.clone();

        self.pending_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(signal).await;
        }));
    }

    fn spawn_watcher(&self) -> JoinHandle<()> {
        let key = self.key;
        let instance = self.instance;
        let image: ImageName = self.record.image_name.clone();
        let probe = Arc::clone(&self.ctx.probe);
        let tx = self.ctx.signals.clone();
        let period = self.ctx.settings.watch_interval;

        tokio::spawn(async move {
            let mut ticker = interval(period.max(MIN_PERIOD));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately; the first real check is one period out.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match probe.image_running(&image).await {
                    Ok(true) => {}
                    Ok(false) => {
                        info!("No process named {} is running any more ({})", image, key);
                        let _ = tx.send(MonitorSignal::ImageGone { key, instance }).await;
                        break;
                    }
                    Err(e) => warn!("Fallback watcher for {}: {}", key, e),
                }
            }
        })
    }

    fn begin_kill(&mut self, idle: Duration) {
        if let Some(timer) = self.pending_timer.take() {
            timer.abort();
        }
        self.state = MonitorState::KillAttempting;

        let notification = KillNotification {
            exe_path: self.record.path_display(),
            pid: self.record.pid,
            idle_sec: self.ctx.settings.idle_limit_secs(),
            status: KillStatus::Attempting,
        };

        warn!(
            "Idle limit reached for {} ({}): idle {:?} >= {:?}, closing {}",
            notification.exe_path,
            self.key,
            idle,
            self.ctx.settings.idle_limit,
            self.record.image_name
        );
        self.ctx.observers.notify_kill(&notification);

        tokio::spawn(run_kill_sequence(
            self.key,
            self.instance,
            self.record.image_name.clone(),
            notification,
            self.ctx.clone(),
        ));
    }
}

impl Drop for IdleMonitor {
    fn drop(&mut self) {
        self.clear("monitor dropped");
    }
}

impl fmt::Debug for IdleMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleMonitor")
            .field("key", &self.key)
            .field("instance", &self.instance)
            .field("record", &self.record)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Graceful close, fixed grace delay, forced kill, `killed` notification.
///
/// Runs detached and is never aborted: once `attempting` went out, the forced
/// phase and the `killed` notification always follow. Kill errors are logged
/// and do not change the outcome.
///
/// The grace delay starts together with the close request. A close request
/// still pending when the delay ends is abandoned.
async fn run_kill_sequence(
    key: MonitorKey,
    instance: u64,
    image: ImageName,
    attempting: KillNotification,
    ctx: MonitorContext,
) {
    let graceful = {
        let killer = Arc::clone(&ctx.killer);
        let image = image.clone();
        tokio::spawn(async move {
            if let Err(e) = killer.request_close(&image).await {
                warn!("Graceful phase for {} ({}): {}", image, key, e);
            }
        })
    };

    tokio::time::sleep(ctx.settings.grace_delay).await;
    if !graceful.is_finished() {
        warn!(
            "Graceful phase for {} ({}) still pending after {:?}, abandoning it",
            image, key, ctx.settings.grace_delay
        );
        graceful.abort();
    }

    let _ = ctx
        .signals
        .send(MonitorSignal::ForcePhaseStarted { key, instance })
        .await;

    if let Err(e) = ctx.killer.force_kill(&image).await {
        error!("Forced phase for {} ({}): {}", image, key, e);
    }

    info!("Kill sequence finished for {} ({})", attempting.exe_path, key);
    ctx.observers
        .notify_kill(&attempting.with_status(KillStatus::Killed));

    let _ = ctx
        .signals
        .send(MonitorSignal::KillCompleted { key, instance })
        .await;
}
