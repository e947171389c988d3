//! Kill and idle notifications, and their delivery to observers.
//!
//! Delivery is synchronous and happens on the task that drives the monitors,
//! so observers must not block. One observer failing (error or panic) never
//! stops delivery to the others and never affects monitor state.

use arcade_common::ProcessError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Phase of an idle kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KillStatus {
    /// Idle threshold reached; graceful close requested.
    Attempting,
    /// Forced kill issued; the monitor is done.
    Killed,
}

impl fmt::Display for KillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KillStatus::Attempting => write!(f, "attempting"),
            KillStatus::Killed => write!(f, "killed"),
        }
    }
}

/// Payload broadcast once per kill phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillNotification {
    pub exe_path: String,
    pub pid: Option<u32>,
    /// The idle threshold that was crossed, in seconds.
    pub idle_sec: u64,
    pub status: KillStatus,
}

impl KillNotification {
    /// The same payload with a different status.
    pub fn with_status(&self, status: KillStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

/// Idle time observed by a check that stayed below the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleUpdate {
    pub exe_path: String,
    pub pid: Option<u32>,
    pub idle_sec: u64,
    pub idle_limit_sec: u64,
}

/// Everything the launcher reports to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LauncherEvent {
    Kill(KillNotification),
    IdleUpdate(IdleUpdate),
}

/// Receiver of launcher notifications.
pub trait KillObserver: Send + Sync {
    /// Name used in logs when delivery fails.
    fn name(&self) -> &str {
        "observer"
    }

    fn on_kill(&self, notification: &KillNotification) -> Result<(), String>;

    fn on_idle_update(&self, _update: &IdleUpdate) -> Result<(), String> {
        Ok(())
    }
}

/// Observer that forwards every event into an unbounded channel.
pub struct ChannelObserver {
    name: String,
    tx: mpsc::UnboundedSender<LauncherEvent>,
}

impl ChannelObserver {
    pub fn new(name: impl Into<String>, tx: mpsc::UnboundedSender<LauncherEvent>) -> Self {
        Self {
            name: name.into(),
            tx,
        }
    }

    /// Create an observer together with the receiving end of its channel.
    pub fn channel(name: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<LauncherEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(name, tx), rx)
    }

    fn forward(&self, event: LauncherEvent) -> Result<(), String> {
        self.tx
            .send(event)
            .map_err(|_| "receiver dropped".to_string())
    }
}

impl KillObserver for ChannelObserver {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_kill(&self, notification: &KillNotification) -> Result<(), String> {
        self.forward(LauncherEvent::Kill(notification.clone()))
    }

    fn on_idle_update(&self, update: &IdleUpdate) -> Result<(), String> {
        self.forward(LauncherEvent::IdleUpdate(update.clone()))
    }
}

/// Shared, cloneable set of observers.
///
/// Clones share the same list, so an observer added after monitors were
/// created still receives their notifications.
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Arc<RwLock<Vec<Arc<dyn KillObserver>>>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, observer: Arc<dyn KillObserver>) {
        debug!("Registered observer '{}'", observer.name());
        self.observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(observer);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver a kill notification to every observer.
    ///
    /// Returns the delivery failures, which have already been logged.
    pub fn notify_kill(&self, notification: &KillNotification) -> Vec<ProcessError> {
        self.deliver(|observer| observer.on_kill(notification))
    }

    /// Deliver an idle update to every observer.
    pub fn notify_idle(&self, update: &IdleUpdate) -> Vec<ProcessError> {
        self.deliver(|observer| observer.on_idle_update(update))
    }

    fn deliver<F>(&self, send: F) -> Vec<ProcessError>
    where
        F: Fn(&dyn KillObserver) -> Result<(), String>,
    {
        let mut failures = Vec::new();
        for observer in self.snapshot() {
            let outcome = match catch_unwind(AssertUnwindSafe(|| send(observer.as_ref()))) {
                Ok(result) => result,
                Err(_) => Err("observer panicked".to_string()),
            };
            if let Err(reason) = outcome {
                let error = ProcessError::notification_failed(observer.name(), reason);
                warn!("{}", error);
                failures.push(error);
            }
        }
        failures
    }

    // Delivery runs on a copy so observers can register more observers.
    fn snapshot(&self) -> Vec<Arc<dyn KillObserver>> {
        self.observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Failing;

    impl KillObserver for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn on_kill(&self, _notification: &KillNotification) -> Result<(), String> {
            Err("window closed".to_string())
        }
    }

    struct Panicking;

    impl KillObserver for Panicking {
        fn on_kill(&self, _notification: &KillNotification) -> Result<(), String> {
            panic!("observer bug");
        }
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl KillObserver for Counting {
        fn on_kill(&self, _notification: &KillNotification) -> Result<(), String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sample() -> KillNotification {
        KillNotification {
            exe_path: "/games/foo.exe".to_string(),
            pid: Some(4242),
            idle_sec: 120,
            status: KillStatus::Attempting,
        }
    }

    #[test]
    fn test_kill_notification_wire_format() {
        let json = serde_json::to_value(LauncherEvent::Kill(sample())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "event": "kill",
                "exePath": "/games/foo.exe",
                "pid": 4242,
                "idleSec": 120,
                "status": "attempting"
            })
        );
    }

    #[test]
    fn test_with_status_keeps_payload() {
        let killed = sample().with_status(KillStatus::Killed);
        assert_eq!(killed.status, KillStatus::Killed);
        assert_eq!(killed.exe_path, "/games/foo.exe");
        assert_eq!(killed.pid, Some(4242));
    }

    #[test]
    fn test_failing_observers_do_not_block_others() {
        let observers = ObserverSet::new();
        let counter = Arc::new(Counting::default());
        observers.add(Arc::new(Failing));
        observers.add(Arc::new(Panicking));
        observers.add(counter.clone());

        let failures = observers.notify_kill(&sample());

        assert_eq!(failures.len(), 2);
        assert!(matches!(
            &failures[0],
            ProcessError::NotificationFailed { observer, .. } if observer == "failing"
        ));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_channel_observer_forwards_events() {
        let (observer, mut rx) = ChannelObserver::channel("ui");
        let observers = ObserverSet::new();
        observers.add(Arc::new(observer));

        let update = IdleUpdate {
            exe_path: "/games/foo.exe".to_string(),
            pid: None,
            idle_sec: 12,
            idle_limit_sec: 120,
        };
        assert!(observers.notify_idle(&update).is_empty());
        assert!(observers.notify_kill(&sample()).is_empty());

        assert_eq!(rx.try_recv().unwrap(), LauncherEvent::IdleUpdate(update));
        assert_eq!(rx.try_recv().unwrap(), LauncherEvent::Kill(sample()));
    }

    #[test]
    fn test_channel_observer_reports_dropped_receiver() {
        let (observer, rx) = ChannelObserver::channel("ui");
        drop(rx);
        assert_eq!(observer.on_kill(&sample()), Err("receiver dropped".to_string()));
    }

    #[test]
    fn test_clones_share_observers() {
        let observers = ObserverSet::new();
        let clone = observers.clone();
        clone.add(Arc::new(Counting::default()));
        assert_eq!(observers.len(), 1);
        assert!(!observers.is_empty());
    }
}
