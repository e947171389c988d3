//! # Arcade Monitoring
//!
//! Idle-triggered lifecycle monitoring for launched games.
//!
//! This crate provides:
//! - `IdleMonitor`, the per-process state machine that polls the idle clock
//!   and runs the graceful-then-forced kill sequence
//! - Kill and idle notifications, and the observer fan-out that delivers them
//! - `MonitorSettings`, the timing constants (idle limit, grace delay, watch interval)
//!
//! Monitors do not talk to each other or to the registry directly. Every
//! timer, watcher and kill task reports back through a `MonitorSignal`
//! channel owned by whoever drives the monitors.

pub mod idle_monitor;
pub mod notification;
pub mod settings;

pub use idle_monitor::{
    CheckOutcome, IdleMonitor, MonitorContext, MonitorInfo, MonitorSignal, MonitorState,
};
pub use notification::{
    ChannelObserver, IdleUpdate, KillNotification, KillObserver, KillStatus, LauncherEvent,
    ObserverSet,
};
pub use settings::MonitorSettings;
