//! Timing constants for idle monitoring.

use std::time::Duration;
use tracing::warn;

/// Default idle threshold before a game is terminated.
pub const DEFAULT_IDLE_LIMIT: Duration = Duration::from_secs(120);

/// Default delay between the graceful and the forced kill phase.
pub const DEFAULT_GRACE_DELAY: Duration = Duration::from_secs(2);

/// Default interval of the fallback existence poll.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(5);

/// Smallest duration a monitor timer runs with.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Timing configuration shared by every idle monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Idle time at which the kill sequence starts. Also the re-poll period.
    pub idle_limit: Duration,
    /// Fixed wait between the graceful close request and the forced kill.
    pub grace_delay: Duration,
    /// How often the fallback watcher checks that the image still runs.
    pub watch_interval: Duration,
}

impl MonitorSettings {
    pub fn idle_limit_secs(&self) -> u64 {
        self.idle_limit.as_secs()
    }

    /// Copy of these settings with every zero duration raised to `MIN_PERIOD`.
    ///
    /// Settings loaded from a config file are validated already; this covers
    /// settings built in code.
    pub fn clamped(self) -> Self {
        Self {
            idle_limit: clamp("idle_limit", self.idle_limit),
            grace_delay: clamp("grace_delay", self.grace_delay),
            watch_interval: clamp("watch_interval", self.watch_interval),
        }
    }
}

fn clamp(name: &str, value: Duration) -> Duration {
    if value < MIN_PERIOD {
        warn!("{} of {:?} is too small, using {:?}", name, value, MIN_PERIOD);
        MIN_PERIOD
    } else {
        value
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            idle_limit: DEFAULT_IDLE_LIMIT,
            grace_delay: DEFAULT_GRACE_DELAY,
            watch_interval: DEFAULT_WATCH_INTERVAL,
        }
    }
}
