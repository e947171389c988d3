//! System-wide user idle time.
//!
//! `IdleClock` answers "how long since the last user input". On Windows the
//! OS tracks this for every input device (`GetLastInputInfo`); on Linux the X
//! server does (MIT-SCREEN-SAVER `ms_since_user_input`). Without either, the
//! clock counts from the last activity signal the presentation layer reported.

use arcade_common::ProcessResult;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Source of "seconds since last global user input".
pub trait IdleClock: Send + Sync {
    /// Current idle duration, queried fresh on every call.
    fn idle_duration(&self) -> ProcessResult<Duration>;

    /// Note that user input just happened.
    ///
    /// Clocks backed by the OS ignore this; it only matters for clocks that
    /// cannot see input themselves.
    fn record_activity(&self) {}
}

/// Idle clock driven purely by reported activity.
#[derive(Debug)]
pub struct ActivityIdleClock {
    last_activity: Mutex<Instant>,
}

impl ActivityIdleClock {
    /// Create a clock that considers "now" the last moment of activity.
    pub fn new() -> Self {
        Self {
            last_activity: Mutex::new(Instant::now()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Instant> {
        // An `Instant` cannot be left half-written, so a poisoned lock is still usable.
        self.last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ActivityIdleClock {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleClock for ActivityIdleClock {
    fn idle_duration(&self) -> ProcessResult<Duration> {
        Ok(self.lock().elapsed())
    }

    fn record_activity(&self) {
        *self.lock() = Instant::now();
    }
}

/// The idle clock appropriate for the current platform.
pub struct SystemIdleClock {
    #[cfg(target_os = "linux")]
    x11: Option<x11_idle::X11IdleSource>,
    #[cfg(not(windows))]
    fallback: ActivityIdleClock,
}

impl SystemIdleClock {
    /// Clock for the default display (`$DISPLAY` on Linux).
    pub fn new() -> Self {
        Self::with_display(None)
    }

    /// Clock for the named X display. Ignored outside Linux.
    ///
    /// When the display cannot be reached, idle time falls back to reported
    /// activity.
    #[allow(unused_variables)]
    pub fn with_display(display: Option<&str>) -> Self {
        Self {
            #[cfg(target_os = "linux")]
            x11: x11_idle::X11IdleSource::connect(display),
            #[cfg(not(windows))]
            fallback: ActivityIdleClock::new(),
        }
    }

    /// Whether idle time comes from the OS rather than reported activity.
    pub fn is_system_wide(&self) -> bool {
        #[cfg(windows)]
        {
            true
        }

        #[cfg(target_os = "linux")]
        {
            self.x11.is_some()
        }

        #[cfg(all(not(windows), not(target_os = "linux")))]
        {
            false
        }
    }
}

impl Default for SystemIdleClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SystemIdleClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemIdleClock")
            .field("system_wide", &self.is_system_wide())
            .finish()
    }
}

impl IdleClock for SystemIdleClock {
    #[cfg(windows)]
    fn idle_duration(&self) -> ProcessResult<Duration> {
        windows_idle::last_input_elapsed()
    }

    #[cfg(target_os = "linux")]
    fn idle_duration(&self) -> ProcessResult<Duration> {
        match &self.x11 {
            Some(source) => source.ms_since_user_input(),
            None => self.fallback.idle_duration(),
        }
    }

    #[cfg(all(not(windows), not(target_os = "linux")))]
    fn idle_duration(&self) -> ProcessResult<Duration> {
        self.fallback.idle_duration()
    }

    #[cfg(not(windows))]
    fn record_activity(&self) {
        self.fallback.record_activity();
    }
}

#[cfg(target_os = "linux")]
mod x11_idle {
    use arcade_common::{ProcessError, ProcessResult};
    use std::time::Duration;
    use tracing::{info, warn};
    use x11rb::connection::Connection;
    use x11rb::protocol::screensaver;
    use x11rb::protocol::xproto::Window;
    use x11rb::rust_connection::RustConnection;

    pub(super) struct X11IdleSource {
        conn: RustConnection,
        root: Window,
    }

    impl X11IdleSource {
        /// Connect and issue one query, so a server without the screensaver
        /// extension is rejected up front rather than at the first check.
        pub(super) fn connect(display: Option<&str>) -> Option<Self> {
            let (conn, screen_num) = match x11rb::connect(display) {
                Ok(connected) => connected,
                Err(e) => {
                    warn!(
                        "No X display for idle tracking ({}), falling back to reported activity",
                        e
                    );
                    return None;
                }
            };
            let root = conn.setup().roots.get(screen_num)?.root;

            let source = Self { conn, root };
            match source.ms_since_user_input() {
                Ok(idle) => {
                    info!("Tracking idle time through the X server (idle {:?})", idle);
                    Some(source)
                }
                Err(e) => {
                    warn!("{}, falling back to reported activity", e);
                    None
                }
            }
        }

        pub(super) fn ms_since_user_input(&self) -> ProcessResult<Duration> {
            let reply = screensaver::query_info(&self.conn, self.root)
                .map_err(|e| ProcessError::idle_clock_unavailable(format!("X11 request: {}", e)))?
                .reply()
                .map_err(|e| {
                    ProcessError::idle_clock_unavailable(format!("X11 screensaver query: {}", e))
                })?;
            Ok(Duration::from_millis(u64::from(reply.ms_since_user_input)))
        }
    }
}

#[cfg(windows)]
mod windows_idle {
    use arcade_common::{ProcessError, ProcessResult};
    use std::time::Duration;
    use windows::Win32::System::SystemInformation::GetTickCount;
    use windows::Win32::UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO};

    pub(super) fn last_input_elapsed() -> ProcessResult<Duration> {
        let mut info = LASTINPUTINFO {
            cbSize: std::mem::size_of::<LASTINPUTINFO>() as u32,
            dwTime: 0,
        };

        unsafe {
            if !GetLastInputInfo(&mut info).as_bool() {
                return Err(ProcessError::idle_clock_unavailable(
                    "GetLastInputInfo failed",
                ));
            }
            // Both values are 32-bit tick counts; wrapping_sub survives the 49.7-day rollover.
            let elapsed_ms = GetTickCount().wrapping_sub(info.dwTime);
            Ok(Duration::from_millis(u64::from(elapsed_ms)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_activity_clock_counts_from_last_activity() {
        let clock = ActivityIdleClock::new();
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(clock.idle_duration().unwrap(), Duration::from_secs(30));

        clock.record_activity();
        assert_eq!(clock.idle_duration().unwrap(), Duration::ZERO);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(clock.idle_duration().unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn test_system_clock_reports_a_duration() {
        let clock = SystemIdleClock::new();
        assert!(clock.idle_duration().is_ok());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test(start_paused = true)]
    async fn test_unreachable_display_falls_back_to_activity() {
        let clock = SystemIdleClock::with_display(Some("not-a-display"));
        assert!(!clock.is_system_wide());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(clock.idle_duration().unwrap(), Duration::from_secs(30));
        clock.record_activity();
        assert_eq!(clock.idle_duration().unwrap(), Duration::ZERO);
    }
}
