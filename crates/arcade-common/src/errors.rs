//! Error types for the arcade kiosk launcher.
//!
//! Only `SpawnFailed` is ever surfaced to a caller of `launch`. Every other
//! variant is logged at the point it happens and then swallowed: the launcher
//! keeps running no matter which phase of a monitor failed.

use thiserror::Error;

/// Process-specific error types for launching and supervising games.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessError {
    #[error("Process spawn failed: {path} - {reason}")]
    SpawnFailed { path: String, reason: String },

    /// The process started but the OS gave us no usable identifier.
    #[error("Process identifier unavailable: {path}")]
    IdentifierUnavailable { path: String },

    #[error("Graceful close failed: {image} - {reason}")]
    GracefulKillFailed { image: String, reason: String },

    #[error("Forced kill failed: {image} - {reason}")]
    ForcedKillFailed { image: String, reason: String },

    #[error("Process probe failed: {image} - {reason}")]
    ProbeFailed { image: String, reason: String },

    #[error("Idle clock unavailable: {reason}")]
    IdleClockUnavailable { reason: String },

    #[error("Observer '{observer}' failed: {reason}")]
    NotificationFailed { observer: String, reason: String },

    #[error("Monitor registry unavailable during '{operation}'")]
    RegistryUnavailable { operation: String },
}

impl ProcessError {
    pub fn spawn_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn identifier_unavailable(path: impl Into<String>) -> Self {
        Self::IdentifierUnavailable { path: path.into() }
    }

    pub fn graceful_kill_failed(image: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GracefulKillFailed {
            image: image.into(),
            reason: reason.into(),
        }
    }

    pub fn forced_kill_failed(image: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ForcedKillFailed {
            image: image.into(),
            reason: reason.into(),
        }
    }

    pub fn probe_failed(image: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            image: image.into(),
            reason: reason.into(),
        }
    }

    pub fn idle_clock_unavailable(reason: impl Into<String>) -> Self {
        Self::IdleClockUnavailable {
            reason: reason.into(),
        }
    }

    pub fn notification_failed(observer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotificationFailed {
            observer: observer.into(),
            reason: reason.into(),
        }
    }

    pub fn registry_unavailable(operation: impl Into<String>) -> Self {
        Self::RegistryUnavailable {
            operation: operation.into(),
        }
    }

    /// Whether this error ends the operation that produced it.
    ///
    /// Everything except a failed spawn or a dead registry is degraded but
    /// recoverable and only gets logged.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SpawnFailed { .. } | Self::RegistryUnavailable { .. }
        )
    }
}

/// Result type for process operations.
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_error_construction() {
        let error = ProcessError::spawn_failed("/games/foo.exe", "executable not found");
        assert!(matches!(error, ProcessError::SpawnFailed { .. }));
        assert_eq!(
            error.to_string(),
            "Process spawn failed: /games/foo.exe - executable not found"
        );

        let error = ProcessError::forced_kill_failed("foo.exe", "permission denied");
        assert!(error.to_string().contains("Forced kill failed"));
        assert!(error.to_string().contains("permission denied"));
    }

    #[test]
    fn test_only_spawn_and_registry_errors_are_fatal() {
        assert!(ProcessError::spawn_failed("a", "b").is_fatal());
        assert!(ProcessError::registry_unavailable("launch").is_fatal());

        assert!(!ProcessError::identifier_unavailable("a").is_fatal());
        assert!(!ProcessError::graceful_kill_failed("a", "b").is_fatal());
        assert!(!ProcessError::forced_kill_failed("a", "b").is_fatal());
        assert!(!ProcessError::notification_failed("ui", "closed").is_fatal());
        assert!(!ProcessError::probe_failed("a", "b").is_fatal());
        assert!(!ProcessError::idle_clock_unavailable("x").is_fatal());
    }

    #[test]
    fn test_error_pattern_matching() {
        let err = ProcessError::notification_failed("ui", "receiver dropped");
        match err {
            ProcessError::NotificationFailed { observer, reason } => {
                assert_eq!(observer, "ui");
                assert_eq!(reason, "receiver dropped");
            }
            _ => panic!("Wrong error type"),
        }
    }
}
