//! # Arcade Launcher
//!
//! Launch coordination for the arcade kiosk.
//!
//! This crate provides:
//! - `Launcher` - spawns games and keeps one idle monitor per started process
//! - The monitor registry actor that owns every monitor
//! - Configuration management (YAML game catalog and timing)

pub mod config;
pub mod registry;

// Re-export main types
pub use config::{GameEntry, LauncherConfig, LauncherOptions};
pub use registry::{LaunchResult, Launcher, LauncherBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
