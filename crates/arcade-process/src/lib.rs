//! # Arcade Process
//!
//! Low-level process operations for the arcade kiosk launcher.
//!
//! This crate provides cross-platform primitives for:
//! - Spawning a game executable and observing its exit
//! - Name-based process discovery (every process sharing an image name)
//! - Two-phase termination by image name (graceful close, then forced kill)
//! - Querying how long the user has been idle

pub mod check;
pub mod execute;
pub mod idle;
pub mod terminate;

#[cfg(windows)]
pub mod terminate_windows;

// Re-export main types
pub use check::*;
pub use execute::*;
pub use idle::*;
pub use terminate::*;
