//! # Arcade Common
//!
//! Common types and errors shared across the arcade kiosk crates.
//!
//! This crate provides the foundational pieces every other crate builds on:
//! the process error taxonomy and the domain types that describe a launched
//! game process (`ProcessRecord`, `ImageName`, `MonitorKey`).

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{ProcessError, ProcessResult};
pub use types::{ImageName, MonitorKey, ProcessRecord};
