//! Background tasks module
//!
//! This module contains the coordinator that runs alongside the HTTP server and
//! outlives the foreground console.

pub mod background;

// Re-export main types
pub use background::{BackgroundCoordinator, WakeOutcome};
