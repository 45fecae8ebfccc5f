//! Foreground surface module
//!
//! The controller that owns decrement authority while the console is open, and
//! the terminal surface that drives it.

pub mod console;
pub mod controller;

// Re-export main types
pub use console::{run_console, ConsoleCommand};
pub use controller::{ForegroundController, ForegroundPhase, ForegroundView, TickOutcome};
