//! Utility functions module
//!
//! Clock abstraction and signal handling shared by both surfaces.

pub mod clock;
pub mod signals;

// Re-export main items
pub use clock::{format_mm_ss, Clock, SystemClock};
pub use signals::shutdown_signal;
