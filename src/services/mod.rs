//! External collaborator module
//!
//! The badge indicator and the wake-up scheduler. Both are consumed by the
//! foreground controller and the background coordinator, neither owns them.

pub mod indicator;
pub mod wake_scheduler;

// Re-export main types
pub use indicator::{Badge, BadgeSink, IndicatorHandle, LogBadgeSink, PAUSED_COLOR, RUNNING_COLOR};
pub use wake_scheduler::{WakeEvent, WakeScheduler, PRESENTATION_ALARM};
