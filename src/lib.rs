//! Slide Timer - A presentation countdown with a background coordinator
//!
//! The foreground console runs a per-second countdown while it is open. When
//! it is hidden, a background coordinator keeps the persisted state and the
//! badge moving on coarse wake-ups, so the countdown survives the surface
//! going away.

pub mod api;
pub mod config;
pub mod error;
pub mod foreground;
pub mod services;
pub mod state;
pub mod store;
pub mod tasks;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use error::{IndicatorError, Result, StoreError, TimerError};
pub use foreground::ForegroundController;
pub use state::AppState;
pub use tasks::BackgroundCoordinator;
pub use utils::signals::shutdown_signal;
