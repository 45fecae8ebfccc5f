//! State management module
//!
//! This module contains the countdown data model and the shared daemon state.

pub mod app_state;
pub mod presentation_state;
pub mod session;
pub mod settings;

// Re-export main types
pub use app_state::AppState;
pub use presentation_state::{remaining_from_start, PresentationState};
pub use session::Session;
pub use settings::Settings;
