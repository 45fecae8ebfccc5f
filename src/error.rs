//! Error types for the timer core

/// Failures of the persisted state store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be encoded for storage.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store lock was poisoned by a panicking writer.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the badge indicator.
#[derive(Debug, thiserror::Error)]
pub enum IndicatorError {
    /// The sink refused the badge update.
    #[error("badge sink error: {0}")]
    Sink(String),

    /// The renderer task is gone or never acknowledged.
    #[error("badge renderer unavailable")]
    Unavailable,
}

/// Top-level error type for timer operations.
#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    /// Non-positive slide count or presentation time.
    #[error("validation error: {0}")]
    Validation(String),

    /// Persisted store read/write failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Indicator update failure.
    #[error(transparent)]
    Render(#[from] IndicatorError),

    /// A stored value could not be parsed.
    #[error("state corruption in '{key}': {reason}")]
    StateCorruption { key: String, reason: String },
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, TimerError>;
