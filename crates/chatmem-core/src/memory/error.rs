//! Error taxonomy for the memory manager.

/// Errors returned by memory manager operations.
///
/// `CondenseFailed` is produced by condensers; the manager recovers from it
/// inside `append` and never returns it to callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid memory strategy '{0}' (expected buffer, buffer_window, summary or summary_buffer)")]
    InvalidStrategy(String),

    #[error("invalid parameter {name}={value}: must be a positive integer")]
    InvalidParameter { name: &'static str, value: i64 },

    #[error("condensation failed: {0}")]
    CondenseFailed(String),
}

/// Result type for memory operations.
pub type Result<T> = std::result::Result<T, MemoryError>;
