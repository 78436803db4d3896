//! Error types for TaskDeck
//!
//! Central error vocabulary shared by every layer.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// TaskDeck error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Task / registry
    // ========================================================================
    #[error("Task error: {0}")]
    Task(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    // ========================================================================
    // Process / PTY
    // ========================================================================
    #[error("PTY error: {0}")]
    Pty(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    // ========================================================================
    // External error conversions
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // Misc
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

// ============================================================================
// From conversions
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
