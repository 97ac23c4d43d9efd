//! Error types for the SCAR session core and sync service.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum ScarError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Local or remote collection storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Speech recognizer error.
    #[error("recognizer error: {0}")]
    Recognizer(String),

    /// Speech synthesis error.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Response generator error.
    #[error("responder error: {0}")]
    Responder(String),

    /// Sync transport error (network, unexpected status, bad body).
    #[error("sync error: {0}")]
    Sync(String),

    /// The sync payload was not tagged with the owner identity.
    #[error("unauthorized")]
    Unauthorized,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ScarError>;
