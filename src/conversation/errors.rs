//! Error types for the conversation layer.

use thiserror::Error;

use crate::persistence::error::StorageError;

/// Crate-level error for setup paths (configuration, storage, HTTP client).
#[derive(Debug, Error)]
pub enum ChatError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Durable storage could not be opened.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    /// HTTP client could not be built.
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A built-in pattern failed to compile.
    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Convenience result alias for setup operations.
pub type ChatResult<T> = Result<T, ChatError>;

/// Rejected state-machine transitions.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// An exchange is already pending.
    #[error("an exchange is already in progress")]
    Busy,
    /// A completion arrived while no exchange was pending.
    #[error("no exchange is pending")]
    NotPending,
    /// A completion arrived for an exchange other than the pending one.
    #[error("completion does not match the pending exchange")]
    ExchangeMismatch,
    /// The prompt was empty after trimming.
    #[error("Message cannot be empty")]
    EmptyPrompt,
}
