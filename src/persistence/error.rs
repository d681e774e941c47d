//! Error types for the persistence layer.

use thiserror::Error;

/// Failure of a key-value backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// `SQLite` backend error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The write would exceed the backend's size quota.
    #[error("storage quota exceeded: {attempted} bytes requested, limit is {limit}")]
    QuotaExceeded {
        /// Maximum number of bytes the backend accepts.
        limit: usize,
        /// Size of the rejected write.
        attempted: usize,
    },
    /// A lock guarding the backend was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Reasons a persisted blob could not be turned back into state.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not valid JSON, or the wrong shape.
    #[error("malformed state blob: {0}")]
    Json(#[from] serde_json::Error),
    /// Blob was written by an unknown schema version.
    #[error("unsupported state version {0}")]
    UnsupportedVersion(u32),
    /// A message identifier is not a UUID.
    #[error("invalid message id {0:?}")]
    InvalidId(String),
    /// A message role is neither `user` nor `assistant`.
    #[error("invalid role {0:?}")]
    InvalidRole(String),
    /// A message timestamp could not be parsed back into an instant.
    #[error("invalid timestamp {value:?} on message {id}")]
    InvalidTimestamp {
        /// Identifier of the offending message.
        id: String,
        /// Raw timestamp text.
        value: String,
    },
}

/// Failure of [`crate::persistence::Persistence::save`]. Never fatal to the caller.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// State could not be serialized.
    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
    /// Backend rejected the write.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
