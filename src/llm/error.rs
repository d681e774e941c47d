//! Error types for the model boundary and the exchange orchestrator.

use std::time::Duration;

use thiserror::Error;

/// Message used when the client fails in a way that carries no usable text.
pub const UNKNOWN_ERROR_MESSAGE: &str =
    "An unexpected error occurred while communicating with Gemini";

/// Message used when no credential is configured.
pub const MISSING_CREDENTIAL_MESSAGE: &str =
    "Missing Gemini API key. Please add GEMINI_API_KEY to your environment";

/// Failures reported by a [`crate::llm::client::ModelClient`].
#[derive(Debug, Error)]
pub enum ModelError {
    /// No API credential is configured.
    #[error("{}", MISSING_CREDENTIAL_MESSAGE)]
    MissingCredential,
    /// The request never produced an HTTP response.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    /// The API answered with an error status.
    #[error("{message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message reported by the API, or the status reason.
        message: String,
    },
    /// The prompt was rejected by safety filters.
    #[error("Response was blocked: {0}")]
    Blocked(String),
    /// The API answered without any text.
    #[error("The model returned an empty response")]
    EmptyResponse,
    /// The response body did not have the expected shape.
    #[error("Invalid response from Gemini: {0}")]
    InvalidResponse(String),
}

/// Outcome taxonomy of one exchange. `Display` is the user-facing text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// Missing or invalid credential; no request was sent.
    #[error("{0}")]
    Configuration(String),
    /// The input was rejected before any request was sent.
    #[error("{0}")]
    Validation(String),
    /// The network or API reported a failure; message kept verbatim.
    #[error("{0}")]
    Upstream(String),
    /// The exchange exceeded the configured timeout.
    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    /// The exchange was cancelled by the caller.
    #[error("Request was cancelled")]
    Cancelled,
    /// Anything else.
    #[error("{0}")]
    Unknown(String),
}

impl ExchangeError {
    /// Generic failure with the standard message.
    #[must_use]
    pub fn unknown() -> Self {
        Self::Unknown(UNKNOWN_ERROR_MESSAGE.to_string())
    }

    /// Short stable label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Validation(_) => "validation",
            Self::Upstream(_) => "upstream",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl From<ModelError> for ExchangeError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::MissingCredential => Self::Configuration(err.to_string()),
            other => {
                let message = other.to_string();
                if message.trim().is_empty() {
                    Self::unknown()
                } else {
                    Self::Upstream(message)
                }
            }
        }
    }
}
