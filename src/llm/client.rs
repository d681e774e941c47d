//! Model API boundary.

use std::future::Future;
use std::pin::Pin;

use crate::llm::error::ModelError;
use crate::llm::payload::InlinePayload;

/// Boxed future type for model calls.
pub type ModelFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Which model serves a request; chosen solely by whether an image is attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelVariant {
    /// Text-only prompts.
    Text,
    /// Prompts carrying an inline image.
    Vision,
}

impl ModelVariant {
    /// Stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Vision => "vision",
        }
    }
}

/// One generation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Model variant to route to.
    pub variant: ModelVariant,
    /// Prompt text, already wrapped when a persona applies.
    pub prompt: String,
    /// Inline image, present only for [`ModelVariant::Vision`].
    pub image: Option<InlinePayload>,
}

impl GenerateRequest {
    /// Text-only request.
    #[must_use]
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            variant: ModelVariant::Text,
            prompt: prompt.into(),
            image: None,
        }
    }

    /// Request with an inline image.
    #[must_use]
    pub fn vision(prompt: impl Into<String>, image: InlinePayload) -> Self {
        Self {
            variant: ModelVariant::Vision,
            prompt: prompt.into(),
            image: Some(image),
        }
    }
}

/// Trait abstraction over generative model providers.
pub trait ModelClient: Send + Sync {
    /// Generate a reply for `request`.
    ///
    /// # Errors
    /// Returns an error if the credential is missing, the request fails, or the
    /// response carries no text.
    fn generate(&self, request: GenerateRequest) -> ModelFuture<'_, Result<String, ModelError>>;

    /// Whether a credential is configured. Checked before any request is built.
    fn has_credential(&self) -> bool;
}
