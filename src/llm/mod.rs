//! Model API boundary and exchange orchestration.
//!
//! - `client`: provider-neutral `ModelClient` trait
//! - `gemini`: REST implementation for Gemini
//! - `orchestrator`: validation, persona wrapping, timeout and cancellation
//! - `payload`: image attachments and their base64 inline form
//! - `persona`: prompt template for text-only requests

pub mod client;
pub mod error;
pub mod gemini;
pub mod orchestrator;
pub mod payload;
pub mod persona;

pub use client::{GenerateRequest, ModelClient, ModelFuture, ModelVariant};
pub use error::{ExchangeError, ModelError};
pub use gemini::GeminiClient;
pub use orchestrator::ResponseOrchestrator;
pub use payload::{ImageAttachment, InlinePayload};
pub use persona::PersonaTemplate;
