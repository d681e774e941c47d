//! Single owning context for one chat conversation.
//!
//! `ChatSession` holds the conversation store, the orchestrator, the renderer
//! and the ephemeral image registry. Nothing here is global: the view layer
//! owns one session and drives it.
//!
//! An exchange can be driven in one call with [`ChatSession::send`], or split
//! into [`ChatSession::begin`], [`OutstandingExchange::run`] and
//! [`ChatSession::complete`] so the session stays usable (theme toggle,
//! rendering) while the network call is in flight.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span};

use crate::conversation::config::{ChatConfig, LimitsConfig};
use crate::conversation::errors::{ChatResult, StoreError};
use crate::conversation::ids::MessageId;
use crate::conversation::message::{ImageRef, Message};
use crate::conversation::state::Theme;
use crate::conversation::store::{ConversationStore, PendingExchange};
use crate::history::{HistoryGroup, HistorySection, group_by_recency, history_sections};
use crate::llm::client::ModelClient;
use crate::llm::error::ExchangeError;
use crate::llm::gemini::GeminiClient;
use crate::llm::orchestrator::ResponseOrchestrator;
use crate::llm::payload::ImageAttachment;
use crate::persistence::Persistence;
use crate::persistence::kv_store::SqliteKeyValueStore;
use crate::render::{Renderer, SafeHtml};

/// Reasons a submission is refused before anything is appended.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The state machine refused the transition.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The input failed validation.
    #[error(transparent)]
    Input(ExchangeError),
}

/// An exchange that has been recorded as pending and not yet completed.
#[derive(Debug)]
#[must_use = "an outstanding exchange must be completed"]
pub struct OutstandingExchange {
    pending: PendingExchange,
    prompt: String,
    image: Option<ImageAttachment>,
}

impl OutstandingExchange {
    /// Identifier of the user message that opened the exchange.
    #[must_use]
    pub const fn user_message(&self) -> MessageId {
        self.pending.user_message()
    }

    /// Prompt as submitted.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Perform the model call.
    ///
    /// # Errors
    /// Returns the exchange error to be recorded with [`ChatSession::complete`].
    pub async fn run(
        &self,
        orchestrator: &ResponseOrchestrator,
        cancel: &CancellationToken,
    ) -> Result<String, ExchangeError> {
        let span = info_span!("turn", exchange = %self.pending.id());
        orchestrator
            .exchange(&self.prompt, self.image.as_ref(), cancel)
            .instrument(span)
            .await
    }
}

/// Result of a completed exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeReport {
    /// User message that opened the exchange.
    pub user_message: MessageId,
    /// Assistant message appended at completion.
    pub reply_message: MessageId,
    /// The failure shown in the reply message, if the exchange failed.
    pub error: Option<ExchangeError>,
}

impl ExchangeReport {
    /// Whether the model produced a reply.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// One conversation and everything needed to drive and display it.
pub struct ChatSession {
    store: ConversationStore,
    orchestrator: ResponseOrchestrator,
    renderer: Renderer,
    limits: LimitsConfig,
    images: HashMap<String, ImageAttachment>,
}

impl ChatSession {
    /// Assemble a session from its parts.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the renderer cannot be built.
    pub fn new(
        config: &ChatConfig,
        persistence: Persistence,
        client: Arc<dyn ModelClient>,
    ) -> ChatResult<Self> {
        config.validate()?;
        Ok(Self {
            store: ConversationStore::open(persistence, config),
            orchestrator: ResponseOrchestrator::new(client, config),
            renderer: Renderer::new()?,
            limits: config.limits.clone(),
            images: HashMap::new(),
        })
    }

    /// Session backed by the Gemini REST client.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the HTTP client cannot be built.
    pub fn with_gemini(config: &ChatConfig, persistence: Persistence) -> ChatResult<Self> {
        let client = GeminiClient::new(config)?;
        Self::new(config, persistence, Arc::new(client))
    }

    /// Session persisted to an `SQLite` file and backed by Gemini.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or the session cannot be built.
    pub fn open_sqlite(config: &ChatConfig, path: impl AsRef<Path>) -> ChatResult<Self> {
        let store = SqliteKeyValueStore::open(path)?;
        let persistence = Persistence::new(Box::new(store), config.persistence.storage_key.clone());
        Self::with_gemini(config, persistence)
    }

    /// Transcript in display order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    /// Whether an exchange is outstanding.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.store.is_loading()
    }

    /// Current theme.
    #[must_use]
    pub const fn theme(&self) -> Theme {
        self.store.theme()
    }

    /// Underlying state machine.
    #[must_use]
    pub const fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Orchestrator handle for driving an [`OutstandingExchange`].
    #[must_use]
    pub fn orchestrator(&self) -> ResponseOrchestrator {
        self.orchestrator.clone()
    }

    /// Validate input, append the user message and enter `Pending`.
    ///
    /// The prompt is stored and sent as typed; surrounding whitespace only
    /// matters for the blank and length checks.
    ///
    /// # Errors
    /// Returns [`SessionError::Store`] for a blank prompt or while another exchange
    /// is pending, and [`SessionError::Input`] for an over-long prompt or an image
    /// larger than `limits.max_image_bytes`.
    pub fn begin(
        &mut self,
        prompt: &str,
        image: Option<ImageAttachment>,
    ) -> Result<OutstandingExchange, SessionError> {
        let chars = prompt.trim().chars().count();
        if chars > self.limits.max_prompt_chars {
            return Err(SessionError::Input(ExchangeError::Validation(format!(
                "Message is too long ({chars} characters, limit {})",
                self.limits.max_prompt_chars
            ))));
        }
        let max_image_bytes = self.limits.max_image_bytes;
        if let Some(oversized) = image.as_ref().filter(|a| a.len() > max_image_bytes) {
            return Err(SessionError::Input(ExchangeError::Validation(format!(
                "Image is too large ({} bytes, limit {max_image_bytes})",
                oversized.len()
            ))));
        }

        let image_ref = image
            .as_ref()
            .map(|attachment| ImageRef::ephemeral(attachment.media_type()));
        let pending = self.store.submit(prompt, image_ref.clone())?;

        if let (Some(image_ref), Some(attachment)) = (image_ref, image.as_ref()) {
            self.images
                .insert(image_ref.handle().to_string(), attachment.clone());
        }
        self.release_evicted_images();

        Ok(OutstandingExchange {
            pending,
            prompt: prompt.to_string(),
            image,
        })
    }

    /// Record the outcome of `exchange`.
    ///
    /// # Errors
    /// Returns an error if `exchange` does not belong to this session's pending exchange.
    pub fn complete(
        &mut self,
        exchange: OutstandingExchange,
        result: Result<String, ExchangeError>,
    ) -> Result<ExchangeReport, StoreError> {
        let user_message = exchange.pending.user_message();
        let report = match result {
            Ok(reply) => ExchangeReport {
                user_message,
                reply_message: self.store.on_success(exchange.pending, &reply)?,
                error: None,
            },
            Err(err) => ExchangeReport {
                user_message,
                reply_message: self.store.on_failure(exchange.pending, &err.to_string())?,
                error: Some(err),
            },
        };
        self.release_evicted_images();
        Ok(report)
    }

    /// Run a whole exchange: begin, call the model, complete.
    ///
    /// Model failures do not surface as `Err`: they are appended to the transcript
    /// and reported in [`ExchangeReport::error`].
    ///
    /// # Errors
    /// Returns an error only when the submission is refused before anything is appended.
    pub async fn send(
        &mut self,
        prompt: &str,
        image: Option<ImageAttachment>,
        cancel: &CancellationToken,
    ) -> Result<ExchangeReport, SessionError> {
        let exchange = self.begin(prompt, image)?;
        let result = exchange.run(&self.orchestrator, cancel).await;
        Ok(self.complete(exchange, result)?)
    }

    /// Flip the theme.
    pub fn toggle_theme(&mut self) -> Theme {
        self.store.toggle_theme()
    }

    /// Empty the transcript once `confirm` approves, releasing attached images.
    ///
    /// # Errors
    /// Returns [`StoreError::Busy`] while an exchange is pending.
    pub fn clear_history<F>(&mut self, confirm: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&str) -> bool,
    {
        let cleared = self.store.clear_history(confirm)?;
        if cleared {
            self.release_all_images();
        }
        Ok(cleared)
    }

    /// Bytes behind an image reference, while the session holds them.
    #[must_use]
    pub fn image(&self, image: &ImageRef) -> Option<&ImageAttachment> {
        self.images.get(image.handle())
    }

    /// Drop the bytes behind `image`. Returns whether anything was held.
    pub fn release_image(&mut self, image: &ImageRef) -> bool {
        self.images.remove(image.handle()).is_some()
    }

    /// Number of images currently held.
    #[must_use]
    pub fn held_images(&self) -> usize {
        self.images.len()
    }

    /// Safe markup for `message`.
    #[must_use]
    pub fn render(&self, message: &Message) -> SafeHtml {
        self.renderer.render_message(message)
    }

    /// Recency groups of the transcript.
    #[must_use]
    pub fn groups<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<HistoryGroup<'_>> {
        group_by_recency(self.store.messages(), now)
    }

    /// History panel rows with previews and relative ages.
    #[must_use]
    pub fn history<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        preview_chars: usize,
    ) -> Vec<HistorySection> {
        history_sections(self.store.messages(), now, preview_chars)
    }

    fn release_evicted_images(&mut self) {
        let mut released = 0_usize;
        for image in self.store.take_evicted_images() {
            if self.images.remove(image.handle()).is_some() {
                released += 1;
            }
        }
        if released > 0 {
            debug!(released, "released images of evicted messages");
        }
    }

    fn release_all_images(&mut self) {
        let released = self.images.len();
        self.images.clear();
        if released > 0 {
            debug!(released, "released attached images");
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.release_all_images();
    }
}
