//! Conversation state machine.
//!
//! A single exchange moves `Idle -> Pending -> Idle`. Every transition that
//! mutates the state is mirrored to durable storage before it returns, so a
//! crash never loses more than the reply of the exchange in flight.

use tracing::{debug, info, warn};

use crate::conversation::config::ChatConfig;
use crate::conversation::errors::StoreError;
use crate::conversation::ids::{ExchangeId, MessageId};
use crate::conversation::message::{ImageRef, Message};
use crate::conversation::state::{ConversationState, Theme};
use crate::persistence::Persistence;

/// Prefix placed in front of every error shown as an assistant message.
pub const WARNING_MARKER: &str = "⚠️";

/// Question shown before the transcript is wiped.
pub const CLEAR_HISTORY_PROMPT: &str = "Are you sure you want to clear all chat history?";

/// Phase of the single-exchange state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No exchange outstanding.
    Idle,
    /// One exchange outstanding.
    Pending(ExchangeId),
}

/// Ticket for the exchange started by [`ConversationStore::submit`].
///
/// It is consumed by exactly one of `on_success` / `on_failure`.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pending exchange must be completed with on_success or on_failure"]
pub struct PendingExchange {
    id: ExchangeId,
    user_message: MessageId,
}

impl PendingExchange {
    /// Exchange identifier.
    #[must_use]
    pub const fn id(&self) -> ExchangeId {
        self.id
    }

    /// Identifier of the user message that opened the exchange.
    #[must_use]
    pub const fn user_message(&self) -> MessageId {
        self.user_message
    }
}

/// Owns the canonical conversation state and its persistence.
pub struct ConversationStore {
    state: ConversationState,
    phase: Phase,
    persistence: Persistence,
    max_messages: usize,
    last_persist_error: Option<String>,
    evicted_images: Vec<ImageRef>,
}

impl ConversationStore {
    /// Hydrate from storage, or start fresh when nothing usable is stored.
    #[must_use]
    pub fn open(persistence: Persistence, config: &ChatConfig) -> Self {
        let state = persistence
            .load(config.ui.default_theme)
            .unwrap_or_else(|| ConversationState::new(config.ui.default_theme));

        info!(
            messages = state.messages().len(),
            dark = state.theme().is_dark(),
            "conversation store opened"
        );

        Self {
            state,
            phase: Phase::Idle,
            persistence,
            max_messages: config.persistence.max_messages,
            last_persist_error: None,
            evicted_images: Vec::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Transcript in display order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.state.messages()
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether an exchange is outstanding.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    /// Current theme.
    #[must_use]
    pub const fn theme(&self) -> Theme {
        self.state.theme()
    }

    /// Message of the most recent failed write, cleared by the next successful one.
    #[must_use]
    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    /// Image references of messages evicted past the transcript cap since the last call.
    ///
    /// Whoever holds the bytes behind these references should release them.
    #[must_use]
    pub fn take_evicted_images(&mut self) -> Vec<ImageRef> {
        std::mem::take(&mut self.evicted_images)
    }

    /// Append the user's message and enter `Pending`.
    ///
    /// # Errors
    /// Returns [`StoreError::Busy`] if an exchange is already pending and
    /// [`StoreError::EmptyPrompt`] if the prompt is blank. Neither appends anything.
    pub fn submit(
        &mut self,
        prompt: &str,
        image: Option<ImageRef>,
    ) -> Result<PendingExchange, StoreError> {
        if let Phase::Pending(_) = self.phase {
            return Err(StoreError::Busy);
        }
        if prompt.trim().is_empty() {
            return Err(StoreError::EmptyPrompt);
        }

        let message = Message::user(prompt, image);
        let pending = PendingExchange {
            id: ExchangeId::new(),
            user_message: message.id(),
        };

        self.append(message);
        self.state.set_loading(true);
        self.phase = Phase::Pending(pending.id);
        debug!(exchange = %pending.id, "exchange submitted");

        self.persist();
        Ok(pending)
    }

    /// Record the model's reply and return to `Idle`.
    ///
    /// # Errors
    /// Returns an error if `pending` is not the outstanding exchange.
    pub fn on_success(
        &mut self,
        pending: PendingExchange,
        reply: &str,
    ) -> Result<MessageId, StoreError> {
        self.finish(&pending, Message::assistant(reply))
    }

    /// Record a failed exchange as a visible assistant message and return to `Idle`.
    ///
    /// # Errors
    /// Returns an error if `pending` is not the outstanding exchange.
    pub fn on_failure(
        &mut self,
        pending: PendingExchange,
        error_message: &str,
    ) -> Result<MessageId, StoreError> {
        let content = format!("{WARNING_MARKER} {error_message}");
        self.finish(&pending, Message::assistant(content))
    }

    /// Flip the theme. Allowed in any phase.
    pub fn toggle_theme(&mut self) -> Theme {
        self.state.toggle_theme();
        self.persist();
        self.state.theme()
    }

    /// Empty the transcript once `confirm` approves [`CLEAR_HISTORY_PROMPT`].
    ///
    /// Returns `Ok(false)` when the user declines. The theme is left untouched.
    ///
    /// # Errors
    /// Returns [`StoreError::Busy`] while an exchange is pending; `confirm` is not asked.
    pub fn clear_history<F>(&mut self, confirm: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&str) -> bool,
    {
        if let Phase::Pending(_) = self.phase {
            return Err(StoreError::Busy);
        }
        if !confirm(CLEAR_HISTORY_PROMPT) {
            debug!("clear history declined");
            return Ok(false);
        }

        let removed = self.state.messages().len();
        self.state.clear_messages();
        self.evicted_images.clear();
        info!(removed, "chat history cleared");
        self.persist();
        Ok(true)
    }

    fn finish(
        &mut self,
        pending: &PendingExchange,
        reply: Message,
    ) -> Result<MessageId, StoreError> {
        match self.phase {
            Phase::Idle => return Err(StoreError::NotPending),
            Phase::Pending(id) if id != pending.id => return Err(StoreError::ExchangeMismatch),
            Phase::Pending(_) => {}
        }

        let reply_id = reply.id();
        self.append(reply);
        self.state.set_loading(false);
        self.phase = Phase::Idle;
        debug!(exchange = %pending.id, "exchange finished");

        self.persist();
        Ok(reply_id)
    }

    fn append(&mut self, message: Message) {
        self.state.push(message);
        let evicted = self.state.evict_oldest(self.max_messages);
        if evicted.is_empty() {
            return;
        }
        debug!(
            evicted = evicted.len(),
            cap = self.max_messages,
            "evicted oldest messages"
        );
        self.evicted_images
            .extend(evicted.into_iter().filter_map(|m| m.image().cloned()));
    }

    fn persist(&mut self) {
        match self.persistence.save(&self.state) {
            Ok(()) => self.last_persist_error = None,
            Err(err) => {
                warn!("failed to persist conversation state: {err}");
                self.last_persist_error = Some(err.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::codec;
    use crate::persistence::kv_store::{KeyValueStore, MemoryKeyValueStore};

    const KEY: &str = "gemini-chat-state";

    fn open_store() -> (ConversationStore, MemoryKeyValueStore) {
        let backend = MemoryKeyValueStore::new();
        let persistence = Persistence::new(Box::new(backend.clone()), KEY);
        (
            ConversationStore::open(persistence, &ChatConfig::default()),
            backend,
        )
    }

    fn stored(backend: &MemoryKeyValueStore) -> ConversationState {
        let raw = backend.get(KEY).unwrap().expect("state persisted");
        codec::decode(&raw, Theme::Light).unwrap()
    }

    fn stored_loading_flag(backend: &MemoryKeyValueStore) -> bool {
        let raw = backend.get(KEY).unwrap().expect("state persisted");
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        value["isLoading"].as_bool().unwrap()
    }

    #[test]
    fn test_success_path() {
        let (mut store, _) = open_store();

        let pending = store.submit("hello", None).unwrap();
        assert!(store.is_loading());
        assert_eq!(store.phase(), Phase::Pending(pending.id()));
        assert_eq!(store.messages()[0].id(), pending.user_message());

        store.on_success(pending, "hi there").unwrap();
        assert!(!store.is_loading());
        assert_eq!(store.phase(), Phase::Idle);

        let contents: Vec<&str> = store.messages().iter().map(Message::content).collect();
        assert_eq!(contents, vec!["hello", "hi there"]);
    }

    #[test]
    fn test_failure_path_prefixes_warning_marker() {
        let (mut store, _) = open_store();

        let pending = store.submit("hello", None).unwrap();
        store.on_failure(pending, "Missing Gemini API key").unwrap();

        let last = store.messages().last().unwrap();
        assert!(last.content().starts_with(WARNING_MARKER));
        assert!(last.content().contains("Missing"));
        assert!(!store.is_loading());
    }

    #[test]
    fn test_submit_rejects_blank_prompt() {
        let (mut store, backend) = open_store();
        assert_eq!(store.submit("   \n", None), Err(StoreError::EmptyPrompt));
        assert!(store.messages().is_empty());
        assert!(!store.is_loading());
        assert!(backend.get(KEY).unwrap().is_none());
    }

    #[test]
    fn test_second_submit_while_pending_is_busy() {
        let (mut store, _) = open_store();
        let _pending = store.submit("one", None).unwrap();
        assert_eq!(store.submit("two", None), Err(StoreError::Busy));
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn test_completion_must_match_pending_exchange() {
        let (mut store, _) = open_store();
        let first = store.submit("one", None).unwrap();
        store.on_success(first, "ok").unwrap();

        let (mut other, _) = open_store();
        let foreign = other.submit("elsewhere", None).unwrap();
        assert_eq!(store.on_success(foreign, "late"), Err(StoreError::NotPending));

        let _current = store.submit("two", None).unwrap();
        let foreign = other.submit("again", None);
        assert_eq!(foreign, Err(StoreError::Busy));
    }

    #[test]
    fn test_mismatched_ticket_is_rejected_while_pending() {
        let (mut store, _) = open_store();
        let (mut other, _) = open_store();
        let _mine = store.submit("mine", None).unwrap();
        let theirs = other.submit("theirs", None).unwrap();

        assert_eq!(
            store.on_success(theirs, "reply"),
            Err(StoreError::ExchangeMismatch)
        );
        assert!(store.is_loading());
    }

    #[test]
    fn test_loading_flag_tracks_outstanding_exchange() {
        let (mut store, _) = open_store();
        for round in 0..6 {
            assert!(!store.is_loading());
            let pending = store.submit(&format!("prompt {round}"), None).unwrap();
            assert!(store.is_loading());
            assert_eq!(store.submit("extra", None), Err(StoreError::Busy));
            assert!(store.is_loading());
            if round % 2 == 0 {
                store.on_success(pending, "reply").unwrap();
            } else {
                store.on_failure(pending, "boom").unwrap();
            }
            assert!(!store.is_loading());
        }
        assert_eq!(store.messages().len(), 12);
    }

    #[test]
    fn test_every_transition_is_persisted() {
        let (mut store, backend) = open_store();

        let pending = store.submit("hello", None).unwrap();
        assert_eq!(stored(&backend).messages().len(), 1);
        assert!(stored_loading_flag(&backend));

        store.on_success(pending, "hi").unwrap();
        assert_eq!(stored(&backend).messages().len(), 2);
        assert!(!stored_loading_flag(&backend));

        store.toggle_theme();
        assert_eq!(stored(&backend).theme(), Theme::Dark);
    }

    #[test]
    fn test_reopen_after_crash_clears_pending_flag() {
        let backend = MemoryKeyValueStore::new();
        {
            let persistence = Persistence::new(Box::new(backend.clone()), KEY);
            let mut store = ConversationStore::open(persistence, &ChatConfig::default());
            let _pending = store.submit("lost reply", None).unwrap();
        }

        let persistence = Persistence::new(Box::new(backend), KEY);
        let store = ConversationStore::open(persistence, &ChatConfig::default());
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].content(), "lost reply");
        assert!(!store.is_loading());
        assert_eq!(store.phase(), Phase::Idle);
    }

    #[test]
    fn test_clear_history_with_confirmation() {
        let backend = MemoryKeyValueStore::new();
        let mut seeded = ConversationState::new(Theme::Dark);
        for i in 0..5 {
            seeded.push(if i % 2 == 0 {
                Message::user(format!("q{i}"), None)
            } else {
                Message::assistant(format!("a{i}"))
            });
        }
        backend.set(KEY, &codec::encode(&seeded).unwrap()).unwrap();

        let persistence = Persistence::new(Box::new(backend.clone()), KEY);
        let mut store = ConversationStore::open(persistence, &ChatConfig::default());
        assert_eq!(store.messages().len(), 5);

        let mut asked = String::new();
        let cleared = store
            .clear_history(|question| {
                asked = question.to_string();
                true
            })
            .unwrap();

        assert!(cleared);
        assert_eq!(asked, CLEAR_HISTORY_PROMPT);
        assert!(store.messages().is_empty());
        assert_eq!(store.theme(), Theme::Dark);
        assert!(stored(&backend).messages().is_empty());
    }

    #[test]
    fn test_clear_history_declined_keeps_messages() {
        let (mut store, _) = open_store();
        let pending = store.submit("keep me", None).unwrap();
        store.on_success(pending, "kept").unwrap();

        assert_eq!(store.clear_history(|_| false), Ok(false));
        assert_eq!(store.messages().len(), 2);
    }

    #[test]
    fn test_clear_history_refused_while_pending() {
        let (mut store, _) = open_store();
        let _pending = store.submit("busy", None).unwrap();

        let mut asked = false;
        let result = store.clear_history(|_| {
            asked = true;
            true
        });
        assert_eq!(result, Err(StoreError::Busy));
        assert!(!asked);
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn test_toggle_theme_allowed_while_pending() {
        let (mut store, _) = open_store();
        let pending = store.submit("hello", None).unwrap();
        assert_eq!(store.toggle_theme(), Theme::Dark);
        assert_eq!(store.messages().len(), 1);
        store.on_success(pending, "hi").unwrap();
        assert_eq!(store.theme(), Theme::Dark);
    }

    #[test]
    fn test_transcript_cap_evicts_oldest() {
        let backend = MemoryKeyValueStore::new();
        let persistence = Persistence::new(Box::new(backend), KEY);
        let mut config = ChatConfig::default();
        config.persistence.max_messages = 3;
        let mut store = ConversationStore::open(persistence, &config);

        for i in 0..3 {
            let pending = store.submit(&format!("q{i}"), None).unwrap();
            store.on_success(pending, &format!("a{i}")).unwrap();
        }

        let contents: Vec<&str> = store.messages().iter().map(Message::content).collect();
        assert_eq!(contents, vec!["a1", "q2", "a2"]);
    }

    #[test]
    fn test_evicted_image_refs_are_handed_out_once() {
        let persistence = Persistence::new(Box::new(MemoryKeyValueStore::new()), KEY);
        let mut config = ChatConfig::default();
        config.persistence.max_messages = 2;
        let mut store = ConversationStore::open(persistence, &config);

        let first = ImageRef::ephemeral("image/png");
        let pending = store.submit("look", Some(first.clone())).unwrap();
        store.on_success(pending, "seen").unwrap();
        assert!(store.take_evicted_images().is_empty());

        let pending = store.submit("again", None).unwrap();
        assert_eq!(store.take_evicted_images(), vec![first]);
        store.on_success(pending, "ok").unwrap();
        assert!(store.take_evicted_images().is_empty());
        assert_eq!(store.messages().len(), 2);
    }

    #[test]
    fn test_persist_failure_is_non_fatal() {
        let persistence = Persistence::new(Box::new(MemoryKeyValueStore::with_quota(8)), KEY);
        let mut store = ConversationStore::open(persistence, &ChatConfig::default());

        let pending = store.submit("this will not fit in eight bytes", None).unwrap();
        assert!(store.last_persist_error().is_some());
        store.on_success(pending, "still works").unwrap();
        assert_eq!(store.messages().len(), 2);
    }
}
