//! Boundary adapter between the conversation store and durable storage.

use tracing::{debug, warn};

use crate::conversation::state::{ConversationState, Theme};
use crate::persistence::codec;
use crate::persistence::error::PersistenceError;
use crate::persistence::kv_store::KeyValueStore;

/// Loads and saves the whole conversation state under a single key.
pub struct Persistence {
    store: Box<dyn KeyValueStore>,
    key: String,
}

impl Persistence {
    /// Wrap a backend; the blob lives under `key`.
    #[must_use]
    pub fn new(store: Box<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Storage key used for the blob.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read and decode the stored state.
    ///
    /// Returns `None` when nothing is stored, when the backend cannot be read,
    /// or when the blob is malformed; the caller then starts from a fresh state.
    #[must_use]
    pub fn load(&self, fallback_theme: Theme) -> Option<ConversationState> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %self.key, "no stored conversation state");
                return None;
            }
            Err(err) => {
                warn!(key = %self.key, "failed to read conversation state: {err}");
                return None;
            }
        };

        match codec::decode(&raw, fallback_theme) {
            Ok(state) => {
                debug!(
                    key = %self.key,
                    messages = state.messages().len(),
                    "hydrated conversation state"
                );
                Some(state)
            }
            Err(err) => {
                warn!(key = %self.key, "discarding malformed conversation state: {err}");
                None
            }
        }
    }

    /// Serialize and write the full state.
    ///
    /// # Errors
    /// Returns an error if encoding fails or the backend rejects the write.
    /// Callers treat this as a warning; in-memory state stays authoritative.
    pub fn save(&self, state: &ConversationState) -> Result<(), PersistenceError> {
        let raw = codec::encode(state)?;
        self.store.set(&self.key, &raw)?;
        Ok(())
    }

    /// Delete the stored blob.
    ///
    /// # Errors
    /// Returns an error if the backend rejects the delete.
    pub fn erase(&self) -> Result<(), PersistenceError> {
        self.store.remove(&self.key)?;
        Ok(())
    }
}
