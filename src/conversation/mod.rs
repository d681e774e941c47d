//! Conversation transcript, state machine and configuration.

pub mod config;
pub mod errors;
pub mod ids;
pub mod message;
pub mod state;
pub mod store;

pub use config::{ApiKey, ChatConfig};
pub use errors::{ChatError, ChatResult, StoreError};
pub use ids::{ExchangeId, MessageId};
pub use message::{ImageRef, Message, Role};
pub use state::{ConversationState, Theme};
pub use store::{ConversationStore, PendingExchange, Phase};
