//! Core of a Gemini chat client: conversation state machine, local persistence,
//! safe markdown rendering, exchange orchestration and the history view-model.

// Hard rules
#![deny(unsafe_code)] // No unsafe code
#![forbid(unsafe_op_in_unsafe_fn)]
#![deny(unused_must_use)] // Results and Options must be handled
#![deny(overflowing_literals)]
#![deny(nonstandard_style)]
#![warn(missing_docs)] // Every public item is documented
#![warn(unused_imports)]
#![warn(unused_variables)]
#![warn(dead_code)]

// Clippy discipline
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_in_result)]
#![deny(clippy::redundant_clone)]
#![deny(clippy::shadow_unrelated)]
#![deny(clippy::too_many_arguments)]
#![deny(clippy::cognitive_complexity)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::too_many_lines
    )
)]

/// Transcript model, state machine and configuration.
pub mod conversation;
/// History panel view-model.
pub mod history;
/// Model API boundary and exchange orchestration.
pub mod llm;
/// Durable client-side persistence.
pub mod persistence;
/// Markdown expansion, highlighting and sanitizing.
pub mod render;
/// Single owning context wiring the pieces together.
pub mod session;
/// Tracing subscriber setup.
pub mod telemetry;

pub use conversation::{
    ChatConfig, ChatError, ChatResult, ConversationState, ConversationStore, Message, MessageId,
    Role, StoreError, Theme,
};
pub use history::{HistoryBucket, HistoryGroup, group_by_recency};
pub use llm::{ExchangeError, GeminiClient, ImageAttachment, ModelClient, ResponseOrchestrator};
pub use persistence::{KeyValueStore, MemoryKeyValueStore, Persistence, SqliteKeyValueStore};
pub use render::{Renderer, SafeHtml};
pub use session::{ChatSession, ExchangeReport, OutstandingExchange, SessionError};
