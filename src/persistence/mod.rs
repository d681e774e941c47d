//! Durable client-side persistence of the conversation state.
//!
//! - `kv_store`: textual key-value backends (in-memory, `SQLite`)
//! - `codec`: JSON blob encoding with per-message timestamp rehydration
//! - `layer`: `load`/`save` adapter used by the conversation store

pub mod codec;
pub mod error;
pub mod kv_store;
pub mod layer;

pub use error::{DecodeError, PersistenceError, StorageError};
pub use kv_store::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
pub use layer::Persistence;
