//! Conversation, fact and summary stores for Switchboard.
//!
//! Each track is an independent, optional adapter. Chat agents treat every
//! store call as best-effort: a failing store never fails a turn.

pub mod error;
pub mod file;
pub mod in_memory;
pub mod store;

pub use error::MemoryError;
pub use file::{JsonFileStore, StoreState};
pub use in_memory::InMemoryStore;
pub use store::{ConversationStore, FactStore, MemoryAdapters, SummaryEntry, SummaryStore};
