//! Memory-specific error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Store is closed")]
    Closed,

    #[error("Corrupt record for chat {chat_id}: {message}")]
    Corrupt { chat_id: Uuid, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<MemoryError> for switchboard_types::SwitchboardError {
    fn from(err: MemoryError) -> Self {
        switchboard_types::SwitchboardError::Memory(err.to_string())
    }
}
