/// Error types for the sync engine
use crate::model::ConversationId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Stale reference to unknown conversation {0}")]
    StaleReference(ConversationId),

    #[error("Snapshot request failed: {0}")]
    Snapshot(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
