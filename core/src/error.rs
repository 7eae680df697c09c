/// Error types for the conversation synchronizer
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A change record is missing a required field (or names the current user on both sides)
    #[error("Malformed change record: missing or invalid `{field}`")]
    MalformedEvent { field: &'static str },

    /// The event source reported a failure instead of a batch
    #[error("Source error: {0}")]
    Source(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Avatar decode error: {0}")]
    Avatar(#[from] base64::DecodeError),

    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The serialized update path has been shut down
    #[error("Synchronizer closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, SyncError>;
