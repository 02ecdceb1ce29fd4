//! Error types for the library seams.

use thiserror::Error;

/// Failure from the post publisher that is not a rate-limit rejection.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publish request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("publisher returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Other(String),
}

/// Failure from the persistent store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store data at {path} is invalid: {source}")]
    Format {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure from the queue handler's own surface.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue handler already started")]
    AlreadyStarted,

    #[error("failed to load queue config: {0}")]
    Config(#[from] StoreError),
}
