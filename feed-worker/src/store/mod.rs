//! Persistent store contract and its JSON file implementation.

pub mod file;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::queue::QueueConfig;

pub use file::FileStore;

/// Configuration source and "last published" bookkeeping for the queue.
#[async_trait]
pub trait Store: Send + Sync {
    /// Load the queue configuration. Called once at startup.
    async fn init_config(&self) -> Result<QueueConfig, StoreError>;

    /// Record the publish date of the most recently published item.
    async fn write_date(&self, date: DateTime<Utc>) -> Result<(), StoreError>;

    /// Drop stale dedup records. Returns how many were removed.
    async fn cleanup_old_values(&self) -> Result<usize, StoreError>;
}
