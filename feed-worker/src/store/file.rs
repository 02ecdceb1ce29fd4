//! JSON file store.
//!
//! Two files:
//! - the config file, read once by `init_config` (camelCase keys, missing
//!   file means defaults)
//! - the state file, holding the last published date and the dedup history,
//!   rewritten atomically (temp file + rename) on every change

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::Store;
use crate::error::StoreError;
use crate::queue::QueueConfig;

/// Persisted store state.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreState {
    #[serde(default)]
    last_published: Option<DateTime<Utc>>,
    /// Dedup key → first time it was seen
    #[serde(default)]
    seen: BTreeMap<String, DateTime<Utc>>,
}

struct Inner {
    state: StoreState,
    retention_days: u32,
}

/// Store backed by a config file and a state file on local disk.
pub struct FileStore {
    config_path: PathBuf,
    state_path: PathBuf,
    inner: Mutex<Inner>,
}

impl FileStore {
    /// Open the store, loading existing state if the state file exists.
    pub async fn open(
        config_path: impl Into<PathBuf>,
        state_path: impl Into<PathBuf>,
    ) -> Result<Self, StoreError> {
        let config_path = config_path.into();
        let state_path = state_path.into();

        let state = match read_json::<StoreState>(&state_path).await? {
            Some(state) => state,
            None => StoreState::default(),
        };

        info!(
            state_path = %state_path.display(),
            seen_entries = state.seen.len(),
            has_last_published = state.last_published.is_some(),
            "file_store_opened"
        );

        Ok(Self {
            config_path,
            state_path,
            inner: Mutex::new(Inner {
                state,
                retention_days: QueueConfig::default().dedup_retention_days,
            }),
        })
    }

    /// Date of the most recently published item, if any.
    pub async fn last_published(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().await.state.last_published
    }

    /// Returns `true` when `key` was seen before; otherwise records it and
    /// returns `false`.
    pub async fn check_and_remember(&self, key: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;

        if inner.state.seen.contains_key(key) {
            debug!(key = %key, "file_store_duplicate");
            return Ok(true);
        }

        // Only remember the key once it is on disk, so a failed write can
        // be retried without the item reading as a duplicate.
        let mut next = inner.state.clone();
        next.seen.insert(key.to_string(), Utc::now());
        self.persist(&next).await?;
        inner.state = next;
        Ok(false)
    }

    async fn cleanup_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock().await;

        let before = inner.state.seen.len();
        inner.state.seen.retain(|_, seen_at| *seen_at >= cutoff);
        let removed = before - inner.state.seen.len();

        if removed > 0 {
            self.persist(&inner.state).await?;
        }

        Ok(removed)
    }

    async fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(state).map_err(|source| StoreError::Format {
            path: self.state_path.display().to_string(),
            source,
        })?;

        let tmp_path = self.state_path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &body)
            .await
            .map_err(|source| io_error(&tmp_path, source))?;
        tokio::fs::rename(&tmp_path, &self.state_path)
            .await
            .map_err(|source| io_error(&self.state_path, source))?;

        Ok(())
    }
}

#[async_trait]
impl Store for FileStore {
    async fn init_config(&self) -> Result<QueueConfig, StoreError> {
        let config = match read_json::<QueueConfig>(&self.config_path).await? {
            Some(config) => config,
            None => {
                info!(
                    config_path = %self.config_path.display(),
                    "file_store_config_missing_using_defaults"
                );
                QueueConfig::default()
            }
        };

        self.inner.lock().await.retention_days = config.dedup_retention_days;
        Ok(config)
    }

    async fn write_date(&self, date: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.state.last_published = Some(date);
        self.persist(&inner.state).await
    }

    async fn cleanup_old_values(&self) -> Result<usize, StoreError> {
        let retention_days = self.inner.lock().await.retention_days;
        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        self.cleanup_before(cutoff).await
    }
}

/// Read and parse a JSON file. A missing file is `Ok(None)`.
async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(io_error(path, source)),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Format {
            path: path.display().to_string(),
            source,
        })
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}
