//! In-memory collaborators for queue tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::types::{PostOutcome, PostPayload, QueueConfig, QueueItem};
use crate::error::{PublishError, StoreError};
use crate::publish::PostPublisher;
use crate::store::Store;

pub(crate) fn item(title: &str, date: &str) -> QueueItem {
    QueueItem {
        content: format!("{} body", title),
        embed: None,
        languages: vec!["en".to_string()],
        title: title.to_string(),
        date: date.to_string(),
    }
}

pub(crate) fn titles(items: &[QueueItem]) -> Vec<String> {
    items.iter().map(|i| i.title.clone()).collect()
}

/// Publisher that replays a script of outcomes, then accepts everything.
pub(crate) struct FakePublisher {
    script: Mutex<VecDeque<Result<PostOutcome, String>>>,
    payloads: Mutex<Vec<PostPayload>>,
    published: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Duration,
}

impl FakePublisher {
    pub(crate) fn accepting() -> Self {
        Self::scripted(Vec::new())
    }

    pub(crate) fn scripted(script: Vec<Result<PostOutcome, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            payloads: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of publish attempts, successful or not.
    pub(crate) fn attempts(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }

    pub(crate) fn payloads(&self) -> Vec<PostPayload> {
        self.payloads.lock().unwrap().clone()
    }

    /// Contents of the posts that went out, in publish order.
    pub(crate) fn published_contents(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PostPublisher for FakePublisher {
    async fn post(&self, payload: &PostPayload) -> Result<PostOutcome, PublishError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.clone());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(PostOutcome::Published));

        if let Ok(PostOutcome::Published) = next {
            self.published.lock().unwrap().push(payload.content.clone());
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        next.map_err(PublishError::Other)
    }
}

/// Store that keeps everything in memory.
pub(crate) struct MemoryStore {
    config: Option<QueueConfig>,
    dates: Mutex<Vec<DateTime<Utc>>>,
    cleanups: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub(crate) fn new(config: QueueConfig) -> Self {
        Self {
            config: Some(config),
            dates: Mutex::new(Vec::new()),
            cleanups: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// A store whose config cannot be loaded.
    pub(crate) fn broken() -> Self {
        Self {
            config: None,
            ..Self::new(QueueConfig::default())
        }
    }

    pub(crate) fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub(crate) fn dates(&self) -> Vec<DateTime<Utc>> {
        self.dates.lock().unwrap().clone()
    }

    pub(crate) fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

fn io_error(path: &str) -> StoreError {
    StoreError::Io {
        path: path.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::Other, "unavailable"),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn init_config(&self) -> Result<QueueConfig, StoreError> {
        self.config.clone().ok_or_else(|| io_error("memory://config"))
    }

    async fn write_date(&self, date: DateTime<Utc>) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io_error("memory://state"));
        }
        self.dates.lock().unwrap().push(date);
        Ok(())
    }

    async fn cleanup_old_values(&self) -> Result<usize, StoreError> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }
}
