//! Public face of the publish queue.
//!
//! `QueueHandler` owns the shared queue state and hands out the only two
//! operations producers need: `start` and `enqueue`. Everything else
//! (dispatch, gate, cooldown) stays internal.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::info;

use super::dispatcher::{Dispatcher, SharedQueue};
use super::scheduler::Scheduler;
use super::types::{QueueConfig, QueueItem};
use crate::error::QueueError;
use crate::publish::PostPublisher;
use crate::store::Store;

/// Point-in-time view of the queue for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub length: usize,
    pub paused: bool,
    pub cooldown_pending: bool,
    pub running: bool,
}

/// Cloneable handle to the publish queue.
#[derive(Clone)]
pub struct QueueHandler {
    shared: Arc<SharedQueue>,
    publisher: Arc<dyn PostPublisher>,
    store: Arc<dyn Store>,
    config: Arc<OnceLock<QueueConfig>>,
}

impl QueueHandler {
    /// Create a handler. Items may be enqueued before `start`; they are
    /// picked up by the first pass.
    pub fn new(publisher: Arc<dyn PostPublisher>, store: Arc<dyn Store>) -> Self {
        Self {
            shared: Arc::new(SharedQueue::default()),
            publisher,
            store,
            config: Arc::new(OnceLock::new()),
        }
    }

    /// Load the queue config from the store and arm the scheduler.
    ///
    /// Fails with `QueueError::AlreadyStarted` on a second call.
    pub async fn start<F>(&self, shutdown: F) -> Result<JoinHandle<()>, QueueError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.config.get().is_some() {
            return Err(QueueError::AlreadyStarted);
        }

        let config = self.store.init_config().await?;
        self.config
            .set(config.clone())
            .map_err(|_| QueueError::AlreadyStarted)?;

        info!(
            run_interval_secs = config.run_interval,
            publish_date = config.publish_date,
            remove_duplicate = config.remove_duplicate,
            "queue_handler_starting"
        );

        let period = config.tick_interval();
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.shared),
            Arc::clone(&self.publisher),
            Arc::clone(&self.store),
            config,
        );

        Ok(Scheduler::new(dispatcher, period).spawn(shutdown))
    }

    /// Append an item to the queue. Returns the new queue length.
    ///
    /// Never publishes synchronously; the item goes out on a later pass.
    pub async fn enqueue(&self, item: QueueItem) -> usize {
        let title = item.title.clone();
        let length = self.shared.state.lock().await.store.enqueue(item);
        info!(title = %title, queue_length = length, "queue_item_enqueued");
        length
    }

    /// Config loaded by `start`, if it has run.
    pub fn config(&self) -> Option<&QueueConfig> {
        self.config.get()
    }

    pub async fn status(&self) -> QueueStatus {
        let state = self.shared.state.lock().await;
        QueueStatus {
            length: state.store.len(),
            paused: state.gate.is_paused(),
            cooldown_pending: state.gate.has_pending_cooldown(),
            running: state.running,
        }
    }

    /// Copy of the pending items in publish order.
    pub async fn snapshot(&self) -> Vec<QueueItem> {
        self.shared.state.lock().await.store.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;
    use crate::queue::testing::{item, titles, FakePublisher, MemoryStore};
    use crate::queue::PostOutcome;

    fn build(
        publisher: FakePublisher,
        store: MemoryStore,
    ) -> (QueueHandler, Arc<FakePublisher>, Arc<MemoryStore>) {
        let publisher = Arc::new(publisher);
        let store = Arc::new(store);
        let handler = QueueHandler::new(publisher.clone(), store.clone());
        (handler, publisher, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_tick_drains_queue() {
        let (handler, publisher, store) =
            build(FakePublisher::accepting(), MemoryStore::new(QueueConfig::default()));

        handler.enqueue(item("A", "2025-01-01T00:00:00Z")).await;
        handler.enqueue(item("B", "2025-01-02T00:00:00Z")).await;
        handler.enqueue(item("C", "2025-01-03T00:00:00Z")).await;
        handler.start(std::future::pending::<()>()).await.unwrap();

        // Nothing goes out before the first tick
        sleep(Duration::from_secs(59)).await;
        assert_eq!(publisher.attempts(), 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(publisher.published_contents(), vec!["A body", "B body", "C body"]);
        assert_eq!(store.dates().len(), 3);
        assert_eq!(handler.status().await.length, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_item_drains_after_cooldown() {
        let publisher = FakePublisher::scripted(vec![
            Ok(PostOutcome::Published),
            Ok(PostOutcome::RateLimited {
                retry_after: Some(Duration::from_secs(45)),
            }),
        ]);
        let (handler, publisher, _store) =
            build(publisher, MemoryStore::new(QueueConfig::default()));

        handler.enqueue(item("A", "")).await;
        handler.enqueue(item("B", "")).await;
        handler.start(std::future::pending::<()>()).await.unwrap();

        // First tick at t=60: A goes out, B is rejected
        sleep(Duration::from_secs(61)).await;
        assert_eq!(titles(&handler.snapshot().await), vec!["B"]);
        let status = handler.status().await;
        assert!(status.paused);
        assert!(status.cooldown_pending);

        // Cooldown ends at t=105, well before the next tick at t=120
        sleep(Duration::from_secs(43)).await;
        assert_eq!(titles(&handler.snapshot().await), vec!["B"]);

        sleep(Duration::from_secs(2)).await;
        assert!(handler.snapshot().await.is_empty());
        assert_eq!(publisher.published_contents(), vec!["A body", "B body"]);

        let status = handler.status().await;
        assert!(!status.paused);
        assert!(!status.cooldown_pending);
        assert!(!status.running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_rejected() {
        let (handler, _publisher, _store) =
            build(FakePublisher::accepting(), MemoryStore::new(QueueConfig::default()));

        handler.start(std::future::pending::<()>()).await.unwrap();
        let second = handler.start(std::future::pending::<()>()).await;

        assert!(matches!(second, Err(QueueError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn test_start_fails_without_config() {
        let (handler, _publisher, _store) =
            build(FakePublisher::accepting(), MemoryStore::broken());

        let result = handler.start(std::future::pending::<()>()).await;

        assert!(matches!(result, Err(QueueError::Config(_))));
        assert!(handler.config().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_scheduler() {
        let (handler, publisher, _store) =
            build(FakePublisher::accepting(), MemoryStore::new(QueueConfig::default()));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let scheduler = handler
            .start(async move {
                let _ = rx.await;
            })
            .await
            .unwrap();
        handler.enqueue(item("A", "")).await;

        tx.send(()).unwrap();
        scheduler.await.unwrap();

        sleep(Duration::from_secs(120)).await;
        assert_eq!(publisher.attempts(), 0);
        assert_eq!(handler.status().await.length, 1);
    }

    #[tokio::test]
    async fn test_enqueue_returns_length() {
        let (handler, _publisher, _store) =
            build(FakePublisher::accepting(), MemoryStore::new(QueueConfig::default()));

        assert_eq!(handler.enqueue(item("A", "")).await, 1);
        assert_eq!(handler.enqueue(item("B", "")).await, 2);
        assert_eq!(titles(&handler.snapshot().await), vec!["A", "B"]);
    }
}
