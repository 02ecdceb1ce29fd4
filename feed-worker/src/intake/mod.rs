//! Feed item intake.
//!
//! Items reach the queue either over HTTP (`web`) or from the `feed_items`
//! RabbitMQ queue (`consumer`). Both go through `Intake::admit`, which fills
//! in default languages, drops duplicates when dedup is enabled, and
//! enqueues everything else.
//!
//! ```text
//! feedpost-enqueue → feed_items queue → consumer ─┐
//!                                 POST /items ────┴→ Intake::admit → QueueHandler
//! ```

pub mod consumer;
pub mod publisher;

use std::sync::Arc;

use tracing::info;

use crate::error::StoreError;
use crate::queue::{QueueHandler, QueueItem};
use crate::store::FileStore;

pub use publisher::IntakePublisher;

/// What happened to an item offered to the intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Enqueued { queue_length: usize },
    Duplicate,
}

/// Shared front door for every producer.
#[derive(Clone)]
pub struct Intake {
    handler: QueueHandler,
    store: Arc<FileStore>,
    default_languages: Vec<String>,
}

impl Intake {
    pub fn new(handler: QueueHandler, store: Arc<FileStore>, default_languages: Vec<String>) -> Self {
        Self {
            handler,
            store,
            default_languages,
        }
    }

    pub fn handler(&self) -> &QueueHandler {
        &self.handler
    }

    /// Offer an item to the queue.
    pub async fn admit(&self, mut item: QueueItem) -> Result<Admission, StoreError> {
        if item.languages.is_empty() {
            item.languages = self.default_languages.clone();
        }

        let dedup = self
            .handler
            .config()
            .map(|c| c.remove_duplicate)
            .unwrap_or(false);

        if dedup && self.store.check_and_remember(&item.dedup_key()).await? {
            info!(title = %item.title, "intake_item_duplicate");
            return Ok(Admission::Duplicate);
        }

        let queue_length = self.handler.enqueue(item).await;
        Ok(Admission::Enqueued { queue_length })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::testing::{item, FakePublisher};
    use tempfile::TempDir;

    async fn build_intake(dir: &TempDir, config_json: Option<&str>) -> Intake {
        if let Some(json) = config_json {
            std::fs::write(dir.path().join("config.json"), json).unwrap();
        }
        let store = Arc::new(
            FileStore::open(dir.path().join("config.json"), dir.path().join("state.json"))
                .await
                .unwrap(),
        );
        let handler = QueueHandler::new(Arc::new(FakePublisher::accepting()), store.clone());
        handler.start(std::future::pending::<()>()).await.unwrap();
        Intake::new(handler, store, vec!["en".to_string()])
    }

    #[tokio::test]
    async fn test_admit_fills_default_languages() {
        let dir = TempDir::new().unwrap();
        let intake = build_intake(&dir, None).await;

        let mut bare = item("A", "");
        bare.languages.clear();

        assert_eq!(
            intake.admit(bare).await.unwrap(),
            Admission::Enqueued { queue_length: 1 }
        );
        assert_eq!(intake.handler().snapshot().await[0].languages, vec!["en"]);
    }

    #[tokio::test]
    async fn test_admit_keeps_duplicates_when_dedup_disabled() {
        let dir = TempDir::new().unwrap();
        let intake = build_intake(&dir, None).await;

        intake.admit(item("A", "d")).await.unwrap();
        assert_eq!(
            intake.admit(item("A", "d")).await.unwrap(),
            Admission::Enqueued { queue_length: 2 }
        );
    }

    #[tokio::test]
    async fn test_admit_drops_duplicates_when_dedup_enabled() {
        let dir = TempDir::new().unwrap();
        let intake = build_intake(&dir, Some(r#"{"removeDuplicate": true}"#)).await;

        intake.admit(item("A", "d")).await.unwrap();
        assert_eq!(
            intake.admit(item("A", "d")).await.unwrap(),
            Admission::Duplicate
        );
        assert_eq!(
            intake.admit(item("B", "d")).await.unwrap(),
            Admission::Enqueued { queue_length: 2 }
        );
    }
}
