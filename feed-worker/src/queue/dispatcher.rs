//! Drain pass over the publish queue.
//!
//! One pass takes the items present when it starts and publishes them
//! strictly in order, one at a time. A rate-limit rejection puts the item
//! back at the front, closes the gate, and ends the pass; the cooldown timer
//! reopens the gate later and asks the scheduler for an immediate pass.
//!
//! ```text
//! run() → guard → snapshot → gate check → [take front → post → drop | requeue] → report
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use super::gate::RateLimitGate;
use super::store::QueueStore;
use super::types::{PostOutcome, PostPayload, QueueConfig, QueueItem, DEFAULT_RETRY_AFTER};
use crate::publish::PostPublisher;
use crate::store::Store;
use crate::util::parse_feed_date;

/// All mutable queue state. Guarded by a single mutex.
#[derive(Debug, Default)]
pub(crate) struct QueueState {
    pub(crate) store: QueueStore,
    pub(crate) gate: RateLimitGate,
    pub(crate) running: bool,
}

/// Queue state shared between the dispatcher, the scheduler, the cooldown
/// timer and the intakes.
#[derive(Debug, Default)]
pub(crate) struct SharedQueue {
    pub(crate) state: Mutex<QueueState>,
    /// Signalled by the cooldown timer once the gate reopens.
    pub(crate) resume: Notify,
}

/// What a finished pass leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    /// Items published during this pass
    pub published: usize,
    /// Queue contents after the pass
    pub queue: Vec<QueueItem>,
}

/// Result of a single `Dispatcher::run` call.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Another pass was already in progress; nothing happened.
    AlreadyRunning,
    /// Nothing was queued.
    Empty,
    /// The gate is closed; the queue was left untouched.
    RateLimited,
    /// Every item in the snapshot was published.
    Completed(PassReport),
    /// The service rate-limited us; the pass stopped and the gate closed.
    Paused {
        retry_after: Duration,
        report: PassReport,
    },
    /// The publisher failed unexpectedly; the item went back to the front.
    Failed(PassReport),
}

/// Runs drain passes against the shared queue.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<SharedQueue>,
    publisher: Arc<dyn PostPublisher>,
    store: Arc<dyn Store>,
    config: QueueConfig,
}

impl Dispatcher {
    pub(crate) fn new(
        shared: Arc<SharedQueue>,
        publisher: Arc<dyn PostPublisher>,
        store: Arc<dyn Store>,
        config: QueueConfig,
    ) -> Self {
        Self {
            shared,
            publisher,
            store,
            config,
        }
    }

    /// Run one drain pass.
    ///
    /// Returns immediately when a pass is already running, the queue is
    /// empty, or the gate is closed.
    pub async fn run(&self) -> DispatchOutcome {
        let pass_len = {
            let mut state = self.shared.state.lock().await;

            if state.running {
                debug!("queue_pass_already_running");
                return DispatchOutcome::AlreadyRunning;
            }

            if state.store.is_empty() {
                debug!("queue_empty");
                return DispatchOutcome::Empty;
            }

            // Items enqueued after this point land behind the snapshot and
            // wait for the next pass.
            let pass_len = state.store.len();

            info!(items = pass_len, "queue_pass_starting");

            if state.gate.is_paused() {
                info!(items = pass_len, "queue_pass_rate_limited");
                return DispatchOutcome::RateLimited;
            }

            state.running = true;
            pass_len
        };

        let mut published = 0;

        for position in 0..pass_len {
            // While `running` is held nobody else takes from or pushes to the
            // front, so the live head is always the next snapshot item.
            let item = match self.shared.state.lock().await.store.remove_at(0) {
                Some(item) => item,
                None => break,
            };

            let forwarded_date = self
                .config
                .publish_date
                .then(|| parse_feed_date(&item.date).value);
            let payload = PostPayload {
                content: item.content.clone(),
                embed: item.embed.clone(),
                languages: item.languages.clone(),
                date: forwarded_date,
            };

            match self.publisher.post(&payload).await {
                Ok(PostOutcome::Published) => {
                    published += 1;
                    info!(
                        title = %item.title,
                        position = position,
                        remaining = pass_len - position - 1,
                        "queue_item_published"
                    );

                    let date = match forwarded_date {
                        Some(date) => date,
                        None => parse_feed_date(&item.date).value,
                    };
                    if let Err(e) = self.store.write_date(date).await {
                        error!(title = %item.title, error = %e, "store_write_date_failed");
                    }
                }
                Ok(PostOutcome::RateLimited { retry_after }) => {
                    // A zero hint would reopen the gate at once
                    let delay = retry_after
                        .filter(|d| !d.is_zero())
                        .unwrap_or(DEFAULT_RETRY_AFTER);
                    let report = self.pause(item, delay, published).await;
                    return DispatchOutcome::Paused {
                        retry_after: delay,
                        report,
                    };
                }
                Err(e) => {
                    error!(title = %item.title, error = %e, "queue_item_publish_failed");
                    let mut state = self.shared.state.lock().await;
                    state.store.requeue_front(item);
                    state.running = false;
                    return DispatchOutcome::Failed(PassReport {
                        published,
                        queue: state.store.snapshot(),
                    });
                }
            }
        }

        let queue = {
            let mut state = self.shared.state.lock().await;
            state.running = false;
            state.store.snapshot()
        };

        info!(
            published = published,
            queued = queue.len(),
            next_run_secs = self.config.run_interval,
            "queue_pass_finished"
        );

        if self.config.remove_duplicate {
            match self.store.cleanup_old_values().await {
                Ok(removed) => info!(removed = removed, "store_cleanup_complete"),
                Err(e) => error!(error = %e, "store_cleanup_failed"),
            }
        }

        DispatchOutcome::Completed(PassReport { published, queue })
    }

    /// Put a rejected item back at the front and close the gate.
    async fn pause(&self, item: QueueItem, delay: Duration, published: usize) -> PassReport {
        let title = item.title.clone();
        let mut state = self.shared.state.lock().await;

        state.store.requeue_front(item);

        let shared = Arc::clone(&self.shared);
        let armed = state
            .gate
            .pause(delay, move |delay| spawn_cooldown(shared, delay));
        state.running = false;

        info!(
            title = %title,
            retry_after_secs = delay.as_secs(),
            cooldown_armed = armed,
            "queue_rate_limited_pausing"
        );

        PassReport {
            published,
            queue: state.store.snapshot(),
        }
    }

    /// Abort a pending cooldown and reopen the gate.
    pub async fn cancel_cooldown(&self) {
        self.shared.state.lock().await.gate.cancel();
    }

    /// Completes when the cooldown timer has reopened the gate.
    pub async fn resumed(&self) {
        self.shared.resume.notified().await;
    }
}

/// One-shot timer that reopens the gate after `delay` and wakes the scheduler.
fn spawn_cooldown(shared: Arc<SharedQueue>, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(delay).await;
        shared.state.lock().await.gate.open();
        info!(cooldown_secs = delay.as_secs(), "queue_rate_limit_expired_resuming");
        shared.resume.notify_one();
    })
}
