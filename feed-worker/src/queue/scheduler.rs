//! Periodic and resume triggers for the dispatcher.

use std::future::Future;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use super::dispatcher::{DispatchOutcome, Dispatcher};

/// Why a pass was started.
#[derive(Debug, Clone, Copy)]
enum Trigger {
    Interval,
    Cooldown,
}

/// Fires `Dispatcher::run` every `period`, and once more whenever the
/// cooldown timer reopens the gate.
pub struct Scheduler {
    dispatcher: Dispatcher,
    period: Duration,
}

impl Scheduler {
    pub fn new(dispatcher: Dispatcher, period: Duration) -> Self {
        Self { dispatcher, period }
    }

    /// Start the scheduler loop. It stops when `shutdown` completes, waits
    /// for an in-flight pass, and cancels any pending cooldown on the way out.
    pub fn spawn<F>(self, shutdown: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(self.run(shutdown))
    }

    async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // First tick after one full period, like a plain interval timer
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut passes = JoinSet::new();

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("queue_scheduler_stopping");
                    break;
                }
                _ = ticker.tick() => self.trigger(Trigger::Interval, &mut passes),
                _ = self.dispatcher.resumed() => self.trigger(Trigger::Cooldown, &mut passes),
                Some(joined) = passes.join_next(), if !passes.is_empty() => {
                    log_pass(joined);
                }
            }
        }

        // The item of an in-flight pass is already off the queue; let it land
        // before the queue is inspected.
        while let Some(joined) = passes.join_next().await {
            log_pass(joined);
        }
        self.dispatcher.cancel_cooldown().await;

        info!("queue_scheduler_stopped");
    }

    /// Spawn a pass without waiting for it. Overlap is the dispatcher's
    /// problem: a pass started while another runs returns immediately.
    fn trigger(&self, trigger: Trigger, passes: &mut JoinSet<DispatchOutcome>) {
        debug!(trigger = ?trigger, "queue_pass_triggered");
        let dispatcher = self.dispatcher.clone();
        passes.spawn(async move { dispatcher.run().await });
    }
}

fn log_pass(joined: Result<DispatchOutcome, JoinError>) {
    match joined {
        Ok(outcome) => debug!(outcome = ?outcome, "queue_pass_joined"),
        Err(e) => error!(error = %e, "queue_pass_panicked"),
    }
}
