//! Rate limit gate: the pause/resume state machine for the whole queue.

use std::time::Duration;

use tokio::task::JoinHandle;

/// Pause flag plus the single outstanding cooldown timer.
#[derive(Debug, Default)]
pub struct RateLimitGate {
    paused: bool,
    cooldown: Option<JoinHandle<()>>,
}

impl RateLimitGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Close the gate and arm a cooldown built by `arm`.
    ///
    /// Returns `false` without calling `arm` when the gate is already paused,
    /// so there is never more than one cooldown timer pending.
    pub fn pause<F>(&mut self, delay: Duration, arm: F) -> bool
    where
        F: FnOnce(Duration) -> JoinHandle<()>,
    {
        if self.paused {
            return false;
        }

        self.paused = true;
        if let Some(stale) = self.cooldown.replace(arm(delay)) {
            stale.abort();
        }
        true
    }

    /// Reopen the gate. Called by the cooldown timer when it fires.
    ///
    /// The handle is dropped rather than aborted since the caller is usually
    /// the timer task itself.
    pub fn open(&mut self) {
        self.paused = false;
        self.cooldown = None;
    }

    /// Abort any pending cooldown and reopen the gate.
    pub fn cancel(&mut self) {
        if let Some(timer) = self.cooldown.take() {
            timer.abort();
        }
        self.paused = false;
    }

    /// True while a cooldown timer is armed and has not fired yet.
    pub fn has_pending_cooldown(&self) -> bool {
        self.cooldown.as_ref().is_some_and(|t| !t.is_finished())
    }
}
