//! In-memory publish queue with rate-limit backoff.
//!
//! This module provides:
//! - `QueueHandler`: the cloneable handle producers enqueue into
//! - `Dispatcher`: sequential drain passes over a snapshot of the queue
//! - `Scheduler`: the periodic tick and the post-cooldown resume
//! - `RateLimitGate`: pause/resume state with a single cooldown timer
//!
//! ## Flow
//!
//! ```text
//! Intake → enqueue → QueueStore ← Dispatcher ← Scheduler (tick | cooldown resume)
//!                                     ↓
//!                              PostPublisher / Store
//! ```

pub mod dispatcher;
pub mod gate;
pub mod handler;
pub mod scheduler;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{DispatchOutcome, Dispatcher, PassReport};
pub use gate::RateLimitGate;
pub use handler::{QueueHandler, QueueStatus};
pub use scheduler::Scheduler;
pub use store::QueueStore;
pub use types::{
    PostOutcome, PostPayload, QueueConfig, QueueItem, DEFAULT_RETRY_AFTER, INTAKE_QUEUE,
};
