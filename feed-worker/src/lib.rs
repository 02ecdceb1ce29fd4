//! Feedpost - Rate-limit aware publish queue for feed items.
//!
//! This library provides the modules behind the two Feedpost binaries:
//! - `feedpost-worker`: queue, dispatcher, HTTP and AMQP intake in one process
//! - `feedpost-enqueue`: pushes feed items from stdin onto the AMQP intake queue
//!
//! ## Architecture
//!
//! ```text
//! Feed source → (POST /items | feed_items queue) → Intake → Queue → Dispatcher → Post publisher
//!                                                                       ↓
//!                                                                  File store
//! ```

pub mod config;
pub mod error;
pub mod intake;
pub mod publish;
pub mod queue;
pub mod store;
pub mod util;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use error::{PublishError, QueueError, StoreError};
pub use intake::{Admission, Intake, IntakePublisher};
pub use publish::{HttpPublisher, PostPublisher};
pub use queue::{
    DispatchOutcome, PostOutcome, PostPayload, QueueConfig, QueueHandler, QueueItem, QueueStatus,
    INTAKE_QUEUE,
};
pub use store::{FileStore, Store};
pub use web::AppState;
