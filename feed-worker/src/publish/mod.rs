//! Post publisher contract and its HTTP implementation.
//!
//! The dispatcher only sees the `PostPublisher` trait: one payload in, either
//! `Published` or `RateLimited` out. Anything else is a `PublishError`.

pub mod http;

use async_trait::async_trait;

use crate::error::PublishError;
use crate::queue::{PostOutcome, PostPayload};

pub use http::HttpPublisher;

/// Publishes a single post to the external service.
#[async_trait]
pub trait PostPublisher: Send + Sync {
    async fn post(&self, payload: &PostPayload) -> Result<PostOutcome, PublishError>;
}
