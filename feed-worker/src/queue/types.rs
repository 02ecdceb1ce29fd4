//! Queue item and publish payload types.
//!
//! This module defines:
//! - `QueueItem`: a pending feed entry waiting in the publish queue
//! - `PostPayload`: the normalized payload handed to the post publisher
//! - `PostOutcome`: what the publisher reports back for a single attempt
//! - `QueueConfig`: the queue settings supplied by the store at startup

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Queue name for feed items arriving over AMQP.
pub const INTAKE_QUEUE: &str = "feed_items";

/// Cooldown applied when a rate-limit rejection carries no retry hint.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// A feed entry waiting to be published.
///
/// Produced by the feed collaborator and moved through the queue by value:
/// a rejected item goes back to the front as the same value, never a copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Post body, passed to the publisher untouched
    pub content: String,
    /// Optional rich-media descriptor, opaque to the queue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<serde_json::Value>,
    /// Language tags for the post, in order
    #[serde(default)]
    pub languages: Vec<String>,
    /// Human-readable label used only for logging
    #[serde(default)]
    pub title: String,
    /// Source-provided publish timestamp (may be malformed)
    #[serde(default)]
    pub date: String,
}

impl QueueItem {
    /// Key used by the intakes to recognise an entry they have already seen.
    pub fn dedup_key(&self) -> String {
        format!("{}|{}", self.title, self.date)
    }
}

/// Payload handed to the post publisher for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostPayload {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<serde_json::Value>,
    pub languages: Vec<String>,
    /// Original publish date, only forwarded when `publish_date` is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

/// Result of a single publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// The post went out.
    Published,
    /// The service refused the post because of rate limiting.
    RateLimited {
        /// Suggested delay before trying again
        retry_after: Option<Duration>,
    },
}

/// Queue settings loaded once at startup from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueConfig {
    /// Seconds between periodic drain passes
    pub run_interval: u64,
    /// Whether to forward the original timestamp to the publisher
    pub publish_date: bool,
    /// Whether to run the store cleanup after a full drain
    pub remove_duplicate: bool,
    /// How long dedup records are kept before cleanup drops them
    pub dedup_retention_days: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            run_interval: 60,
            publish_date: false,
            remove_duplicate: false,
            dedup_retention_days: 7,
        }
    }
}

impl QueueConfig {
    /// Interval between periodic ticks. Never zero.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.run_interval.max(1))
    }
}
