//! Feedpost Enqueue - push feed items onto the AMQP intake queue.
//!
//! Reads one JSON queue item per line from stdin and publishes each to the
//! `feed_items` queue, where `feedpost-worker` picks them up in order.
//! Lines that are blank or not valid items are skipped with a warning.

use anyhow::{bail, Context, Result};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use feedpost::{Config, IntakePublisher, QueueItem};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true).with_writer(std::io::stderr))
        .init();

    let config = Config::from_env();
    let Some(url) = config.cloudamqp_url else {
        bail!("CLOUDAMQP_URL must be set");
    };

    let publisher = IntakePublisher::new(url);
    let mut lines = BufReader::new(io::stdin()).lines();

    let mut published = 0usize;
    let mut skipped = 0usize;
    let mut line_number = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        let item: QueueItem = match serde_json::from_str(&line) {
            Ok(item) => item,
            Err(e) => {
                warn!(line = line_number, error = %e, "enqueue_line_invalid");
                skipped += 1;
                continue;
            }
        };

        publisher
            .publish_item(&item)
            .await
            .with_context(|| format!("Failed to publish line {}", line_number))?;
        published += 1;
    }

    publisher.close().await;

    info!(published = published, skipped = skipped, "enqueue_complete");
    Ok(())
}
