//! Async RabbitMQ publisher for feed items.
//!
//! Used by `feedpost-enqueue` to push items onto the `feed_items` queue the
//! worker consumes. The connection is opened lazily and reopened when the
//! channel drops.

use std::sync::Arc;

use anyhow::{Context, Result};
use lapin::{
    options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions},
    publisher_confirm::Confirmation,
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::queue::{QueueItem, INTAKE_QUEUE};

/// Async RabbitMQ publisher with connection management.
#[derive(Clone)]
pub struct IntakePublisher {
    inner: Arc<PublisherInner>,
}

struct PublisherInner {
    url: String,
    connection: RwLock<Option<Connection>>,
    channel: RwLock<Option<Channel>>,
}

impl IntakePublisher {
    /// Create a new publisher with the given RabbitMQ URL.
    pub fn new(url: String) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                url,
                connection: RwLock::new(None),
                channel: RwLock::new(None),
            }),
        }
    }

    /// Ensure we have a valid connection and channel.
    async fn ensure_connected(&self) -> Result<Channel> {
        {
            let channel = self.inner.channel.read().await;
            if let Some(ch) = channel.as_ref() {
                if ch.status().connected() {
                    return Ok(ch.clone());
                }
            }
        }

        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        // Double-check after acquiring write lock
        if let Some(ch) = channel.as_ref() {
            if ch.status().connected() {
                return Ok(ch.clone());
            }
        }

        info!("rabbitmq_publisher_connecting");

        let conn = Connection::connect(&self.inner.url, ConnectionProperties::default())
            .await
            .context("Failed to connect to RabbitMQ")?;

        let ch = conn
            .create_channel()
            .await
            .context("Failed to create channel")?;

        ch.confirm_select(ConfirmSelectOptions::default())
            .await
            .context("Failed to enable publisher confirms")?;

        ch.queue_declare(
            INTAKE_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("Failed to declare intake queue")?;

        info!(queue = INTAKE_QUEUE, "rabbitmq_publisher_connected");

        *connection = Some(conn);
        *channel = Some(ch.clone());

        Ok(ch)
    }

    /// Publish a feed item to the intake queue.
    pub async fn publish_item(&self, item: &QueueItem) -> Result<()> {
        let channel = self.ensure_connected().await?;

        let body = serde_json::to_vec(item).context("Failed to serialize item")?;
        let message_id = item.dedup_key();

        let confirmation = channel
            .basic_publish(
                "",
                INTAKE_QUEUE,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_delivery_mode(2) // Persistent
                    .with_content_type("application/json".into())
                    .with_message_id(message_id.clone().into()),
            )
            .await
            .context("Failed to publish to intake queue")?
            .await
            .context("Failed to confirm publish")?;

        ensure_acked(&confirmation, &message_id)?;

        info!(
            queue = INTAKE_QUEUE,
            message_id = %message_id,
            body_length = body.len(),
            "rabbitmq_item_published"
        );

        Ok(())
    }

    /// Close the connection gracefully.
    pub async fn close(&self) {
        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        if let Some(ch) = channel.take() {
            if let Err(e) = ch.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_channel_close_error");
            }
        }

        if let Some(conn) = connection.take() {
            if let Err(e) = conn.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_connection_close_error");
            }
        }

        info!("rabbitmq_publisher_closed");
    }
}

/// Fail when the broker nacked a confirmed publish.
fn ensure_acked(confirmation: &Confirmation, message_id: &str) -> Result<()> {
    if confirmation.is_nack() {
        warn!(
            queue = INTAKE_QUEUE,
            message_id = %message_id,
            "rabbitmq_item_nacked"
        );
        anyhow::bail!("Broker rejected item {}", message_id);
    }
    Ok(())
}
