//! RabbitMQ intake consumer using lapin.
//!
//! Consumes feed items from the `feed_items` queue and admits them to the
//! publish queue. Deliveries are handled one at a time, in delivery order,
//! so the publish order matches the order the feed source produced.

use std::future::Future;

use anyhow::{Context, Result};
use futures::StreamExt;
use lapin::{
    message::Delivery,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
    Channel, Connection, ConnectionProperties,
};
use tracing::{error, info, warn};

use super::{Admission, Intake};
use crate::queue::{QueueItem, INTAKE_QUEUE};

/// How a delivery should be settled with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Ack,
    /// Reject; `requeue` asks the broker to redeliver it later
    Nack { requeue: bool },
}

/// Run the AMQP intake until `shutdown` completes or the consumer closes.
///
/// This function:
/// 1. Connects to RabbitMQ using the configured URL
/// 2. Sets QoS to a prefetch of 1 so deliveries arrive in order
/// 3. Declares the queue (idempotent operation)
/// 4. Admits each delivery and acks/nacks it before taking the next
pub async fn run<F>(url: &str, intake: Intake, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    info!(url_length = url.len(), "rabbitmq_connecting");

    let conn = Connection::connect(url, ConnectionProperties::default())
        .await
        .context("Failed to connect to RabbitMQ")?;

    info!("rabbitmq_connected");

    let channel = conn.create_channel().await.context("Failed to create channel")?;

    channel
        .basic_qos(1, BasicQosOptions::default())
        .await
        .context("Failed to set QoS")?;

    // Declare the queue (durable so items survive a broker restart)
    channel
        .queue_declare(
            INTAKE_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("Failed to declare intake queue")?;

    info!(queue = INTAKE_QUEUE, "rabbitmq_queue_declared");

    let mut consumer = channel
        .basic_consume(
            INTAKE_QUEUE,
            "feedpost-worker",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .context("Failed to start consumer")?;

    info!(queue = INTAKE_QUEUE, "rabbitmq_consumer_started");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("rabbitmq_consumer_stopping");
                break;
            }
            delivery = consumer.next() => {
                match delivery {
                    Some(Ok(delivery)) => handle_delivery(&channel, &intake, delivery).await,
                    Some(Err(e)) => {
                        error!(error = %e, "rabbitmq_delivery_error");
                    }
                    None => {
                        warn!("rabbitmq_consumer_closed");
                        break;
                    }
                }
            }
        }
    }

    if let Err(e) = channel.close(200, "Normal shutdown").await {
        warn!(error = %e, "rabbitmq_channel_close_error");
    }
    if let Err(e) = conn.close(200, "Normal shutdown").await {
        warn!(error = %e, "rabbitmq_connection_close_error");
    }

    info!("rabbitmq_consumer_shutdown_complete");
    Ok(())
}

async fn handle_delivery(channel: &Channel, intake: &Intake, delivery: Delivery) {
    let delivery_tag = delivery.delivery_tag;
    let message_id = delivery
        .properties
        .message_id()
        .as_ref()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    info!(
        queue = INTAKE_QUEUE,
        message_id = %message_id,
        delivery_tag = delivery_tag,
        body_length = delivery.data.len(),
        "rabbitmq_item_received"
    );

    let settlement = match parse_item(&delivery.data) {
        Ok(item) => match intake.admit(item).await {
            Ok(Admission::Enqueued { queue_length }) => {
                info!(
                    message_id = %message_id,
                    queue_length = queue_length,
                    "rabbitmq_item_enqueued"
                );
                Settlement::Ack
            }
            Ok(Admission::Duplicate) => Settlement::Ack,
            Err(e) => {
                // Dedup bookkeeping failed; let the broker redeliver it
                error!(message_id = %message_id, error = %e, "rabbitmq_item_admit_failed");
                Settlement::Nack { requeue: true }
            }
        },
        Err(e) => {
            error!(
                message_id = %message_id,
                error = %e,
                body_preview = %String::from_utf8_lossy(
                    &delivery.data[..delivery.data.len().min(500)]
                ),
                "rabbitmq_item_parse_failed"
            );
            Settlement::Nack { requeue: false }
        }
    };

    let result = match settlement {
        Settlement::Ack => {
            channel
                .basic_ack(delivery_tag, BasicAckOptions::default())
                .await
        }
        Settlement::Nack { requeue } => {
            channel
                .basic_nack(
                    delivery_tag,
                    BasicNackOptions {
                        requeue,
                        ..Default::default()
                    },
                )
                .await
        }
    };

    if let Err(e) = result {
        error!(
            delivery_tag = delivery_tag,
            settlement = ?settlement,
            error = %e,
            "rabbitmq_settle_failed"
        );
    }
}

fn parse_item(body: &[u8]) -> serde_json::Result<QueueItem> {
    serde_json::from_slice(body)
}
