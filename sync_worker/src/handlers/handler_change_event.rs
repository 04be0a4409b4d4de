use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicConsumeOptions, QueueDeclareOptions},
    types::FieldTable,
    Connection,
};
use tokio::time::sleep;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use common::dtos::change_event::ChangeEvent;
use common::helper::error_chain_fmt;

use crate::domain::services::sync_engine::SyncEngine;

/// Pause before resuming consumption after a delivery error
const DEQUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(thiserror::Error)]
pub enum RegisterHandlerChangeEventError {
    #[error(transparent)]
    RabbitMQError(#[from] lapin::Error),
}

impl std::fmt::Debug for RegisterHandlerChangeEventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Consumes change events from the durable queue, forever.
///
/// Every delivery is acknowledged, valid or not: a malformed message is
/// dropped after a warning (redelivering it could never succeed), and a
/// valid one is acknowledged as soon as its sync job is spawned. If the
/// worker dies between the publish and the ack, the broker redelivers and
/// the job simply re-converges.
#[tracing::instrument(name = "Register queue handler", skip(consuming_connection, sync_engine))]
pub async fn register_handler(
    consuming_connection: Connection,
    queue_name: String,
    sync_engine: Arc<SyncEngine>,
) -> Result<(), RegisterHandlerChangeEventError> {
    let channel = consuming_connection.create_channel().await?;

    // Declared durable on both sides so whichever service starts first
    // creates it with the same properties
    let queue_declare_options = QueueDeclareOptions {
        durable: true,
        ..QueueDeclareOptions::default()
    };
    channel
        .queue_declare(&queue_name, queue_declare_options, FieldTable::default())
        .await?;

    let mut consumer = channel
        .basic_consume(
            &queue_name,
            "",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!(
        "📡 Consuming from queue {}, waiting for change events ...",
        queue_name
    );

    while let Some(delivery) = consumer.next().await {
        async {
            let delivery = match delivery {
                Ok(delivery) => delivery,
                Err(error) => {
                    error!(
                        ?error,
                        "Failed to consume message from queue {}", queue_name
                    );
                    sleep(DEQUEUE_ERROR_BACKOFF).await;
                    return;
                }
            };

            let source_id = match triage_delivery(&delivery.data) {
                DeliveryDisposition::Drop => {
                    acknowledge(delivery).await;
                    return;
                }
                DeliveryDisposition::Sync(source_id) => source_id,
            };

            info!("Received change event for source {}", source_id);

            // The job runs isolated in its own task: a panic or a hang in one
            // sync cannot take down the consumer loop, and the next queued
            // event is picked up right away
            let sync_engine = sync_engine.clone();
            tokio::spawn(
                async move {
                    match sync_engine.sync(source_id).await {
                        Ok(report) => {
                            info!(?report, "Sync job succeeded for source {}", source_id)
                        }
                        Err(error) => {
                            error!(?error, "Sync job failed for source {}", source_id)
                        }
                    }
                }
                .instrument(info_span!("Isolated sync job", source_id = %source_id)),
            );

            acknowledge(delivery).await;
        }
        .instrument(
            info_span!("Handling consumed message", queue = %queue_name, handling_id = %Uuid::new_v4()),
        )
        .await
    }

    Ok(())
}

/// What the consumer loop does with one delivery
#[derive(Debug, PartialEq)]
pub enum DeliveryDisposition {
    /// Unusable message: acknowledged and dropped, the loop keeps consuming
    Drop,
    /// Valid change event: a sync job is spawned for this source
    Sync(Uuid),
}

/// Per-delivery decision, separated from the broker plumbing.
///
/// Both outcomes end in an acknowledgment and the loop moving on to the
/// next delivery: redelivering a malformed message could never succeed,
/// and a failed sync is retried by the next triggering event instead.
pub fn triage_delivery(data: &[u8]) -> DeliveryDisposition {
    let change_event = match ChangeEvent::try_parsing(data) {
        Ok(change_event) => change_event,
        Err(error) => {
            warn!(?error, "Dropping malformed change event");
            return DeliveryDisposition::Drop;
        }
    };

    match change_event.database_id {
        Some(source_id) => DeliveryDisposition::Sync(source_id),
        None => {
            warn!("Dropping change event without a source id");
            DeliveryDisposition::Drop
        }
    }
}

async fn acknowledge(delivery: Delivery) {
    if let Err(error) = delivery.ack(BasicAckOptions::default()).await {
        error!(?error, "Failed to acknowledge change event message");
    }
}
