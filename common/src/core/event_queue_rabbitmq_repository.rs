use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lapin::{
    options::{BasicPublishOptions, QueueDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection,
};
use tracing::info;
use uuid::Uuid;

use crate::dtos::change_event::ChangeEvent;
use crate::ports::event_queue::{EventQueue, EventQueueError};

/// Change-event queue implemented with RabbitMQ.
///
/// Publishes to one durable queue through the default exchange, so messages
/// survive a broker restart and are delivered FIFO to the consuming workers.
pub struct EventQueueRabbitMQRepository {
    // Keeps the connection alive alongside the channel
    _connection: Arc<Connection>,
    channel: Channel,
    queue_name: String,
}

impl EventQueueRabbitMQRepository {
    /// Creates a publishing channel and declares the durable queue.
    ///
    /// The declaration is idempotent: the consuming worker declares the same
    /// queue with the same options.
    #[tracing::instrument(name = "Initializing RabbitMQ event queue", skip(connection))]
    pub async fn try_new(
        connection: Arc<Connection>,
        queue_name: &str,
    ) -> Result<Self, EventQueueError> {
        let channel = connection.create_channel().await?;

        let queue_declare_options = QueueDeclareOptions {
            durable: true,
            ..QueueDeclareOptions::default()
        };

        channel
            .queue_declare(queue_name, queue_declare_options, FieldTable::default())
            .await?;

        info!(
            "Successfully declared queue {} with properties: {:?}",
            queue_name, queue_declare_options
        );

        Ok(Self {
            _connection: connection,
            channel,
            queue_name: queue_name.to_string(),
        })
    }
}

#[async_trait]
impl EventQueue for EventQueueRabbitMQRepository {
    #[tracing::instrument(name = "Publishing change event", skip(self))]
    async fn publish(&self, event: &ChangeEvent) -> Result<(), EventQueueError> {
        let data = event.try_serializing()?;

        let current_time_ms = Utc::now().timestamp_millis() as u64;

        // Publishing through the default exchange: the routing key is the queue name.
        // Not using publisher confirmation.
        self.channel
            .basic_publish(
                "",
                &self.queue_name,
                BasicPublishOptions::default(),
                &data,
                BasicProperties::default()
                    .with_timestamp(current_time_ms)
                    .with_message_id(Uuid::new_v4().to_string().into()),
            )
            .await?;

        Ok(())
    }
}
