use async_trait::async_trait;

use crate::dtos::change_event::{ChangeEvent, ChangeEventError};
use crate::helper::error_chain_fmt;

/// Publishing side of the durable change-event queue.
///
/// Consuming stays concrete in the worker's queue handler: dequeue is
/// inseparable from the broker's delivery and acknowledgment model.
#[async_trait]
pub trait EventQueue: Send + Sync {
    async fn publish(&self, event: &ChangeEvent) -> Result<(), EventQueueError>;
}

#[derive(thiserror::Error)]
pub enum EventQueueError {
    #[error(transparent)]
    RabbitMQError(#[from] lapin::Error),

    #[error(transparent)]
    SerializationError(#[from] ChangeEventError),
}

impl std::fmt::Debug for EventQueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
