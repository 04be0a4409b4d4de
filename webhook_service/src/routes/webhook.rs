use actix_web::{web, HttpResponse};
use serde_json::{json, Value as JsonValue};
use tracing::{error, info};
use uuid::Uuid;

use common::core::mapping_sqlite_repository::{
    MappingSqliteRepository, MappingSqliteRepositoryError,
};
use common::dtos::change_event::ChangeEvent;
use common::helper::error_chain_fmt;
use common::ports::{
    EventQueue, EventQueueError, SourceProvider, SourceProviderError, VectorIndex,
    VectorIndexError,
};

use crate::domain::entities::webhook_event::{classify, WebhookAction};

/// Receives the provider's change notifications.
///
/// Every event is acknowledged with a 200: internal failures are logged and
/// reported in the response body so the provider never retry-storms us.
/// Processing a duplicated delivery is harmless: mapping writes are
/// insert-or-replace, collection deletion is idempotent, and a duplicate
/// enqueue converges to the same index state.
#[tracing::instrument(
    name = "Handling webhook notification",
    skip(body, mapping_repository, event_queue, source_provider, vector_index)
)]
pub async fn webhook(
    body: web::Json<JsonValue>,
    mapping_repository: web::Data<MappingSqliteRepository>,
    event_queue: web::Data<dyn EventQueue>,
    source_provider: web::Data<dyn SourceProvider>,
    vector_index: web::Data<dyn VectorIndex>,
) -> HttpResponse {
    let body = body.into_inner();

    match classify(&body) {
        WebhookAction::Handshake(challenge) => {
            info!("Answering provider verification handshake");
            HttpResponse::Ok().json(json!({ "challenge": challenge }))
        }
        WebhookAction::SourceCreated(source_id) => {
            match handle_source_created(source_id, &source_provider, &mapping_repository).await {
                Ok(collection_name) => {
                    info!(
                        "Mapped new source {} to collection {}",
                        source_id, collection_name
                    );
                    HttpResponse::Ok().json(json!({ "status": "created" }))
                }
                Err(error) => acknowledge_error(error),
            }
        }
        WebhookAction::SourceDeleted(source_id) => {
            match handle_source_deleted(source_id, &mapping_repository, &vector_index).await {
                Ok(()) => HttpResponse::Ok().json(json!({ "status": "deleted" })),
                Err(error) => acknowledge_error(error),
            }
        }
        WebhookAction::RowChange(source_id) => {
            match handle_row_change(source_id, body, &event_queue).await {
                Ok(()) => HttpResponse::Ok().json(json!({ "status": "ok" })),
                Err(error) => acknowledge_error(error),
            }
        }
        WebhookAction::Unattributable => {
            info!("Event without a resolvable source id, ignoring");
            HttpResponse::Ok().json(json!({ "status": "ignored" }))
        }
    }
}

/// Resolves the new source's title and saves its mapping entry.
///
/// No synchronization and no enqueue here: the collection is filled on the
/// first row event (or a manual trigger).
async fn handle_source_created(
    source_id: Uuid,
    source_provider: &web::Data<dyn SourceProvider>,
    mapping_repository: &web::Data<MappingSqliteRepository>,
) -> Result<String, WebhookError> {
    let source = source_provider.fetch_source(source_id).await?;
    let collection_name = source.collection_name();

    mapping_repository.save(source_id, &collection_name).await?;

    Ok(collection_name)
}

/// Drops the deleted source's collection and mapping entry.
///
/// Both steps tolerate being already done: a re-delivered deletion event
/// finds no mapping and does nothing.
async fn handle_source_deleted(
    source_id: Uuid,
    mapping_repository: &web::Data<MappingSqliteRepository>,
    vector_index: &web::Data<dyn VectorIndex>,
) -> Result<(), WebhookError> {
    match mapping_repository.lookup(source_id).await? {
        Some(collection_name) => {
            let dropped = vector_index.drop_collection(&collection_name).await?;
            if !dropped {
                info!("Collection {} was already absent", collection_name);
            }
            mapping_repository.delete(source_id).await?;
            info!("Cleaned up deleted source {}", source_id);
        }
        None => {
            info!("No mapping entry for source {}, nothing to clean up", source_id);
        }
    }

    Ok(())
}

async fn handle_row_change(
    source_id: Uuid,
    raw_event: JsonValue,
    event_queue: &web::Data<dyn EventQueue>,
) -> Result<(), WebhookError> {
    let change_event = ChangeEvent {
        database_id: Some(source_id),
        event: raw_event,
    };

    event_queue.publish(&change_event).await?;

    info!("Queued change event for source {}", source_id);
    Ok(())
}

fn acknowledge_error(error: WebhookError) -> HttpResponse {
    error!(?error, "Failed to process webhook event");
    HttpResponse::Ok().json(json!({ "status": "error", "details": error.to_string() }))
}

#[derive(thiserror::Error)]
pub enum WebhookError {
    #[error(transparent)]
    SourceProviderError(#[from] SourceProviderError),
    #[error(transparent)]
    MappingSqliteRepositoryError(#[from] MappingSqliteRepositoryError),
    #[error(transparent)]
    VectorIndexError(#[from] VectorIndexError),
    #[error(transparent)]
    EventQueueError(#[from] EventQueueError),
}

impl std::fmt::Debug for WebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
