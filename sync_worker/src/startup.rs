use std::sync::Arc;

use futures::future::join_all;
use qdrant_client::prelude::{QdrantClient, QdrantClientConfig};
use tokio::task::JoinHandle;
use tracing::info;

use common::core::mapping_sqlite_repository::{
    get_mapping_pool, MappingSqliteRepository, MappingSqliteRepositoryError,
};
use common::core::provider_http_client::ProviderHttpClient;
use common::core::record_point_qdrant_repository::RecordPointQdrantRepository;
use common::ports::{
    EmbeddingsService, EmbeddingsServiceError, SourceProvider, SourceProviderError, VectorIndex,
};

use crate::configuration::{QdrantSettings, RabbitMQSettings, Settings};
use crate::domain::services::ollama_embeddings_service::OllamaEmbeddingsService;
use crate::domain::services::sync_engine::SyncEngine;
use crate::handlers::handler_change_event::{self, RegisterHandlerChangeEventError};

/// Holds the handlers to the spawned queue consumers
pub struct Application {
    handlers: Vec<JoinHandle<Result<(), ApplicationError>>>,
}

#[derive(thiserror::Error, Debug)]
pub enum ApplicationError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error(transparent)]
    RabbitMQError(#[from] lapin::Error),
    #[error(transparent)]
    RegisterHandlerChangeEventError(#[from] RegisterHandlerChangeEventError),
    #[error(transparent)]
    MappingSqliteRepositoryError(#[from] MappingSqliteRepositoryError),
    #[error(transparent)]
    DBError(#[from] sqlx::Error),
    #[error(transparent)]
    SourceProviderError(#[from] SourceProviderError),
    #[error(transparent)]
    EmbeddingsServiceError(#[from] EmbeddingsServiceError),
    #[error("Error from Qdrant: {0}")]
    QdrantError(String),
}

impl Application {
    #[tracing::instrument(name = "Building sync worker application", skip(settings))]
    pub async fn build(settings: Settings) -> Result<Self, ApplicationError> {
        let consuming_connection = get_rabbitmq_connection(&settings.rabbitmq).await?;
        let sync_engine = Arc::new(build_sync_engine(&settings).await?);

        let handler = tokio::spawn(async move {
            handler_change_event::register_handler(
                consuming_connection,
                settings.rabbitmq.queue_name,
                sync_engine,
            )
            .await
            .map_err(ApplicationError::from)
        });

        Ok(Self {
            handlers: vec![handler],
        })
    }

    /// Runs until every handler completed, which should not happen outside
    /// a shutdown
    pub async fn run_until_stopped(self) -> Result<(), ApplicationError> {
        let handler_results = join_all(self.handlers).await;
        info!(
            "Application stopped with the following results: {:?}",
            handler_results
        );

        info!("👋 Bye!");
        Ok(())
    }
}

/// Wires the sync engine to its live collaborators.
///
/// Shared with the `sync_once` binary, which drives the engine directly
/// instead of consuming the queue.
pub async fn build_sync_engine(settings: &Settings) -> Result<SyncEngine, ApplicationError> {
    let mapping_pool = get_mapping_pool(&settings.mapping.db_path).await?;
    let mapping_repository = Arc::new(MappingSqliteRepository::new(mapping_pool));
    mapping_repository.init().await?;

    let source_provider: Arc<dyn SourceProvider> = Arc::new(ProviderHttpClient::try_new(
        &settings.provider.base_url,
        settings.provider.api_token.clone(),
        settings.provider.timeout(),
    )?);

    let embeddings_service: Arc<dyn EmbeddingsService> = Arc::new(
        OllamaEmbeddingsService::try_new(
            &settings.embeddings.base_url,
            settings.embeddings.model.clone(),
            settings.embeddings.timeout(),
        )?,
    );

    let qdrant_client = get_qdrant_client(&settings.qdrant)?;
    let vector_index: Arc<dyn VectorIndex> =
        Arc::new(RecordPointQdrantRepository::new(qdrant_client));

    Ok(SyncEngine::new(
        source_provider,
        embeddings_service,
        vector_index,
        mapping_repository,
        settings.qdrant.collection_vector_size,
        settings.qdrant.collection_distance.clone(),
    ))
}

#[tracing::instrument(name = "Create RabbitMQ connection")]
pub async fn get_rabbitmq_connection(
    config: &RabbitMQSettings,
) -> Result<lapin::Connection, lapin::Error> {
    lapin::Connection::connect(&config.get_uri(), config.get_connection_properties()).await
}

/// Set up a client to Qdrant
pub fn get_qdrant_client(config: &QdrantSettings) -> Result<QdrantClient, ApplicationError> {
    let qdrant_config = QdrantClientConfig::from_url(&config.get_grpc_base_url());
    QdrantClient::new(Some(qdrant_config)).map_err(|e| ApplicationError::QdrantError(e.to_string()))
}
