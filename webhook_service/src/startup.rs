use std::net::TcpListener;
use std::sync::Arc;

use actix_web::{
    dev::Server,
    web::{self, Data},
    App, HttpServer,
};
use qdrant_client::prelude::{QdrantClient, QdrantClientConfig};
use tracing::info;
use tracing_actix_web::TracingLogger;

use common::core::event_queue_rabbitmq_repository::EventQueueRabbitMQRepository;
use common::core::mapping_sqlite_repository::{
    get_mapping_pool, MappingSqliteRepository, MappingSqliteRepositoryError,
};
use common::core::provider_http_client::ProviderHttpClient;
use common::core::record_point_qdrant_repository::RecordPointQdrantRepository;
use common::ports::{
    EventQueue, EventQueueError, SourceProvider, SourceProviderError, VectorIndex,
};

use crate::configuration::{QdrantSettings, RabbitMQSettings, Settings};
use crate::routes::{health_check::health_check, webhook::webhook};

/// Holds the newly built server, and some useful properties
pub struct Application {
    server: Server,
    port: u16,
}

#[derive(thiserror::Error, Debug)]
pub enum ApplicationBuildError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error(transparent)]
    RabbitMQError(#[from] lapin::Error),
    #[error(transparent)]
    EventQueueError(#[from] EventQueueError),
    #[error(transparent)]
    MappingSqliteRepositoryError(#[from] MappingSqliteRepositoryError),
    #[error(transparent)]
    DBError(#[from] sqlx::Error),
    #[error(transparent)]
    SourceProviderError(#[from] SourceProviderError),
    #[error("Error from Qdrant: {0}")]
    QdrantError(String),
}

impl Application {
    /// # Parameters
    /// - nb_workers: number of actix-web workers
    ///   if `None`, the number of available physical CPUs is used as the worker count.
    #[tracing::instrument(name = "Building webhook application")]
    pub async fn build(
        settings: Settings,
        nb_workers: Option<usize>,
    ) -> Result<Self, ApplicationBuildError> {
        let address = format!(
            "{}:{}",
            settings.application.host, settings.application.port
        );
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr().unwrap().port();

        let mapping_pool = get_mapping_pool(&settings.mapping.db_path).await?;
        let mapping_repository = MappingSqliteRepository::new(mapping_pool);
        mapping_repository.init().await?;

        let rabbitmq_publishing_connection =
            Arc::new(get_rabbitmq_connection(&settings.rabbitmq).await?);
        let event_queue: Arc<dyn EventQueue> = Arc::new(
            EventQueueRabbitMQRepository::try_new(
                rabbitmq_publishing_connection,
                &settings.rabbitmq.queue_name,
            )
            .await?,
        );

        let source_provider: Arc<dyn SourceProvider> = Arc::new(ProviderHttpClient::try_new(
            &settings.provider.base_url,
            settings.provider.api_token.clone(),
            settings.provider.timeout(),
        )?);

        let qdrant_client = get_qdrant_client(&settings.qdrant)?;
        let vector_index: Arc<dyn VectorIndex> =
            Arc::new(RecordPointQdrantRepository::new(qdrant_client));

        let server = run(
            listener,
            nb_workers,
            mapping_repository,
            event_queue,
            source_provider,
            vector_index,
        )?;

        Ok(Self { server, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// This function only returns when the application is stopped
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        info!("Running server ...");
        self.server.await
    }
}

/// listener: the consumer binds their own port
///
/// TracingLogger middleware: generates a unique identifier for each
/// incoming request: `request_id`.
pub fn run(
    listener: TcpListener,
    nb_workers: Option<usize>,
    mapping_repository: MappingSqliteRepository,
    event_queue: Arc<dyn EventQueue>,
    source_provider: Arc<dyn SourceProvider>,
    vector_index: Arc<dyn VectorIndex>,
) -> Result<Server, std::io::Error> {
    // Wraps the shared repositories in `actix_web::Data` (`Arc`) to be able
    // to register them and access them from handlers
    let mapping_repository = Data::new(mapping_repository);
    let event_queue = Data::from(event_queue);
    let source_provider = Data::from(source_provider);
    let vector_index = Data::from(vector_index);

    // `move` to capture variables from the surrounding environment
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .route("/webhook", web::post().to(webhook))
            .app_data(mapping_repository.clone())
            .app_data(event_queue.clone())
            .app_data(source_provider.clone())
            .app_data(vector_index.clone())
    })
    .listen(listener)?;

    // If no workers were set, use the actix-web default (number of physical CPUs)
    if let Some(nb_workers) = nb_workers {
        return Ok(server.workers(nb_workers).run());
    }

    Ok(server.run())
}

#[tracing::instrument(name = "Create RabbitMQ connection")]
pub async fn get_rabbitmq_connection(
    config: &RabbitMQSettings,
) -> Result<lapin::Connection, lapin::Error> {
    lapin::Connection::connect(&config.get_uri(), config.get_connection_properties()).await
}

/// Set up a client to Qdrant
pub fn get_qdrant_client(config: &QdrantSettings) -> Result<QdrantClient, ApplicationBuildError> {
    let qdrant_config = QdrantClientConfig::from_url(&config.get_grpc_base_url());
    QdrantClient::new(Some(qdrant_config))
        .map_err(|e| ApplicationBuildError::QdrantError(e.to_string()))
}
