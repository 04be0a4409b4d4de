pub mod event_queue_rabbitmq_repository;
pub mod mapping_sqlite_repository;
pub mod provider_http_client;
pub mod record_point_qdrant_repository;
