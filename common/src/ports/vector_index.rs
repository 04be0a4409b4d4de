use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::entities::record_point::{RecordPayload, RecordPoint};
use crate::helper::error_chain_fmt;

/// Port to the vector index service.
///
/// One collection per source table; points are keyed by source row ids.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Creates the collection if it does not exist yet. Idempotent.
    async fn ensure_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
        distance: &str,
    ) -> Result<(), VectorIndexError>;

    /// Drops the collection. Returns `false` when it was already absent,
    /// so repeated deletions stay idempotent.
    async fn drop_collection(&self, collection_name: &str) -> Result<bool, VectorIndexError>;

    /// Full listing of the collection's point ids and payloads,
    /// paginated internally until exhausted
    async fn list_points(
        &self,
        collection_name: &str,
    ) -> Result<Vec<(Uuid, RecordPayload)>, VectorIndexError>;

    async fn delete_points(
        &self,
        collection_name: &str,
        point_ids: &[Uuid],
    ) -> Result<(), VectorIndexError>;

    async fn upsert_points(
        &self,
        collection_name: &str,
        points: Vec<RecordPoint>,
    ) -> Result<(), VectorIndexError>;
}

#[derive(thiserror::Error)]
pub enum VectorIndexError {
    #[error("Error from Qdrant: {0}")]
    QdrantError(String),

    #[error("Error from the index configuration: {0}")]
    ConfigurationError(String),
}

impl std::fmt::Debug for VectorIndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
