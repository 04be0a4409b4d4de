use async_trait::async_trait;

use crate::domain::entities::record_point::Embeddings;
use crate::helper::error_chain_fmt;

/// Port to the embedding service: text in, fixed-dimension vector out
#[async_trait]
pub trait EmbeddingsService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embeddings, EmbeddingsServiceError>;
}

#[derive(thiserror::Error)]
pub enum EmbeddingsServiceError {
    #[error("Request to the embedding service failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Unexpected response from the embedding service: {0}")]
    UnexpectedResponse(String),
}

impl std::fmt::Debug for EmbeddingsServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
