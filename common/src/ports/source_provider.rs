use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::entities::source_table::{SourceRow, SourceTable};
use crate::helper::error_chain_fmt;

/// Port to the upstream structured-data provider.
///
/// The provider owns the source tables; this system only observes them.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Every source the provider exposes to our credential
    async fn list_sources(&self) -> Result<Vec<SourceTable>, SourceProviderError>;

    /// Current metadata (title included) of one source
    async fn fetch_source(&self, source_id: Uuid) -> Result<SourceTable, SourceProviderError>;

    /// Current rows of one source
    async fn fetch_rows(&self, source_id: Uuid) -> Result<Vec<SourceRow>, SourceProviderError>;
}

#[derive(thiserror::Error)]
pub enum SourceProviderError {
    #[error("Request to the source provider failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Unexpected response from the source provider: {0}")]
    UnexpectedResponse(String),
}

impl std::fmt::Debug for SourceProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
