use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use common::core::mapping_sqlite_repository::{
    MappingSqliteRepository, MappingSqliteRepositoryError,
};
use common::domain::entities::record_point::{RecordPayload, RecordPoint};
use common::domain::entities::source_table::SourceRow;
use common::helper::error_chain_fmt;
use common::ports::{
    EmbeddingsService, SourceProvider, SourceProviderError, VectorIndex, VectorIndexError,
};

/// Reconciles one source table with its index collection.
///
/// A sync job always converges the collection to the current source content,
/// whatever the triggering event was: the diff below decides what actually
/// gets embedded, deleted or left alone.
pub struct SyncEngine {
    source_provider: Arc<dyn SourceProvider>,
    embeddings_service: Arc<dyn EmbeddingsService>,
    vector_index: Arc<dyn VectorIndex>,
    mapping_repository: Arc<MappingSqliteRepository>,
    collection_vector_size: u64,
    collection_distance: String,
}

/// Outcome of one sync job, for logs and the `sync_once` binary
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub collection_name: String,
    pub upserted: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub embed_failures: usize,
}

#[derive(thiserror::Error)]
pub enum SyncEngineError {
    #[error(transparent)]
    SourceProviderError(#[from] SourceProviderError),

    #[error(transparent)]
    VectorIndexError(#[from] VectorIndexError),

    #[error(transparent)]
    MappingSqliteRepositoryError(#[from] MappingSqliteRepositoryError),
}

impl std::fmt::Debug for SyncEngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl SyncEngine {
    pub fn new(
        source_provider: Arc<dyn SourceProvider>,
        embeddings_service: Arc<dyn EmbeddingsService>,
        vector_index: Arc<dyn VectorIndex>,
        mapping_repository: Arc<MappingSqliteRepository>,
        collection_vector_size: u64,
        collection_distance: String,
    ) -> Self {
        Self {
            source_provider,
            embeddings_service,
            vector_index,
            mapping_repository,
            collection_vector_size,
            collection_distance,
        }
    }

    /// Converges the collection associated to `source_id` to the source's
    /// current rows.
    ///
    /// An embedding failure only skips that row (it stays stale until a
    /// later sync); provider, index and mapping failures abort the job.
    #[tracing::instrument(name = "Sync job", skip(self))]
    pub async fn sync(&self, source_id: Uuid) -> Result<SyncReport, SyncEngineError> {
        let source = self.source_provider.fetch_source(source_id).await?;
        let rows = self.source_provider.fetch_rows(source_id).await?;
        let collection_name = source.collection_name();

        info!(
            "Syncing {} rows of source {} into collection {}",
            rows.len(),
            source_id,
            collection_name
        );

        self.vector_index
            .ensure_collection(
                &collection_name,
                self.collection_vector_size,
                &self.collection_distance,
            )
            .await?;

        let existing: HashMap<Uuid, RecordPayload> = self
            .vector_index
            .list_points(&collection_name)
            .await?
            .into_iter()
            .collect();

        let plan = compute_sync_plan(&rows, &existing);

        let mut points = Vec::with_capacity(plan.to_embed.len());
        let mut embed_failures = 0;
        for row in &plan.to_embed {
            match self.embeddings_service.embed(&row.embeddable_text()).await {
                Ok(vector) => points.push(RecordPoint {
                    id: row.id,
                    vector,
                    payload: row.payload(),
                }),
                Err(error) => {
                    warn!(
                        ?error,
                        "Failed to embed row {}, continuing with the other rows", row.id
                    );
                    embed_failures += 1;
                }
            }
        }

        // Deletes go first: if an upsert batch fails halfway, a stale point
        // must not survive next to its fresher replacement
        self.vector_index
            .delete_points(&collection_name, &plan.stale_ids)
            .await?;

        let upserted = points.len();
        self.vector_index
            .upsert_points(&collection_name, points)
            .await?;

        // The mapping entry is (re)written on every successful sync, so a
        // source first seen through a row event still ends up mapped
        self.mapping_repository
            .save(source_id, &collection_name)
            .await?;

        let report = SyncReport {
            collection_name,
            upserted,
            deleted: plan.stale_ids.len(),
            skipped: plan.skipped,
            embed_failures,
        };
        info!(?report, "Sync job done for source {}", source_id);

        Ok(report)
    }

    /// Syncs every source the provider exposes, continuing past individual
    /// failures. Used by the `sync_once` binary.
    #[tracing::instrument(name = "Sync all sources", skip(self))]
    pub async fn sync_all(&self) -> Result<Vec<SyncReport>, SyncEngineError> {
        let sources = self.source_provider.list_sources().await?;
        info!("Syncing {} sources", sources.len());

        let mut reports = Vec::with_capacity(sources.len());
        for source in sources {
            match self.sync(source.id).await {
                Ok(report) => reports.push(report),
                Err(error) => {
                    error!(
                        ?error,
                        "Failed to sync source {}, continuing with the other sources", source.id
                    );
                }
            }
        }

        Ok(reports)
    }
}

/// The diff between the source rows and the collection content
#[derive(Debug, Default)]
pub struct SyncPlan {
    /// Rows that are new or whose payload changed
    pub to_embed: Vec<SourceRow>,
    /// Point ids with no matching source row anymore
    pub stale_ids: Vec<Uuid>,
    /// Rows whose stored payload is identical, left untouched
    pub skipped: usize,
}

/// Pure diff: compares the rows' payloads against the payloads already
/// stored in the collection
pub fn compute_sync_plan(rows: &[SourceRow], existing: &HashMap<Uuid, RecordPayload>) -> SyncPlan {
    let mut plan = SyncPlan::default();

    for row in rows {
        match existing.get(&row.id) {
            Some(stored_payload) if *stored_payload == row.payload() => plan.skipped += 1,
            _ => plan.to_embed.push(row.clone()),
        }
    }

    let mut stale_ids: Vec<Uuid> = existing
        .keys()
        .filter(|point_id| !rows.iter().any(|row| row.id == **point_id))
        .copied()
        .collect();
    // Deterministic order, mostly for logs and tests
    stale_ids.sort();
    plan.stale_ids = stale_ids;

    plan
}
