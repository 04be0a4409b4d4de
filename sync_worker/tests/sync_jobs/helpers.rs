use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use common::core::mapping_sqlite_repository::MappingSqliteRepository;
use common::domain::entities::cell_value::CellValue;
use common::domain::entities::record_point::{Embeddings, RecordPayload, RecordPoint};
use common::domain::entities::source_table::{SourceRow, SourceTable};
use common::ports::{
    EmbeddingsService, EmbeddingsServiceError, SourceProvider, SourceProviderError, VectorIndex,
    VectorIndexError,
};
use sync_worker::domain::services::sync_engine::SyncEngine;

pub struct SyncHarness {
    pub sync_engine: SyncEngine,
    pub source_provider: Arc<FakeSourceProvider>,
    pub embeddings_service: Arc<CountingEmbeddingsService>,
    pub vector_index: Arc<InMemoryVectorIndex>,
    mapping_pool: SqlitePool,
}

impl SyncHarness {
    pub fn mapping_repository(&self) -> MappingSqliteRepository {
        MappingSqliteRepository::new(self.mapping_pool.clone())
    }
}

/// Builds a sync engine wired to in-memory fakes of the provider, the
/// embedding service and the vector index, plus an in-memory SQLite
/// mapping store
pub async fn spawn_engine() -> SyncHarness {
    let mapping_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");
    let mapping_repository = Arc::new(MappingSqliteRepository::new(mapping_pool.clone()));
    mapping_repository.init().await.unwrap();

    let source_provider = Arc::new(FakeSourceProvider::default());
    let embeddings_service = Arc::new(CountingEmbeddingsService::default());
    let vector_index = Arc::new(InMemoryVectorIndex::default());

    let sync_engine = SyncEngine::new(
        source_provider.clone(),
        embeddings_service.clone(),
        vector_index.clone(),
        mapping_repository,
        3,
        "Cosine".to_string(),
    );

    SyncHarness {
        sync_engine,
        source_provider,
        embeddings_service,
        vector_index,
        mapping_pool,
    }
}

pub fn budget_row(id: Uuid, name: &str, amount: f64) -> SourceRow {
    SourceRow {
        id,
        cells: BTreeMap::from([
            ("name".to_string(), CellValue::Text(name.to_string())),
            ("amount".to_string(), CellValue::Number(amount)),
        ]),
    }
}

#[derive(Default)]
pub struct FakeSourceProvider {
    sources: Mutex<HashMap<Uuid, SourceTable>>,
    rows: Mutex<HashMap<Uuid, Vec<SourceRow>>>,
    failing_sources: Mutex<HashSet<Uuid>>,
}

impl FakeSourceProvider {
    pub fn add_source(&self, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.sources.lock().unwrap().insert(
            id,
            SourceTable {
                id,
                title: title.to_string(),
            },
        );
        id
    }

    pub fn rename_source(&self, source_id: Uuid, title: &str) {
        self.sources
            .lock()
            .unwrap()
            .get_mut(&source_id)
            .expect("unknown source")
            .title = title.to_string();
    }

    pub fn set_rows(&self, source_id: Uuid, rows: Vec<SourceRow>) {
        self.rows.lock().unwrap().insert(source_id, rows);
    }

    /// Makes every following call about this source fail
    pub fn fail_source(&self, source_id: Uuid) {
        self.failing_sources.lock().unwrap().insert(source_id);
    }

    fn check_available(&self, source_id: Uuid) -> Result<(), SourceProviderError> {
        if self.failing_sources.lock().unwrap().contains(&source_id) {
            return Err(SourceProviderError::UnexpectedResponse(format!(
                "provider unavailable for source {}",
                source_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SourceProvider for FakeSourceProvider {
    async fn list_sources(&self) -> Result<Vec<SourceTable>, SourceProviderError> {
        Ok(self.sources.lock().unwrap().values().cloned().collect())
    }

    async fn fetch_source(&self, source_id: Uuid) -> Result<SourceTable, SourceProviderError> {
        self.check_available(source_id)?;
        self.sources
            .lock()
            .unwrap()
            .get(&source_id)
            .cloned()
            .ok_or_else(|| {
                SourceProviderError::UnexpectedResponse(format!("unknown source {}", source_id))
            })
    }

    async fn fetch_rows(&self, source_id: Uuid) -> Result<Vec<SourceRow>, SourceProviderError> {
        self.check_available(source_id)?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&source_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Deterministic embedder that records every text it was asked to embed
#[derive(Default)]
pub struct CountingEmbeddingsService {
    embedded_texts: Mutex<Vec<String>>,
    rejected_text: Mutex<Option<String>>,
}

impl CountingEmbeddingsService {
    pub fn embedded_texts(&self) -> Vec<String> {
        self.embedded_texts.lock().unwrap().clone()
    }

    pub fn nb_embed_calls(&self) -> usize {
        self.embedded_texts.lock().unwrap().len()
    }

    /// Makes the service fail on this exact text, to exercise partial
    /// embedding failures
    pub fn reject_text(&self, text: &str) {
        *self.rejected_text.lock().unwrap() = Some(text.to_string());
    }

    pub fn accept_all(&self) {
        *self.rejected_text.lock().unwrap() = None;
    }
}

#[async_trait]
impl EmbeddingsService for CountingEmbeddingsService {
    async fn embed(&self, text: &str) -> Result<Embeddings, EmbeddingsServiceError> {
        if self.rejected_text.lock().unwrap().as_deref() == Some(text) {
            return Err(EmbeddingsServiceError::UnexpectedResponse(
                "the model rejected the input".to_string(),
            ));
        }

        self.embedded_texts.lock().unwrap().push(text.to_string());
        Ok(vec![text.len() as f32, 0.5, 1.0])
    }
}

type FakeCollection = HashMap<Uuid, (Embeddings, RecordPayload)>;

#[derive(Default)]
pub struct InMemoryVectorIndex {
    collections: Mutex<HashMap<String, FakeCollection>>,
}

impl InMemoryVectorIndex {
    pub fn has_collection(&self, collection_name: &str) -> bool {
        self.collections
            .lock()
            .unwrap()
            .contains_key(collection_name)
    }

    pub fn points(&self, collection_name: &str) -> FakeCollection {
        self.collections
            .lock()
            .unwrap()
            .get(collection_name)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn ensure_collection(
        &self,
        collection_name: &str,
        _vector_size: u64,
        _distance: &str,
    ) -> Result<(), VectorIndexError> {
        self.collections
            .lock()
            .unwrap()
            .entry(collection_name.to_string())
            .or_default();
        Ok(())
    }

    async fn drop_collection(&self, collection_name: &str) -> Result<bool, VectorIndexError> {
        Ok(self
            .collections
            .lock()
            .unwrap()
            .remove(collection_name)
            .is_some())
    }

    async fn list_points(
        &self,
        collection_name: &str,
    ) -> Result<Vec<(Uuid, RecordPayload)>, VectorIndexError> {
        Ok(self
            .collections
            .lock()
            .unwrap()
            .get(collection_name)
            .map(|points| {
                points
                    .iter()
                    .map(|(id, (_, payload))| (*id, payload.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_points(
        &self,
        collection_name: &str,
        point_ids: &[Uuid],
    ) -> Result<(), VectorIndexError> {
        if let Some(points) = self.collections.lock().unwrap().get_mut(collection_name) {
            for id in point_ids {
                points.remove(id);
            }
        }
        Ok(())
    }

    async fn upsert_points(
        &self,
        collection_name: &str,
        new_points: Vec<RecordPoint>,
    ) -> Result<(), VectorIndexError> {
        let mut collections = self.collections.lock().unwrap();
        let points = collections
            .entry(collection_name.to_string())
            .or_default();
        for point in new_points {
            points.insert(point.id, (point.vector, point.payload));
        }
        Ok(())
    }
}
