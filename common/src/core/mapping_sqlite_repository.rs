use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::helper::error_chain_fmt;

/// Repository for the source→collection mapping entries, persisted in a
/// SQLite database shared by the webhook service and the sync worker.
///
/// SQLite serializes writes at the database level; combined with the WAL
/// journal and a busy timeout this gives the cross-process last-writer-wins
/// semantics the mapping store needs, with no extra locking.
pub struct MappingSqliteRepository {
    pool: SqlitePool,
}

impl MappingSqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the mapping table if it does not exist yet. Idempotent.
    #[tracing::instrument(name = "Initializing the mapping store", skip(self))]
    pub async fn init(&self) -> Result<(), MappingSqliteRepositoryError> {
        sqlx::query(
            r#"
    CREATE TABLE IF NOT EXISTS source_mappings (
        source_id TEXT PRIMARY KEY,
        collection_name TEXT
    )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert-or-replace: the second save for a source id replaces the first
    #[tracing::instrument(name = "Saving mapping entry", skip(self))]
    pub async fn save(
        &self,
        source_id: Uuid,
        collection_name: &str,
    ) -> Result<(), MappingSqliteRepositoryError> {
        sqlx::query(
            r#"
    INSERT OR REPLACE INTO source_mappings (source_id, collection_name)
    VALUES (?1, ?2)
            "#,
        )
        .bind(source_id.to_string())
        .bind(collection_name)
        .execute(&self.pool)
        .await?;

        info!("Saved mapping {} -> {}", source_id, collection_name);
        Ok(())
    }

    #[tracing::instrument(name = "Looking up mapping entry", skip(self))]
    pub async fn lookup(
        &self,
        source_id: Uuid,
    ) -> Result<Option<String>, MappingSqliteRepositoryError> {
        let row = sqlx::query(
            r#"
    SELECT collection_name FROM source_mappings WHERE source_id = ?1
            "#,
        )
        .bind(source_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.get("collection_name")))
    }

    /// No-op when the entry is already absent
    #[tracing::instrument(name = "Deleting mapping entry", skip(self))]
    pub async fn delete(&self, source_id: Uuid) -> Result<(), MappingSqliteRepositoryError> {
        sqlx::query(
            r#"
    DELETE FROM source_mappings WHERE source_id = ?1
            "#,
        )
        .bind(source_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Every mapping entry, for debugging and the `show_mappings` binary
    pub async fn list(&self) -> Result<Vec<(String, String)>, MappingSqliteRepositoryError> {
        let rows = sqlx::query(
            r#"
    SELECT source_id, collection_name FROM source_mappings ORDER BY source_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("source_id"), row.get("collection_name")))
            .collect())
    }
}

/// Opens (and creates if missing) the file-backed mapping database
pub async fn get_mapping_pool(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new().connect_with(options).await
}

#[derive(thiserror::Error)]
pub enum MappingSqliteRepositoryError {
    #[error(transparent)]
    DBError(#[from] sqlx::Error),
}

impl std::fmt::Debug for MappingSqliteRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
