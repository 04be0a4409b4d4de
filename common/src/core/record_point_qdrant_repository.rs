use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::{
    prelude::QdrantClient,
    qdrant::{
        self, point_id::PointIdOptions, points_selector::PointsSelectorOneOf, value::Kind,
        vectors_config::Config, with_payload_selector::SelectorOptions, CreateCollection, Distance,
        PointId, PointStruct, PointsIdsList, PointsSelector, ScrollPoints, VectorParams,
        VectorsConfig, WithPayloadSelector,
    },
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::entities::cell_value::PayloadValue;
use crate::domain::entities::record_point::{RecordPayload, RecordPoint};
use crate::ports::vector_index::{VectorIndex, VectorIndexError};

const SCROLL_PAGE_SIZE: u32 = 256;

/// Repository for record points persisted in Qdrant.
///
/// Unlike a single-collection repository, the collection is chosen per call:
/// each source table maps to its own collection.
pub struct RecordPointQdrantRepository {
    client: QdrantClient,
}

impl RecordPointQdrantRepository {
    pub fn new(client: QdrantClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VectorIndex for RecordPointQdrantRepository {
    #[tracing::instrument(name = "Ensuring Qdrant collection exists", skip(self))]
    async fn ensure_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
        distance: &str,
    ) -> Result<(), VectorIndexError> {
        let collection_distance = Distance::from_str_name(distance).ok_or(
            VectorIndexError::ConfigurationError(format!(
                "Invalid Qdrant distance from configuration: {}",
                distance
            )),
        )?;

        let already_exists = self
            .client
            .has_collection(collection_name)
            .await
            .map_err(|e| VectorIndexError::QdrantError(e.to_string()))?;

        if already_exists {
            return Ok(());
        }

        match self
            .client
            .create_collection(&CreateCollection {
                collection_name: collection_name.to_string(),
                vectors_config: Some(VectorsConfig {
                    config: Some(Config::Params(VectorParams {
                        size: vector_size,
                        distance: collection_distance as i32,
                        ..Default::default()
                    })),
                }),
                ..Default::default()
            })
            .await
        {
            Ok(_) => {
                info!("Created collection {}", collection_name);
                Ok(())
            }
            Err(error) => {
                // Qdrant client only returns anyhow errors for now.
                // Another sync job may have created the collection between
                // our existence check and this call.
                if error.to_string().contains("already exists") {
                    return Ok(());
                }
                Err(VectorIndexError::QdrantError(error.to_string()))
            }
        }
    }

    #[tracing::instrument(name = "Dropping Qdrant collection", skip(self))]
    async fn drop_collection(&self, collection_name: &str) -> Result<bool, VectorIndexError> {
        let exists = self
            .client
            .has_collection(collection_name)
            .await
            .map_err(|e| VectorIndexError::QdrantError(e.to_string()))?;

        if !exists {
            return Ok(false);
        }

        match self.client.delete_collection(collection_name).await {
            Ok(_) => Ok(true),
            Err(error) => {
                // Tolerates a concurrent deletion
                if error.to_string().contains("doesn't exist")
                    || error.to_string().contains("not found")
                {
                    return Ok(false);
                }
                Err(VectorIndexError::QdrantError(error.to_string()))
            }
        }
    }

    #[tracing::instrument(name = "Listing Qdrant collection points", skip(self))]
    async fn list_points(
        &self,
        collection_name: &str,
    ) -> Result<Vec<(Uuid, RecordPayload)>, VectorIndexError> {
        let mut points = vec![];
        let mut offset: Option<PointId> = None;

        loop {
            let response = self
                .client
                .scroll(&ScrollPoints {
                    collection_name: collection_name.to_string(),
                    offset: offset.clone(),
                    limit: Some(SCROLL_PAGE_SIZE),
                    with_payload: Some(WithPayloadSelector {
                        selector_options: Some(SelectorOptions::Enable(true)),
                    }),
                    ..Default::default()
                })
                .await
                .map_err(|e| VectorIndexError::QdrantError(e.to_string()))?;

            for point in response.result {
                let id = match point.id.as_ref().and_then(parse_point_id) {
                    Some(id) => id,
                    None => {
                        // A point we did not write: it can never match a row id,
                        // so it is left out of the reconciliation entirely
                        warn!(?point.id, "Skipping point with a non-UUID id");
                        continue;
                    }
                };

                points.push((id, parse_payload(point.payload)));
            }

            match response.next_page_offset {
                Some(next_offset) => offset = Some(next_offset),
                None => break,
            }
        }

        Ok(points)
    }

    #[tracing::instrument(name = "Deleting points from Qdrant", skip(self))]
    async fn delete_points(
        &self,
        collection_name: &str,
        point_ids: &[Uuid],
    ) -> Result<(), VectorIndexError> {
        if point_ids.is_empty() {
            return Ok(());
        }

        let selector = PointsSelector {
            points_selector_one_of: Some(PointsSelectorOneOf::Points(PointsIdsList {
                ids: point_ids.iter().map(|id| id.to_string().into()).collect(),
            })),
        };

        self.client
            .delete_points(collection_name, &selector, None)
            .await
            .map_err(|e| VectorIndexError::QdrantError(e.to_string()))?;

        info!("Deleted {} stale points", point_ids.len());
        Ok(())
    }

    #[tracing::instrument(name = "Upserting points to Qdrant", skip(self, points))]
    async fn upsert_points(
        &self,
        collection_name: &str,
        points: Vec<RecordPoint>,
    ) -> Result<(), VectorIndexError> {
        if points.is_empty() {
            return Ok(());
        }

        let nb_points = points.len();

        self.client
            .upsert_points(
                collection_name,
                points.into_iter().map(PointStruct::from).collect(),
                None,
            )
            .await
            .map_err(|e| VectorIndexError::QdrantError(e.to_string()))?;

        info!("Upserted {} points", nb_points);
        Ok(())
    }
}

fn parse_point_id(id: &PointId) -> Option<Uuid> {
    match id.point_id_options.as_ref()? {
        PointIdOptions::Uuid(uuid) => Uuid::parse_str(uuid).ok(),
        PointIdOptions::Num(_) => None,
    }
}

/// Rebuilds the stored fingerprint from a Qdrant payload.
///
/// Cells of an unsupported kind are dropped: the rebuilt payload then differs
/// from the row's, and the row gets re-embedded on the next sync.
fn parse_payload(payload: HashMap<String, qdrant::Value>) -> RecordPayload {
    RecordPayload(
        payload
            .into_iter()
            .filter_map(|(column, value)| {
                let value = match value.kind? {
                    Kind::StringValue(text) => PayloadValue::Text(text),
                    Kind::DoubleValue(number) => PayloadValue::Number(number),
                    Kind::IntegerValue(number) => PayloadValue::Number(number as f64),
                    _ => return None,
                };
                Some((column, value))
            })
            .collect(),
    )
}

impl From<RecordPoint> for PointStruct {
    fn from(record_point: RecordPoint) -> Self {
        Self {
            id: Some(record_point.id.to_string().into()),
            vectors: Some(record_point.vector.into()),
            payload: record_point.payload.into(),
        }
    }
}

impl From<RecordPayload> for HashMap<String, qdrant::Value> {
    fn from(payload: RecordPayload) -> Self {
        payload
            .0
            .into_iter()
            .map(|(column, value)| {
                let value = match value {
                    PayloadValue::Text(text) => qdrant::Value::from(text),
                    PayloadValue::Number(number) => qdrant::Value::from(number),
                };
                (column, value)
            })
            .collect()
    }
}
