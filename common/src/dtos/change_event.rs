use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::helper::error_chain_fmt;

/// Message queued between the webhook service and the sync worker.
///
/// `database_id` identifies the source table affected by the event; the raw
/// provider envelope is carried along for logging and future use. Events
/// whose source could not be resolved are queued with a null id and dropped
/// by the worker.
#[derive(Debug, Deserialize, Serialize)]
pub struct ChangeEvent {
    pub database_id: Option<Uuid>,
    pub event: JsonValue,
}

impl ChangeEvent {
    pub fn try_parsing(data: &[u8]) -> Result<Self, ChangeEventError> {
        let data = std::str::from_utf8(data)?;
        let event = serde_json::from_str(data)
            .map_err(|e| ChangeEventError::InvalidJsonData(e, data.to_string()))?;

        Ok(event)
    }

    pub fn try_serializing(&self) -> Result<Vec<u8>, ChangeEventError> {
        Ok(serde_json::to_vec(self).map_err(ChangeEventError::NotSerializable)?)
    }
}

#[derive(thiserror::Error)]
pub enum ChangeEventError {
    #[error("Data could not be converted from utf8 u8 vector to string")]
    InvalidStringData(#[from] std::str::Utf8Error),

    #[error("Data did not represent a valid JSON object: {0}. Data: {1}")]
    InvalidJsonData(serde_json::Error, String),

    #[error("Change event could not be serialized to JSON: {0}")]
    NotSerializable(serde_json::Error),
}

impl std::fmt::Debug for ChangeEventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
