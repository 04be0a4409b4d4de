use std::collections::BTreeMap;

use uuid::Uuid;

use super::cell_value::PayloadValue;

pub type Embeddings = Vec<f32>;

/// The column→value mapping stored with a point.
///
/// Doubles as the change-detection fingerprint: a row is only re-embedded
/// when its payload no longer equals the one stored in the index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordPayload(pub BTreeMap<String, PayloadValue>);

/// One embedded record inside a collection, keyed by its source row id
#[derive(Debug, Clone)]
pub struct RecordPoint {
    pub id: Uuid,
    pub vector: Embeddings,
    pub payload: RecordPayload,
}
