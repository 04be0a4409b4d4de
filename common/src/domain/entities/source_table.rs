use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cell_value::CellValue;
use super::record_point::RecordPayload;

/// Metadata of an externally-owned structured table
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceTable {
    pub id: Uuid,
    pub title: String,
}

impl SourceTable {
    /// Name of the index collection associated to this source
    pub fn collection_name(&self) -> String {
        derive_collection_name(&self.title)
    }
}

/// One row of a source table.
///
/// The row id is provider-assigned and stable: it doubles as the point id in
/// the index, so re-embedding the same row updates its point instead of
/// accumulating duplicates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceRow {
    pub id: Uuid,
    // BTreeMap for a stable column order
    pub cells: BTreeMap<String, CellValue>,
}

impl SourceRow {
    /// Concatenation of the cell values, in column order, fed to the
    /// embedding service
    pub fn embeddable_text(&self) -> String {
        self.cells
            .values()
            .map(CellValue::render)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The payload persisted with the row's point, doubling as its
    /// change-detection fingerprint
    pub fn payload(&self) -> RecordPayload {
        RecordPayload(
            self.cells
                .iter()
                .map(|(column, cell)| (column.clone(), cell.to_payload_value()))
                .collect(),
        )
    }
}

/// Derives a collection name from a source title: trimmed, lower-cased,
/// spaces turned into underscores
pub fn derive_collection_name(title: &str) -> String {
    let name = title.trim().to_lowercase().replace(' ', "_");
    if name.is_empty() {
        return "untitled".to_string();
    }
    name
}
