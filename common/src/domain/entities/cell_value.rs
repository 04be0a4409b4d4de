use serde::{Deserialize, Serialize};

/// One typed scalar cell of a source row, as exposed by the provider.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    Text(String),
    Number(f64),
    /// Label of a single-select column
    Select(String),
    /// ISO-8601 date, kept as the provider sends it
    Date(String),
}

impl CellValue {
    /// Renders the cell for the embeddable text of its row
    pub fn render(&self) -> String {
        match self {
            CellValue::Text(text) => text.clone(),
            CellValue::Number(number) => number.to_string(),
            CellValue::Select(label) => label.clone(),
            CellValue::Date(date) => date.clone(),
        }
    }

    /// The form under which the cell is persisted in a point payload.
    ///
    /// Select labels and dates collapse into plain text: the payload only has
    /// to be a stable fingerprint and retrievable metadata, not a lossless
    /// copy of the provider's column types.
    pub fn to_payload_value(&self) -> PayloadValue {
        match self {
            CellValue::Text(text) => PayloadValue::Text(text.clone()),
            CellValue::Number(number) => PayloadValue::Number(*number),
            CellValue::Select(label) => PayloadValue::Text(label.clone()),
            CellValue::Date(date) => PayloadValue::Text(date.clone()),
        }
    }
}

/// A scalar as stored in, and read back from, the vector index payload
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    Text(String),
    Number(f64),
}

impl PayloadValue {
    pub fn render(&self) -> String {
        match self {
            PayloadValue::Text(text) => text.clone(),
            PayloadValue::Number(number) => number.to_string(),
        }
    }
}
