//! JSON cassette format

use super::{document_from_value, CassetteDocument, Serializer};
use crate::{Result, TapedeckError};

/// Pretty-printed JSON documents
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn file_extension(&self) -> String {
        "json".to_string()
    }

    fn serialize(&self, document: &CassetteDocument) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(document)
            .map_err(|e| TapedeckError::Serialization(format!("Failed to write JSON: {e}")))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<CassetteDocument> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| TapedeckError::Serialization(format!("Failed to parse JSON: {e}")))?;
        document_from_value(value)
    }
}
