//! YAML cassette format

use super::{document_from_value, CassetteDocument, Serializer};
use crate::{Result, TapedeckError};

/// Human-readable YAML documents, the default format
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlSerializer;

impl Serializer for YamlSerializer {
    fn file_extension(&self) -> String {
        "yml".to_string()
    }

    fn serialize(&self, document: &CassetteDocument) -> Result<Vec<u8>> {
        serde_yaml::to_string(document)
            .map(String::into_bytes)
            .map_err(|e| TapedeckError::Serialization(format!("Failed to write YAML: {e}")))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<CassetteDocument> {
        let value: serde_json::Value = serde_yaml::from_slice(bytes)
            .map_err(|e| TapedeckError::Serialization(format!("Failed to parse YAML: {e}")))?;
        document_from_value(value)
    }
}
