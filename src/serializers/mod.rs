//! Pluggable byte formats for cassette documents

mod compressed;
mod document;
mod json;
mod yaml;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::{Result, TapedeckError};

pub use compressed::CompressedSerializer;
pub use document::{
    recorded_with, BodyRecord, CassetteDocument, InteractionRecord, RequestRecord, ResponseRecord,
    StatusRecord,
};
pub use json::JsonSerializer;
pub use yaml::YamlSerializer;

/// Turns cassette documents into bytes and back
pub trait Serializer: Send + Sync {
    /// File extension without the leading dot
    fn file_extension(&self) -> String;

    /// Encode a document
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails
    fn serialize(&self, document: &CassetteDocument) -> Result<Vec<u8>>;

    /// Decode a document
    ///
    /// # Errors
    ///
    /// Returns `InvalidCassetteFormat` for superseded shapes, or a
    /// serialization error for unreadable bytes
    fn deserialize(&self, bytes: &[u8]) -> Result<CassetteDocument>;
}

/// Check a generic document tree for the current shape and decode it
///
/// Early cassette files were a bare list of interactions; those need an
/// offline migration and are rejected here.
pub(crate) fn document_from_value(value: serde_json::Value) -> Result<CassetteDocument> {
    match &value {
        serde_json::Value::Array(_) => {
            return Err(TapedeckError::InvalidCassetteFormat(
                "the cassette is a bare list of interactions, a format that is no longer supported; migrate it to the `http_interactions` layout".to_string(),
            ));
        }
        serde_json::Value::Object(map) if !map.contains_key("http_interactions") => {
            return Err(TapedeckError::InvalidCassetteFormat(
                "missing `http_interactions` key".to_string(),
            ));
        }
        serde_json::Value::Object(_) => {}
        other => {
            return Err(TapedeckError::InvalidCassetteFormat(format!(
                "expected a mapping at the top level, found {other}"
            )));
        }
    }

    serde_json::from_value(value).map_err(|e| {
        TapedeckError::InvalidCassetteFormat(format!("Failed to decode cassette: {e}"))
    })
}

/// Named serializers
#[derive(Clone)]
pub struct SerializerRegistry {
    serializers: BTreeMap<String, Arc<dyn Serializer>>,
}

impl SerializerRegistry {
    /// Registry with `yaml`, `json` and `compressed` (zstd over yaml)
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            serializers: BTreeMap::new(),
        };
        registry.register("yaml", YamlSerializer);
        registry.register("json", JsonSerializer);
        registry.register("compressed", CompressedSerializer::new(YamlSerializer));
        registry
    }

    /// Register a serializer under `name`
    pub fn register(&mut self, name: impl Into<String>, serializer: impl Serializer + 'static) {
        let name = name.into();
        if self.serializers.contains_key(&name) {
            warn!("Overriding serializer {:?}", name);
        }
        self.serializers.insert(name, Arc::new(serializer));
    }

    /// Look up a serializer
    ///
    /// # Errors
    ///
    /// Returns `UnregisteredSerializer` listing the registered names
    pub fn get(&self, name: &str) -> Result<Arc<dyn Serializer>> {
        self.serializers
            .get(name)
            .cloned()
            .ok_or_else(|| TapedeckError::UnregisteredSerializer {
                name: name.to_string(),
                registered: self.serializers.keys().cloned().collect(),
            })
    }
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("serializers", &self.serializers.keys().collect::<Vec<_>>())
            .finish()
    }
}
