//! Zstd-compressed wrapper over another serializer

use std::sync::Arc;

use super::{CassetteDocument, Serializer};
use crate::{Result, TapedeckError};

/// Default zstd compression level
pub const COMPRESSION_LEVEL: i32 = 3;

/// Compresses the output of an inner serializer
#[derive(Clone)]
pub struct CompressedSerializer {
    inner: Arc<dyn Serializer>,
    level: i32,
}

impl CompressedSerializer {
    /// Wrap `inner` with the default compression level
    pub fn new(inner: impl Serializer + 'static) -> Self {
        Self::with_level(inner, COMPRESSION_LEVEL)
    }

    /// Wrap `inner` with an explicit compression level
    pub fn with_level(inner: impl Serializer + 'static, level: i32) -> Self {
        Self {
            inner: Arc::new(inner),
            level,
        }
    }
}

impl Serializer for CompressedSerializer {
    fn file_extension(&self) -> String {
        format!("{}.zst", self.inner.file_extension())
    }

    fn serialize(&self, document: &CassetteDocument) -> Result<Vec<u8>> {
        let plain = self.inner.serialize(document)?;
        zstd::encode_all(plain.as_slice(), self.level)
            .map_err(|e| TapedeckError::Serialization(format!("Failed to compress cassette: {e}")))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<CassetteDocument> {
        let plain = zstd::decode_all(bytes).map_err(|e| {
            TapedeckError::Serialization(format!("Failed to decompress cassette: {e}"))
        })?;
        self.inner.deserialize(&plain)
    }
}
