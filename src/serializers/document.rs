//! Canonical, ordered cassette document
//!
//! Field order here is the key order on disk.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::http::{Body, Headers, HttpInteraction, Method, Request, Response, ResponseStatus};
use crate::{Result, TapedeckError};

/// Value written to `recorded_with`
#[must_use]
pub fn recorded_with() -> String {
    format!("tapedeck {}", env!("CARGO_PKG_VERSION"))
}

/// The persisted shape of a cassette
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CassetteDocument {
    /// Interactions in recorded order
    pub http_interactions: Vec<InteractionRecord>,
    /// Library identification
    pub recorded_with: String,
}

impl CassetteDocument {
    /// Build a document from interactions
    #[must_use]
    pub fn from_interactions(
        interactions: &[HttpInteraction],
        preserve_exact_body_bytes: bool,
    ) -> Self {
        Self {
            http_interactions: interactions
                .iter()
                .map(|interaction| {
                    InteractionRecord::from_interaction(interaction, preserve_exact_body_bytes)
                })
                .collect(),
            recorded_with: recorded_with(),
        }
    }

    /// Decode every interaction in the document
    ///
    /// # Errors
    ///
    /// Returns error if a method or base64 body cannot be decoded
    pub fn into_interactions(self) -> Result<Vec<HttpInteraction>> {
        self.http_interactions
            .into_iter()
            .map(InteractionRecord::into_interaction)
            .collect()
    }
}

/// One persisted interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// Request half
    pub request: RequestRecord,
    /// Response half
    pub response: ResponseRecord,
    /// Recording time
    pub recorded_at: DateTime<Utc>,
}

/// Persisted request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Lowercase method
    pub method: Method,
    /// URI as recorded
    pub uri: String,
    /// Body
    pub body: BodyRecord,
    /// Headers
    #[serde(default)]
    pub headers: Headers,
}

/// Persisted response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    /// Status line
    pub status: StatusRecord,
    /// Headers
    #[serde(default)]
    pub headers: Headers,
    /// Body
    pub body: BodyRecord,
    /// Protocol version
    #[serde(default)]
    pub http_version: Option<String>,
    /// Adapter metadata, written only when present
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub adapter_metadata: BTreeMap<String, serde_json::Value>,
}

/// Persisted status line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Status code
    pub code: u16,
    /// Reason phrase
    #[serde(default)]
    pub message: String,
}

/// Persisted body: embedded text or base64 bytes, plus the original encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyRecord {
    /// Encoding label
    pub encoding: String,
    /// Text form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,
    /// Exact-bytes form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64_string: Option<String>,
}

impl BodyRecord {
    /// Encode a body; binary bodies always use base64
    #[must_use]
    pub fn encode(body: &Body, preserve_exact_bytes: bool) -> Self {
        let encoding = body.encoding().to_string();
        match body.as_str() {
            Some(text) if !preserve_exact_bytes => Self {
                encoding,
                string: Some(text.to_string()),
                base64_string: None,
            },
            _ => Self {
                encoding,
                string: None,
                base64_string: Some(STANDARD.encode(body.as_bytes())),
            },
        }
    }

    /// Decode back into a body
    ///
    /// # Errors
    ///
    /// Returns `InvalidCassetteFormat` for malformed base64
    pub fn decode(self) -> Result<Body> {
        let bytes = match (self.base64_string, self.string) {
            (Some(encoded), _) => STANDARD.decode(encoded.trim()).map_err(|e| {
                TapedeckError::InvalidCassetteFormat(format!("Invalid base64 body: {e}"))
            })?,
            (None, Some(text)) => text.into_bytes(),
            (None, None) => Vec::new(),
        };
        Ok(Body::with_encoding(bytes, self.encoding))
    }
}

impl InteractionRecord {
    /// Convert an interaction into its persisted form
    #[must_use]
    pub fn from_interaction(
        interaction: &HttpInteraction,
        preserve_exact_body_bytes: bool,
    ) -> Self {
        let request = &interaction.request;
        let response = &interaction.response;
        Self {
            request: RequestRecord {
                method: request.method,
                uri: request.uri.clone(),
                body: BodyRecord::encode(&request.body, preserve_exact_body_bytes),
                headers: request.headers.clone(),
            },
            response: ResponseRecord {
                status: StatusRecord {
                    code: response.status.code,
                    message: response.status.message.clone(),
                },
                headers: response.headers.clone(),
                body: BodyRecord::encode(&response.body, preserve_exact_body_bytes),
                http_version: response.http_version.clone(),
                adapter_metadata: response.adapter_metadata.clone(),
            },
            recorded_at: interaction.recorded_at,
        }
    }

    /// Convert back into an interaction
    ///
    /// # Errors
    ///
    /// Returns error if a body cannot be decoded
    pub fn into_interaction(self) -> Result<HttpInteraction> {
        let request = Request {
            method: self.request.method,
            uri: self.request.uri,
            body: self.request.body.decode()?,
            headers: self.request.headers,
        };
        let response = Response {
            status: ResponseStatus::new(self.response.status.code, self.response.status.message),
            headers: self.response.headers,
            body: self.response.body.decode()?,
            http_version: self.response.http_version,
            adapter_metadata: self.response.adapter_metadata,
        };
        Ok(HttpInteraction::with_timestamp(request, response, self.recorded_at))
    }
}
