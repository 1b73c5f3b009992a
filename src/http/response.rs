//! Library-agnostic response representation

use std::collections::BTreeMap;

use super::{Body, Headers};

/// Status line of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseStatus {
    /// Numeric status code
    pub code: u16,
    /// Reason phrase
    pub message: String,
}

impl ResponseStatus {
    /// Create a status
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A response as recorded or played back
#[derive(Debug, Clone)]
pub struct Response {
    /// Status line
    pub status: ResponseStatus,
    /// Response headers
    pub headers: Headers,
    /// Response body
    pub body: Body,
    /// HTTP protocol version, e.g. "1.1"
    pub http_version: Option<String>,
    /// Adapter-specific data carried through untouched
    pub adapter_metadata: BTreeMap<String, serde_json::Value>,
}

impl Response {
    /// Create a response with no headers and an empty body
    pub fn new(status: ResponseStatus) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Body::empty(),
            http_version: None,
            adapter_metadata: BTreeMap::new(),
        }
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Append a header value
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Set the protocol version
    #[must_use]
    pub fn with_http_version(mut self, version: impl Into<String>) -> Self {
        self.http_version = Some(version.into());
        self
    }

    /// Rewrite an existing `Content-Length` header to the actual body length
    pub fn update_content_length_header(&mut self) {
        let length = self.body.len().to_string();
        for (name, values) in &mut self.headers {
            if name.eq_ignore_ascii_case("content-length") {
                *values = vec![length.clone()];
            }
        }
    }
}

// Adapter metadata never takes part in equality.
impl PartialEq for Response {
    fn eq(&self, other: &Self) -> bool {
        self.status == other.status
            && self.headers == other.headers
            && self.body == other.body
            && self.http_version == other.http_version
    }
}

impl Eq for Response {}
