//! Library-agnostic request representation

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use super::{Body, Headers};
use crate::TapedeckError;

/// HTTP method, always lowercase on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
    /// TRACE
    Trace,
    /// CONNECT
    Connect,
}

impl Method {
    /// Lowercase method name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::Head => "head",
            Self::Options => "options",
            Self::Trace => "trace",
            Self::Connect => "connect",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = TapedeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            "put" => Ok(Self::Put),
            "patch" => Ok(Self::Patch),
            "delete" => Ok(Self::Delete),
            "head" => Ok(Self::Head),
            "options" => Ok(Self::Options),
            "trace" => Ok(Self::Trace),
            "connect" => Ok(Self::Connect),
            other => Err(TapedeckError::InvalidCassetteFormat(format!(
                "Unknown HTTP method: {other}"
            ))),
        }
    }
}

/// A request as seen by the matching engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Normalized URI with an explicit port
    pub uri: String,
    /// Request body
    pub body: Body,
    /// Request headers
    pub headers: Headers,
}

impl Request {
    /// Create a request, normalizing the URI
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: normalize_uri(uri),
            body: Body::empty(),
            headers: Headers::new(),
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

    /// Parsed URI, if it is absolute
    #[must_use]
    pub fn parsed_uri(&self) -> Option<Url> {
        Url::parse(&self.uri).ok()
    }
}

/// Normalize a URI so that equal endpoints compare equal as strings
///
/// The port is always spelled out, default or not. Unparseable input is
/// returned trimmed but otherwise untouched.
#[must_use]
pub fn normalize_uri(uri: &str) -> String {
    let trimmed = uri.trim();
    let Ok(url) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    let Some(host) = url.host_str() else {
        return url.to_string();
    };

    let mut normalized = format!("{}://", url.scheme());
    if !url.username().is_empty() {
        normalized.push_str(url.username());
        if let Some(password) = url.password() {
            normalized.push(':');
            normalized.push_str(password);
        }
        normalized.push('@');
    }
    normalized.push_str(host);
    if let Some(port) = url.port_or_known_default() {
        normalized.push_str(&format!(":{port}"));
    }
    normalized.push_str(url.path());
    if let Some(query) = url.query() {
        normalized.push('?');
        normalized.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        normalized.push('#');
        normalized.push_str(fragment);
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_adds_default_port() {
        assert_eq!(normalize_uri("http://example.com/"), "http://example.com:80/");
        assert_eq!(normalize_uri("https://example.com"), "https://example.com:443/");
        assert_eq!(
            normalize_uri("http://example.com:80/foo?a=1"),
            "http://example.com:80/foo?a=1"
        );
    }

    #[test]
    fn test_normalize_keeps_custom_port() {
        assert_eq!(
            normalize_uri("http://example.com:8080/x"),
            "http://example.com:8080/x"
        );
    }

    #[test]
    fn test_normalize_idempotent() {
        let once = normalize_uri("HTTP://Example.COM/Path?b=2&a=1");
        assert_eq!(normalize_uri(&once), once);
        assert_eq!(once, "http://example.com:80/Path?b=2&a=1");
    }

    #[test]
    fn test_normalize_relative_untouched() {
        assert_eq!(normalize_uri(" /relative "), "/relative");
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("patch".parse::<Method>().unwrap(), Method::Patch);
        assert!("brew".parse::<Method>().is_err());
    }

    #[test]
    fn test_with_header_appends() {
        let request = Request::new(Method::Get, "http://example.com/")
            .with_header("Accept", "a")
            .with_header("Accept", "b");
        assert_eq!(request.headers["Accept"], vec!["a", "b"]);
    }
}
