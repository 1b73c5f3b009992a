//! Message bodies with their original encoding

use bytes::Bytes;

/// Encoding label for bodies that are valid UTF-8
pub const UTF8: &str = "UTF-8";

/// Encoding label for arbitrary binary bodies
pub const BINARY: &str = "ASCII-8BIT";

/// Raw body bytes plus the encoding they were captured with
///
/// An absent body is the empty body; there is no null state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Body {
    bytes: Bytes,
    encoding: String,
}

impl Body {
    /// Wrap bytes, detecting the encoding from their content
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let encoding = detect_encoding(&bytes).to_string();
        Self { bytes, encoding }
    }

    /// Wrap bytes with an explicit encoding label
    pub fn with_encoding(bytes: impl Into<Bytes>, encoding: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            encoding: encoding.into(),
        }
    }

    /// The empty body
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Bytes::new())
    }

    /// Raw bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the raw bytes
    #[must_use]
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    /// Encoding label the body was captured with
    #[must_use]
    pub fn encoding(&self) -> &str {
        if self.encoding.is_empty() {
            detect_encoding(&self.bytes)
        } else {
            &self.encoding
        }
    }

    /// Body as text, when it is valid UTF-8
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    /// Body length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the body is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Replace every occurrence of `text` with `replacement`, keeping the encoding
    pub fn replace(&mut self, text: &str, replacement: &str) {
        if let Some(replaced) = replace_bytes(&self.bytes, text.as_bytes(), replacement.as_bytes())
        {
            self.bytes = Bytes::from(replaced);
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::new(Bytes::copy_from_slice(text.as_bytes()))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::new(Bytes::from(text))
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(Bytes::from(bytes))
    }
}

fn detect_encoding(bytes: &[u8]) -> &'static str {
    if std::str::from_utf8(bytes).is_ok() {
        UTF8
    } else {
        BINARY
    }
}

/// Byte-level substitution; `None` when `needle` does not occur
fn replace_bytes(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Option<Vec<u8>> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }

    let mut out = Vec::with_capacity(haystack.len());
    let mut found = false;
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
            found = true;
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }

    found.then_some(out)
}
