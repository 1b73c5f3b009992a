//! Serializable, transport-agnostic exchange model

mod body;
mod interaction;
mod request;
mod response;

use std::collections::BTreeMap;

pub use body::{Body, BINARY, UTF8};
pub use interaction::{HookAwareInteraction, HttpInteraction};
pub use request::{normalize_uri, Method, Request};
pub use response::{Response, ResponseStatus};

/// Header map: name to the ordered list of its values
pub type Headers = BTreeMap<String, Vec<String>>;
