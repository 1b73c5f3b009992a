//! Request matchers deciding whether two requests are "the same"
//!
//! A request matches another under a matcher set iff every matcher agrees.

pub mod builtins;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::http::Request;
use crate::{Result, TapedeckError};

/// Shared equality predicate between two requests
pub type Predicate = Arc<dyn Fn(&Request, &Request) -> bool + Send + Sync>;

/// A resolved matcher: a registered predicate or an ad-hoc callable
#[derive(Clone)]
pub enum Matcher {
    /// Predicate looked up by name in the registry
    Named {
        /// Registry name
        name: String,
        /// The predicate
        predicate: Predicate,
    },
    /// Callable supplied directly by the caller
    AdHoc(Predicate),
}

impl Matcher {
    /// Wrap an arbitrary callable
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&Request, &Request) -> bool + Send + Sync + 'static,
    {
        Self::AdHoc(Arc::new(predicate))
    }

    /// Evaluate the predicate
    #[must_use]
    pub fn matches(&self, r1: &Request, r2: &Request) -> bool {
        match self {
            Self::Named { predicate, .. } | Self::AdHoc(predicate) => predicate(r1, r2),
        }
    }

    /// Registry name, if any
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named { name, .. } => Some(name),
            Self::AdHoc(_) => None,
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named { name, .. } => write!(f, "Matcher({name})"),
            Self::AdHoc(_) => f.write_str("Matcher(<callable>)"),
        }
    }
}

/// A match attribute as given in cassette options
#[derive(Debug, Clone)]
pub enum MatchAttribute {
    /// Name of a registered matcher
    Name(String),
    /// Ready-made matcher
    Matcher(Matcher),
}

impl From<&str> for MatchAttribute {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for MatchAttribute {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Matcher> for MatchAttribute {
    fn from(matcher: Matcher) -> Self {
        Self::Matcher(matcher)
    }
}

/// Whether every matcher considers the two requests equal
#[must_use]
pub fn conjunctive_match(r1: &Request, r2: &Request, matchers: &[Matcher]) -> bool {
    matchers.iter().all(|matcher| matcher.matches(r1, r2))
}

/// Matcher comparing URIs after removing the named query parameters
///
/// Array-valued parameters written as `name[]` are removed too.
pub fn uri_without_params<I, S>(names: I) -> Matcher
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    Matcher::custom(move |r1, r2| {
        builtins::strip_params(&r1.uri, &names) == builtins::strip_params(&r2.uri, &names)
    })
}

/// Registry of named request matchers
#[derive(Clone)]
pub struct RequestMatcherRegistry {
    matchers: BTreeMap<String, Predicate>,
}

impl RequestMatcherRegistry {
    /// Registry holding only the built-in matchers
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            matchers: BTreeMap::new(),
        };
        registry.register("method", builtins::method);
        registry.register("uri", builtins::uri);
        registry.register("host", builtins::host);
        registry.register("path", builtins::path);
        registry.register("body", builtins::body);
        registry.register("headers", builtins::headers);
        registry.register("body_as_json", builtins::body_as_json);
        registry.register("query", builtins::query);
        registry
    }

    /// Register a predicate under `name`, replacing any previous one
    pub fn register<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&Request, &Request) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        if self.matchers.contains_key(&name) {
            warn!("Overriding request matcher {:?}", name);
        }
        self.matchers.insert(name, Arc::new(predicate));
    }

    /// Look up a matcher by name
    ///
    /// # Errors
    ///
    /// Returns `UnregisteredMatcher` listing the registered names
    pub fn get(&self, name: &str) -> Result<Matcher> {
        self.matchers
            .get(name)
            .map(|predicate| Matcher::Named {
                name: name.to_string(),
                predicate: Arc::clone(predicate),
            })
            .ok_or_else(|| TapedeckError::UnregisteredMatcher {
                name: name.to_string(),
                registered: self.names(),
            })
    }

    /// Resolve match attributes into matchers, in order
    ///
    /// # Errors
    ///
    /// Returns error on the first unregistered name
    pub fn resolve(&self, attributes: &[MatchAttribute]) -> Result<Vec<Matcher>> {
        attributes
            .iter()
            .map(|attribute| match attribute {
                MatchAttribute::Name(name) => self.get(name),
                MatchAttribute::Matcher(matcher) => Ok(matcher.clone()),
            })
            .collect()
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.matchers.keys().cloned().collect()
    }
}

impl Default for RequestMatcherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestMatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestMatcherRegistry")
            .field("matchers", &self.names())
            .finish()
    }
}
