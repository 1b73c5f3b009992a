//! Classification of outgoing requests for network-library adapters
//!
//! An adapter turns a native request into a [`Request`], asks [`RequestHandler::handle`]
//! what to do with it, and reports realized responses back through
//! [`CassetteStack::record_http_interaction`].

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::http::{Request, Response};
use crate::playback::{lock, PlaybackSource};
use crate::stack::CassetteStack;
use crate::{Result, TapedeckError};

const LOCALHOST_ALIASES: [&str; 4] = ["localhost", "127.0.0.1", "0.0.0.0", "::1"];

/// Predicate over a single request
pub type IgnorePredicate = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Rules deciding which requests bypass recording and playback entirely
#[derive(Clone, Default)]
pub struct RequestIgnorer {
    ignored_hosts: BTreeSet<String>,
    ignore_localhost: bool,
    predicates: Vec<IgnorePredicate>,
}

impl RequestIgnorer {
    /// Ignore nothing
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add hosts to ignore
    pub fn ignore_hosts<I, S>(&mut self, hosts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_hosts
            .extend(hosts.into_iter().map(|host| host.into().to_ascii_lowercase()));
    }

    /// Stop ignoring hosts
    pub fn unignore_hosts<I, S>(&mut self, hosts: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for host in hosts {
            self.ignored_hosts.remove(&host.as_ref().to_ascii_lowercase());
        }
    }

    /// Ignore requests to `localhost`, `127.0.0.1`, `0.0.0.0` and `::1`
    pub fn set_ignore_localhost(&mut self, ignore: bool) {
        self.ignore_localhost = ignore;
    }

    /// Ignore every request `predicate` accepts
    pub fn ignore_request<F>(&mut self, predicate: F)
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Arc::new(predicate));
    }

    /// Whether `request` is ignored by any rule
    #[must_use]
    pub fn is_ignored(&self, request: &Request) -> bool {
        if let Some(host) = request_host(request) {
            if self.ignore_localhost && is_localhost(&host) {
                return true;
            }
            if self.ignored_hosts.contains(&host) {
                return true;
            }
        }
        self.predicates.iter().any(|predicate| predicate(request))
    }
}

impl fmt::Debug for RequestIgnorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestIgnorer")
            .field("ignored_hosts", &self.ignored_hosts)
            .field("ignore_localhost", &self.ignore_localhost)
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

fn request_host(request: &Request) -> Option<String> {
    let url = request.parsed_uri()?;
    let host = url.host_str()?;
    Some(
        host.trim_start_matches('[')
            .trim_end_matches(']')
            .to_ascii_lowercase(),
    )
}

/// Whether `host` names the local machine
#[must_use]
pub fn is_localhost(host: &str) -> bool {
    LOCALHOST_ALIASES.contains(&host)
}

/// How a request is to be handled, in decreasing priority
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestType {
    /// Performed for real and never recorded
    Ignored,
    /// Answered from a recorded interaction
    StubbedByVcr(Response),
    /// Owned by another stubbing mechanism
    ExternallyStubbed,
    /// Performed for real, then recorded
    Recordable,
    /// Neither stubbed nor allowed to go out
    Unhandled,
}

impl RequestType {
    /// Short name used in logs
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::StubbedByVcr(_) => "stubbed_by_vcr",
            Self::ExternallyStubbed => "externally_stubbed",
            Self::Recordable => "recordable",
            Self::Unhandled => "unhandled",
        }
    }
}

/// Classify `request` against the stack
///
/// A matching recorded interaction is consumed.
pub fn request_type(
    stack: &CassetteStack,
    request: &Request,
    externally_stubbed: bool,
) -> RequestType {
    if !stack.turned_on() || stack.configuration().request_ignorer().is_ignored(request) {
        return RequestType::Ignored;
    }

    if let Some(response) = lock(&stack.http_interactions()).response_for(request) {
        return RequestType::StubbedByVcr(response);
    }

    if externally_stubbed {
        return RequestType::ExternallyStubbed;
    }

    if stack.real_http_connections_allowed() {
        RequestType::Recordable
    } else {
        RequestType::Unhandled
    }
}

/// Error describing a request nothing can serve
#[must_use]
pub fn unhandled_request_error(stack: &CassetteStack, request: &Request) -> TapedeckError {
    let (cassette, remaining_unused) = match stack.current_cassette() {
        Some(cassette) => (
            Some((cassette.name().to_string(), cassette.record_mode())),
            cassette.http_interactions().remaining_unused_interaction_count(),
        ),
        None => (None, 0),
    };

    TapedeckError::UnhandledHttpRequest {
        method: request.method.to_string(),
        uri: request.uri.clone(),
        cassette,
        remaining_unused,
    }
}

/// Adapter-side callbacks for each classification
pub trait RequestHandler {
    /// Value handed back to the adapter
    type Output;

    /// The request being handled
    fn request(&self) -> &Request;

    /// Whether another stubbing mechanism already owns the request
    fn externally_stubbed(&self) -> bool {
        false
    }

    /// Perform the request for real without recording it
    ///
    /// # Errors
    ///
    /// Returns error if the adapter fails
    fn on_ignored_request(&mut self, stack: &mut CassetteStack) -> Result<Self::Output>;

    /// Answer with a recorded response
    ///
    /// # Errors
    ///
    /// Returns error if the adapter fails
    fn on_stubbed_by_vcr_request(
        &mut self,
        stack: &mut CassetteStack,
        response: Response,
    ) -> Result<Self::Output>;

    /// Defer to the other stubbing mechanism; passes through like an ignored request by default
    ///
    /// # Errors
    ///
    /// Returns error if the adapter fails
    fn on_externally_stubbed_request(&mut self, stack: &mut CassetteStack) -> Result<Self::Output> {
        self.on_ignored_request(stack)
    }

    /// Perform the request for real and record the realized exchange
    ///
    /// # Errors
    ///
    /// Returns error if the adapter fails
    fn on_recordable_request(&mut self, stack: &mut CassetteStack) -> Result<Self::Output>;

    /// Fail with a descriptive error
    ///
    /// # Errors
    ///
    /// Returns `UnhandledHttpRequest` unless overridden
    fn on_unhandled_request(&mut self, stack: &mut CassetteStack) -> Result<Self::Output> {
        Err(unhandled_request_error(stack, self.request()))
    }

    /// Classify the request and dispatch to the matching callback
    ///
    /// # Errors
    ///
    /// Returns whatever the chosen callback returns
    fn handle(&mut self, stack: &mut CassetteStack) -> Result<Self::Output> {
        let request_type = request_type(stack, self.request(), self.externally_stubbed());
        debug!(
            "Handling request: {} {} ({})",
            self.request().method,
            self.request().uri,
            request_type.as_str()
        );

        match request_type {
            RequestType::Ignored => self.on_ignored_request(stack),
            RequestType::StubbedByVcr(response) => {
                info!(
                    "Playing back {} for {} {}",
                    response.status.code,
                    self.request().method,
                    self.request().uri
                );
                self.on_stubbed_by_vcr_request(stack, response)
            }
            RequestType::ExternallyStubbed => self.on_externally_stubbed_request(stack),
            RequestType::Recordable => self.on_recordable_request(stack),
            RequestType::Unhandled => self.on_unhandled_request(stack),
        }
    }
}
