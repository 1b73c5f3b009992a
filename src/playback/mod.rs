//! Playback of recorded interactions

mod list;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::http::{Request, Response};

pub use list::HttpInteractionList;

/// Anything that can serve recorded responses
pub trait PlaybackSource: Send {
    /// Consume and return the response of the first matching interaction
    fn response_for(&mut self, request: &Request) -> Option<Response>;

    /// Whether an unconsumed interaction matches, without consuming it
    fn has_interaction_matching(&self, request: &Request) -> bool;

    /// Whether an already consumed interaction matches
    fn has_used_interaction_matching(&self, request: &Request) -> bool;

    /// Number of interactions not yet played back
    fn remaining_unused_interaction_count(&self) -> usize;
}

/// Playback source shared between a cassette and the lists nested under it
pub type SharedSource = Arc<Mutex<dyn PlaybackSource>>;

/// Lock a shared source, recovering from poisoning
pub(crate) fn lock(source: &SharedSource) -> MutexGuard<'_, dyn PlaybackSource + 'static> {
    source.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Source that never matches; ends read-through chains
#[derive(Debug, Clone, Copy, Default)]
pub struct NullList;

impl NullList {
    /// A shared handle to a null list
    #[must_use]
    pub fn shared() -> SharedSource {
        Arc::new(Mutex::new(Self))
    }
}

impl PlaybackSource for NullList {
    fn response_for(&mut self, _request: &Request) -> Option<Response> {
        None
    }

    fn has_interaction_matching(&self, _request: &Request) -> bool {
        false
    }

    fn has_used_interaction_matching(&self, _request: &Request) -> bool {
        false
    }

    fn remaining_unused_interaction_count(&self) -> usize {
        0
    }
}
