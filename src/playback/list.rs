//! Consumption-tracking interaction list

use tracing::debug;

use super::{lock, NullList, PlaybackSource, SharedSource};
use crate::http::{HttpInteraction, Request, Response};
use crate::matching::{conjunctive_match, Matcher};
use crate::{Result, TapedeckError};

/// Serves recorded responses in recorded order, each at most once
///
/// Unmatched requests fall through to the parent source. With playback
/// repeats allowed, a drained list keeps serving the most recently used match.
pub struct HttpInteractionList {
    interactions: Vec<HttpInteraction>,
    used_interactions: Vec<HttpInteraction>,
    request_matchers: Vec<Matcher>,
    allow_playback_repeats: bool,
    parent: SharedSource,
}

impl HttpInteractionList {
    /// Create a list with no parent
    #[must_use]
    pub fn new(
        interactions: Vec<HttpInteraction>,
        request_matchers: Vec<Matcher>,
        allow_playback_repeats: bool,
    ) -> Self {
        Self::with_parent(
            interactions,
            request_matchers,
            allow_playback_repeats,
            NullList::shared(),
        )
    }

    /// Create a list reading through to `parent`
    #[must_use]
    pub fn with_parent(
        interactions: Vec<HttpInteraction>,
        request_matchers: Vec<Matcher>,
        allow_playback_repeats: bool,
        parent: SharedSource,
    ) -> Self {
        Self {
            interactions,
            used_interactions: Vec::new(),
            request_matchers,
            allow_playback_repeats,
            parent,
        }
    }

    /// Interactions not yet played back, in recorded order
    #[must_use]
    pub fn interactions(&self) -> &[HttpInteraction] {
        &self.interactions
    }

    /// Interactions already played back, most recent first
    #[must_use]
    pub fn used_interactions(&self) -> &[HttpInteraction] {
        &self.used_interactions
    }

    /// Fail if any interaction was never played back
    ///
    /// # Errors
    ///
    /// Returns `UnusedHttpInteractions` describing each leftover
    pub fn assert_no_unused_interactions(&self, cassette: &str) -> Result<()> {
        if self.interactions.is_empty() {
            return Ok(());
        }

        Err(TapedeckError::UnusedHttpInteractions {
            cassette: cassette.to_string(),
            interactions: self
                .interactions
                .iter()
                .map(|interaction| format!("  - {}", interaction.summary()))
                .collect(),
        })
    }

    fn matching_interaction_index(&self, request: &Request) -> Option<usize> {
        self.interactions.iter().position(|interaction| {
            conjunctive_match(request, &interaction.request, &self.request_matchers)
        })
    }

    fn matching_used_interaction(&self, request: &Request) -> Option<&HttpInteraction> {
        self.used_interactions.iter().find(|interaction| {
            conjunctive_match(request, &interaction.request, &self.request_matchers)
        })
    }
}

impl PlaybackSource for HttpInteractionList {
    fn response_for(&mut self, request: &Request) -> Option<Response> {
        if let Some(index) = self.matching_interaction_index(request) {
            let interaction = self.interactions.remove(index);
            debug!(
                "Found matching interaction for {} {} at index {}: {}",
                request.method,
                request.uri,
                index,
                interaction.summary()
            );
            let response = interaction.response.clone();
            self.used_interactions.insert(0, interaction);
            return Some(response);
        }

        if let Some(response) = lock(&self.parent).response_for(request) {
            debug!(
                "Found matching interaction for {} {} in parent list",
                request.method, request.uri
            );
            return Some(response);
        }

        if self.allow_playback_repeats {
            if let Some(interaction) = self.matching_used_interaction(request) {
                debug!(
                    "Repeating used interaction for {} {}: {}",
                    request.method,
                    request.uri,
                    interaction.summary()
                );
                return Some(interaction.response.clone());
            }
        }

        None
    }

    fn has_interaction_matching(&self, request: &Request) -> bool {
        self.matching_interaction_index(request).is_some()
            || lock(&self.parent).has_interaction_matching(request)
    }

    fn has_used_interaction_matching(&self, request: &Request) -> bool {
        self.matching_used_interaction(request).is_some()
    }

    fn remaining_unused_interaction_count(&self) -> usize {
        self.interactions.len()
    }
}
