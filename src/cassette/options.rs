//! Per-insert cassette options

use std::time::Duration;

use crate::config::{CassetteDefaults, RecordMode};
use crate::matching::MatchAttribute;

/// Options given when inserting a cassette
///
/// Every option left unset falls back to the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct CassetteOptions {
    record: Option<RecordMode>,
    match_requests_on: Option<Vec<MatchAttribute>>,
    serializer: Option<String>,
    persister: Option<String>,
    tags: Option<Vec<String>>,
    allow_playback_repeats: Option<bool>,
    exclusive: Option<bool>,
    allow_unused_http_interactions: Option<bool>,
    re_record_interval: Option<Duration>,
    preserve_exact_body_bytes: Option<bool>,
    update_content_length_header: Option<bool>,
    record_on_error: Option<bool>,
    clean_outdated_http_interactions: Option<bool>,
}

impl CassetteOptions {
    /// No overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record mode
    #[must_use]
    pub fn record(mut self, mode: RecordMode) -> Self {
        self.record = Some(mode);
        self
    }

    /// Matchers deciding request equality, by name or as ready-made matchers
    #[must_use]
    pub fn match_requests_on<I, A>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<MatchAttribute>,
    {
        self.match_requests_on = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    /// Serializer name
    #[must_use]
    pub fn serializer(mut self, name: impl Into<String>) -> Self {
        self.serializer = Some(name.into());
        self
    }

    /// Persister name
    #[must_use]
    pub fn persister(mut self, name: impl Into<String>) -> Self {
        self.persister = Some(name.into());
        self
    }

    /// Add one tag
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.get_or_insert_with(Vec::new).push(tag.into());
        self
    }

    /// Replace the tag set
    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Serve used interactions again once the pool is drained
    #[must_use]
    pub fn allow_playback_repeats(mut self, allow: bool) -> Self {
        self.allow_playback_repeats = Some(allow);
        self
    }

    /// Do not read through to enclosing cassettes
    #[must_use]
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = Some(exclusive);
        self
    }

    /// Skip the unused-interaction check on eject
    #[must_use]
    pub fn allow_unused_http_interactions(mut self, allow: bool) -> Self {
        self.allow_unused_http_interactions = Some(allow);
        self
    }

    /// Re-record once the oldest interaction is older than `interval`
    #[must_use]
    pub fn re_record_interval(mut self, interval: Duration) -> Self {
        self.re_record_interval = Some(interval);
        self
    }

    /// Store bodies base64-encoded
    #[must_use]
    pub fn preserve_exact_body_bytes(mut self, preserve: bool) -> Self {
        self.preserve_exact_body_bytes = Some(preserve);
        self
    }

    /// Rewrite `Content-Length` of played back responses
    #[must_use]
    pub fn update_content_length_header(mut self, update: bool) -> Self {
        self.update_content_length_header = Some(update);
        self
    }

    /// Persist new interactions even when the code using the cassette failed
    #[must_use]
    pub fn record_on_error(mut self, record: bool) -> Self {
        self.record_on_error = Some(record);
        self
    }

    /// Drop interactions older than the re-record interval when persisting
    #[must_use]
    pub fn clean_outdated_http_interactions(mut self, clean: bool) -> Self {
        self.clean_outdated_http_interactions = Some(clean);
        self
    }

    pub(crate) fn resolve(self, defaults: &CassetteDefaults) -> ResolvedOptions {
        ResolvedOptions {
            record: self.record.unwrap_or(defaults.record),
            match_requests_on: self.match_requests_on.unwrap_or_else(|| {
                defaults
                    .match_requests_on
                    .iter()
                    .map(|name| MatchAttribute::Name(name.clone()))
                    .collect()
            }),
            serializer: self.serializer.unwrap_or_else(|| defaults.serializer.clone()),
            persister: self.persister.unwrap_or_else(|| defaults.persister.clone()),
            tags: self.tags.unwrap_or_else(|| defaults.tags.clone()),
            allow_playback_repeats: self
                .allow_playback_repeats
                .unwrap_or(defaults.allow_playback_repeats),
            exclusive: self.exclusive.unwrap_or(defaults.exclusive),
            allow_unused_http_interactions: self
                .allow_unused_http_interactions
                .unwrap_or(defaults.allow_unused_http_interactions),
            re_record_interval: self
                .re_record_interval
                .or_else(|| defaults.re_record_interval_secs.map(Duration::from_secs)),
            preserve_exact_body_bytes: self
                .preserve_exact_body_bytes
                .unwrap_or(defaults.preserve_exact_body_bytes),
            update_content_length_header: self
                .update_content_length_header
                .unwrap_or(defaults.update_content_length_header),
            record_on_error: self.record_on_error.unwrap_or(defaults.record_on_error),
            clean_outdated_http_interactions: self
                .clean_outdated_http_interactions
                .unwrap_or(defaults.clean_outdated_http_interactions),
        }
    }
}

/// Options with defaults applied
#[derive(Debug, Clone)]
pub(crate) struct ResolvedOptions {
    pub record: RecordMode,
    pub match_requests_on: Vec<MatchAttribute>,
    pub serializer: String,
    pub persister: String,
    pub tags: Vec<String>,
    pub allow_playback_repeats: bool,
    pub exclusive: bool,
    pub allow_unused_http_interactions: bool,
    pub re_record_interval: Option<Duration>,
    pub preserve_exact_body_bytes: bool,
    pub update_content_length_header: bool,
    pub record_on_error: bool,
    pub clean_outdated_http_interactions: bool,
}

/// Options for ejecting a cassette
#[derive(Debug, Clone, Copy, Default)]
pub struct EjectOptions {
    /// Do not fail on interactions that were never played back
    pub skip_no_unused_interactions_assertion: bool,
    /// The code using the cassette failed; suppresses the unused check and,
    /// unless `record_on_error` is set, persistence
    pub run_failed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_options_fall_back_to_defaults() {
        let defaults = CassetteDefaults {
            record: RecordMode::NewEpisodes,
            tags: vec!["default".to_string()],
            re_record_interval_secs: Some(60),
            ..CassetteDefaults::default()
        };
        let resolved = CassetteOptions::new().resolve(&defaults);
        assert_eq!(resolved.record, RecordMode::NewEpisodes);
        assert_eq!(resolved.serializer, "yaml");
        assert_eq!(resolved.persister, "file_system");
        assert_eq!(resolved.tags, vec!["default"]);
        assert_eq!(resolved.re_record_interval, Some(Duration::from_secs(60)));
        assert!(resolved.allow_unused_http_interactions);
        assert!(resolved.record_on_error);
        assert_eq!(resolved.match_requests_on.len(), 2);
    }

    #[test]
    fn test_explicit_options_win() {
        let resolved = CassetteOptions::new()
            .record(RecordMode::None)
            .serializer("json")
            .tag("a")
            .tag("b")
            .match_requests_on(["method", "host", "path"])
            .allow_unused_http_interactions(false)
            .re_record_interval(Duration::from_secs(5))
            .resolve(&CassetteDefaults::default());
        assert_eq!(resolved.record, RecordMode::None);
        assert_eq!(resolved.serializer, "json");
        assert_eq!(resolved.tags, vec!["a", "b"]);
        assert_eq!(resolved.match_requests_on.len(), 3);
        assert!(!resolved.allow_unused_http_interactions);
        assert_eq!(resolved.re_record_interval, Some(Duration::from_secs(5)));
    }
}
