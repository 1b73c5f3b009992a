//! Hooks run on interactions crossing the record/playback boundary

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::cassette::CassetteInfo;
use crate::http::{HookAwareInteraction, HttpInteraction};

/// Point at which a hook fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Before interactions are written to storage
    BeforeRecord,
    /// After interactions are loaded, before they are played back
    BeforePlayback,
}

/// Hook callback
pub type HookFn = Arc<dyn Fn(&mut HookAwareInteraction<'_>, &CassetteInfo) + Send + Sync>;

#[derive(Clone)]
struct Registration {
    tag: Option<String>,
    callback: HookFn,
}

/// Ordered hook registrations per kind
#[derive(Clone, Default)]
pub struct Hooks {
    before_record: Vec<Registration>,
    before_playback: Vec<Registration>,
}

impl Hooks {
    /// Empty hook set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook; with a tag it only fires for cassettes carrying that tag
    pub fn register<F>(&mut self, kind: HookKind, tag: Option<&str>, callback: F)
    where
        F: Fn(&mut HookAwareInteraction<'_>, &CassetteInfo) + Send + Sync + 'static,
    {
        let registration = Registration {
            tag: tag.map(str::to_string),
            callback: Arc::new(callback),
        };
        self.registrations_mut(kind).push(registration);
    }

    /// Register a before-record hook
    pub fn before_record<F>(&mut self, tag: Option<&str>, callback: F)
    where
        F: Fn(&mut HookAwareInteraction<'_>, &CassetteInfo) + Send + Sync + 'static,
    {
        self.register(HookKind::BeforeRecord, tag, callback);
    }

    /// Register a before-playback hook
    pub fn before_playback<F>(&mut self, tag: Option<&str>, callback: F)
    where
        F: Fn(&mut HookAwareInteraction<'_>, &CassetteInfo) + Send + Sync + 'static,
    {
        self.register(HookKind::BeforePlayback, tag, callback);
    }

    /// Replace `real` with `placeholder` when recording, and back on playback
    ///
    /// `real` is evaluated each time the hook runs.
    pub fn filter_sensitive_data<F>(&mut self, placeholder: &str, tag: Option<&str>, real: F)
    where
        F: Fn(&HttpInteraction) -> String + Send + Sync + 'static,
    {
        let real = Arc::new(real);

        let to_placeholder = placeholder.to_string();
        let real_for_record = Arc::clone(&real);
        self.before_record(tag, move |interaction, _cassette| {
            let value = real_for_record(&**interaction);
            interaction.filter(&value, &to_placeholder);
        });

        let from_placeholder = placeholder.to_string();
        self.before_playback(tag, move |interaction, _cassette| {
            let value = real(&**interaction);
            interaction.filter(&from_placeholder, &value);
        });
    }

    /// Run every applicable hook of `kind` against `interaction`, in registration order
    pub fn invoke(
        &self,
        kind: HookKind,
        interaction: &mut HookAwareInteraction<'_>,
        cassette: &CassetteInfo,
    ) {
        for registration in self.registrations(kind) {
            let applies = registration
                .tag
                .as_ref()
                .map_or(true, |tag| cassette.tags.contains(tag));
            if applies {
                (registration.callback)(interaction, cassette);
            }
        }
    }

    /// Run hooks over a batch and keep the interactions no hook ignored
    pub fn filter_interactions(
        &self,
        kind: HookKind,
        interactions: Vec<HttpInteraction>,
        cassette: &CassetteInfo,
    ) -> Vec<HttpInteraction> {
        if self.registrations(kind).is_empty() {
            return interactions;
        }

        let before = interactions.len();
        let kept: Vec<HttpInteraction> = interactions
            .into_iter()
            .filter_map(|mut interaction| {
                let mut hooked = HookAwareInteraction::new(&mut interaction);
                self.invoke(kind, &mut hooked, cassette);
                let ignored = hooked.is_ignored();
                (!ignored).then_some(interaction)
            })
            .collect();

        if kept.len() != before {
            debug!(
                "{:?} hooks ignored {} interaction(s) for cassette {}",
                kind,
                before - kept.len(),
                cassette.name
            );
        }
        kept
    }

    fn registrations(&self, kind: HookKind) -> &[Registration] {
        match kind {
            HookKind::BeforeRecord => &self.before_record,
            HookKind::BeforePlayback => &self.before_playback,
        }
    }

    fn registrations_mut(&mut self, kind: HookKind) -> &mut Vec<Registration> {
        match kind {
            HookKind::BeforeRecord => &mut self.before_record,
            HookKind::BeforePlayback => &mut self.before_playback,
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_record", &self.before_record.len())
            .field("before_playback", &self.before_playback.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::config::RecordMode;
    use crate::http::{Method, Request, Response, ResponseStatus};

    fn info(tags: &[&str]) -> CassetteInfo {
        CassetteInfo {
            name: "hooks".to_string(),
            record_mode: RecordMode::Once,
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    fn interaction(uri: &str) -> HttpInteraction {
        HttpInteraction::new(
            Request::new(Method::Get, uri),
            Response::new(ResponseStatus::new(200, "OK")).with_body("api_key=s3cr3t"),
        )
    }

    #[test]
    fn test_tagged_hook_only_fires_for_tagged_cassette() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut hooks = Hooks::new();
        let counter = Arc::clone(&calls);
        hooks.before_record(Some("secret"), move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut recorded = interaction("http://a.com/");
        hooks.invoke(
            HookKind::BeforeRecord,
            &mut HookAwareInteraction::new(&mut recorded),
            &info(&[]),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        hooks.invoke(
            HookKind::BeforeRecord,
            &mut HookAwareInteraction::new(&mut recorded),
            &info(&["secret"]),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let mut hooks = Hooks::new();
        hooks.before_record(None, |i, _| i.filter("s3cr3t", "first"));
        hooks.before_record(None, |i, _| i.filter("first", "second"));

        let kept = hooks.filter_interactions(
            HookKind::BeforeRecord,
            vec![interaction("http://a.com/")],
            &info(&[]),
        );
        assert_eq!(kept[0].response.body.as_str(), Some("api_key=second"));
    }

    #[test]
    fn test_ignored_interactions_are_dropped() {
        let mut hooks = Hooks::new();
        hooks.before_playback(None, |i, _| {
            if i.request.uri.contains("/skip") {
                i.ignore();
            }
        });

        let kept = hooks.filter_interactions(
            HookKind::BeforePlayback,
            vec![interaction("http://a.com/keep"), interaction("http://a.com/skip")],
            &info(&[]),
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].request.uri, "http://a.com:80/keep");
    }

    #[test]
    fn test_filter_sensitive_data_round_trips() {
        let mut hooks = Hooks::new();
        hooks.filter_sensitive_data("<API_KEY>", None, |_| "s3cr3t".to_string());

        let original = interaction("http://a.com/");
        let recorded = hooks.filter_interactions(
            HookKind::BeforeRecord,
            vec![original.clone()],
            &info(&[]),
        );
        assert_eq!(recorded[0].response.body.as_str(), Some("api_key=<API_KEY>"));

        let played = hooks.filter_interactions(HookKind::BeforePlayback, recorded, &info(&[]));
        assert_eq!(played[0], original);
    }
}
