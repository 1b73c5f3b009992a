//! Cassettes: a named interaction log plus its record-mode policy
//!
//! Inserting a cassette loads the persisted interactions, runs the
//! before-playback hooks over them and builds the playback list. Ejecting it
//! merges what was recorded with what was loaded, runs the before-record hooks
//! and writes the result through the configured serializer and persister.

mod options;

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::RecordMode;
use crate::configuration::Configuration;
use crate::hooks::HookKind;
use crate::http::HttpInteraction;
use crate::matching::{conjunctive_match, Matcher};
use crate::persisters::{sanitize_file_name, Persister};
use crate::playback::{HttpInteractionList, NullList, SharedSource};
use crate::probe::ConnectivityProbe;
use crate::serializers::{CassetteDocument, Serializer};
use crate::Result;

pub use options::{CassetteOptions, EjectOptions};

/// What hooks get to see of the cassette they run for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CassetteInfo {
    /// Cassette name
    pub name: String,
    /// Effective record mode
    pub record_mode: RecordMode,
    /// Tags scoping hooks
    pub tags: Vec<String>,
}

/// An inserted cassette
pub struct Cassette {
    name: String,
    record_mode: RecordMode,
    tags: Vec<String>,
    request_matchers: Vec<Matcher>,
    serializer: Arc<dyn Serializer>,
    persister: Arc<dyn Persister>,
    storage_key: String,
    exclusive: bool,
    allow_unused_http_interactions: bool,
    re_record_interval: Option<Duration>,
    preserve_exact_body_bytes: bool,
    record_on_error: bool,
    clean_outdated_http_interactions: bool,
    had_content: bool,
    originally_recorded_at: Option<DateTime<Utc>>,
    previously_recorded_interactions: Vec<HttpInteraction>,
    http_interactions: Arc<Mutex<HttpInteractionList>>,
    new_recorded_interactions: Vec<HttpInteraction>,
}

impl Cassette {
    /// Load a cassette and build its playback list
    ///
    /// `parent` is the playback list of the enclosing cassette; it is
    /// disregarded for exclusive cassettes.
    ///
    /// # Errors
    ///
    /// Returns error if a matcher, serializer or persister is not registered,
    /// or if the persisted cassette cannot be read or decoded
    pub fn load(
        name: &str,
        options: CassetteOptions,
        configuration: &Configuration,
        parent: SharedSource,
    ) -> Result<Self> {
        let options = options.resolve(configuration.default_cassette_options());
        let request_matchers = configuration
            .request_matchers()
            .resolve(&options.match_requests_on)?;
        let serializer = configuration.serializers().get(&options.serializer)?;
        let persister = configuration.persisters().get(&options.persister)?;
        let storage_key = format!(
            "{}.{}",
            sanitize_file_name(name),
            serializer.file_extension()
        );

        let raw = persister.read(&storage_key)?.unwrap_or_default();
        let had_content = !raw.is_empty();
        let recorded = if had_content {
            serializer.deserialize(&raw)?.into_interactions()?
        } else {
            Vec::new()
        };
        let originally_recorded_at = recorded.iter().map(|i| i.recorded_at).min();

        let record_mode = if should_re_record(
            options.record,
            options.re_record_interval,
            &recorded,
            configuration.connectivity_probe(),
        ) {
            info!("Re-recording cassette {} (recorded {:?})", name, originally_recorded_at);
            RecordMode::All
        } else {
            options.record
        };

        let info = CassetteInfo {
            name: name.to_string(),
            record_mode,
            tags: options.tags.clone(),
        };
        let ignorer = configuration.request_ignorer();
        let mut previously_recorded_interactions = configuration
            .hooks()
            .filter_interactions(HookKind::BeforePlayback, recorded, &info);
        previously_recorded_interactions.retain(|i| !ignorer.is_ignored(&i.request));

        let playback = if record_mode == RecordMode::All {
            Vec::new()
        } else {
            let mut playback = previously_recorded_interactions.clone();
            if options.update_content_length_header {
                for interaction in &mut playback {
                    interaction.response.update_content_length_header();
                }
            }
            playback
        };

        let parent = if options.exclusive {
            NullList::shared()
        } else {
            parent
        };
        let http_interactions = HttpInteractionList::with_parent(
            playback,
            request_matchers.clone(),
            options.allow_playback_repeats,
            parent,
        );

        debug!(
            "Loaded cassette {} from {}: {} interaction(s), record mode {}",
            name,
            storage_key,
            previously_recorded_interactions.len(),
            record_mode
        );

        Ok(Self {
            name: info.name,
            record_mode,
            tags: info.tags,
            request_matchers,
            serializer,
            persister,
            storage_key,
            exclusive: options.exclusive,
            allow_unused_http_interactions: options.allow_unused_http_interactions,
            re_record_interval: options.re_record_interval,
            preserve_exact_body_bytes: options.preserve_exact_body_bytes,
            record_on_error: options.record_on_error,
            clean_outdated_http_interactions: options.clean_outdated_http_interactions,
            had_content,
            originally_recorded_at,
            previously_recorded_interactions,
            http_interactions: Arc::new(Mutex::new(http_interactions)),
            new_recorded_interactions: Vec::new(),
        })
    }

    /// Cassette name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective record mode, after any forced re-record
    #[must_use]
    pub fn record_mode(&self) -> RecordMode {
        self.record_mode
    }

    /// Tags scoping hooks
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Whether this cassette ignores enclosing cassettes
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Storage key: sanitized name plus serializer extension
    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Snapshot handed to hooks
    #[must_use]
    pub fn info(&self) -> CassetteInfo {
        CassetteInfo {
            name: self.name.clone(),
            record_mode: self.record_mode,
            tags: self.tags.clone(),
        }
    }

    /// Whether real requests are allowed and get recorded
    #[must_use]
    pub fn recording(&self) -> bool {
        match self.record_mode {
            RecordMode::All | RecordMode::NewEpisodes => true,
            RecordMode::Once => !self.had_content,
            RecordMode::None => false,
        }
    }

    /// Location of the cassette file, for persisters backed by files
    #[must_use]
    pub fn file_path(&self) -> Option<PathBuf> {
        self.persister.absolute_path_to_file(&self.storage_key)
    }

    /// Timestamp of the oldest persisted interaction
    #[must_use]
    pub fn originally_recorded_at(&self) -> Option<DateTime<Utc>> {
        self.originally_recorded_at
    }

    /// Playback list of this cassette
    pub fn http_interactions(&self) -> MutexGuard<'_, HttpInteractionList> {
        self.http_interactions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Playback list as a read-through parent for nested cassettes
    #[must_use]
    pub fn shared_http_interactions(&self) -> SharedSource {
        self.http_interactions.clone()
    }

    /// Interactions loaded at insert, after before-playback hooks
    #[must_use]
    pub fn previously_recorded_interactions(&self) -> &[HttpInteraction] {
        &self.previously_recorded_interactions
    }

    /// Interactions recorded since insert
    #[must_use]
    pub fn new_recorded_interactions(&self) -> &[HttpInteraction] {
        &self.new_recorded_interactions
    }

    /// Buffer a realized exchange for persistence on eject
    ///
    /// Requests matched by the ignore rules are dropped.
    pub fn record_http_interaction(
        &mut self,
        interaction: HttpInteraction,
        configuration: &Configuration,
    ) {
        if configuration
            .request_ignorer()
            .is_ignored(&interaction.request)
        {
            debug!(
                "Not recording ignored request {} {}",
                interaction.request.method, interaction.request.uri
            );
            return;
        }
        debug!(
            "Recorded interaction on cassette {}: {}",
            self.name,
            interaction.summary()
        );
        self.new_recorded_interactions.push(interaction);
    }

    /// Persist recorded interactions and check for unused ones
    ///
    /// # Errors
    ///
    /// Returns error if persisting fails, or `UnusedHttpInteractions` when
    /// the strict check applies and interactions were never played back
    pub fn eject(&mut self, options: EjectOptions, configuration: &Configuration) -> Result<()> {
        if !options.run_failed || self.record_on_error {
            self.write_recorded_interactions(configuration)?;
        } else {
            warn!(
                "Not persisting {} new interaction(s) of cassette {}: the run failed",
                self.new_recorded_interactions.len(),
                self.name
            );
        }

        if self.should_assert_no_unused_interactions(options) {
            self.http_interactions()
                .assert_no_unused_interactions(&self.name)?;
        }
        Ok(())
    }

    fn should_assert_no_unused_interactions(&self, options: EjectOptions) -> bool {
        !(options.skip_no_unused_interactions_assertion
            || self.allow_unused_http_interactions
            || options.run_failed
            || std::thread::panicking())
    }

    fn write_recorded_interactions(&self, configuration: &Configuration) -> Result<()> {
        if self.new_recorded_interactions.is_empty() && !self.clean_outdated_http_interactions {
            return Ok(());
        }

        let interactions = configuration.hooks().filter_interactions(
            HookKind::BeforeRecord,
            self.merged_interactions(),
            &self.info(),
        );
        if interactions.is_empty() {
            debug!("Nothing to persist for cassette {}", self.name);
            return Ok(());
        }

        let document =
            CassetteDocument::from_interactions(&interactions, self.preserve_exact_body_bytes);
        let bytes = self.serializer.serialize(&document)?;
        self.persister.write(&self.storage_key, &bytes)?;
        info!(
            "Persisted {} interaction(s) of cassette {} to {}",
            interactions.len(),
            self.name,
            self.storage_key
        );
        Ok(())
    }

    fn merged_interactions(&self) -> Vec<HttpInteraction> {
        let mut old = self.previously_recorded_interactions.clone();

        if self.record_mode == RecordMode::All {
            old.retain(|previous| {
                !self.new_recorded_interactions.iter().any(|new| {
                    conjunctive_match(&new.request, &previous.request, &self.request_matchers)
                })
            });
        }

        if self.clean_outdated_http_interactions {
            if let Some(cutoff) = self.re_record_interval.and_then(cutoff) {
                old.retain(|previous| previous.recorded_at > cutoff);
            }
        }

        old.extend(self.new_recorded_interactions.iter().cloned());
        old
    }
}

impl fmt::Debug for Cassette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cassette")
            .field("name", &self.name)
            .field("record_mode", &self.record_mode)
            .field("tags", &self.tags)
            .field("storage_key", &self.storage_key)
            .field("new_recorded_interactions", &self.new_recorded_interactions.len())
            .finish_non_exhaustive()
    }
}

fn cutoff(interval: Duration) -> Option<DateTime<Utc>> {
    let interval = chrono::Duration::from_std(interval).ok()?;
    Utc::now().checked_sub_signed(interval)
}

fn should_re_record(
    mode: RecordMode,
    interval: Option<Duration>,
    recorded: &[HttpInteraction],
    probe: &dyn ConnectivityProbe,
) -> bool {
    if mode == RecordMode::None {
        return false;
    }
    let Some(cutoff) = interval.and_then(cutoff) else {
        return false;
    };
    let Some(earliest) = recorded.iter().min_by_key(|i| i.recorded_at) else {
        return false;
    };
    if earliest.recorded_at >= cutoff {
        return false;
    }

    let reachable = probe.is_reachable(&earliest.request.uri);
    if !reachable {
        info!("Not re-recording: {} is unreachable", earliest.request.uri);
    }
    reachable
}
