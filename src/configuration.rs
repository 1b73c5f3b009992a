//! Runtime configuration shared by every cassette on a stack

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::cassette::CassetteInfo;
use crate::config::{CassetteDefaults, Config};
use crate::hooks::Hooks;
use crate::http::{HookAwareInteraction, HttpInteraction, Request};
use crate::matching::RequestMatcherRegistry;
use crate::persisters::{FileSystemPersister, PersisterRegistry, FILE_SYSTEM};
use crate::probe::{ConnectivityProbe, TcpConnectivityProbe};
use crate::request_handler::RequestIgnorer;
use crate::serializers::SerializerRegistry;
use crate::Result;

/// Registries, hooks and ignore rules built from a [`Config`]
pub struct Configuration {
    config: Config,
    request_matchers: RequestMatcherRegistry,
    serializers: SerializerRegistry,
    persisters: PersisterRegistry,
    hooks: Hooks,
    request_ignorer: RequestIgnorer,
    connectivity_probe: Arc<dyn ConnectivityProbe>,
}

impl Configuration {
    /// Build the runtime state for `config`
    #[must_use]
    pub fn new(config: Config) -> Self {
        let mut request_ignorer = RequestIgnorer::new();
        request_ignorer.ignore_hosts(config.ignore_hosts.iter().cloned());
        request_ignorer.set_ignore_localhost(config.ignore_localhost);

        Self {
            persisters: PersisterRegistry::new(&config.cassette_library_dir),
            request_matchers: RequestMatcherRegistry::new(),
            serializers: SerializerRegistry::new(),
            hooks: Hooks::new(),
            request_ignorer,
            connectivity_probe: Arc::new(TcpConnectivityProbe::default()),
            config,
        }
    }

    /// Load a TOML file and build the runtime state from it
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated
    pub fn from_file(path: &Path) -> Result<Self> {
        Config::from_file(path).map(Self::new)
    }

    /// File-level settings
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory the file system persister writes to
    #[must_use]
    pub fn cassette_library_dir(&self) -> &Path {
        &self.config.cassette_library_dir
    }

    /// Point the file system persister at another directory
    pub fn set_cassette_library_dir(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        debug!("Cassette library dir set to {}", dir.display());
        self.persisters.register(FILE_SYSTEM, FileSystemPersister::new(&dir));
        self.config.cassette_library_dir = dir;
    }

    /// Options applied to cassettes unless overridden on insert
    #[must_use]
    pub fn default_cassette_options(&self) -> &CassetteDefaults {
        &self.config.default_cassette_options
    }

    /// Mutable access to the default cassette options
    pub fn default_cassette_options_mut(&mut self) -> &mut CassetteDefaults {
        &mut self.config.default_cassette_options
    }

    /// Whether real requests may go out while no cassette is inserted
    #[must_use]
    pub fn allow_http_connections_when_no_cassette(&self) -> bool {
        self.config.allow_http_connections_when_no_cassette
    }

    /// Permit or forbid real requests while no cassette is inserted
    pub fn set_allow_http_connections_when_no_cassette(&mut self, allow: bool) {
        self.config.allow_http_connections_when_no_cassette = allow;
    }

    /// Matcher registry
    #[must_use]
    pub fn request_matchers(&self) -> &RequestMatcherRegistry {
        &self.request_matchers
    }

    /// Mutable matcher registry, for registering custom matchers
    pub fn request_matchers_mut(&mut self) -> &mut RequestMatcherRegistry {
        &mut self.request_matchers
    }

    /// Serializer registry
    #[must_use]
    pub fn serializers(&self) -> &SerializerRegistry {
        &self.serializers
    }

    /// Mutable serializer registry
    pub fn serializers_mut(&mut self) -> &mut SerializerRegistry {
        &mut self.serializers
    }

    /// Persister registry
    #[must_use]
    pub fn persisters(&self) -> &PersisterRegistry {
        &self.persisters
    }

    /// Mutable persister registry
    pub fn persisters_mut(&mut self) -> &mut PersisterRegistry {
        &mut self.persisters
    }

    /// Registered hooks
    #[must_use]
    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Mutable hooks
    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Register a before-record hook
    pub fn before_record<F>(&mut self, tag: Option<&str>, callback: F)
    where
        F: Fn(&mut HookAwareInteraction<'_>, &CassetteInfo) + Send + Sync + 'static,
    {
        self.hooks.before_record(tag, callback);
    }

    /// Register a before-playback hook
    pub fn before_playback<F>(&mut self, tag: Option<&str>, callback: F)
    where
        F: Fn(&mut HookAwareInteraction<'_>, &CassetteInfo) + Send + Sync + 'static,
    {
        self.hooks.before_playback(tag, callback);
    }

    /// Keep `real` out of persisted cassettes by storing `placeholder` instead
    pub fn filter_sensitive_data<F>(&mut self, placeholder: &str, tag: Option<&str>, real: F)
    where
        F: Fn(&HttpInteraction) -> String + Send + Sync + 'static,
    {
        self.hooks.filter_sensitive_data(placeholder, tag, real);
    }

    /// Request ignore rules
    #[must_use]
    pub fn request_ignorer(&self) -> &RequestIgnorer {
        &self.request_ignorer
    }

    /// Mutable request ignore rules
    pub fn request_ignorer_mut(&mut self) -> &mut RequestIgnorer {
        &mut self.request_ignorer
    }

    /// Never record nor stub requests to these hosts
    pub fn ignore_hosts<I, S>(&mut self, hosts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let hosts: Vec<String> = hosts.into_iter().map(Into::into).collect();
        self.request_ignorer.ignore_hosts(hosts.iter().cloned());
        self.config.ignore_hosts.extend(hosts);
    }

    /// Ignore or stop ignoring localhost requests
    pub fn ignore_localhost(&mut self, ignore: bool) {
        self.request_ignorer.set_ignore_localhost(ignore);
        self.config.ignore_localhost = ignore;
    }

    /// Ignore every request `predicate` accepts
    pub fn ignore_request<F>(&mut self, predicate: F)
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.request_ignorer.ignore_request(predicate);
    }

    /// Probe used before forcing a re-record
    #[must_use]
    pub fn connectivity_probe(&self) -> &dyn ConnectivityProbe {
        self.connectivity_probe.as_ref()
    }

    /// Replace the connectivity probe
    pub fn set_connectivity_probe(&mut self, probe: impl ConnectivityProbe + 'static) {
        self.connectivity_probe = Arc::new(probe);
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("config", &self.config)
            .field("request_matchers", &self.request_matchers)
            .field("serializers", &self.serializers)
            .field("persisters", &self.persisters)
            .field("hooks", &self.hooks)
            .field("request_ignorer", &self.request_ignorer)
            .finish_non_exhaustive()
    }
}
