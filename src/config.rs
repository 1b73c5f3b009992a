//! Configuration types for Tapedeck

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Result, TapedeckError};

/// Record mode of a cassette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordMode {
    /// Record every request, replacing previously recorded matches
    All,
    /// Replay only, never allow real requests
    None,
    /// Record only while the cassette file does not exist yet
    #[default]
    Once,
    /// Replay what exists and record anything new
    NewEpisodes,
}

impl RecordMode {
    /// Name used in configuration files and messages
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::None => "none",
            Self::Once => "once",
            Self::NewEpisodes => "new_episodes",
        }
    }
}

impl fmt::Display for RecordMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default per-cassette options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CassetteDefaults {
    /// Record mode
    pub record: RecordMode,
    /// Names of the matchers deciding request equality
    pub match_requests_on: Vec<String>,
    /// Serializer name
    pub serializer: String,
    /// Persister name
    pub persister: String,
    /// Tags scoping hooks
    pub tags: Vec<String>,
    /// Serve already-used interactions again once the pool is drained
    pub allow_playback_repeats: bool,
    /// Do not read through to enclosing cassettes
    pub exclusive: bool,
    /// Skip the unused-interaction check on eject
    pub allow_unused_http_interactions: bool,
    /// Re-record a cassette whose oldest interaction is older than this
    pub re_record_interval_secs: Option<u64>,
    /// Always store bodies base64-encoded
    pub preserve_exact_body_bytes: bool,
    /// Rewrite `Content-Length` of played back responses
    pub update_content_length_header: bool,
    /// Persist new interactions even when the cassette body failed
    pub record_on_error: bool,
    /// Drop interactions older than the re-record interval when persisting
    pub clean_outdated_http_interactions: bool,
}

impl Default for CassetteDefaults {
    fn default() -> Self {
        Self {
            record: RecordMode::Once,
            match_requests_on: vec!["method".to_string(), "uri".to_string()],
            serializer: "yaml".to_string(),
            persister: "file_system".to_string(),
            tags: Vec::new(),
            allow_playback_repeats: false,
            exclusive: false,
            allow_unused_http_interactions: true,
            re_record_interval_secs: None,
            preserve_exact_body_bytes: false,
            update_content_length_header: false,
            record_on_error: true,
            clean_outdated_http_interactions: false,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory the file system persister stores cassettes in
    pub cassette_library_dir: PathBuf,
    /// Permit real requests while no cassette is inserted
    #[serde(default)]
    pub allow_http_connections_when_no_cassette: bool,
    /// Hosts whose requests are never recorded nor stubbed
    #[serde(default)]
    pub ignore_hosts: Vec<String>,
    /// Ignore requests to localhost addresses
    #[serde(default)]
    pub ignore_localhost: bool,
    /// Options applied to every inserted cassette
    #[serde(default)]
    pub default_cassette_options: CassetteDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cassette_library_dir: PathBuf::from("fixtures/cassettes"),
            allow_http_connections_when_no_cassette: false,
            ignore_hosts: Vec::new(),
            ignore_localhost: false,
            default_cassette_options: CassetteDefaults::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TapedeckError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| TapedeckError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.cassette_library_dir.as_os_str().is_empty() {
            return Err(TapedeckError::ConfigError(
                "cassette_library_dir cannot be empty".to_string(),
            ));
        }

        let defaults = &self.default_cassette_options;

        if defaults.match_requests_on.is_empty() {
            return Err(TapedeckError::ConfigError(
                "match_requests_on must name at least one matcher".to_string(),
            ));
        }

        if defaults.serializer.is_empty() {
            return Err(TapedeckError::ConfigError(
                "serializer cannot be empty".to_string(),
            ));
        }

        if defaults.persister.is_empty() {
            return Err(TapedeckError::ConfigError(
                "persister cannot be empty".to_string(),
            ));
        }

        if defaults.re_record_interval_secs == Some(0) {
            return Err(TapedeckError::ConfigError(
                "re_record_interval_secs must be > 0".to_string(),
            ));
        }

        for (i, host) in self.ignore_hosts.iter().enumerate() {
            if host.trim().is_empty() {
                return Err(TapedeckError::ConfigError(format!(
                    "ignore_hosts[{i}] cannot be empty"
                )));
            }
        }

        Ok(())
    }
}
