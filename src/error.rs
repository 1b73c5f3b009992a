//! Error types for Tapedeck

use std::io;
use thiserror::Error;

use crate::config::RecordMode;

/// Result type for Tapedeck operations
pub type Result<T> = std::result::Result<T, TapedeckError>;

/// Errors that can occur in Tapedeck
#[derive(Debug, Error)]
pub enum TapedeckError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A cassette with the same name is already on the stack
    #[error("There is already a cassette with the same name ({name}). You cannot nest multiple cassettes with the same name.")]
    CassetteInUse {
        /// Name of the duplicated cassette
        name: String,
    },

    /// Insertion attempted while the engine is turned off
    #[error("Tapedeck is turned off. You must turn it on before you can insert a cassette ({name}), or turn it off with `ignore_cassettes` set.")]
    TurnedOff {
        /// Name of the cassette that was being inserted
        name: String,
    },

    /// Turning the engine off while a cassette is inserted
    #[error("A cassette ({name}) is currently inserted. You must eject it before turning Tapedeck off.")]
    CassetteInserted {
        /// Name of the inserted cassette
        name: String,
    },

    /// Unknown request matcher name
    #[error("There is no matcher registered for {name:?}. Registered matchers: {}", .registered.join(", "))]
    UnregisteredMatcher {
        /// Requested matcher name
        name: String,
        /// Currently registered matcher names
        registered: Vec<String>,
    },

    /// Unknown serializer name
    #[error("The requested serializer ({name:?}) is not registered. Registered serializers: {}", .registered.join(", "))]
    UnregisteredSerializer {
        /// Requested serializer name
        name: String,
        /// Currently registered serializer names
        registered: Vec<String>,
    },

    /// Unknown persister name
    #[error("The requested persister ({name:?}) is not registered. Registered persisters: {}", .registered.join(", "))]
    UnregisteredPersister {
        /// Requested persister name
        name: String,
        /// Currently registered persister names
        registered: Vec<String>,
    },

    /// Persisted bytes use a superseded or unreadable shape
    #[error("Invalid cassette format: {0}")]
    InvalidCassetteFormat(String),

    /// Strict eject found interactions that were never played back
    #[error("There are unused HTTP interactions left in the cassette ({cassette}):\n{}", .interactions.join("\n"))]
    UnusedHttpInteractions {
        /// Cassette name
        cassette: String,
        /// One summary line per unused interaction
        interactions: Vec<String>,
    },

    /// A request could not be stubbed and real connections are disallowed
    #[error("{}", unhandled_message(.method, .uri, .cassette.as_ref(), .remaining_unused))]
    UnhandledHttpRequest {
        /// Request method
        method: String,
        /// Request URI
        uri: String,
        /// Active cassette name and effective record mode, if any
        cassette: Option<(String, RecordMode)>,
        /// Unused interactions remaining in the active cassette
        remaining_unused: usize,
    },

    /// Encoding or decoding a cassette document failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

fn unhandled_message(
    method: &str,
    uri: &str,
    cassette: Option<&(String, RecordMode)>,
    remaining_unused: &usize,
) -> String {
    let mut message = format!(
        "An HTTP request has been made that Tapedeck does not know how to handle:\n  {} {uri}\n",
        method.to_uppercase()
    );
    match cassette {
        Some((name, mode)) => {
            message.push_str(&format!(
                "\nThe current cassette ({name}) has record mode {mode}, which does not allow new requests to be recorded."
            ));
            message.push_str(&format!(
                "\nThe cassette has {remaining_unused} unused interaction(s) left."
            ));
            message.push_str(
                "\nUse a different record mode, adjust match_requests_on, or re-record the cassette.",
            );
        }
        None => {
            message.push_str(
                "\nThere is currently no cassette inserted. Insert a cassette to record this request, or ignore it.",
            );
        }
    }
    message
}
