//! Tapedeck - record HTTP interactions once, replay them deterministically
//!
//! Interactions are grouped in named cassettes. A [`CassetteStack`] decides for
//! every outgoing request whether it is served from a cassette, performed for
//! real and recorded, or rejected, according to each cassette's record mode.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::multiple_crate_versions
)]

pub mod cassette;
pub mod config;
pub mod configuration;
pub mod error;
pub mod hooks;
pub mod http;
pub mod matching;
pub mod persisters;
pub mod playback;
pub mod probe;
pub mod request_handler;
pub mod serializers;
pub mod stack;

pub use cassette::{Cassette, CassetteInfo, CassetteOptions, EjectOptions};
pub use config::{CassetteDefaults, Config, RecordMode};
pub use configuration::Configuration;
pub use error::{Result, TapedeckError};
pub use http::{
    Body, HookAwareInteraction, HttpInteraction, Method, Request, Response, ResponseStatus,
};
pub use matching::{MatchAttribute, Matcher, RequestMatcherRegistry};
pub use playback::{HttpInteractionList, NullList, PlaybackSource};
pub use request_handler::{RequestHandler, RequestIgnorer, RequestType};
pub use stack::CassetteStack;
