//! The stack of inserted cassettes
//!
//! A [`CassetteStack`] owns its [`Configuration`] and the cassettes inserted
//! on it. The stack is ordinary mutable state; callers sharing one across
//! threads wrap insert, work and eject in a lock of their own.

use std::panic::{self, AssertUnwindSafe};

use tracing::{info, warn};

use crate::cassette::{Cassette, CassetteOptions, EjectOptions};
use crate::configuration::Configuration;
use crate::http::HttpInteraction;
use crate::playback::{NullList, SharedSource};
use crate::{Result, TapedeckError};

/// LIFO of inserted cassettes
#[derive(Debug, Default)]
pub struct CassetteStack {
    configuration: Configuration,
    cassettes: Vec<Cassette>,
    turned_off: bool,
    ignore_cassettes: bool,
}

impl CassetteStack {
    /// Empty stack using `configuration`
    #[must_use]
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            cassettes: Vec::new(),
            turned_off: false,
            ignore_cassettes: false,
        }
    }

    /// Shared configuration
    #[must_use]
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Mutable configuration
    pub fn configuration_mut(&mut self) -> &mut Configuration {
        &mut self.configuration
    }

    /// Insert a cassette on top of the stack
    ///
    /// Returns `None` when the engine is off and set to ignore cassettes.
    ///
    /// # Errors
    ///
    /// Returns `TurnedOff` when the engine is off, `CassetteInUse` when a
    /// cassette with the same name is already inserted, or any load error
    pub fn insert_cassette(
        &mut self,
        name: &str,
        options: CassetteOptions,
    ) -> Result<Option<&mut Cassette>> {
        if self.turned_off {
            if self.ignore_cassettes {
                info!("Tapedeck is turned off, ignoring cassette {}", name);
                return Ok(None);
            }
            return Err(TapedeckError::TurnedOff {
                name: name.to_string(),
            });
        }

        if self.cassettes.iter().any(|cassette| cassette.name() == name) {
            return Err(TapedeckError::CassetteInUse {
                name: name.to_string(),
            });
        }

        let cassette = Cassette::load(
            name,
            options,
            &self.configuration,
            self.http_interactions(),
        )?;
        info!(
            "Inserted cassette {} (record mode {}, depth {})",
            name,
            cassette.record_mode(),
            self.cassettes.len() + 1
        );
        self.cassettes.push(cassette);
        Ok(self.cassettes.last_mut())
    }

    /// Pop the top cassette and eject it
    ///
    /// The cassette is removed from the stack before anything else happens,
    /// so the previous cassette is current again even when ejecting fails.
    ///
    /// # Errors
    ///
    /// Returns error if persisting fails or the unused-interaction check fails
    pub fn eject_cassette(&mut self, options: EjectOptions) -> Result<Option<Cassette>> {
        let Some(mut cassette) = self.cassettes.pop() else {
            return Ok(None);
        };
        info!("Ejecting cassette {}", cassette.name());
        cassette.eject(options, &self.configuration)?;
        Ok(Some(cassette))
    }

    /// Insert a cassette, run `f`, and eject the cassette on every exit path
    ///
    /// The unused-interaction check is skipped when `f` fails or panics, and
    /// an eject error never replaces a failure of `f`.
    ///
    /// # Errors
    ///
    /// Returns the insert error, the error of `f`, or the eject error
    pub fn use_cassette<T, F>(&mut self, name: &str, options: CassetteOptions, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let inserted = self.insert_cassette(name, options)?.is_some();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *self)));
        if !inserted {
            return outcome.unwrap_or_else(|payload| panic::resume_unwind(payload));
        }

        let run_failed = !matches!(outcome, Ok(Ok(_)));
        let ejected = self.eject_cassette(EjectOptions {
            run_failed,
            ..EjectOptions::default()
        });

        match outcome {
            Ok(Ok(value)) => ejected.map(|_| value),
            Ok(Err(e)) => {
                if let Err(eject_error) = ejected {
                    warn!("Ejecting cassette {} failed after an error: {}", name, eject_error);
                }
                Err(e)
            }
            Err(payload) => {
                if let Err(eject_error) = ejected {
                    warn!("Ejecting cassette {} failed after a panic: {}", name, eject_error);
                }
                panic::resume_unwind(payload)
            }
        }
    }

    /// Top of the stack
    #[must_use]
    pub fn current_cassette(&self) -> Option<&Cassette> {
        self.cassettes.last()
    }

    /// Top of the stack, mutably
    pub fn current_cassette_mut(&mut self) -> Option<&mut Cassette> {
        self.cassettes.last_mut()
    }

    /// Inserted cassettes, bottom first
    #[must_use]
    pub fn cassettes(&self) -> &[Cassette] {
        &self.cassettes
    }

    /// Playback list of the current cassette, or a list that never matches
    #[must_use]
    pub fn http_interactions(&self) -> SharedSource {
        self.current_cassette()
            .map_or_else(NullList::shared, Cassette::shared_http_interactions)
    }

    /// Buffer a realized exchange on the current cassette
    pub fn record_http_interaction(&mut self, interaction: HttpInteraction) {
        match self.cassettes.last_mut() {
            Some(cassette) => cassette.record_http_interaction(interaction, &self.configuration),
            None => warn!(
                "No cassette inserted, dropping interaction {}",
                interaction.summary()
            ),
        }
    }

    /// Whether a request with no recorded match may go out
    #[must_use]
    pub fn real_http_connections_allowed(&self) -> bool {
        match self.current_cassette() {
            Some(cassette) => cassette.recording(),
            None => self.configuration.allow_http_connections_when_no_cassette() || self.turned_off,
        }
    }

    /// Turn the engine off
    ///
    /// With `ignore_cassettes`, inserts while off are silently skipped
    /// instead of failing.
    ///
    /// # Errors
    ///
    /// Returns `CassetteInserted` if a cassette is inserted
    pub fn turn_off(&mut self, ignore_cassettes: bool) -> Result<()> {
        if let Some(cassette) = self.current_cassette() {
            return Err(TapedeckError::CassetteInserted {
                name: cassette.name().to_string(),
            });
        }
        info!("Turning Tapedeck off (ignore_cassettes: {})", ignore_cassettes);
        self.turned_off = true;
        self.ignore_cassettes = ignore_cassettes;
        Ok(())
    }

    /// Turn the engine back on
    pub fn turn_on(&mut self) {
        if self.turned_off {
            info!("Turning Tapedeck on");
        }
        self.turned_off = false;
        self.ignore_cassettes = false;
    }

    /// Whether the engine is on
    #[must_use]
    pub fn turned_on(&self) -> bool {
        !self.turned_off
    }

    /// Run `f` with the engine off, turning it back on afterwards
    ///
    /// # Errors
    ///
    /// Returns `CassetteInserted` if a cassette is inserted
    pub fn turned_off<T, F>(&mut self, ignore_cassettes: bool, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> T,
    {
        self.turn_off(ignore_cassettes)?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *self)));
        self.turn_on();
        Ok(outcome.unwrap_or_else(|payload| panic::resume_unwind(payload)))
    }
}
