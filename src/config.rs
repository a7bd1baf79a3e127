//! Engine configuration
//!
//! Options that shape every room the engine creates: how long a round lasts
//! and how often the timer driver ticks. Values are validated with `garde`
//! before the engine accepts them.

use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants;

/// Configuration options shared by all rooms of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Seconds on the clock when a round starts
    #[garde(range(min = constants::round::MIN_SECONDS, max = constants::round::MAX_SECONDS))]
    round_seconds: u64,
    /// Milliseconds between two ticks of the timer driver
    #[garde(range(min = constants::tick::MIN_MILLIS, max = constants::tick::MAX_MILLIS))]
    tick_millis: u64,
}

impl Default for Config {
    /// Standard rounds of 181 seconds ticking once per second
    fn default() -> Self {
        Self {
            round_seconds: constants::round::DEFAULT_SECONDS,
            tick_millis: constants::tick::DEFAULT_MILLIS,
        }
    }
}

/// Errors that can occur while loading a configuration
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration is not valid JSON
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// The configuration is out of bounds
    #[error("invalid configuration: {0}")]
    Invalid(#[from] garde::Report),
}

impl Config {
    /// Configuration for the short round variant (31 seconds)
    pub fn short_round() -> Self {
        Self::default().with_round_seconds(constants::round::SHORT_SECONDS)
    }

    /// Returns a copy with a different round length
    pub fn with_round_seconds(self, round_seconds: u64) -> Self {
        Self {
            round_seconds,
            ..self
        }
    }

    /// Returns a copy with a different tick period
    pub fn with_tick_millis(self, tick_millis: u64) -> Self {
        Self {
            tick_millis,
            ..self
        }
    }

    /// Seconds on the clock when a round starts
    pub fn round_seconds(&self) -> u64 {
        self.round_seconds
    }

    /// Time between two timer ticks
    pub fn tick_period(&self) -> web_time::Duration {
        web_time::Duration::from_millis(self.tick_millis)
    }

    /// Parses and validates a configuration from JSON
    ///
    /// Missing fields fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the text is not a valid configuration object
    /// and [`Error::Invalid`] if a value is out of bounds.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}
