//! Room passcode generation and matching
//!
//! Every room gets one admin passcode and one guest passcode when it is
//! created. Passcodes are strings of random decimal digits so they can be
//! read out loud; leading zeros are significant.

use std::{fmt::Display, str::FromStr};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

use crate::constants;

/// A string of random decimal digits
#[derive(Debug, Clone, PartialEq, Eq, Hash, DeserializeFromStr, SerializeDisplay)]
pub struct Passcode(String);

/// Error returned when parsing a passcode that is not all digits
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("passcode must be a non-empty string of digits")]
pub struct InvalidPasscode;

impl Passcode {
    /// Generates a passcode of `digits` random digits
    pub fn random(digits: usize) -> Self {
        Self((0..digits).map(|_| fastrand::digit(10)).collect())
    }

    /// Generates an admin passcode (8 digits)
    pub fn admin() -> Self {
        Self::random(constants::passcode::ADMIN_DIGITS)
    }

    /// Generates a guest passcode (4 digits)
    pub fn guest() -> Self {
        Self::random(constants::passcode::GUEST_DIGITS)
    }

    /// Whether `attempt` is exactly this passcode
    pub fn matches(&self, attempt: &str) -> bool {
        self.0 == attempt
    }

    /// The digits of the passcode
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Passcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Passcode {
    type Err = InvalidPasscode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidPasscode);
        }
        Ok(Self(s.to_owned()))
    }
}
