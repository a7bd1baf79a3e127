//! Connection identities and room membership records
//!
//! Every open connection gets an [`Id`]. Once a connection creates or joins
//! a room it is described by exactly one [`UserInfo`], which records the
//! room, the role it plays there and the passcodes it is entitled to see.

use std::{fmt::Display, str::FromStr};

use enum_map::Enum;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use uuid::Uuid;

use crate::passcode::Passcode;

/// A unique identifier for a connection
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    /// Creates a new random connection ID (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    /// Formats the ID as a UUID string
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    /// Parses an ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// The part a user plays in a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum Role {
    /// Controls the game flow and marks answers
    Admin,
    /// Watches the questions
    Guest,
}

/// The membership record of one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    /// The connection this record belongs to
    pub connection: Id,
    /// Name of the room the user is in
    pub room: String,
    /// Role of the user in the room
    pub role: Role,
    /// The room's admin passcode, known to admins only
    pub admin_passcode: Option<Passcode>,
    /// The room's guest passcode
    pub guest_passcode: Passcode,
}

impl UserInfo {
    /// Creates an admin record
    pub fn admin(
        connection: Id,
        room: impl Into<String>,
        admin_passcode: Passcode,
        guest_passcode: Passcode,
    ) -> Self {
        Self {
            connection,
            room: room.into(),
            role: Role::Admin,
            admin_passcode: Some(admin_passcode),
            guest_passcode,
        }
    }

    /// Creates a guest record
    pub fn guest(connection: Id, room: impl Into<String>, guest_passcode: Passcode) -> Self {
        Self {
            connection,
            room: room.into(),
            role: Role::Guest,
            admin_passcode: None,
            guest_passcode,
        }
    }

    /// Whether the user is an admin
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}
