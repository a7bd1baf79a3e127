//! Configuration constants for the quiz room system
//!
//! This module contains the fixed limits and defaults used throughout the
//! room engine so that timers, passcodes and wire payloads share one source
//! of truth.

/// Round timer constants
pub mod round {
    /// Seconds on the clock for a standard round
    pub const DEFAULT_SECONDS: u64 = 181;
    /// Seconds on the clock for the short round variant
    pub const SHORT_SECONDS: u64 = 31;
    /// Minimum configurable round length in seconds
    pub const MIN_SECONDS: u64 = 1;
    /// Maximum configurable round length in seconds
    pub const MAX_SECONDS: u64 = 3600;
}

/// Timer driver cadence constants
pub mod tick {
    /// Default time between two timer ticks in milliseconds
    pub const DEFAULT_MILLIS: u64 = 1000;
    /// Minimum configurable tick period in milliseconds
    pub const MIN_MILLIS: u64 = 10;
    /// Maximum configurable tick period in milliseconds
    pub const MAX_MILLIS: u64 = 60_000;
}

/// Passcode constants
pub mod passcode {
    /// Number of digits in an admin passcode
    pub const ADMIN_DIGITS: usize = 8;
    /// Number of digits in a guest passcode
    pub const GUEST_DIGITS: usize = 4;
}

/// Room constants
pub mod room {
    /// Minimum length of a room name
    pub const MIN_NAME_LENGTH: usize = 1;
    /// Maximum length of a room name
    pub const MAX_NAME_LENGTH: usize = 64;
    /// Maximum length of the optional school and group labels
    pub const MAX_LABEL_LENGTH: usize = 64;
}

/// Websocket close codes used when a tunnel is shut down
pub mod close_code {
    /// Normal closure
    pub const NORMAL: u16 = 1000;
    /// Protocol error, used when a send to a client fails
    pub const PROTOCOL_ERROR: u16 = 1002;
}
