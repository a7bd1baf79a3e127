//! Round clock of a room
//!
//! The clock is idle until a round starts, counts down once per tick while
//! live and not paused, and expires when it reaches zero. It never goes
//! negative and stays at zero until it is replaced by a fresh clock.

use serde::{Deserialize, Serialize};

/// The countdown state of a room's current round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    /// Whether the round has been started
    is_live: bool,
    /// Whether the countdown is frozen
    is_paused: bool,
    /// Seconds remaining in the round
    time: u64,
}

/// Outcome of a single clock tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The clock was not running; nothing changed
    Ignored,
    /// The clock counted down and still has time left
    Running(u64),
    /// The clock just reached zero
    Expired,
}

/// What the timer driver of a room should do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSignal {
    /// Leave the driver as it is
    Unchanged,
    /// Start a fresh driver, replacing any running one
    Attach,
    /// Stop the driver
    Detach,
}

impl TimerState {
    /// A fresh, idle clock with `seconds` on it
    pub fn new(seconds: u64) -> Self {
        Self {
            is_live: false,
            is_paused: false,
            time: seconds,
        }
    }

    /// Whether the round has been started
    pub fn is_live(&self) -> bool {
        self.is_live
    }

    /// Whether the countdown is frozen
    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    /// Seconds remaining
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Whether the round has not been started yet
    pub fn is_idle(&self) -> bool {
        !self.is_live
    }

    /// Whether the round ran out of time
    pub fn is_expired(&self) -> bool {
        self.is_live && self.time == 0
    }

    /// Whether the countdown is currently moving
    pub fn is_running(&self) -> bool {
        self.is_live && !self.is_paused && self.time > 0
    }

    /// Starts an idle clock
    ///
    /// # Returns
    ///
    /// `true` if the clock was idle and is now live
    pub fn start(&mut self) -> bool {
        if self.is_live {
            return false;
        }
        self.is_live = true;
        true
    }

    /// Freezes a running clock
    ///
    /// # Returns
    ///
    /// `true` if the clock was running and is now paused
    pub fn pause(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.is_paused = true;
        true
    }

    /// Unfreezes a paused clock
    ///
    /// # Returns
    ///
    /// `true` if the clock was paused and is now running again
    pub fn resume(&mut self) -> bool {
        if !(self.is_live && self.is_paused) {
            return false;
        }
        self.is_paused = false;
        self.time > 0
    }

    /// Counts down one second if the clock is running
    pub fn tick(&mut self) -> Tick {
        if !self.is_running() {
            return Tick::Ignored;
        }
        self.time = self.time.saturating_sub(1);
        if self.time == 0 {
            Tick::Expired
        } else {
            Tick::Running(self.time)
        }
    }

    /// Runs a running clock straight down to zero
    pub fn expire(&mut self) -> Tick {
        if !self.is_running() {
            return Tick::Ignored;
        }
        self.time = 0;
        Tick::Expired
    }
}
