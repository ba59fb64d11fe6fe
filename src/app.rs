//! Lock Application Logic
//!
//! Interprets the opaque command bytes carried by the Command
//! characteristic and maps lock state onto the status value, the
//! notification payload, and the indicator color. Pure functions only —
//! the task wiring lives with the firmware binary, which feeds commands
//! from the write hook into these helpers and then drives the server's
//! public entry points.

use crate::indicator::IndicatorColor;

/// Commands accepted on the Command characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LockCommand {
    Unlock,
    Lock,
}

impl LockCommand {
    /// Parse a raw command write. Matching is by ASCII prefix, so clients
    /// may send a trailing NUL or newline; anything else is ignored.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"UNLOCK") {
            Some(Self::Unlock)
        } else if data.starts_with(b"LOCK") {
            Some(Self::Lock)
        } else {
            None
        }
    }
}

/// Lock state reported through the Status characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LockState {
    Locked,
    Unlocked,
}

impl LockState {
    /// State reached after applying a command.
    pub fn apply(command: LockCommand) -> Self {
        match command {
            LockCommand::Unlock => Self::Unlocked,
            LockCommand::Lock => Self::Locked,
        }
    }

    /// Value stored in the Status characteristic: 0 locked, 1 unlocked.
    pub fn status_value(&self) -> u32 {
        match self {
            Self::Locked => 0,
            Self::Unlocked => 1,
        }
    }

    /// Payload notified to the client after the state change.
    pub fn notification(&self) -> &'static [u8] {
        match self {
            Self::Locked => b"LOCKED",
            Self::Unlocked => b"UNLOCKED",
        }
    }

    pub fn indicator_color(&self) -> IndicatorColor {
        match self {
            Self::Locked => IndicatorColor::Red,
            Self::Unlocked => IndicatorColor::Green,
        }
    }
}

/// Indicator colors for session-level events.
pub mod indication {
    use super::IndicatorColor;

    /// Shown once bring-up finishes.
    pub const BOOT: IndicatorColor = IndicatorColor::Purple;
    /// Shown while a client is connected.
    pub const CONNECTED: IndicatorColor = IndicatorColor::Blue;
    /// Shown after the client goes away.
    pub const DISCONNECTED: IndicatorColor = IndicatorColor::Off;
}
