//! Translation from physical inputs to the emulator's eight logical keys.
//!
//! The wall runs a Game Boy emulator, so every input device is reduced to the
//! same small key set before anything is sent over the wire.  Both mappings
//! here are pure functions: no I/O, no state beyond the mapping table.

pub mod gamepad;
pub mod keyboard;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use gamepad::{AxisBinding, GamepadMapping, DEFAULT_AXIS_THRESHOLD};
pub use keyboard::from_key_code;

/// A logical emulator button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmulatorKey {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    Start,
    Select,
}

impl EmulatorKey {
    /// Every key, in D-pad then face-button order.
    pub const ALL: [EmulatorKey; 8] = [
        EmulatorKey::Up,
        EmulatorKey::Down,
        EmulatorKey::Left,
        EmulatorKey::Right,
        EmulatorKey::A,
        EmulatorKey::B,
        EmulatorKey::Start,
        EmulatorKey::Select,
    ];

    /// The name used in the `key` field of `emulator input`.
    pub fn as_str(self) -> &'static str {
        match self {
            EmulatorKey::Up => "up",
            EmulatorKey::Down => "down",
            EmulatorKey::Left => "left",
            EmulatorKey::Right => "right",
            EmulatorKey::A => "a",
            EmulatorKey::B => "b",
            EmulatorKey::Start => "start",
            EmulatorKey::Select => "select",
        }
    }
}

impl fmt::Display for EmulatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no emulator key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown emulator key '{0}' (expected one of up, down, left, right, a, b, start, select)")]
pub struct UnknownKey(pub String);

impl FromStr for EmulatorKey {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmulatorKey::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownKey(s.to_string()))
    }
}

/// One press or release edge of an emulator key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTransition {
    pub key: EmulatorKey,
    pub pressed: bool,
}

impl KeyTransition {
    pub fn press(key: EmulatorKey) -> Self {
        Self { key, pressed: true }
    }

    pub fn release(key: EmulatorKey) -> Self {
        Self {
            key,
            pressed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_str_round_trips_through_from_str() {
        for key in EmulatorKey::ALL {
            assert_eq!(key.as_str().parse::<EmulatorKey>(), Ok(key));
        }
    }

    #[test]
    fn test_from_str_is_case_insensitive() {
        assert_eq!("START".parse::<EmulatorKey>(), Ok(EmulatorKey::Start));
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        assert_eq!(
            "turbo".parse::<EmulatorKey>(),
            Err(UnknownKey("turbo".to_string()))
        );
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        assert_eq!(
            serde_json::to_value(EmulatorKey::Select).unwrap(),
            serde_json::json!("select")
        );
    }
}
