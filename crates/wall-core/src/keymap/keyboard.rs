//! Keyboard layout for the on-screen joypad.
//!
//! Codes are DOM `KeyboardEvent.code` names, which identify the physical key
//! regardless of layout: WASD or arrows for the D-pad, K/L for A/B, Enter for
//! Start and Space for Select.

use crate::keymap::EmulatorKey;

/// Maps a physical key code to an emulator key.  Unmapped codes return
/// `None`.
pub fn from_key_code(code: &str) -> Option<EmulatorKey> {
    let key = match code {
        "KeyW" | "ArrowUp" => EmulatorKey::Up,
        "KeyS" | "ArrowDown" => EmulatorKey::Down,
        "KeyA" | "ArrowLeft" => EmulatorKey::Left,
        "KeyD" | "ArrowRight" => EmulatorKey::Right,
        "KeyK" => EmulatorKey::A,
        "KeyL" => EmulatorKey::B,
        "Enter" => EmulatorKey::Start,
        "Space" => EmulatorKey::Select,
        _ => return None,
    };
    Some(key)
}
