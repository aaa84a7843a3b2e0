//! Joypad bridge: turns gamepad changes and key events into `emulator input`
//! commands.
//!
//! The bridge is pure orchestration.  [`GamepadMapping`] and
//! [`from_key_code`] decide which emulator key changed; the bridge wraps each
//! edge in a [`Command::EmulatorInput`] and hands it to a [`CommandSink`].
//! Nothing waits for a reply: input is fire-and-forget.

use std::sync::Arc;

use tracing::{debug, warn};
use wall_core::keymap::from_key_code;
use wall_core::{Command, DeviceChange, GamepadMapping, KeyTransition, OutboundMessage};

/// Where the bridge delivers its commands.
///
/// Implemented by the connection handle; tests use the generated mock.
#[cfg_attr(test, mockall::automock)]
pub trait CommandSink: Send + Sync + 'static {
    fn submit(&self, message: OutboundMessage);
}

impl<S: CommandSink + ?Sized> CommandSink for Arc<S> {
    fn submit(&self, message: OutboundMessage) {
        (**self).submit(message);
    }
}

/// Maps input to emulator commands.
pub struct JoypadBridge<S> {
    sink: S,
    mapping: GamepadMapping,
}

impl<S: CommandSink> JoypadBridge<S> {
    pub fn new(sink: S, mapping: GamepadMapping) -> Self {
        Self { sink, mapping }
    }

    pub fn mapping(&self) -> &GamepadMapping {
        &self.mapping
    }

    /// Sends one command per key edge in `change`.  Returns how many were
    /// sent.
    pub fn on_change(&self, change: &DeviceChange) -> usize {
        let transitions = self.mapping.transitions(change);
        for transition in &transitions {
            self.emit(*transition);
        }
        transitions.len()
    }

    /// Handles a keyboard event identified by its DOM-style `code`
    /// (`"KeyW"`, `"ArrowUp"`, `"Enter"`, ...).
    ///
    /// Auto-repeat events are ignored so a held key produces exactly one
    /// press.  Returns `true` if a command was sent.
    pub fn on_key(&self, code: &str, pressed: bool, repeat: bool) -> bool {
        if repeat {
            return false;
        }
        let Some(key) = from_key_code(code) else {
            debug!("key code {code:?} is not bound");
            return false;
        };
        self.emit(KeyTransition { key, pressed });
        true
    }

    /// Converts the bridge into a listener for the input poller.
    pub fn into_listener(self) -> impl FnMut(&DeviceChange) + Send + 'static {
        move |change| {
            self.on_change(change);
        }
    }

    fn emit(&self, transition: KeyTransition) {
        let command = Command::EmulatorInput {
            key: transition.key,
            press: transition.pressed,
        };
        match command.into_message() {
            Ok(message) => self.sink.submit(message),
            Err(e) => warn!("could not encode emulator input: {e}"),
        }
    }
}
