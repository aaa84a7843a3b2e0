//! Application layer for wall-remote.
//!
//! Knows *what* to send in response to user input, and delegates *how* it
//! is sent to whatever [`CommandSink`] it is given.
//!
//! # What does NOT belong here?
//!
//! - Sockets, reconnects and request ids (infrastructure and `wall-core`)
//! - Key and button tables (`wall_core::keymap`)

pub mod joypad;

pub use joypad::{CommandSink, JoypadBridge};
