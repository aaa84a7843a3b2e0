//! # wall-core
//!
//! Shared, I/O-free building blocks for the wall remote: the JSON wire
//! protocol, the request correlator, the reconnect state machine, and the
//! gamepad input poller.
//!
//! Nothing in this crate opens a socket, spawns a task or reads a clock on its
//! own.  Every operation takes its inputs (frames, transport events, the
//! current instant, device samples) as arguments and returns what the caller
//! should do next.  The async runtime lives in `wall-remote`.
//!
//! # Architecture overview
//!
//! The wall is a large LED display driven by a server that accepts one JSON
//! object per WebSocket text frame.  A remote keeps a single long-lived
//! connection open and multiplexes many independent request/response
//! exchanges over it.
//!
//! - **`protocol`** – Request ids, outbound messages with the injected `req`
//!   field, inbound reply parsing, and the typed command vocabulary.
//!
//! - **`connection`** – The [`Multiplexer`]: outbound queue, pending-callback
//!   table and link state.  It decides whether a message is transmitted or
//!   queued, routes replies to callbacks, and tells the driver when to
//!   reconnect.
//!
//! - **`input`** – Device samples, frame-to-frame diffing and the
//!   [`InputPoller`] with its Idle/Active state machine.
//!
//! - **`keymap`** – Pure translation from keyboard codes and gamepad changes
//!   to the emulator's eight logical keys.

pub mod connection;
pub mod input;
pub mod keymap;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `wall_core::Multiplexer` instead of `wall_core::connection::state::Multiplexer`.
pub use connection::{
    ExponentialBackoff, FixedDelay, Generation, Inbound, LinkState, Multiplexer, RetryPolicy,
    Submission,
};
pub use input::{DeviceChange, DeviceId, DeviceSample, InputPoller, ListenerId, PollTransition};
pub use keymap::{EmulatorKey, GamepadMapping, KeyTransition};
pub use protocol::{Command, OutboundMessage, ProtocolError, RemoteError, Reply, RequestId};
