//! Infrastructure layer for wall-remote.
//!
//! Everything that needs a tokio runtime lives here.
//!
//! # Responsibilities
//!
//! - Opening WebSocket transports to the wall ([`transport`])
//! - Running the connection manager actor that owns the multiplexer
//!   ([`connection_manager`])
//! - Ticking the input poller once per frame ([`frame_loop`])
//!
//! # What does NOT belong here?
//!
//! - Wire encoding, request correlation and change detection (those are
//!   `wall-core`)
//! - Configuration parsing (that is the domain layer)

pub mod connection_manager;
pub mod frame_loop;
pub mod transport;

pub use connection_manager::{
    ConnectionHandle, ConnectionManager, PendingReply, ReplyCallback, RequestError,
};
pub use frame_loop::{
    spawn_frame_loop, GamepadSource, InputPollerHandle, SharedGamepads, DEFAULT_FRAME_PERIOD,
};
pub use transport::{Connector, TransportEvent, WsConnector};
