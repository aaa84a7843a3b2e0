//! Transport seam between the connection manager and a physical socket.
//!
//! A [`Connector`] opens one duplex text connection per call and reports what
//! happens on it as [`TransportEvent`]s on a channel the manager owns.  Each
//! event is tagged with the [`Generation`] it was opened for, so the manager
//! can tell a late event from a superseded socket apart from the live one.
//!
//! ```text
//!   ConnectionManager ──connect(url, gen, events)──► Connector
//!          ▲                                            │ spawns
//!          │  TransportEnvelope { gen, Open | Message   ▼
//!          └──────────────── | Error | Closed } ─── socket task
//!          │                                            ▲
//!          └──── TransportLink::send(frame) ────────────┘
//! ```
//!
//! The real implementation is [`WsConnector`]; tests use
//! [`mock::MockConnector`], which lets them script events by hand.

pub mod mock;
pub mod websocket;

use tokio::sync::mpsc;
use url::Url;
use wall_core::Generation;

pub use websocket::WsConnector;

/// Something that happened on one transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The handshake completed; frames can flow.
    Open,
    /// One inbound text frame.
    Message(String),
    /// The transport failed.  A `Closed` always follows.
    Error(String),
    /// The transport is gone.
    Closed,
}

/// A [`TransportEvent`] plus the generation of the transport that raised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEnvelope {
    pub generation: Generation,
    pub event: TransportEvent,
}

impl TransportEnvelope {
    pub fn new(generation: Generation, event: TransportEvent) -> Self {
        Self { generation, event }
    }
}

/// Write side of one transport, held by the manager.
///
/// Dropping or [`close`](Self::close)-ing the link asks the socket task to
/// send a Close frame and exit.
#[derive(Debug)]
pub struct TransportLink {
    outbound: mpsc::UnboundedSender<String>,
}

impl TransportLink {
    pub fn new(outbound: mpsc::UnboundedSender<String>) -> Self {
        Self { outbound }
    }

    /// Hands a frame to the socket task.
    ///
    /// # Errors
    ///
    /// Returns the frame unchanged if the socket task has already exited, so
    /// the caller can queue it again.
    pub fn send(&self, frame: String) -> Result<(), String> {
        self.outbound.send(frame).map_err(|rejected| rejected.0)
    }

    pub fn close(self) {
        drop(self);
    }
}

/// Opens transports.
pub trait Connector: Send + 'static {
    /// Starts connecting to `url` and returns the write side immediately.
    ///
    /// Every event for this transport must be sent on `events` tagged with
    /// `generation`.  A failed attempt reports `Error` then `Closed`.
    fn connect(
        &self,
        url: &Url,
        generation: Generation,
        events: mpsc::UnboundedSender<TransportEnvelope>,
    ) -> TransportLink;
}
