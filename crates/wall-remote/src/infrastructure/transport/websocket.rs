//! WebSocket transport built on tokio-tungstenite.
//!
//! Each connect spawns one task that owns the socket for its whole life:
//!
//! 1. Perform the handshake (bounded by a timeout) and report `Open`.
//! 2. Loop: write frames handed over by the [`TransportLink`], and report
//!    every inbound text frame as `Message`.
//! 3. On any failure report `Error`; on any exit report `Closed`.
//!
//! The task exits cleanly when the link is dropped, after sending a Close
//! frame to the wall.

use std::time::Duration;

use anyhow::{anyhow, Context};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, warn};
use url::Url;
use wall_core::Generation;

use super::{Connector, TransportEnvelope, TransportEvent, TransportLink};

/// Default bound on the TCP connect plus WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens real WebSocket connections.
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Connector for WsConnector {
    fn connect(
        &self,
        url: &Url,
        generation: Generation,
        events: mpsc::UnboundedSender<TransportEnvelope>,
    ) -> TransportLink {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let url = url.clone();
        let connect_timeout = self.connect_timeout;

        tokio::spawn(async move {
            if let Err(e) = run_socket(&url, connect_timeout, outbound_rx, &events, generation).await
            {
                warn!("transport {generation}: {e:#}");
                let _ = events.send(TransportEnvelope::new(
                    generation,
                    TransportEvent::Error(format!("{e:#}")),
                ));
            }
            // The receiver only disappears when the manager has shut down.
            let _ = events.send(TransportEnvelope::new(generation, TransportEvent::Closed));
        });

        TransportLink::new(outbound_tx)
    }
}

/// Owns one socket from handshake to close.
async fn run_socket(
    url: &Url,
    connect_timeout: Duration,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: &mpsc::UnboundedSender<TransportEnvelope>,
    generation: Generation,
) -> anyhow::Result<()> {
    let emit = |event: TransportEvent| {
        let _ = events.send(TransportEnvelope::new(generation, event));
    };

    let (stream, _response) = tokio::time::timeout(connect_timeout, connect_async(url.as_str()))
        .await
        .map_err(|_| {
            anyhow!(
                "connecting to {url} timed out after {}ms",
                connect_timeout.as_millis()
            )
        })?
        .with_context(|| format!("WebSocket handshake with {url} failed"))?;

    debug!("transport {generation}: connected to {url}");
    emit(TransportEvent::Open);

    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(text) => {
                    sink.send(WsMessage::Text(text))
                        .await
                        .context("WebSocket write failed")?;
                }
                None => {
                    debug!("transport {generation}: link dropped; closing");
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return Ok(());
                }
            },

            incoming = source.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => emit(TransportEvent::Message(text)),
                Some(Ok(WsMessage::Binary(data))) => {
                    // The wall only speaks JSON text frames.
                    warn!("transport {generation}: ignoring {} byte binary frame", data.len());
                }
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!("transport {generation}: server closed the connection ({frame:?})");
                    return Ok(());
                }
                Some(Err(e)) => return Err(e).context("WebSocket read failed"),
                None => {
                    debug!("transport {generation}: stream ended");
                    return Ok(());
                }
            },
        }
    }
}
