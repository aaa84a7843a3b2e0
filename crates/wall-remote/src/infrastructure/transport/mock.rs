//! Scriptable connector for tests.
//!
//! [`MockConnector`] records every connect attempt and never touches the
//! network.  Tests drive each attempt by hand (open it, deliver a frame,
//! fail it, close it) and inspect the frames the manager wrote to it.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use url::Url;
use wall_core::Generation;

use super::{Connector, TransportEnvelope, TransportEvent, TransportLink};

struct Attempt {
    url: Url,
    generation: Generation,
    events: mpsc::UnboundedSender<TransportEnvelope>,
    outbound: mpsc::UnboundedReceiver<String>,
    written: Vec<String>,
}

/// A [`Connector`] whose transports are driven by the test.
///
/// Clones share the same attempt log, so a test keeps one clone and hands the
/// other to the manager.
#[derive(Clone, Default)]
pub struct MockConnector {
    attempts: Arc<Mutex<Vec<Attempt>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connect attempts so far.
    pub fn attempts(&self) -> usize {
        self.attempts.lock().expect("lock poisoned").len()
    }

    /// URL passed to attempt `index`.
    pub fn url(&self, index: usize) -> Url {
        self.with_attempt(index, |a| a.url.clone())
    }

    /// Generation passed to attempt `index`.
    pub fn generation(&self, index: usize) -> Generation {
        self.with_attempt(index, |a| a.generation)
    }

    /// Reports the handshake of attempt `index` as complete.
    pub fn open(&self, index: usize) {
        self.emit(index, TransportEvent::Open);
    }

    /// Delivers one inbound text frame on attempt `index`.
    pub fn deliver(&self, index: usize, text: &str) {
        self.emit(index, TransportEvent::Message(text.to_string()));
    }

    /// Reports a transport error on attempt `index`.
    pub fn fail(&self, index: usize, reason: &str) {
        self.emit(index, TransportEvent::Error(reason.to_string()));
    }

    /// Reports attempt `index` as closed.
    pub fn close(&self, index: usize) {
        self.emit(index, TransportEvent::Closed);
    }

    /// Every frame the manager has written to attempt `index`, in order.
    pub fn written(&self, index: usize) -> Vec<String> {
        self.with_attempt(index, |a| {
            while let Ok(frame) = a.outbound.try_recv() {
                a.written.push(frame);
            }
            a.written.clone()
        })
    }

    /// Returns `true` once the manager has dropped its link to attempt
    /// `index`.
    pub fn link_dropped(&self, index: usize) -> bool {
        self.with_attempt(index, |a| {
            while let Ok(frame) = a.outbound.try_recv() {
                a.written.push(frame);
            }
            matches!(
                a.outbound.try_recv(),
                Err(mpsc::error::TryRecvError::Disconnected)
            )
        })
    }

    fn emit(&self, index: usize, event: TransportEvent) {
        self.with_attempt(index, |a| {
            a.events
                .send(TransportEnvelope::new(a.generation, event))
                .expect("manager has shut down");
        });
    }

    fn with_attempt<T>(&self, index: usize, f: impl FnOnce(&mut Attempt) -> T) -> T {
        let mut attempts = self.attempts.lock().expect("lock poisoned");
        let attempt = attempts
            .get_mut(index)
            .unwrap_or_else(|| panic!("no connect attempt #{index}"));
        f(attempt)
    }
}

impl Connector for MockConnector {
    fn connect(
        &self,
        url: &Url,
        generation: Generation,
        events: mpsc::UnboundedSender<TransportEnvelope>,
    ) -> TransportLink {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.attempts.lock().expect("lock poisoned").push(Attempt {
            url: url.clone(),
            generation,
            events,
            outbound: outbound_rx,
            written: Vec::new(),
        });
        TransportLink::new(outbound_tx)
    }
}
