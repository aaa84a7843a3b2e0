//! The connection state machine.
//!
//! # How the pieces fit
//!
//! [`Multiplexer`] owns everything the connection needs to remember between
//! events: the request-id counter, the outbound queue, the pending-callback
//! table, and the link state.  It does not own a socket.  Whoever drives it
//! (the manager actor in `wall-remote`, or a test) reports what happened on
//! the transport and acts on the return value:
//!
//! ```text
//!   driver                          Multiplexer
//!   ──────                          ───────────
//!   begin_connect()           ──►   state = Connecting, generation += 1
//!   transport opened          ──►   on_open(gen)      → frames to flush
//!   submit(msg, cb)           ──►   Transmit{frame} or Queued
//!   transport text            ──►   on_message(text)  → Reply{cb} / Unsolicited
//!   transport error / close   ──►   on_lost(gen)      → Some(delay) once
//!   delay elapsed             ──►   begin_connect()
//! ```
//!
//! # Link states
//!
//! ```text
//!            begin_connect            on_open
//!  Disconnected ──────────► Connecting ──────► Open
//!        ▲                      │                │
//!        └──────── on_lost ─────┴────────────────┘
//! ```
//!
//! # Generations
//!
//! Every connect attempt gets a fresh [`Generation`].  Open and lost events
//! carry the generation of the transport that produced them; events from an
//! older transport are ignored.  That is what makes an `error` followed by a
//! `close` for the same failure schedule a single reconnect: the first one
//! moves the state to `Disconnected`, the second finds it already there.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::connection::correlator::PendingTable;
use crate::connection::queue::OutboundQueue;
use crate::connection::retry::{FixedDelay, RetryPolicy};
use crate::protocol::codec::decode_frame;
use crate::protocol::{OutboundMessage, ProtocolError, Reply, RequestId, RequestIdCounter};

// ── Generation ────────────────────────────────────────────────────────────────

/// Identifies one connect attempt and the transport it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(u64);

impl Generation {
    pub const fn value(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Link state ────────────────────────────────────────────────────────────────

/// What the multiplexer believes about its transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// A connect attempt is in flight.
    Connecting,
    /// The transport is open; submissions are transmitted immediately.
    Open,
    /// No transport.  Either nothing has been started yet, or the last one was
    /// lost and a reconnect is pending.
    Disconnected,
}

// ── Results ───────────────────────────────────────────────────────────────────

/// What happened to a submitted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The link is open: write `frame` to the transport now.
    Transmit { id: RequestId, frame: String },
    /// The link is not open: the frame waits in the outbound queue.
    Queued { id: RequestId },
}

impl Submission {
    pub fn id(&self) -> RequestId {
        match self {
            Submission::Transmit { id, .. } | Submission::Queued { id } => *id,
        }
    }
}

/// A decoded inbound message and where it should go.
#[derive(Debug)]
pub enum Inbound<C> {
    /// Answers a pending request; `callback` has been removed from the table.
    Reply { id: RequestId, callback: C, reply: Reply },
    /// No pending request matches (missing `req`, unknown id, or a duplicate
    /// reply).  Delivered to the unsolicited-notification path.
    Unsolicited(Reply),
}

// ── Multiplexer ───────────────────────────────────────────────────────────────

/// Request multiplexing and reconnect bookkeeping for one logical connection.
///
/// `C` is the callback type stored in the pending table.
pub struct Multiplexer<C> {
    ids: RequestIdCounter,
    queue: OutboundQueue,
    pending: PendingTable<C>,
    state: LinkState,
    generation: Generation,
    attempts: u32,
    disposed: bool,
    policy: Box<dyn RetryPolicy>,
}

impl<C> Multiplexer<C> {
    /// Creates a disconnected multiplexer using `policy` for reconnect delays.
    pub fn new(policy: impl RetryPolicy + 'static) -> Self {
        Self {
            ids: RequestIdCounter::new(),
            queue: OutboundQueue::new(),
            pending: PendingTable::new(),
            state: LinkState::Disconnected,
            generation: Generation::default(),
            attempts: 0,
            disposed: false,
            policy: Box::new(policy),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Generation of the most recent connect attempt.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        !self.disposed && generation == self.generation
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Consecutive losses since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// The id the next submission will receive.
    pub fn next_request_id(&self) -> RequestId {
        self.ids.peek()
    }

    /// Starts a new connect attempt and returns its generation.
    ///
    /// Any transport from an earlier generation is superseded from this point
    /// on: its open and lost events will be ignored.
    pub fn begin_connect(&mut self) -> Generation {
        self.generation = self.generation.next();
        self.state = LinkState::Connecting;
        debug!("connect attempt {} started", self.generation);
        self.generation
    }

    /// Stamps `message` with the next request id, registers `callback`, and
    /// either hands the frame back for immediate transmission or queues it.
    ///
    /// Never fails.  After [`dispose`](Self::dispose) the message is dropped
    /// and reported as queued.
    pub fn submit(
        &mut self,
        message: OutboundMessage,
        callback: Option<C>,
        deadline: Option<Instant>,
    ) -> Submission {
        let id = self.ids.next_id();
        if self.disposed {
            warn!("message {id} submitted after dispose; dropped");
            return Submission::Queued { id };
        }

        let frame = message.encode(id);
        if let Some(callback) = callback {
            self.pending.register(id, callback, deadline);
        }

        if self.state == LinkState::Open {
            Submission::Transmit { id, frame }
        } else {
            self.queue.push(frame);
            debug!("link not open; queued request {id} ({} waiting)", self.queue.len());
            Submission::Queued { id }
        }
    }

    /// Marks the transport of `generation` as open and returns the queued
    /// frames, in submission order, for the driver to write.  The queue is
    /// empty afterwards.
    ///
    /// Returns nothing for a stale generation or an unexpected open.
    pub fn on_open(&mut self, generation: Generation) -> Vec<String> {
        if !self.is_current(generation) || self.state != LinkState::Connecting {
            debug!("ignoring open from transport {generation}");
            return Vec::new();
        }
        self.state = LinkState::Open;
        self.attempts = 0;
        let frames = self.queue.take_all();
        info!(
            "connection {generation} open; flushing {} queued message(s)",
            frames.len()
        );
        frames
    }

    /// Decodes one inbound text frame and routes it.
    ///
    /// Replies are routed whatever transport carried them: the request ids are
    /// unique across the whole connection lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the text is not a JSON object.  The
    /// caller logs and drops it; nothing in the multiplexer changes.
    pub fn on_message(&mut self, text: &str) -> Result<Inbound<C>, ProtocolError> {
        let reply = Reply::from_fields(decode_frame(text)?);
        let Some(id) = reply.request_id() else {
            return Ok(Inbound::Unsolicited(reply));
        };
        match self.pending.resolve(id) {
            Some(callback) => Ok(Inbound::Reply { id, callback, reply }),
            None => {
                debug!("reply {id} has no pending request");
                Ok(Inbound::Unsolicited(reply))
            }
        }
    }

    /// Reports that the transport of `generation` failed or closed.
    ///
    /// Returns the delay before the next connect attempt the first time a
    /// live transport is lost, and `None` for every duplicate or stale report.
    pub fn on_lost(&mut self, generation: Generation) -> Option<Duration> {
        if !self.is_current(generation) || self.state == LinkState::Disconnected {
            debug!("ignoring loss report from transport {generation}");
            return None;
        }
        self.state = LinkState::Disconnected;
        self.attempts = self.attempts.saturating_add(1);
        let delay = self.policy.next_retry_delay(self.attempts);
        info!(
            "connection {generation} lost; reconnecting in {}ms (attempt {})",
            delay.as_millis(),
            self.attempts
        );
        Some(delay)
    }

    /// Reports that frames handed out for transmission could not be written.
    ///
    /// The frames go back to the front of the queue in their original order,
    /// then the loss is handled as in [`on_lost`](Self::on_lost).
    pub fn transmit_failed(
        &mut self,
        generation: Generation,
        unsent: Vec<String>,
    ) -> Option<Duration> {
        if !self.disposed {
            for frame in unsent.into_iter().rev() {
                self.queue.push_front(frame);
            }
        }
        self.on_lost(generation)
    }

    /// Earliest pending-request deadline, if any entry has one.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.next_deadline()
    }

    /// Removes and returns pending entries whose deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Vec<(RequestId, C)> {
        let expired = self.pending.expire(now);
        if !expired.is_empty() {
            debug!("{} pending request(s) timed out", expired.len());
        }
        expired
    }

    /// Ends the connection's lifetime.
    ///
    /// Clears the queue, returns every pending callback so the caller can
    /// fail it, and makes all later transport events stale.
    pub fn dispose(&mut self) -> Vec<(RequestId, C)> {
        self.disposed = true;
        self.state = LinkState::Disconnected;
        let dropped = self.queue.take_all().len();
        if dropped > 0 {
            debug!("dispose dropped {dropped} queued message(s)");
        }
        self.pending.drain()
    }
}

impl<C> Default for Multiplexer<C> {
    fn default() -> Self {
        Self::new(FixedDelay::default())
    }
}

impl<C> fmt::Debug for Multiplexer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Multiplexer")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("attempts", &self.attempts)
            .field("queued", &self.queue.len())
            .field("pending", &self.pending)
            .field("disposed", &self.disposed)
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::retry::MockRetryPolicy;
    use serde_json::Value;

    fn req_of(frame: &str) -> String {
        let value: Value = serde_json::from_str(frame).unwrap();
        value["req"].as_str().unwrap().to_string()
    }

    fn open_mux() -> (Multiplexer<&'static str>, Generation) {
        let mut mux = Multiplexer::default();
        let gen = mux.begin_connect();
        mux.on_open(gen);
        (mux, gen)
    }

    #[test]
    fn test_new_multiplexer_is_disconnected() {
        let mux: Multiplexer<()> = Multiplexer::default();
        assert_eq!(mux.state(), LinkState::Disconnected);
        assert_eq!(mux.next_request_id(), RequestId::new(1));
    }

    #[test]
    fn test_submit_while_connecting_queues() {
        // Arrange
        let mut mux: Multiplexer<()> = Multiplexer::default();
        mux.begin_connect();

        // Act
        let submission = mux.submit(OutboundMessage::command("x"), None, None);

        // Assert
        assert_eq!(submission, Submission::Queued { id: RequestId::new(1) });
        assert_eq!(mux.queued_len(), 1);
    }

    #[test]
    fn test_submit_while_open_transmits() {
        let (mut mux, _) = open_mux();

        let submission = mux.submit(OutboundMessage::command("x"), Some("cb"), None);

        match submission {
            Submission::Transmit { id, frame } => {
                assert_eq!(id, RequestId::new(1));
                assert_eq!(req_of(&frame), "1");
            }
            other => panic!("expected Transmit, got {other:?}"),
        }
        assert_eq!(mux.pending_len(), 1);
        assert_eq!(mux.queued_len(), 0);
    }

    #[test]
    fn test_on_open_flushes_queue_in_order() {
        // Arrange
        let mut mux: Multiplexer<()> = Multiplexer::default();
        let gen = mux.begin_connect();
        for name in ["a", "b", "c"] {
            mux.submit(OutboundMessage::command(name), None, None);
        }

        // Act
        let frames = mux.on_open(gen);

        // Assert
        let ids: Vec<String> = frames.iter().map(|f| req_of(f)).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(mux.queued_len(), 0);
        assert_eq!(mux.state(), LinkState::Open);
        assert!(mux.on_open(gen).is_empty(), "second open must not re-flush");
    }

    #[test]
    fn test_on_open_from_stale_generation_is_ignored() {
        let mut mux: Multiplexer<()> = Multiplexer::default();
        let old = mux.begin_connect();
        mux.on_lost(old);
        mux.begin_connect();
        mux.submit(OutboundMessage::command("x"), None, None);

        assert!(mux.on_open(old).is_empty());
        assert_eq!(mux.state(), LinkState::Connecting);
        assert_eq!(mux.queued_len(), 1);
    }

    #[test]
    fn test_matching_reply_resolves_callback_once() {
        // Arrange
        let (mut mux, _) = open_mux();
        mux.submit(OutboundMessage::command("x"), Some("cb"), None);

        // Act
        let first = mux.on_message(r#"{"req":"1","result":42}"#).unwrap();
        let second = mux.on_message(r#"{"req":"1","result":43}"#).unwrap();

        // Assert
        match first {
            Inbound::Reply { id, callback, reply } => {
                assert_eq!(id, RequestId::new(1));
                assert_eq!(callback, "cb");
                assert_eq!(reply.get("result"), Some(&serde_json::json!(42)));
            }
            other => panic!("expected Reply, got {other:?}"),
        }
        assert!(matches!(second, Inbound::Unsolicited(_)));
        assert_eq!(mux.pending_len(), 0);
    }

    #[test]
    fn test_reply_with_padded_req_does_not_match() {
        // Arrange
        let (mut mux, _) = open_mux();
        mux.submit(OutboundMessage::command("x"), Some("cb"), None);

        // Act
        let padded = mux.on_message(r#"{"req":"01","result":42}"#).unwrap();
        let signed = mux.on_message(r#"{"req":"+1","result":42}"#).unwrap();

        // Assert
        assert!(matches!(padded, Inbound::Unsolicited(_)));
        assert!(matches!(signed, Inbound::Unsolicited(_)));
        assert_eq!(mux.pending_len(), 1);
    }

    #[test]
    fn test_reply_without_req_is_unsolicited() {
        let (mut mux, _) = open_mux();
        mux.submit(OutboundMessage::command("x"), Some("cb"), None);

        let inbound = mux.on_message(r#"{"event":"refresh"}"#).unwrap();

        assert!(matches!(inbound, Inbound::Unsolicited(_)));
        assert_eq!(mux.pending_len(), 1);
    }

    #[test]
    fn test_malformed_message_is_error_and_changes_nothing() {
        let (mut mux, _) = open_mux();
        mux.submit(OutboundMessage::command("x"), Some("cb"), None);

        assert!(mux.on_message("not json").is_err());
        assert!(mux.on_message("[1,2]").is_err());
        assert_eq!(mux.pending_len(), 1);
        assert_eq!(mux.state(), LinkState::Open);
    }

    #[test]
    fn test_error_then_close_schedules_one_reconnect() {
        // Arrange
        let (mut mux, gen) = open_mux();

        // Act
        let on_error = mux.on_lost(gen);
        let on_close = mux.on_lost(gen);

        // Assert
        assert_eq!(on_error, Some(Duration::from_millis(2000)));
        assert_eq!(on_close, None);
        assert_eq!(mux.state(), LinkState::Disconnected);
    }

    #[test]
    fn test_failed_connect_attempt_schedules_reconnect() {
        let mut mux: Multiplexer<()> = Multiplexer::default();
        let gen = mux.begin_connect();

        assert!(mux.on_lost(gen).is_some());
        assert_eq!(mux.attempts(), 1);
    }

    #[test]
    fn test_stale_loss_does_not_tear_down_new_link() {
        let mut mux: Multiplexer<()> = Multiplexer::default();
        let old = mux.begin_connect();
        mux.on_lost(old);
        let new = mux.begin_connect();
        mux.on_open(new);

        assert_eq!(mux.on_lost(old), None);
        assert_eq!(mux.state(), LinkState::Open);
    }

    #[test]
    fn test_policy_sees_consecutive_attempts_and_reset_on_open() {
        // Arrange
        let mut policy = MockRetryPolicy::new();
        policy
            .expect_next_retry_delay()
            .withf(|attempt| *attempt == 1)
            .times(2)
            .returning(|_| Duration::from_millis(10));
        policy
            .expect_next_retry_delay()
            .withf(|attempt| *attempt == 2)
            .times(1)
            .returning(|_| Duration::from_millis(20));
        let mut mux: Multiplexer<()> = Multiplexer::new(policy);

        // Act: two failed attempts, then success, then another failure
        let g1 = mux.begin_connect();
        let d1 = mux.on_lost(g1);
        let g2 = mux.begin_connect();
        let d2 = mux.on_lost(g2);
        let g3 = mux.begin_connect();
        mux.on_open(g3);
        let d3 = mux.on_lost(g3);

        // Assert
        assert_eq!(d1, Some(Duration::from_millis(10)));
        assert_eq!(d2, Some(Duration::from_millis(20)));
        assert_eq!(d3, Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_transmit_failed_requeues_at_front_in_order() {
        // Arrange
        let mut mux: Multiplexer<()> = Multiplexer::default();
        let gen = mux.begin_connect();
        mux.submit(OutboundMessage::command("a"), None, None);
        mux.submit(OutboundMessage::command("b"), None, None);
        let flushed = mux.on_open(gen);

        // Act
        let delay = mux.transmit_failed(gen, flushed);
        mux.submit(OutboundMessage::command("c"), None, None);
        let next = mux.begin_connect();
        let frames = mux.on_open(next);

        // Assert
        assert!(delay.is_some());
        let ids: Vec<String> = frames.iter().map(|f| req_of(f)).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_expire_returns_due_callbacks() {
        let (mut mux, _) = open_mux();
        let now = Instant::now();
        mux.submit(OutboundMessage::command("x"), Some("due"), Some(now));
        mux.submit(OutboundMessage::command("y"), Some("open-ended"), None);

        let expired = mux.expire(now);

        assert_eq!(expired, vec![(RequestId::new(1), "due")]);
        assert_eq!(mux.pending_len(), 1);
        assert_eq!(mux.next_deadline(), None);
    }

    #[test]
    fn test_dispose_drains_pending_and_ignores_later_events() {
        // Arrange
        let (mut mux, gen) = open_mux();
        mux.submit(OutboundMessage::command("x"), Some("a"), None);
        mux.submit(OutboundMessage::command("y"), Some("b"), None);

        // Act
        let failed = mux.dispose();

        // Assert
        assert_eq!(
            failed,
            vec![(RequestId::new(1), "a"), (RequestId::new(2), "b")]
        );
        assert_eq!(mux.on_lost(gen), None);
        assert!(mux.is_disposed());
        let after = mux.submit(OutboundMessage::command("z"), Some("c"), None);
        assert_eq!(after.id(), RequestId::new(3));
        assert_eq!(mux.pending_len(), 0);
        assert_eq!(mux.queued_len(), 0);
    }
}
