//! The connection manager actor.
//!
//! # Ownership
//!
//! One spawned task owns the [`Multiplexer`] (request counter, outbound queue,
//! pending table) and the current [`TransportLink`].  Nothing else can touch
//! that state, so there are no locks.  Everyone else talks to the task through
//! a cloneable [`ConnectionHandle`]:
//!
//! ```text
//!  ConnectionHandle ──ManagerCommand──┐
//!  ConnectionHandle ──ManagerCommand──┤      ┌─────────────────────┐
//!                                     ├────► │   manager actor     │ ──frames──► TransportLink
//!  socket task ──TransportEnvelope────┤      │  Multiplexer<Resp.> │
//!  reconnect timer / deadlines ───────┘      └─────────────────────┘
//!                                              │ watch<LinkState>
//!                                              │ broadcast<Reply> (unsolicited)
//! ```
//!
//! Because request ids are stamped inside the actor, the order in which
//! handles call `send` is the order ids are issued and frames hit the wire.
//!
//! # Lifecycle
//!
//! [`ConnectionManager::open`] spawns the actor and issues the first connect
//! straight away.  The actor runs until [`ConnectionHandle::dispose`] is called
//! or every handle has been dropped.
//!
//! `dispose` throws away whatever is still queued.  A caller that must not
//! lose fire-and-forget messages (the `joypad` command at end of input)
//! awaits [`ConnectionHandle::flush`] first.  Once an open socket has been
//! told to close, `dispose` also waits up to [`CLOSE_GRACE`] for the socket
//! task to confirm, so frames already handed to it reach the wire before the
//! process exits.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use url::Url;
use wall_core::{
    FixedDelay, Generation, Inbound, LinkState, Multiplexer, OutboundMessage, Reply, RequestId,
    RetryPolicy, Submission,
};

use crate::application::CommandSink;
use crate::domain::{ConfigError, RemoteConfig};
use crate::infrastructure::transport::{
    Connector, TransportEnvelope, TransportEvent, TransportLink,
};

/// Capacity of the unsolicited-message broadcast.  Slow subscribers that fall
/// further behind than this skip ahead.
const UNSOLICITED_CAPACITY: usize = 64;

/// How long `dispose` waits for an open socket to finish closing.
pub const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Callback form accepted by [`ConnectionHandle::send_with`].
pub type ReplyCallback = Box<dyn FnOnce(Reply) + Send>;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Why a [`PendingReply`] finished without a reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The configured request timeout elapsed first.
    #[error("request {0} timed out waiting for a reply")]
    TimedOut(RequestId),

    /// The connection was disposed (or its task stopped) first.
    #[error("connection was disposed before a reply arrived")]
    Disposed,
}

// ── Pending-table entries ─────────────────────────────────────────────────────

/// What the actor stores in the pending table for one request.
pub enum Responder {
    /// Invoked with the reply; dropped silently on timeout or dispose.
    Callback(ReplyCallback),
    /// Completes a [`PendingReply`].
    Channel(oneshot::Sender<Result<Reply, RequestError>>),
}

impl Responder {
    fn resolve(self, reply: Reply) {
        match self {
            Responder::Callback(callback) => callback(reply),
            Responder::Channel(tx) => {
                let _ = tx.send(Ok(reply));
            }
        }
    }

    fn fail(self, error: RequestError) {
        match self {
            Responder::Callback(_) => {}
            Responder::Channel(tx) => {
                let _ = tx.send(Err(error));
            }
        }
    }
}

/// Future returned by [`ConnectionHandle::request`].
///
/// Resolves with the reply whose `req` matches, or with a [`RequestError`].
/// With no request timeout configured it stays pending until a reply
/// arrives or the connection is disposed.
#[must_use = "a PendingReply does nothing unless awaited"]
pub struct PendingReply {
    rx: oneshot::Receiver<Result<Reply, RequestError>>,
}

impl Future for PendingReply {
    type Output = Result<Reply, RequestError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(RequestError::Disposed)))
    }
}

// ── Handle ────────────────────────────────────────────────────────────────────

enum ManagerCommand {
    Send {
        message: OutboundMessage,
        responder: Option<Responder>,
    },
    Flush {
        done: oneshot::Sender<()>,
    },
    Dispose {
        done: oneshot::Sender<()>,
    },
}

/// Cheap, cloneable front end of one managed connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<ManagerCommand>,
    unsolicited: broadcast::Sender<Reply>,
    status: watch::Receiver<LinkState>,
}

impl ConnectionHandle {
    /// Sends a fire-and-forget message.  Never blocks and never fails; while
    /// the link is down the message waits in the outbound queue.
    pub fn send(&self, message: OutboundMessage) {
        self.enqueue(message, None);
    }

    /// Sends a message and calls `callback` with its reply, if one arrives.
    pub fn send_with<F>(&self, message: OutboundMessage, callback: F)
    where
        F: FnOnce(Reply) + Send + 'static,
    {
        self.enqueue(message, Some(Responder::Callback(Box::new(callback))));
    }

    /// Sends a message and returns a future for its reply.
    pub fn request(&self, message: OutboundMessage) -> PendingReply {
        let (tx, rx) = oneshot::channel();
        self.enqueue(message, Some(Responder::Channel(tx)));
        PendingReply { rx }
    }

    /// Receives every inbound message that matched no pending request.
    pub fn subscribe(&self) -> broadcast::Receiver<Reply> {
        self.unsolicited.subscribe()
    }

    /// Watches the link state.
    pub fn status(&self) -> watch::Receiver<LinkState> {
        self.status.clone()
    }

    /// Current link state.
    pub fn link_state(&self) -> LinkState {
        *self.status.borrow()
    }

    /// Waits until the link is open.
    ///
    /// Returns `false` if the manager stopped first.
    pub async fn wait_open(&self) -> bool {
        let mut status = self.status.clone();
        let opened = status.wait_for(|s| *s == LinkState::Open).await.is_ok();
        opened
    }

    /// Waits until the link is open and every message sent through this
    /// connection so far has been handed to the transport.
    ///
    /// Stays pending while the wall is unreachable.  Returns `false` if the
    /// manager stopped first.
    pub async fn flush(&self) -> bool {
        let (done, flushed) = oneshot::channel();
        if self.commands.send(ManagerCommand::Flush { done }).is_err() {
            return false;
        }
        flushed.await.is_ok()
    }

    /// Ends the connection: cancels any pending reconnect, closes the
    /// transport, drops queued messages and fails outstanding requests with
    /// [`RequestError::Disposed`].  Returns once the actor has stopped.
    pub async fn dispose(&self) {
        let (done, finished) = oneshot::channel();
        if self.commands.send(ManagerCommand::Dispose { done }).is_ok() {
            let _ = finished.await;
        }
    }

    fn enqueue(&self, message: OutboundMessage, responder: Option<Responder>) {
        let command = ManagerCommand::Send { message, responder };
        if self.commands.send(command).is_err() {
            // The dropped command takes its responder with it, which completes
            // any PendingReply with `Disposed`.
            debug!("message submitted after the connection was disposed");
        }
    }
}

impl CommandSink for ConnectionHandle {
    fn submit(&self, message: OutboundMessage) {
        self.send(message);
    }
}

// ── Manager ───────────────────────────────────────────────────────────────────

/// Entry point for opening a managed connection.
pub struct ConnectionManager;

impl ConnectionManager {
    /// Spawns the manager for `config` using `connector` for transports.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configured origin cannot be turned into
    /// a WebSocket endpoint.
    pub fn open<C: Connector>(
        config: &RemoteConfig,
        connector: C,
    ) -> Result<ConnectionHandle, ConfigError> {
        let url = config.endpoint()?;
        Ok(Self::open_with(
            url,
            connector,
            FixedDelay(config.reconnect_delay),
            config.request_timeout,
        ))
    }

    /// Spawns a manager with an explicit endpoint and retry policy.
    pub fn open_with<C, P>(
        url: Url,
        connector: C,
        policy: P,
        request_timeout: Option<Duration>,
    ) -> ConnectionHandle
    where
        C: Connector,
        P: RetryPolicy + 'static,
    {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (unsolicited, _) = broadcast::channel(UNSOLICITED_CAPACITY);
        let (status_tx, status_rx) = watch::channel(LinkState::Disconnected);

        let actor = ManagerActor {
            url,
            connector,
            mux: Multiplexer::new(policy),
            link: None,
            events_tx,
            events_rx,
            commands: commands_rx,
            unsolicited: unsolicited.clone(),
            status: status_tx,
            reconnect_at: None,
            request_timeout,
            flush_waiters: Vec::new(),
        };
        tokio::spawn(actor.run());

        ConnectionHandle {
            commands: commands_tx,
            unsolicited,
            status: status_rx,
        }
    }
}

// ── Actor ─────────────────────────────────────────────────────────────────────

enum ActorEvent {
    Command(ManagerCommand),
    HandlesDropped,
    Transport(TransportEnvelope),
    ReconnectDue,
    DeadlineDue,
}

struct ManagerActor<C: Connector> {
    url: Url,
    connector: C,
    mux: Multiplexer<Responder>,
    link: Option<TransportLink>,
    events_tx: mpsc::UnboundedSender<TransportEnvelope>,
    events_rx: mpsc::UnboundedReceiver<TransportEnvelope>,
    commands: mpsc::UnboundedReceiver<ManagerCommand>,
    unsolicited: broadcast::Sender<Reply>,
    status: watch::Sender<LinkState>,
    reconnect_at: Option<Instant>,
    request_timeout: Option<Duration>,
    flush_waiters: Vec<oneshot::Sender<()>>,
}

impl<C: Connector> ManagerActor<C> {
    async fn run(mut self) {
        self.connect();

        loop {
            let reconnect_at = self.reconnect_at;
            let deadline = self.mux.next_deadline().map(Instant::from_std);

            let event = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => ActorEvent::Command(command),
                    None => ActorEvent::HandlesDropped,
                },
                Some(envelope) = self.events_rx.recv() => ActorEvent::Transport(envelope),
                _ = sleep_until_some(reconnect_at) => ActorEvent::ReconnectDue,
                _ = sleep_until_some(deadline) => ActorEvent::DeadlineDue,
            };

            match event {
                ActorEvent::Command(ManagerCommand::Send { message, responder }) => {
                    self.submit(message, responder);
                }
                ActorEvent::Command(ManagerCommand::Flush { done }) => {
                    self.flush_waiters.push(done);
                    self.notify_flushed();
                }
                ActorEvent::Command(ManagerCommand::Dispose { done }) => {
                    if let Some(generation) = self.shutdown() {
                        self.await_close(generation).await;
                    }
                    let _ = done.send(());
                    break;
                }
                ActorEvent::HandlesDropped => {
                    debug!("all connection handles dropped");
                    self.shutdown();
                    break;
                }
                ActorEvent::Transport(envelope) => self.on_transport(envelope),
                ActorEvent::ReconnectDue => {
                    self.reconnect_at = None;
                    self.connect();
                }
                ActorEvent::DeadlineDue => self.expire_requests(),
            }
        }
    }

    fn connect(&mut self) {
        let generation = self.mux.begin_connect();
        info!("connecting to {} (attempt {generation})", self.url);
        self.link = Some(
            self.connector
                .connect(&self.url, generation, self.events_tx.clone()),
        );
        self.publish_status();
    }

    fn submit(&mut self, message: OutboundMessage, responder: Option<Responder>) {
        let deadline = match (&responder, self.request_timeout) {
            (Some(_), Some(timeout)) => Some((Instant::now() + timeout).into_std()),
            _ => None,
        };
        match self.mux.submit(message, responder, deadline) {
            Submission::Transmit { id, frame } => {
                debug!("transmitting request {id}");
                self.transmit(vec![frame]);
            }
            Submission::Queued { id } => debug!("request {id} queued until the link opens"),
        }
    }

    /// Writes frames to the current link.  Frames the link refuses go back to
    /// the front of the queue and the link is treated as lost.
    fn transmit(&mut self, frames: Vec<String>) {
        let generation = self.mux.generation();
        let mut frames = frames.into_iter();
        let refused = match &self.link {
            Some(link) => loop {
                match frames.next() {
                    Some(frame) => {
                        if let Err(frame) = link.send(frame) {
                            break Some(frame);
                        }
                    }
                    None => break None,
                }
            },
            None => frames.next(),
        };

        if let Some(first) = refused {
            let unsent: Vec<String> = std::iter::once(first).chain(frames).collect();
            warn!(
                "transport {generation} refused writes; requeueing {} frame(s)",
                unsent.len()
            );
            let delay = self.mux.transmit_failed(generation, unsent);
            self.after_loss(delay);
        }
    }

    fn on_transport(&mut self, envelope: TransportEnvelope) {
        let TransportEnvelope { generation, event } = envelope;

        if let TransportEvent::Message(text) = event {
            self.on_text(&text);
            return;
        }
        if !self.mux.is_current(generation) {
            debug!("ignoring {event:?} from superseded transport {generation}");
            return;
        }

        match event {
            TransportEvent::Open => {
                let frames = self.mux.on_open(generation);
                self.publish_status();
                self.transmit(frames);
                self.notify_flushed();
            }
            TransportEvent::Error(reason) => {
                warn!("transport {generation} error: {reason}");
                let delay = self.mux.on_lost(generation);
                self.after_loss(delay);
            }
            TransportEvent::Closed => {
                let delay = self.mux.on_lost(generation);
                self.after_loss(delay);
            }
            TransportEvent::Message(_) => {}
        }
    }

    fn on_text(&mut self, text: &str) {
        match self.mux.on_message(text) {
            Ok(Inbound::Reply {
                id,
                callback,
                reply,
            }) => {
                debug!("reply for request {id}");
                callback.resolve(reply);
            }
            Ok(Inbound::Unsolicited(reply)) => {
                // No subscribers is fine; the message is simply dropped.
                let _ = self.unsolicited.send(reply);
            }
            Err(e) => warn!("dropping inbound frame: {e}"),
        }
    }

    /// Schedules the reconnect for a loss the multiplexer accepted.
    fn after_loss(&mut self, delay: Option<Duration>) {
        let Some(delay) = delay else { return };
        if let Some(link) = self.link.take() {
            link.close();
        }
        self.reconnect_at = Some(Instant::now() + delay);
        self.publish_status();
    }

    fn expire_requests(&mut self) {
        let now = Instant::now().into_std();
        for (id, responder) in self.mux.expire(now) {
            warn!("request {id} timed out");
            responder.fail(RequestError::TimedOut(id));
        }
    }

    /// Completes flush waiters once nothing is left in the queue.
    fn notify_flushed(&mut self) {
        if self.mux.state() != LinkState::Open || self.mux.queued_len() > 0 {
            return;
        }
        for done in self.flush_waiters.drain(..) {
            let _ = done.send(());
        }
    }

    /// Tears everything down.  Returns the generation of the link that was
    /// open at the time, if any.
    fn shutdown(&mut self) -> Option<Generation> {
        self.reconnect_at = None;
        self.flush_waiters.clear();
        let was_open = self.mux.state() == LinkState::Open;
        let generation = self.mux.generation();
        if let Some(link) = self.link.take() {
            link.close();
        }
        let dropped = self.mux.queued_len();
        if dropped > 0 {
            warn!("connection disposed with {dropped} message(s) still queued");
        }
        let outstanding = self.mux.dispose();
        if !outstanding.is_empty() {
            info!(
                "connection disposed with {} request(s) unanswered",
                outstanding.len()
            );
        }
        for (_, responder) in outstanding {
            responder.fail(RequestError::Disposed);
        }
        self.publish_status();
        info!("connection to {} disposed", self.url);
        was_open.then_some(generation)
    }

    /// Waits for the socket task of `generation` to report `Closed`.
    async fn await_close(&mut self, generation: Generation) {
        let events = &mut self.events_rx;
        let closed = async {
            while let Some(envelope) = events.recv().await {
                if envelope.generation == generation
                    && matches!(envelope.event, TransportEvent::Closed)
                {
                    return;
                }
            }
        };
        if tokio::time::timeout(CLOSE_GRACE, closed).await.is_err() {
            debug!(
                "transport {generation} did not confirm close within {}ms",
                CLOSE_GRACE.as_millis()
            );
        }
    }

    fn publish_status(&self) {
        let state = self.mux.state();
        self.status.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }
}

async fn sleep_until_some(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
