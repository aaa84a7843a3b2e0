//! Frame loop that drives an [`InputPoller`].
//!
//! The poller itself is passive; this module gives it a clock.  One spawned
//! task owns the poller and a [`GamepadSource`], and ticks the poller once
//! per frame period while it is Active.  The interval timer only exists while
//! the poller is Active, so an idle remote schedules no work at all.
//!
//! Listeners run on the frame-loop task.  They should be quick: a slow
//! listener delays the next frame.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info};
use wall_core::input::Listener;
use wall_core::{DeviceChange, DeviceId, DeviceSample, InputPoller, ListenerId, PollTransition};

/// Default frame period, roughly 60 Hz.
pub const DEFAULT_FRAME_PERIOD: Duration = Duration::from_millis(16);

/// Reads the live state of gamepads.
#[cfg_attr(test, mockall::automock)]
pub trait GamepadSource: Send + 'static {
    /// Current state of `device`, or `None` if it cannot be read right now.
    fn sample(&mut self, device: DeviceId) -> Option<DeviceSample>;
}

/// In-memory [`GamepadSource`] whose pads are set by whoever holds a clone.
#[derive(Debug, Clone, Default)]
pub struct SharedGamepads {
    pads: Arc<Mutex<HashMap<DeviceId, DeviceSample>>>,
}

impl SharedGamepads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the state the next frame will read for `device`.
    pub fn set(&self, device: DeviceId, sample: DeviceSample) {
        self.pads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(device, sample);
    }

    pub fn remove(&self, device: DeviceId) {
        self.pads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&device);
    }
}

impl GamepadSource for SharedGamepads {
    fn sample(&mut self, device: DeviceId) -> Option<DeviceSample> {
        self.pads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&device)
            .cloned()
    }
}

enum PollerCommand {
    AddListener {
        listener: Listener,
        reply: oneshot::Sender<ListenerId>,
    },
    RemoveListener(ListenerId),
    DeviceConnected {
        device: DeviceId,
        initial: DeviceSample,
    },
    DeviceDisconnected(DeviceId),
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a running frame loop.
#[derive(Clone)]
pub struct InputPollerHandle {
    commands: mpsc::UnboundedSender<PollerCommand>,
    active: watch::Receiver<bool>,
}

impl InputPollerHandle {
    /// Registers a change listener.
    ///
    /// Returns `None` if the frame loop has already stopped.
    pub async fn add_listener<F>(&self, listener: F) -> Option<ListenerId>
    where
        F: FnMut(&DeviceChange) + Send + 'static,
    {
        let (reply, id) = oneshot::channel();
        let command = PollerCommand::AddListener {
            listener: Box::new(listener),
            reply,
        };
        self.commands.send(command).ok()?;
        id.await.ok()
    }

    pub fn remove_listener(&self, id: ListenerId) {
        let _ = self.commands.send(PollerCommand::RemoveListener(id));
    }

    /// Reports a newly connected device and its state at connect time.
    pub fn device_connected(&self, device: DeviceId, initial: DeviceSample) {
        let _ = self
            .commands
            .send(PollerCommand::DeviceConnected { device, initial });
    }

    pub fn device_disconnected(&self, device: DeviceId) {
        let _ = self.commands.send(PollerCommand::DeviceDisconnected(device));
    }

    /// `true` while the loop is ticking.
    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    /// Watches the Idle/Active state.
    pub fn active(&self) -> watch::Receiver<bool> {
        self.active.clone()
    }

    /// Stops the frame loop and waits for it to exit.
    pub async fn shutdown(&self) {
        let (done, finished) = oneshot::channel();
        if self.commands.send(PollerCommand::Shutdown { done }).is_ok() {
            let _ = finished.await;
        }
    }
}

/// Spawns the frame loop and returns its handle.
///
/// Must be called from within a tokio runtime.  The loop stops on
/// [`InputPollerHandle::shutdown`] or when every handle is dropped.
pub fn spawn_frame_loop<S: GamepadSource>(
    source: S,
    frame_period: Duration,
    tolerance: f32,
) -> InputPollerHandle {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (active_tx, active_rx) = watch::channel(false);

    let frame_loop = FrameLoop {
        poller: InputPoller::with_tolerance(tolerance),
        source,
        frame_period: frame_period.max(Duration::from_millis(1)),
        ticker: None,
        commands: commands_rx,
        active: active_tx,
    };
    tokio::spawn(frame_loop.run());

    InputPollerHandle {
        commands: commands_tx,
        active: active_rx,
    }
}

enum LoopEvent {
    Command(PollerCommand),
    HandlesDropped,
    Tick,
}

struct FrameLoop<S> {
    poller: InputPoller,
    source: S,
    frame_period: Duration,
    ticker: Option<Interval>,
    commands: mpsc::UnboundedReceiver<PollerCommand>,
    active: watch::Sender<bool>,
}

impl<S: GamepadSource> FrameLoop<S> {
    async fn run(mut self) {
        loop {
            let event = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => LoopEvent::Command(command),
                    None => LoopEvent::HandlesDropped,
                },
                _ = next_tick(&mut self.ticker) => LoopEvent::Tick,
            };

            match event {
                LoopEvent::Tick => {
                    let source = &mut self.source;
                    let changed = self.poller.tick(|device| source.sample(device));
                    if changed > 0 {
                        debug!("frame: {changed} device(s) changed");
                    }
                }
                LoopEvent::Command(PollerCommand::Shutdown { done }) => {
                    self.stop_ticking();
                    let _ = done.send(());
                    break;
                }
                LoopEvent::HandlesDropped => {
                    self.stop_ticking();
                    break;
                }
                LoopEvent::Command(command) => {
                    let transition = self.apply(command);
                    self.on_transition(transition);
                }
            }
        }
        debug!("frame loop stopped");
    }

    fn apply(&mut self, command: PollerCommand) -> Option<PollTransition> {
        match command {
            PollerCommand::AddListener { listener, reply } => {
                let (id, transition) = self.poller.add_listener(listener);
                let _ = reply.send(id);
                transition
            }
            PollerCommand::RemoveListener(id) => self.poller.remove_listener(id),
            PollerCommand::DeviceConnected { device, initial } => {
                info!("{device} connected");
                self.poller.device_connected(device, initial)
            }
            PollerCommand::DeviceDisconnected(device) => {
                info!("{device} disconnected");
                self.poller.device_disconnected(device)
            }
            PollerCommand::Shutdown { .. } => None,
        }
    }

    fn on_transition(&mut self, transition: Option<PollTransition>) {
        match transition {
            Some(PollTransition::Started) => {
                let mut ticker = interval(self.frame_period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                self.ticker = Some(ticker);
                self.active.send_replace(true);
            }
            Some(PollTransition::Stopped) => self.stop_ticking(),
            None => {}
        }
    }

    fn stop_ticking(&mut self) {
        self.ticker = None;
        self.active.send_replace(false);
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
