//! The frame-driven input poller.
//!
//! # States
//!
//! ```text
//!        device connected (listeners exist)
//!        listener added   (devices exist)
//!   Idle ──────────────────────────────────► Active
//!     ▲                                         │
//!     └──── last listener / last device removed ┘
//! ```
//!
//! The poller does not own a timer.  Methods that can flip the state return a
//! [`PollTransition`] so the driver knows when to start or stop its frame
//! loop.  While Idle, [`InputPoller::tick`] does nothing at all.
//!
//! # One tick
//!
//! 1. Sample every device, in connection order, and collect those that
//!    changed.
//! 2. For each changed device, call every listener once, in registration
//!    order.
//! 3. Store the new sample for each changed device.
//!
//! Detection finishes before any listener runs, so a listener never observes
//! a half-updated poller.

use std::collections::BTreeMap;

use tracing::debug;

use crate::input::sample::{DeviceChange, DeviceId, DeviceSample, DEFAULT_AXIS_TOLERANCE};

/// Handle returned by [`InputPoller::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Callback invoked once per changed device per tick.
pub type Listener = Box<dyn FnMut(&DeviceChange) + Send>;

/// Edge of the Idle/Active state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTransition {
    /// Idle → Active: start ticking.
    Started,
    /// Active → Idle: stop ticking.
    Stopped,
}

/// Samples a set of devices once per frame and reports what changed.
pub struct InputPoller {
    devices: Vec<(DeviceId, DeviceSample)>,
    listeners: BTreeMap<ListenerId, Listener>,
    next_listener: u64,
    tolerance: f32,
    active: bool,
}

impl InputPoller {
    /// Creates an idle poller with the default axis tolerance.
    pub fn new() -> Self {
        Self::with_tolerance(DEFAULT_AXIS_TOLERANCE)
    }

    /// Creates an idle poller that ignores axis movements of `tolerance` or
    /// less.
    pub fn with_tolerance(tolerance: f32) -> Self {
        Self {
            devices: Vec::new(),
            listeners: BTreeMap::new(),
            next_listener: 0,
            tolerance,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Connected device ids, in connection order.
    pub fn devices(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.devices.iter().map(|(id, _)| *id)
    }

    /// Last stored sample for `device`.
    pub fn sample_of(&self, device: DeviceId) -> Option<&DeviceSample> {
        self.devices
            .iter()
            .find(|(id, _)| *id == device)
            .map(|(_, sample)| sample)
    }

    /// Registers `listener` and returns its handle plus the state edge, if
    /// this registration started polling.
    pub fn add_listener<F>(&mut self, listener: F) -> (ListenerId, Option<PollTransition>)
    where
        F: FnMut(&DeviceChange) + Send + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.insert(id, Box::new(listener));
        (id, self.refresh())
    }

    /// Unregisters a listener.  Unknown ids are ignored.
    pub fn remove_listener(&mut self, id: ListenerId) -> Option<PollTransition> {
        if self.listeners.remove(&id).is_none() {
            debug!("remove_listener: unknown listener {}", id.0);
        }
        self.refresh()
    }

    /// Records a newly connected device with its initial sample.
    ///
    /// Reconnecting an id that is already known replaces its stored sample.
    pub fn device_connected(
        &mut self,
        device: DeviceId,
        initial: DeviceSample,
    ) -> Option<PollTransition> {
        match self.devices.iter_mut().find(|(id, _)| *id == device) {
            Some((_, sample)) => *sample = initial,
            None => {
                debug!("{device} connected");
                self.devices.push((device, initial));
            }
        }
        self.refresh()
    }

    /// Forgets a device.  Unknown ids are ignored.
    pub fn device_disconnected(&mut self, device: DeviceId) -> Option<PollTransition> {
        let before = self.devices.len();
        self.devices.retain(|(id, _)| *id != device);
        if self.devices.len() != before {
            debug!("{device} disconnected");
        }
        self.refresh()
    }

    /// Runs one frame.
    ///
    /// `sample` returns the current state of a device, or `None` if it cannot
    /// be read this frame (that device is skipped; removal only happens
    /// through [`device_disconnected`](Self::device_disconnected)).
    ///
    /// Returns the number of devices that changed.
    pub fn tick<F>(&mut self, mut sample: F) -> usize
    where
        F: FnMut(DeviceId) -> Option<DeviceSample>,
    {
        if !self.active {
            return 0;
        }

        // Phase 1: detect.
        let changes: Vec<DeviceChange> = self
            .devices
            .iter()
            .filter_map(|(id, old)| {
                let new = sample(*id)?;
                new.differs_from(old, self.tolerance)
                    .then(|| DeviceChange::new(*id, old.clone(), new, self.tolerance))
            })
            .collect();

        // Phase 2: notify, then store.
        for change in &changes {
            for listener in self.listeners.values_mut() {
                listener(change);
            }
            if let Some((_, stored)) = self.devices.iter_mut().find(|(id, _)| *id == change.device)
            {
                *stored = change.new.clone();
            }
        }
        changes.len()
    }

    /// Recomputes Active/Idle and reports the edge, if any.
    fn refresh(&mut self) -> Option<PollTransition> {
        let should_run = !self.devices.is_empty() && !self.listeners.is_empty();
        match (self.active, should_run) {
            (false, true) => {
                self.active = true;
                debug!("input polling started");
                Some(PollTransition::Started)
            }
            (true, false) => {
                self.active = false;
                debug!("input polling stopped");
                Some(PollTransition::Stopped)
            }
            _ => None,
        }
    }
}

impl Default for InputPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InputPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputPoller")
            .field("devices", &self.devices)
            .field("listeners", &self.listeners.len())
            .field("tolerance", &self.tolerance)
            .field("active", &self.active)
            .finish()
    }
}
