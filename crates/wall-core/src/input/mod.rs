//! Gamepad sampling and change detection.
//!
//! [`DeviceSample`] is one frame of button and axis state; [`InputPoller`]
//! keeps the last sample per device, diffs each new frame against it, and
//! hands [`DeviceChange`]s to listeners.

pub mod poller;
pub mod sample;

pub use poller::{InputPoller, Listener, ListenerId, PollTransition};
pub use sample::{
    AxisChange, ButtonTransition, DeviceChange, DeviceId, DeviceSample, DEFAULT_AXIS_TOLERANCE,
};
