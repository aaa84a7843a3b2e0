//! Device samples and frame-to-frame change records.

use std::fmt;

/// Default tolerance below which an axis movement is treated as noise.
pub const DEFAULT_AXIS_TOLERANCE: f32 = 0.01;

/// Identifies one connected input device (the gamepad slot index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gamepad {}", self.0)
    }
}

/// Button and axis state of one device at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceSample {
    /// Pressed state per button, in the device's button order.
    pub buttons: Vec<bool>,
    /// Axis values per axis, usually in `-1.0..=1.0`.
    pub axes: Vec<f32>,
}

impl DeviceSample {
    pub fn new(buttons: Vec<bool>, axes: Vec<f32>) -> Self {
        Self { buttons, axes }
    }

    /// Returns `true` when `self` and `other` differ enough to report.
    ///
    /// Buttons compare exactly.  An axis counts as moved only when
    /// `|new - old| > tolerance`.  A different number of buttons or axes is
    /// always a change.
    pub fn differs_from(&self, other: &DeviceSample, tolerance: f32) -> bool {
        if self.buttons != other.buttons || self.axes.len() != other.axes.len() {
            return true;
        }
        self.axes
            .iter()
            .zip(&other.axes)
            .any(|(new, old)| axis_moved(*old, *new, tolerance))
    }
}

pub(crate) fn axis_moved(old: f32, new: f32, tolerance: f32) -> bool {
    (new - old).abs() > tolerance
}

/// A button that changed state between two samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonTransition {
    pub index: usize,
    pub pressed: bool,
}

/// An axis that moved between two samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisChange {
    pub index: usize,
    pub old: f32,
    pub new: f32,
}

/// One device's change between the previous tick and this one.
///
/// Listeners receive this by reference; it carries both full samples so a
/// listener can diff whichever parts it cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceChange {
    pub device: DeviceId,
    pub old: DeviceSample,
    pub new: DeviceSample,
    pub(crate) tolerance: f32,
}

impl DeviceChange {
    pub fn new(device: DeviceId, old: DeviceSample, new: DeviceSample, tolerance: f32) -> Self {
        Self {
            device,
            old,
            new,
            tolerance,
        }
    }

    pub fn old_buttons(&self) -> &[bool] {
        &self.old.buttons
    }

    pub fn new_buttons(&self) -> &[bool] {
        &self.new.buttons
    }

    pub fn old_axes(&self) -> &[f32] {
        &self.old.axes
    }

    pub fn new_axes(&self) -> &[f32] {
        &self.new.axes
    }

    /// Buttons whose pressed state differs, in index order.
    ///
    /// A button present in only one sample is compared against "released".
    pub fn button_transitions(&self) -> Vec<ButtonTransition> {
        let len = self.old.buttons.len().max(self.new.buttons.len());
        (0..len)
            .filter_map(|index| {
                let old = self.old.buttons.get(index).copied().unwrap_or(false);
                let new = self.new.buttons.get(index).copied().unwrap_or(false);
                (old != new).then_some(ButtonTransition {
                    index,
                    pressed: new,
                })
            })
            .collect()
    }

    /// Axes that moved by more than the poller's tolerance, in index order.
    ///
    /// An axis present in only one sample is compared against `0.0`.
    pub fn axis_changes(&self) -> Vec<AxisChange> {
        let len = self.old.axes.len().max(self.new.axes.len());
        (0..len)
            .filter_map(|index| {
                let old = self.old.axes.get(index).copied().unwrap_or(0.0);
                let new = self.new.axes.get(index).copied().unwrap_or(0.0);
                axis_moved(old, new, self.tolerance).then_some(AxisChange { index, old, new })
            })
            .collect()
    }
}
