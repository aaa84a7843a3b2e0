//! Gamepad button and stick layout.
//!
//! [`GamepadMapping::standard`] follows the W3C "standard" gamepad layout:
//! face buttons 0/1, Back/Start at 8/9, D-pad at 12–15, left stick on axes
//! 0 (x) and 1 (y, negative is up).

use crate::input::DeviceChange;
use crate::keymap::{EmulatorKey, KeyTransition};

/// Stick deflection at which an axis counts as a pressed direction.
pub const DEFAULT_AXIS_THRESHOLD: f32 = 0.5;

/// Binds one axis to a pair of opposite keys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisBinding {
    pub axis: usize,
    /// Pressed while the axis is at or below `-threshold`.
    pub negative: EmulatorKey,
    /// Pressed while the axis is at or above `threshold`.
    pub positive: EmulatorKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Negative,
    Centre,
    Positive,
}

/// Button-index and axis bindings for one kind of controller.
#[derive(Debug, Clone, PartialEq)]
pub struct GamepadMapping {
    buttons: Vec<(usize, EmulatorKey)>,
    axes: Vec<AxisBinding>,
    threshold: f32,
}

impl GamepadMapping {
    /// An empty mapping with the default stick threshold.
    pub fn new() -> Self {
        Self {
            buttons: Vec::new(),
            axes: Vec::new(),
            threshold: DEFAULT_AXIS_THRESHOLD,
        }
    }

    /// The W3C standard layout.
    pub fn standard() -> Self {
        Self::new()
            .button(0, EmulatorKey::A)
            .button(1, EmulatorKey::B)
            .button(8, EmulatorKey::Select)
            .button(9, EmulatorKey::Start)
            .button(12, EmulatorKey::Up)
            .button(13, EmulatorKey::Down)
            .button(14, EmulatorKey::Left)
            .button(15, EmulatorKey::Right)
            .axis(0, EmulatorKey::Left, EmulatorKey::Right)
            .axis(1, EmulatorKey::Up, EmulatorKey::Down)
    }

    #[must_use]
    pub fn button(mut self, index: usize, key: EmulatorKey) -> Self {
        self.buttons.retain(|(i, _)| *i != index);
        self.buttons.push((index, key));
        self
    }

    #[must_use]
    pub fn axis(mut self, axis: usize, negative: EmulatorKey, positive: EmulatorKey) -> Self {
        self.axes.retain(|b| b.axis != axis);
        self.axes.push(AxisBinding {
            axis,
            negative,
            positive,
        });
        self
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Key bound to button `index`, if any.
    pub fn key_for_button(&self, index: usize) -> Option<EmulatorKey> {
        self.buttons
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, key)| *key)
    }

    /// Turns one device change into key press and release edges.
    ///
    /// Button edges come first, in button-index order, then stick edges in
    /// binding order.  When a stick swings straight from one side to the
    /// other, the release of the old direction precedes the press of the new
    /// one.
    pub fn transitions(&self, change: &DeviceChange) -> Vec<KeyTransition> {
        let mut out: Vec<KeyTransition> = change
            .button_transitions()
            .into_iter()
            .filter_map(|t| {
                self.key_for_button(t.index).map(|key| KeyTransition {
                    key,
                    pressed: t.pressed,
                })
            })
            .collect();

        for binding in &self.axes {
            let old = self.direction(change.old_axes().get(binding.axis).copied());
            let new = self.direction(change.new_axes().get(binding.axis).copied());
            if old == new {
                continue;
            }
            if let Some(key) = binding.key_for(old) {
                out.push(KeyTransition::release(key));
            }
            if let Some(key) = binding.key_for(new) {
                out.push(KeyTransition::press(key));
            }
        }
        out
    }

    fn direction(&self, value: Option<f32>) -> Direction {
        match value {
            Some(v) if v <= -self.threshold => Direction::Negative,
            Some(v) if v >= self.threshold => Direction::Positive,
            _ => Direction::Centre,
        }
    }
}

impl Default for GamepadMapping {
    fn default() -> Self {
        Self::standard()
    }
}

impl AxisBinding {
    fn key_for(&self, direction: Direction) -> Option<EmulatorKey> {
        match direction {
            Direction::Negative => Some(self.negative),
            Direction::Positive => Some(self.positive),
            Direction::Centre => None,
        }
    }
}
