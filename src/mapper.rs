//! Active-key to gamepad frame resolution
//!
//! Every active key with a mapped action contributes its conditioned value.
//! Keys driving the same direction combine by max; the two directions of
//! an axis are then netted (positive minus negative).

use crate::frame::{ButtonSet, OutputFrame};
use crate::keys::{KeySet, LogicalKey};
use crate::mapping::{Action, Direction, MappingTable};

/// Conditioned value a button key must exceed to press its button
pub const BUTTON_THRESHOLD: f32 = 0.4;

/// Per-direction maxima for one stick axis
#[derive(Debug, Default, Clone, Copy)]
struct AxisAccumulator {
    positive: f32,
    negative: f32,
}

impl AxisAccumulator {
    fn push_positive(&mut self, value: f32) {
        self.positive = self.positive.max(value);
    }

    fn push_negative(&mut self, value: f32) {
        self.negative = self.negative.max(value);
    }

    /// Net axis value: positive pushes up, negative pushes down
    fn combined(&self) -> f32 {
        (self.positive - self.negative).clamp(-1.0, 1.0)
    }
}

#[derive(Debug, Default)]
struct StickAccumulator {
    x: AxisAccumulator,
    y: AxisAccumulator,
}

impl StickAccumulator {
    fn push(&mut self, direction: Direction, value: f32) {
        match direction {
            Direction::Up => self.y.push_positive(value),
            Direction::Down => self.y.push_negative(value),
            Direction::Right => self.x.push_positive(value),
            Direction::Left => self.x.push_negative(value),
        }
    }
}

/// Resolve the active keys into one output frame
///
/// `value` returns the conditioned value (0.0 - 1.0) of a key.
pub fn resolve_frame<F>(active: &KeySet, mapping: &MappingTable, value: F) -> OutputFrame
where
    F: Fn(LogicalKey) -> f32,
{
    let mut left = StickAccumulator::default();
    let mut right = StickAccumulator::default();
    let mut left_trigger = 0.0f32;
    let mut right_trigger = 0.0f32;
    let mut buttons = ButtonSet::empty();

    for key in active.iter() {
        let action = mapping.get(key);
        if action == Action::None {
            continue;
        }

        let v = value(key);
        match action {
            Action::None => {}
            Action::RightTrigger => right_trigger = right_trigger.max(v),
            Action::LeftTrigger => left_trigger = left_trigger.max(v),
            Action::LeftStick(dir) => left.push(dir, v),
            Action::RightStick(dir) => right.push(dir, v),
            Action::Button(button) => {
                if v > BUTTON_THRESHOLD {
                    buttons |= ButtonSet::from(button);
                }
            }
        }
    }

    OutputFrame {
        left_x: left.x.combined(),
        left_y: left.y.combined(),
        right_x: right.x.combined(),
        right_y: right.y.combined(),
        left_trigger: left_trigger.clamp(0.0, 1.0),
        right_trigger: right_trigger.clamp(0.0, 1.0),
        buttons,
    }
}
