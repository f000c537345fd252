//! Gamepad output frames

use bitflags::bitflags;

use crate::mapping::Button;

/// Minimum per-field change that counts as a new frame
pub const FRAME_EPSILON: f32 = 1e-4;

bitflags! {
    /// Set of pressed buttons
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ButtonSet: u8 {
        const A = 1 << 0;
        const B = 1 << 1;
        const X = 1 << 2;
        const Y = 1 << 3;
        const LEFT_SHOULDER = 1 << 4;
        const RIGHT_SHOULDER = 1 << 5;
        const START = 1 << 6;
        const BACK = 1 << 7;
    }
}

impl From<Button> for ButtonSet {
    fn from(button: Button) -> Self {
        match button {
            Button::A => ButtonSet::A,
            Button::B => ButtonSet::B,
            Button::X => ButtonSet::X,
            Button::Y => ButtonSet::Y,
            Button::LeftShoulder => ButtonSet::LEFT_SHOULDER,
            Button::RightShoulder => ButtonSet::RIGHT_SHOULDER,
            Button::Start => ButtonSet::START,
            Button::Back => ButtonSet::BACK,
        }
    }
}

impl ButtonSet {
    pub fn has(&self, button: Button) -> bool {
        self.contains(ButtonSet::from(button))
    }
}

/// One complete virtual controller state
///
/// Sticks are in [-1, 1] (up and right positive), triggers in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OutputFrame {
    pub left_x: f32,
    pub left_y: f32,
    pub right_x: f32,
    pub right_y: f32,
    pub left_trigger: f32,
    pub right_trigger: f32,
    pub buttons: ButtonSet,
}

impl OutputFrame {
    /// All sticks centered, triggers and buttons released
    pub const ZERO: OutputFrame = OutputFrame {
        left_x: 0.0,
        left_y: 0.0,
        right_x: 0.0,
        right_y: 0.0,
        left_trigger: 0.0,
        right_trigger: 0.0,
        buttons: ButtonSet::empty(),
    };

    fn axes(&self) -> [f32; 6] {
        [
            self.left_x,
            self.left_y,
            self.right_x,
            self.right_y,
            self.left_trigger,
            self.right_trigger,
        ]
    }

    /// Largest absolute per-axis difference (buttons excluded)
    pub fn max_delta(&self, other: &OutputFrame) -> f32 {
        self.axes()
            .iter()
            .zip(other.axes().iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max)
    }

    /// True when any axis moved by more than [`FRAME_EPSILON`] or buttons changed
    pub fn differs(&self, other: &OutputFrame) -> bool {
        self.buttons != other.buttons || self.max_delta(other) > FRAME_EPSILON
    }

    /// Linear blend towards `target`; buttons switch to the target's immediately
    pub fn lerp(&self, target: &OutputFrame, t: f32) -> OutputFrame {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        OutputFrame {
            left_x: mix(self.left_x, target.left_x),
            left_y: mix(self.left_y, target.left_y),
            right_x: mix(self.right_x, target.right_x),
            right_y: mix(self.right_y, target.right_y),
            left_trigger: mix(self.left_trigger, target.left_trigger),
            right_trigger: mix(self.right_trigger, target.right_trigger),
            buttons: target.buttons,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == OutputFrame::ZERO
    }
}
