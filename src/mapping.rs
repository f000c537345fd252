//! Key-to-gamepad action mapping
//!
//! Labels are parsed into [`Action`] once when the table is built, so the
//! per-report path is a plain array lookup.

use crate::keys::{LogicalKey, KEY_SPACE};

/// Stick direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Gamepad buttons that keys can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    A,
    B,
    X,
    Y,
    LeftShoulder,
    RightShoulder,
    Start,
    Back,
}

impl Button {
    pub const ALL: &'static [Button] = &[
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
        Button::LeftShoulder,
        Button::RightShoulder,
        Button::Start,
        Button::Back,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Button::A => "A",
            Button::B => "B",
            Button::X => "X",
            Button::Y => "Y",
            Button::LeftShoulder => "LB",
            Button::RightShoulder => "RB",
            Button::Start => "Start",
            Button::Back => "Back",
        }
    }
}

/// What a mapped key does on the virtual gamepad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Action {
    #[default]
    None,
    RightTrigger,
    LeftTrigger,
    LeftStick(Direction),
    RightStick(Direction),
    Button(Button),
}

impl Action {
    /// Every action, in menu order
    pub const ALL: &'static [Action] = &[
        Action::None,
        Action::RightTrigger,
        Action::LeftTrigger,
        Action::LeftStick(Direction::Up),
        Action::LeftStick(Direction::Down),
        Action::LeftStick(Direction::Left),
        Action::LeftStick(Direction::Right),
        Action::RightStick(Direction::Up),
        Action::RightStick(Direction::Down),
        Action::RightStick(Direction::Left),
        Action::RightStick(Direction::Right),
        Action::Button(Button::A),
        Action::Button(Button::B),
        Action::Button(Button::X),
        Action::Button(Button::Y),
        Action::Button(Button::LeftShoulder),
        Action::Button(Button::RightShoulder),
        Action::Button(Button::Start),
        Action::Button(Button::Back),
    ];

    /// Human-readable label, as stored in config files
    pub fn label(&self) -> &'static str {
        use Direction::*;
        match self {
            Action::None => "None",
            Action::RightTrigger => "Right Trigger (RT) - Accelerate",
            Action::LeftTrigger => "Left Trigger (LT) - Brake",
            Action::LeftStick(Up) => "Left Stick: UP (Y+)",
            Action::LeftStick(Down) => "Left Stick: DOWN (Y-)",
            Action::LeftStick(Left) => "Left Stick: LEFT (X-)",
            Action::LeftStick(Right) => "Left Stick: RIGHT (X+)",
            Action::RightStick(Up) => "Right Stick: UP",
            Action::RightStick(Down) => "Right Stick: DOWN",
            Action::RightStick(Left) => "Right Stick: LEFT",
            Action::RightStick(Right) => "Right Stick: RIGHT",
            Action::Button(Button::A) => "Button A",
            Action::Button(Button::B) => "Button B",
            Action::Button(Button::X) => "Button X",
            Action::Button(Button::Y) => "Button Y",
            Action::Button(Button::LeftShoulder) => "Button LB",
            Action::Button(Button::RightShoulder) => "Button RB",
            Action::Button(Button::Start) => "Button Start",
            Action::Button(Button::Back) => "Button Back",
        }
    }

    /// Short identifier (`left_stick_up`, `button_a`, ...)
    pub fn ident(&self) -> &'static str {
        use Direction::*;
        match self {
            Action::None => "none",
            Action::RightTrigger => "right_trigger",
            Action::LeftTrigger => "left_trigger",
            Action::LeftStick(Up) => "left_stick_up",
            Action::LeftStick(Down) => "left_stick_down",
            Action::LeftStick(Left) => "left_stick_left",
            Action::LeftStick(Right) => "left_stick_right",
            Action::RightStick(Up) => "right_stick_up",
            Action::RightStick(Down) => "right_stick_down",
            Action::RightStick(Left) => "right_stick_left",
            Action::RightStick(Right) => "right_stick_right",
            Action::Button(Button::A) => "button_a",
            Action::Button(Button::B) => "button_b",
            Action::Button(Button::X) => "button_x",
            Action::Button(Button::Y) => "button_y",
            Action::Button(Button::LeftShoulder) => "button_lb",
            Action::Button(Button::RightShoulder) => "button_rb",
            Action::Button(Button::Start) => "button_start",
            Action::Button(Button::Back) => "button_back",
        }
    }

    /// Parse a label or identifier
    pub fn from_label(label: &str) -> Option<Action> {
        let label = label.trim();
        Action::ALL
            .iter()
            .find(|a| a.label().eq_ignore_ascii_case(label) || a.ident().eq_ignore_ascii_case(label))
            .copied()
    }
}

/// Key-to-action table covering the whole key space
#[derive(Clone, PartialEq, Eq)]
pub struct MappingTable {
    actions: Box<[Action; KEY_SPACE]>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self {
            actions: Box::new([Action::None; KEY_SPACE]),
        }
    }

    #[inline]
    pub fn get(&self, key: LogicalKey) -> Action {
        self.actions[key as usize]
    }

    pub fn set(&mut self, key: LogicalKey, action: Action) {
        self.actions[key as usize] = action;
    }

    /// Mapped keys and their actions, ascending by key
    pub fn iter(&self) -> impl Iterator<Item = (LogicalKey, Action)> + '_ {
        self.actions
            .iter()
            .enumerate()
            .filter(|(_, a)| **a != Action::None)
            .map(|(k, a)| (k as LogicalKey, *a))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl Default for MappingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<(LogicalKey, Action)> for MappingTable {
    fn from_iter<I: IntoIterator<Item = (LogicalKey, Action)>>(iter: I) -> Self {
        let mut table = MappingTable::new();
        for (key, action) in iter {
            table.set(key, action);
        }
        table
    }
}

impl std::fmt::Debug for MappingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
