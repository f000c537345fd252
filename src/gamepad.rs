//! Virtual gamepad output
//!
//! [`GamepadSink`] is the controller abstraction the output thread drives.
//! [`VirtualGamepad`] implements it with an evdev/uinput device laid out like
//! an Xbox 360 pad, so games pick it up as a standard controller.

use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AbsInfo, AbsoluteAxisType, AttributeSet, BusType, EventType, InputEvent, InputId, Key,
    UinputAbsSetup,
};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::frame::OutputFrame;
use crate::mapping::Button;

/// Stick value range (signed 16-bit, symmetric)
pub const STICK_MIN: i16 = -32767;
pub const STICK_MAX: i16 = 32767;
/// Trigger value range (8-bit)
pub const TRIGGER_MAX: u8 = 255;

/// Errors from virtual gamepad operations
#[derive(Debug, Error)]
pub enum GamepadError {
    #[error("Failed to create virtual device: {0}")]
    CreateDevice(#[source] std::io::Error),
    #[error("Failed to emit event: {0}")]
    EmitEvent(#[source] std::io::Error),
    #[error("Device not available")]
    Unavailable,
}

/// Controller that accepts trigger/stick/button updates
///
/// Setters stage values; `commit` flushes them as one frame.
pub trait GamepadSink: Send + 'static {
    fn set_left_trigger(&mut self, value: u8) -> Result<(), GamepadError>;
    fn set_right_trigger(&mut self, value: u8) -> Result<(), GamepadError>;
    /// `y` is positive up
    fn set_left_stick(&mut self, x: i16, y: i16) -> Result<(), GamepadError>;
    /// `y` is positive up
    fn set_right_stick(&mut self, x: i16, y: i16) -> Result<(), GamepadError>;
    fn press(&mut self, button: Button) -> Result<(), GamepadError>;
    fn release(&mut self, button: Button) -> Result<(), GamepadError>;
    fn commit(&mut self) -> Result<(), GamepadError>;
}

/// Scale a [0, 1] trigger value to the 8-bit range
pub fn trigger_to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * TRIGGER_MAX as f32) as u8
}

/// Scale a [-1, 1] stick value to the signed 16-bit range
pub fn stick_to_i16(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * STICK_MAX as f32) as i16
}

/// Write a whole frame to a sink and commit it
///
/// Every setter runs and the frame is always committed, even when some
/// calls fail. The first error is returned.
pub fn write_frame<S: GamepadSink + ?Sized>(
    sink: &mut S,
    frame: &OutputFrame,
) -> Result<(), GamepadError> {
    let mut first_err = None;
    let mut keep = |result: Result<(), GamepadError>| {
        if let Err(e) = result {
            first_err.get_or_insert(e);
        }
    };

    keep(sink.set_left_trigger(trigger_to_u8(frame.left_trigger)));
    keep(sink.set_right_trigger(trigger_to_u8(frame.right_trigger)));
    keep(sink.set_left_stick(stick_to_i16(frame.left_x), stick_to_i16(frame.left_y)));
    keep(sink.set_right_stick(stick_to_i16(frame.right_x), stick_to_i16(frame.right_y)));
    for &button in Button::ALL {
        keep(if frame.buttons.has(button) {
            sink.press(button)
        } else {
            sink.release(button)
        });
    }
    keep(sink.commit());

    first_err.map_or(Ok(()), Err)
}

impl<S: GamepadSink + ?Sized> GamepadSink for Box<S> {
    fn set_left_trigger(&mut self, value: u8) -> Result<(), GamepadError> {
        (**self).set_left_trigger(value)
    }
    fn set_right_trigger(&mut self, value: u8) -> Result<(), GamepadError> {
        (**self).set_right_trigger(value)
    }
    fn set_left_stick(&mut self, x: i16, y: i16) -> Result<(), GamepadError> {
        (**self).set_left_stick(x, y)
    }
    fn set_right_stick(&mut self, x: i16, y: i16) -> Result<(), GamepadError> {
        (**self).set_right_stick(x, y)
    }
    fn press(&mut self, button: Button) -> Result<(), GamepadError> {
        (**self).press(button)
    }
    fn release(&mut self, button: Button) -> Result<(), GamepadError> {
        (**self).release(button)
    }
    fn commit(&mut self) -> Result<(), GamepadError> {
        (**self).commit()
    }
}

/// Virtual gamepad device
pub struct VirtualGamepad {
    device: VirtualDevice,
    /// Last emitted value per event code (for change detection)
    values: HashMap<(u16, u16), i32>,
    /// Events staged since the last commit
    pending: Vec<InputEvent>,
}

impl VirtualGamepad {
    /// Create a new virtual gamepad device
    ///
    /// # Arguments
    /// * `name` - Device name (shown in `evtest` and game controller settings)
    pub fn new(name: &str) -> Result<Self, GamepadError> {
        let mut keys = AttributeSet::<Key>::new();
        for &button in Button::ALL {
            keys.insert(button_to_key(button));
        }

        let mut builder = VirtualDeviceBuilder::new()
            .map_err(GamepadError::CreateDevice)?
            .name(name)
            // Microsoft X-Box 360 pad ids so SDL applies its standard mapping
            .input_id(InputId::new(BusType::BUS_USB, 0x045e, 0x028e, 0x0110))
            .with_keys(&keys)
            .map_err(GamepadError::CreateDevice)?;

        for axis in [
            AbsoluteAxisType::ABS_X,
            AbsoluteAxisType::ABS_Y,
            AbsoluteAxisType::ABS_RX,
            AbsoluteAxisType::ABS_RY,
        ] {
            builder = builder
                .with_absolute_axis(&UinputAbsSetup::new(
                    axis,
                    AbsInfo::new(0, STICK_MIN as i32, STICK_MAX as i32, 16, 128, 0),
                ))
                .map_err(GamepadError::CreateDevice)?;
        }
        for axis in [AbsoluteAxisType::ABS_Z, AbsoluteAxisType::ABS_RZ] {
            builder = builder
                .with_absolute_axis(&UinputAbsSetup::new(
                    axis,
                    AbsInfo::new(0, 0, TRIGGER_MAX as i32, 0, 0, 0),
                ))
                .map_err(GamepadError::CreateDevice)?;
        }

        let device = builder.build().map_err(GamepadError::CreateDevice)?;

        Ok(Self {
            device,
            values: HashMap::new(),
            pending: Vec::with_capacity(16),
        })
    }

    /// Get the device path (e.g., /dev/input/eventX)
    pub fn device_path(&mut self) -> Option<std::path::PathBuf> {
        self.device
            .enumerate_dev_nodes_blocking()
            .ok()?
            .next()?
            .ok()
    }

    /// Stage an event if its value changed since the last one staged
    fn stage(&mut self, kind: EventType, code: u16, value: i32) {
        if self.values.get(&(kind.0, code)) == Some(&value) {
            return;
        }
        self.values.insert((kind.0, code), value);
        self.pending.push(InputEvent::new(kind, code, value));
    }

    fn stage_abs(&mut self, axis: AbsoluteAxisType, value: i32) {
        self.stage(EventType::ABSOLUTE, axis.0, value);
    }
}

impl GamepadSink for VirtualGamepad {
    fn set_left_trigger(&mut self, value: u8) -> Result<(), GamepadError> {
        self.stage_abs(AbsoluteAxisType::ABS_Z, value as i32);
        Ok(())
    }

    fn set_right_trigger(&mut self, value: u8) -> Result<(), GamepadError> {
        self.stage_abs(AbsoluteAxisType::ABS_RZ, value as i32);
        Ok(())
    }

    // evdev Y axes grow downwards
    fn set_left_stick(&mut self, x: i16, y: i16) -> Result<(), GamepadError> {
        self.stage_abs(AbsoluteAxisType::ABS_X, x as i32);
        self.stage_abs(AbsoluteAxisType::ABS_Y, -(y as i32));
        Ok(())
    }

    fn set_right_stick(&mut self, x: i16, y: i16) -> Result<(), GamepadError> {
        self.stage_abs(AbsoluteAxisType::ABS_RX, x as i32);
        self.stage_abs(AbsoluteAxisType::ABS_RY, -(y as i32));
        Ok(())
    }

    fn press(&mut self, button: Button) -> Result<(), GamepadError> {
        self.stage(EventType::KEY, button_to_key(button).code(), 1);
        Ok(())
    }

    fn release(&mut self, button: Button) -> Result<(), GamepadError> {
        self.stage(EventType::KEY, button_to_key(button).code(), 0);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), GamepadError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let result = self.device.emit(&self.pending);
        if result.is_err() {
            // Re-send everything next time instead of trusting stale values
            self.values.clear();
        }
        self.pending.clear();
        result.map_err(|e| {
            debug!("Gamepad emit failed: {}", e);
            GamepadError::EmitEvent(e)
        })
    }
}

/// Button layout of the xpad driver
fn button_to_key(button: Button) -> Key {
    match button {
        Button::A => Key::BTN_SOUTH,
        Button::B => Key::BTN_EAST,
        Button::X => Key::BTN_NORTH,
        Button::Y => Key::BTN_WEST,
        Button::LeftShoulder => Key::BTN_TL,
        Button::RightShoulder => Key::BTN_TR,
        Button::Start => Key::BTN_START,
        Button::Back => Key::BTN_SELECT,
    }
}
