//! Shared fixtures for integration tests: a scripted device handle and a
//! sink that records every committed frame.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hallpad::device::DeviceHandle;
use hallpad::error::DeviceError;
use hallpad::gamepad::{GamepadError, GamepadSink};
use hallpad::mapping::Button;

/// One scripted read result
#[derive(Debug, Clone)]
pub enum Step {
    Report(Vec<u8>),
    Error,
    Disconnect,
}

/// Device handle fed from a queue; reads `Ok(0)` when the queue is empty
pub struct ScriptedDevice {
    steps: Arc<Mutex<VecDeque<Step>>>,
    closed: Arc<AtomicBool>,
}

/// Test-side handle for pushing steps into a running [`ScriptedDevice`]
#[derive(Clone)]
pub struct DeviceScript {
    steps: Arc<Mutex<VecDeque<Step>>>,
    closed: Arc<AtomicBool>,
}

pub fn scripted_device() -> (ScriptedDevice, DeviceScript) {
    let steps = Arc::new(Mutex::new(VecDeque::new()));
    let closed = Arc::new(AtomicBool::new(false));
    (
        ScriptedDevice {
            steps: steps.clone(),
            closed: closed.clone(),
        },
        DeviceScript { steps, closed },
    )
}

impl DeviceScript {
    pub fn push(&self, step: Step) {
        self.steps.lock().push_back(step);
    }

    pub fn report(&self, bytes: &[u8]) {
        self.push(Step::Report(bytes.to_vec()));
    }

    pub fn is_drained(&self) -> bool {
        self.steps.lock().is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl DeviceHandle for ScriptedDevice {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DeviceError::Disconnected);
        }
        match self.steps.lock().pop_front() {
            None => Ok(0),
            Some(Step::Report(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(Step::Error) => Err(DeviceError::Read("scripted failure".into())),
            Some(Step::Disconnect) => Err(DeviceError::Disconnected),
        }
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Controller state as committed to the sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkFrame {
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub left: (i16, i16),
    pub right: (i16, i16),
    pub pressed: [bool; 8],
}

impl SinkFrame {
    pub fn is_zero(&self) -> bool {
        *self == SinkFrame::default()
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.pressed[button_index(button)]
    }
}

fn button_index(button: Button) -> usize {
    Button::ALL
        .iter()
        .position(|b| *b == button)
        .expect("button in ALL")
}

/// Sink that logs each committed frame
#[derive(Clone, Default)]
pub struct RecordingSink {
    staged: SinkFrame,
    pub frames: Arc<Mutex<Vec<SinkFrame>>>,
}

impl RecordingSink {
    pub fn last(&self) -> Option<SinkFrame> {
        self.frames.lock().last().copied()
    }

    pub fn count(&self) -> usize {
        self.frames.lock().len()
    }
}

impl GamepadSink for RecordingSink {
    fn set_left_trigger(&mut self, value: u8) -> Result<(), GamepadError> {
        self.staged.left_trigger = value;
        Ok(())
    }
    fn set_right_trigger(&mut self, value: u8) -> Result<(), GamepadError> {
        self.staged.right_trigger = value;
        Ok(())
    }
    fn set_left_stick(&mut self, x: i16, y: i16) -> Result<(), GamepadError> {
        self.staged.left = (x, y);
        Ok(())
    }
    fn set_right_stick(&mut self, x: i16, y: i16) -> Result<(), GamepadError> {
        self.staged.right = (x, y);
        Ok(())
    }
    fn press(&mut self, button: Button) -> Result<(), GamepadError> {
        self.staged.pressed[button_index(button)] = true;
        Ok(())
    }
    fn release(&mut self, button: Button) -> Result<(), GamepadError> {
        self.staged.pressed[button_index(button)] = false;
        Ok(())
    }
    fn commit(&mut self) -> Result<(), GamepadError> {
        self.frames.lock().push(self.staged);
        Ok(())
    }
}

/// Sink whose every write fails
#[derive(Default)]
pub struct FailingSink {
    pub attempts: Arc<Mutex<usize>>,
}

impl GamepadSink for FailingSink {
    fn set_left_trigger(&mut self, _value: u8) -> Result<(), GamepadError> {
        Ok(())
    }
    fn set_right_trigger(&mut self, _value: u8) -> Result<(), GamepadError> {
        Ok(())
    }
    fn set_left_stick(&mut self, _x: i16, _y: i16) -> Result<(), GamepadError> {
        Ok(())
    }
    fn set_right_stick(&mut self, _x: i16, _y: i16) -> Result<(), GamepadError> {
        Ok(())
    }
    fn press(&mut self, _button: Button) -> Result<(), GamepadError> {
        Ok(())
    }
    fn release(&mut self, _button: Button) -> Result<(), GamepadError> {
        Ok(())
    }
    fn commit(&mut self) -> Result<(), GamepadError> {
        *self.attempts.lock() += 1;
        Err(GamepadError::Unavailable)
    }
}

/// Build an analog report for `key` at magnitude `raw`
pub fn analog(key: u8, raw: u16) -> [u8; 8] {
    let [hi, lo] = raw.to_be_bytes();
    [0xA0, 0x00, 0x00, key, hi, lo, 0x00, 0x00]
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}
