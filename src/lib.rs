//! Hall-effect keyboard to virtual gamepad mapper
//!
//! Reads per-key analog travel from a Hall-effect keyboard, conditions it
//! through a tuning profile, resolves mapped keys into gamepad sticks,
//! triggers and buttons, and drives a uinput virtual controller.

pub mod conditioner;
pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod gamepad;
pub mod keys;
pub mod mapper;
pub mod mapping;
pub mod packet;
pub mod profile;
pub mod session;
pub mod stress;
pub mod sync;

pub use conditioner::{condition, KeyState, SignalConditioner};
pub use config::{ConfigFormat, DeviceConfig, HallConfig};
#[cfg(feature = "hid")]
pub use device::HidDeviceHandle;
pub use device::{DeviceHandle, DeviceSelector};
pub use error::{ConfigError, DeviceError, SessionError};
pub use frame::{ButtonSet, OutputFrame};
pub use gamepad::{GamepadError, GamepadSink, VirtualGamepad};
pub use keys::{KeySet, LogicalKey};
pub use mapper::{resolve_frame, BUTTON_THRESHOLD};
pub use mapping::{Action, Button, Direction, MappingTable};
pub use packet::{parse_report, AnalogSample, Report};
pub use profile::{Curve, Shared, TuningProfile};
pub use session::{
    Pipeline, Session, SessionEvent, SessionSettings, SessionState, StatsSnapshot,
};
pub use sync::{interpolate, OutputSynchronizer};
