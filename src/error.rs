//! Error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the keyboard device handle
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Failed to open device: {0}")]
    Open(String),

    #[error("HID permission denied: {0}")]
    PermissionDenied(String),

    #[error("Read failed: {0}")]
    Read(String),

    #[error("Device disconnected")]
    Disconnected,
}

impl DeviceError {
    /// Whether the handle is gone for good (no point retrying reads)
    pub fn is_fatal(&self) -> bool {
        matches!(self, DeviceError::Disconnected | DeviceError::NotFound(_))
    }
}

#[cfg(feature = "hid")]
impl From<hidapi::HidError> for DeviceError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if msg.contains("Permission denied") || msg.contains("EPERM") || msg.contains("EACCES") {
            DeviceError::PermissionDenied(msg)
        } else if msg.contains("No such device") || msg.contains("ENODEV") {
            DeviceError::Disconnected
        } else {
            DeviceError::Read(msg)
        }
    }
}

/// Errors loading or interpreting the persisted configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid key \"{0}\" in mappings")]
    InvalidKey(String),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
}

/// Errors from session lifecycle operations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session is already connected")]
    AlreadyConnected,

    #[error(transparent)]
    Open(#[from] DeviceError),

    #[error("Virtual controller is not available")]
    SinkUnavailable,

    #[error("Failed to spawn session thread: {0}")]
    Spawn(#[source] std::io::Error),
}
