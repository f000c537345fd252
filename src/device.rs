//! Keyboard device handle
//!
//! The session only sees an already-opened [`DeviceHandle`]. Discovery and
//! interface selection live here, behind the `hid` feature.

use crate::error::DeviceError;

/// Non-blocking source of raw input reports
pub trait DeviceHandle: Send + 'static {
    /// Read one report into `buf`
    ///
    /// `Ok(0)` means no report is pending right now.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError>;

    /// Release the underlying device. Reads afterwards fail with
    /// [`DeviceError::Disconnected`].
    fn close(&mut self);
}

impl<D: DeviceHandle + ?Sized> DeviceHandle for Box<D> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        (**self).read(buf)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Which HID interface to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    /// Platform device path (e.g. `/dev/hidraw3`)
    Path(String),
    /// USB ids plus interface number (`None` takes the first interface)
    Interface {
        vid: u16,
        pid: u16,
        interface: Option<i32>,
    },
}

/// Default keyboard ids (Mchose Hall effect boards)
pub const DEFAULT_VID: u16 = 0x41E4;
pub const DEFAULT_PID: u16 = 0x211A;

impl std::fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceSelector::Path(path) => write!(f, "{}", path),
            DeviceSelector::Interface {
                vid,
                pid,
                interface,
            } => match interface {
                Some(i) => write!(f, "{:04x}:{:04x} interface {}", vid, pid, i),
                None => write!(f, "{:04x}:{:04x}", vid, pid),
            },
        }
    }
}

#[cfg(feature = "hid")]
pub use hid::{detect_analog_interface, HidDeviceHandle};

#[cfg(feature = "hid")]
mod hid {
    use super::{DeviceHandle, DeviceSelector};
    use crate::error::DeviceError;
    use crate::packet::report::ANALOG_MARKER;
    use hidapi::{HidApi, HidDevice};
    use std::ffi::CString;
    use tracing::{debug, info};

    /// Probe every HID interface for a pending vendor analog report
    ///
    /// Interfaces that cannot be opened are skipped. Only reports already
    /// queued are seen, so a key should be held while scanning.
    pub fn detect_analog_interface() -> Result<Option<DeviceSelector>, DeviceError> {
        let api = HidApi::new()?;
        let mut found: Vec<DeviceSelector> = Vec::new();
        let mut buf = [0u8; 64];

        for info in api.device_list() {
            let device = match info.open_device(&api) {
                Ok(d) => d,
                Err(e) => {
                    debug!("Skipping {:?}: {}", info.path(), e);
                    continue;
                }
            };
            if device.set_blocking_mode(false).is_err() {
                continue;
            }
            if let Ok(n) = device.read(&mut buf) {
                if n > 0 && buf[0] == ANALOG_MARKER {
                    found.push(DeviceSelector::Interface {
                        vid: info.vendor_id(),
                        pid: info.product_id(),
                        interface: Some(info.interface_number()),
                    });
                }
            }
        }

        found.sort_by_key(|sel| match sel {
            DeviceSelector::Interface {
                vid,
                pid,
                interface,
            } => (*vid, *pid, *interface),
            DeviceSelector::Path(_) => (0, 0, None),
        });
        Ok(found.into_iter().next())
    }

    /// hidapi-backed handle in non-blocking mode
    pub struct HidDeviceHandle {
        device: Option<HidDevice>,
        description: String,
    }

    impl HidDeviceHandle {
        /// Open the interface described by `selector`
        pub fn open(selector: &DeviceSelector) -> Result<Self, DeviceError> {
            let api = HidApi::new()?;
            let device = match selector {
                DeviceSelector::Path(path) => {
                    let path = CString::new(path.as_str())
                        .map_err(|_| DeviceError::Open(format!("invalid path {:?}", path)))?;
                    api.open_path(&path)?
                }
                DeviceSelector::Interface {
                    vid,
                    pid,
                    interface,
                } => {
                    let info = api
                        .device_list()
                        .find(|d| {
                            d.vendor_id() == *vid
                                && d.product_id() == *pid
                                && interface.map_or(true, |i| d.interface_number() == i)
                        })
                        .ok_or_else(|| DeviceError::NotFound(selector.to_string()))?;
                    debug!("Found {} at {:?}", selector, info.path());
                    info.open_device(&api)?
                }
            };
            device.set_blocking_mode(false)?;

            let description = match device.get_product_string() {
                Ok(Some(name)) => format!("{} ({})", name, selector),
                _ => selector.to_string(),
            };
            info!("Opened {}", description);

            Ok(Self {
                device: Some(device),
                description,
            })
        }

        pub fn description(&self) -> &str {
            &self.description
        }
    }

    impl DeviceHandle for HidDeviceHandle {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
            let device = self.device.as_ref().ok_or(DeviceError::Disconnected)?;
            Ok(device.read(buf)?)
        }

        fn close(&mut self) {
            if self.device.take().is_some() {
                debug!("Closed {}", self.description);
            }
        }
    }
}
