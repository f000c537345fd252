//! Input report parsing
//!
//! Two framings arrive on the keyboard's analog interface:
//!
//! - Vendor analog report: `[A0, .., .., key, mag_hi, mag_lo, ..]`, one key
//!   per report with a big-endian 16-bit magnitude.
//! - Boot keyboard report: `[modifiers, 00, k1, k2, k3, k4, k5, k6]`, binary
//!   state for up to six keys plus eight modifiers.
//!
//! Framing is decided per report from its shape alone; there is no sticky
//! mode. Anything else is `NotRecognized`. Parsing never fails or allocates.

use crate::keys::{KeySet, LogicalKey};

/// Report framing constants
pub mod report {
    /// First byte of a vendor analog report
    pub const ANALOG_MARKER: u8 = 0xA0;
    /// Minimum length of a vendor analog report
    pub const ANALOG_MIN_LEN: usize = 7;
    /// Offset of the key code in an analog report
    pub const ANALOG_KEY_OFFSET: usize = 3;
    /// Offset of the big-endian magnitude in an analog report
    pub const ANALOG_MAGNITUDE_OFFSET: usize = 4;

    /// Exact length of a boot keyboard report
    pub const BOOT_LEN: usize = 8;
    /// Keycode reported in every slot on rollover overflow
    pub const BOOT_ROLLOVER: u8 = 0x01;
    /// Usage code of the first modifier (left control)
    pub const MODIFIER_BASE: u8 = 0xE0;
}

/// One analog key reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalogSample {
    pub key: LogicalKey,
    pub raw: u16,
}

/// Result of parsing one input report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    /// Vendor analog report
    Analog(AnalogSample),
    /// Boot keyboard report: every key currently held (modifiers included)
    Boot(KeySet),
    /// Foreign or malformed framing
    NotRecognized,
}

impl Report {
    /// Expand into analog samples. Boot keys read as fully actuated.
    pub fn samples(&self, max_pressure: u16) -> impl Iterator<Item = AnalogSample> + '_ {
        let (single, held) = match self {
            Report::Analog(sample) => (Some(*sample), None),
            Report::Boot(keys) => (None, Some(keys)),
            Report::NotRecognized => (None, None),
        };
        single.into_iter().chain(
            held.into_iter()
                .flat_map(|keys| keys.iter())
                .map(move |key| AnalogSample {
                    key,
                    raw: max_pressure,
                }),
        )
    }
}

/// Parse a raw input report
pub fn parse_report(data: &[u8]) -> Report {
    if let Some(sample) = parse_analog(data) {
        return Report::Analog(sample);
    }
    parse_boot(data).map_or(Report::NotRecognized, Report::Boot)
}

/// Parse a vendor analog report
///
/// Format: `[A0, ?, ?, key, mag_hi, mag_lo, ?, ...]`
pub fn parse_analog(data: &[u8]) -> Option<AnalogSample> {
    if data.len() < report::ANALOG_MIN_LEN || data[0] != report::ANALOG_MARKER {
        return None;
    }
    let key = data[report::ANALOG_KEY_OFFSET];
    let raw = u16::from_be_bytes([
        data[report::ANALOG_MAGNITUDE_OFFSET],
        data[report::ANALOG_MAGNITUDE_OFFSET + 1],
    ]);
    Some(AnalogSample { key, raw })
}

/// Parse a boot keyboard report into the set of held keys
///
/// Format: `[modifiers, reserved, k1..k6]`. Modifier bit `n` is usage `0xE0 + n`.
/// A rollover report (slots filled with `0x01`) carries no usable state.
pub fn parse_boot(data: &[u8]) -> Option<KeySet> {
    if data.len() != report::BOOT_LEN || data[1] != 0 {
        return None;
    }
    let slots = &data[2..];
    if slots.contains(&report::BOOT_ROLLOVER) {
        return None;
    }

    let mut held = KeySet::new();
    let modifiers = data[0];
    for bit in 0..8u8 {
        if modifiers & (1 << bit) != 0 {
            held.insert(report::MODIFIER_BASE + bit);
        }
    }
    for &key in slots.iter().filter(|&&k| k != 0) {
        held.insert(key);
    }
    Some(held)
}
