//! Persisted configuration
//!
//! TOML by default; files ending in `.json` use the JSON layout of
//! `hall_config.json`:
//!
//! ```json
//! {
//!   "mappings": { "26": "Left Stick: UP (Y+)", "8": "Right Trigger (RT) - Accelerate" },
//!   "settings": { "deadzone": 30, "sensitivity": 1.0, "max_pressure": 600, "curve": "linear" },
//!   "device_info": { "vid": 16868, "pid": 8474, "iface": 1 }
//! }
//! ```
//!
//! Mapping keys are HID usage codes (decimal, `0x` hex, or a key name) and
//! values are action labels. Old Spanish labels are translated on load.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::device::DeviceSelector;
use crate::error::ConfigError;
use crate::keys::{key_name, parse_key, LogicalKey};
use crate::mapping::{Action, Direction, MappingTable};
use crate::profile::TuningProfile;
use crate::session::SessionSettings;

/// Action labels written by older Spanish-language versions
const LEGACY_LABELS: &[(&str, &str)] = &[
    ("Ninguna", "None"),
    ("Gatillo Derecho (RT) - Acelerar", "Right Trigger (RT) - Accelerate"),
    ("Gatillo Izquierdo (LT) - Frenar", "Left Trigger (LT) - Brake"),
    ("Stick Izquierdo: ARRIBA (Y+)", "Left Stick: UP (Y+)"),
    ("Stick Izquierdo: ABAJO (Y-)", "Left Stick: DOWN (Y-)"),
    ("Stick Izquierdo: IZQUIERDA (X-)", "Left Stick: LEFT (X-)"),
    ("Stick Izquierdo: DERECHA (X+)", "Left Stick: RIGHT (X+)"),
    ("Stick Derecho: ARRIBA", "Right Stick: UP"),
    ("Stick Derecho: ABAJO", "Right Stick: DOWN"),
    ("Stick Derecho: IZQUIERDA", "Right Stick: LEFT"),
    ("Stick Derecho: DERECHA", "Right Stick: RIGHT"),
    ("Botón A", "Button A"),
    ("Botón B", "Button B"),
    ("Botón X", "Button X"),
    ("Botón Y", "Button Y"),
    ("Boton A", "Button A"),
    ("Boton B", "Button B"),
    ("Boton X", "Button X"),
    ("Boton Y", "Button Y"),
    // Studio variant, with emoji prefixes
    ("🎮 RT - Acelerar", "Right Trigger (RT) - Accelerate"),
    ("🎮 LT - Frenar", "Left Trigger (LT) - Brake"),
    ("🕹️ Stick Izq: ARRIBA", "Left Stick: UP (Y+)"),
    ("🕹️ Stick Izq: ABAJO", "Left Stick: DOWN (Y-)"),
    ("🕹️ Stick Izq: IZQUIERDA", "Left Stick: LEFT (X-)"),
    ("🕹️ Stick Izq: DERECHA", "Left Stick: RIGHT (X+)"),
    ("🕹️ Stick Der: ARRIBA", "Right Stick: UP"),
    ("🕹️ Stick Der: ABAJO", "Right Stick: DOWN"),
    ("🕹️ Stick Der: IZQUIERDA", "Right Stick: LEFT"),
    ("🕹️ Stick Der: DERECHA", "Right Stick: RIGHT"),
    ("🔘 Botón A", "Button A"),
    ("🔘 Botón B", "Button B"),
    ("🔘 Botón X", "Button X"),
    ("🔘 Botón Y", "Button Y"),
    ("🔘 LB (Bumper Izq)", "Button LB"),
    ("🔘 RB (Bumper Der)", "Button RB"),
    ("🔘 Start", "Button Start"),
    ("🔘 Back", "Button Back"),
];

/// Emoji variation selector, present or not depending on the writer
const VARIATION_SELECTOR: char = '\u{FE0F}';

fn same_label(a: &str, b: &str) -> bool {
    let visible = |s: &str| s.chars().filter(|c| *c != VARIATION_SELECTOR).collect::<String>();
    a == b || visible(a) == visible(b)
}

/// Translate a legacy action label; other labels pass through unchanged
pub fn translate_legacy_label(label: &str) -> &str {
    LEGACY_LABELS
        .iter()
        .find(|(legacy, _)| same_label(legacy, label.trim()))
        .map_or(label, |(_, english)| *english)
}

/// On-disk format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

/// Saved keyboard interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub vid: u16,
    pub pid: u16,
    /// Interface number; any interface when absent
    #[serde(default, alias = "iface", skip_serializing_if = "Option::is_none")]
    pub interface: Option<i32>,
    /// Explicit device path, takes precedence over the ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl DeviceConfig {
    pub fn selector(&self) -> DeviceSelector {
        match &self.path {
            Some(path) => DeviceSelector::Path(path.clone()),
            None => DeviceSelector::Interface {
                vid: self.vid,
                pid: self.pid,
                interface: self.interface,
            },
        }
    }
}

/// Complete configuration record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HallConfig {
    /// Name of the virtual gamepad device
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default, alias = "device_info", skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceConfig>,
    /// Key (code or name) → action label
    #[serde(default, alias = "Mappings")]
    pub mappings: BTreeMap<String, String>,
    #[serde(default, alias = "Settings")]
    pub settings: TuningProfile,
    #[serde(default)]
    pub session: SessionSettings,
}

fn default_device_name() -> String {
    "Hallpad Virtual Gamepad".to_string()
}

impl Default for HallConfig {
    fn default() -> Self {
        // WASD on the left stick, Q/E on the triggers
        let mappings = [
            ("W", Action::LeftStick(Direction::Up)),
            ("S", Action::LeftStick(Direction::Down)),
            ("A", Action::LeftStick(Direction::Left)),
            ("D", Action::LeftStick(Direction::Right)),
            ("Q", Action::LeftTrigger),
            ("E", Action::RightTrigger),
        ]
        .into_iter()
        .map(|(key, action)| (key.to_string(), action.label().to_string()))
        .collect();

        Self {
            device_name: default_device_name(),
            device: None,
            mappings,
            settings: TuningProfile::default(),
            session: SessionSettings::default(),
        }
    }
}

impl HallConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hallpad")
            .join("config.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content, ConfigFormat::from_path(path))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse config text without validating it
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        Ok(match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        })
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = match ConfigFormat::from_path(path) {
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
        };
        std::fs::write(path, content).map_err(io_err)
    }

    /// Check settings and mapping keys
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settings.validate()?;
        self.mapping_table().map(|_| ())
    }

    /// Validated tuning profile
    pub fn profile(&self) -> Result<TuningProfile, ConfigError> {
        self.settings.validate()?;
        Ok(self.settings.clone())
    }

    /// Build the lookup table from the string mappings
    ///
    /// Unknown action labels are skipped with a warning; an unparseable key
    /// is an error.
    pub fn mapping_table(&self) -> Result<MappingTable, ConfigError> {
        let mut table = MappingTable::new();
        for (key, label) in &self.mappings {
            let code = parse_key(key).ok_or_else(|| ConfigError::InvalidKey(key.clone()))?;
            match Action::from_label(translate_legacy_label(label)) {
                Some(action) => table.set(code, action),
                None => warn!("Ignoring unknown action \"{}\" for key {}", label, key),
            }
        }
        Ok(table)
    }

    /// Assign an action to a key (`Action::None` removes the mapping)
    ///
    /// Any existing entry for the same key code is replaced, whatever
    /// spelling it used.
    pub fn set_mapping(&mut self, key: LogicalKey, action: Action) {
        self.mappings
            .retain(|existing, _| parse_key(existing) != Some(key));
        if action != Action::None {
            // Number-row names ("1") would read back as decimal codes
            let name = key_name(key)
                .filter(|name| parse_key(name) == Some(key))
                .map_or_else(|| key.to_string(), str::to_string);
            self.mappings.insert(name, action.label().to_string());
        }
    }

    pub fn device_selector(&self) -> Option<DeviceSelector> {
        self.device.as_ref().map(DeviceConfig::selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::Button;
    use crate::profile::Curve;

    #[test]
    fn test_default_config_serializes() {
        let config = HallConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("Hallpad Virtual Gamepad"));
        assert!(toml_str.contains("W = \"Left Stick: UP (Y+)\""));
        assert!(toml_str.contains("max_pressure = 1600"));
    }

    #[test]
    fn test_roundtrip() {
        let config = HallConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = HallConfig::parse(&toml_str, ConfigFormat::Toml).unwrap();
        assert_eq!(parsed.device_name, config.device_name);
        assert_eq!(parsed.mappings, config.mappings);
        assert_eq!(parsed.settings, config.settings);
        assert_eq!(parsed.session, config.session);
    }

    #[test]
    fn test_default_mapping_table() {
        let table = HallConfig::default().mapping_table().unwrap();
        assert_eq!(table.len(), 6);
        assert_eq!(table.get(0x1A), Action::LeftStick(Direction::Up));
        assert_eq!(table.get(0x14), Action::LeftTrigger);
        assert_eq!(table.get(0x08), Action::RightTrigger);
    }

    #[test]
    fn test_legacy_json_format() {
        let json = r#"{
            "Mappings": {
                "26": "Stick Izquierdo: ARRIBA (Y+)",
                "22": "Left Stick: DOWN (Y-)",
                "44": "Botón A",
                "8": "Gatillo Derecho (RT) - Acelerar"
            },
            "Settings": { "Deadzone": 25, "Sensitivity": 1.5, "MaxPressure": 700, "Curve": "scurve" },
            "device_info": { "vid": 16868, "pid": 8474, "iface": null }
        }"#;
        let config = HallConfig::parse(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.settings.deadzone, 25);
        assert_eq!(config.settings.sensitivity, 1.5);
        assert_eq!(config.settings.max_pressure, 700);
        assert_eq!(config.settings.curve, Curve::SCurve);
        assert_eq!(
            config.device_selector(),
            Some(DeviceSelector::Interface {
                vid: 0x41E4,
                pid: 0x211A,
                interface: None
            })
        );

        let table = config.mapping_table().unwrap();
        assert_eq!(table.get(26), Action::LeftStick(Direction::Up));
        assert_eq!(table.get(22), Action::LeftStick(Direction::Down));
        assert_eq!(table.get(44), Action::Button(Button::A));
        assert_eq!(table.get(8), Action::RightTrigger);
    }

    #[test]
    fn test_unknown_label_skipped() {
        let mut config = HallConfig::default();
        config.mappings.clear();
        config.mappings.insert("W".into(), "Jump".into());
        config.mappings.insert("0x16".into(), "left_stick_down".into());
        let table = config.mapping_table().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0x16), Action::LeftStick(Direction::Down));
    }

    #[test]
    fn test_invalid_key_is_error() {
        let mut config = HallConfig::default();
        config.mappings.insert("NotAKey".into(), "Button A".into());
        assert!(matches!(
            config.mapping_table(),
            Err(ConfigError::InvalidKey(k)) if k == "NotAKey"
        ));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let toml_str = r#"
[settings]
sensitivity = -1.0
"#;
        let config = HallConfig::parse(toml_str, ConfigFormat::Toml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSetting(_))
        ));
        assert!(config.profile().is_err());
    }

    #[test]
    fn test_set_mapping_replaces_any_spelling() {
        let mut config = HallConfig::default();
        config.mappings.insert("0x2C".into(), "Button B".into());
        config.set_mapping(0x2C, Action::Button(Button::A));
        let table = config.mapping_table().unwrap();
        assert_eq!(table.get(0x2C), Action::Button(Button::A));
        assert_eq!(
            config.mappings.keys().filter(|k| parse_key(k) == Some(0x2C)).count(),
            1
        );

        config.set_mapping(0x1E, Action::Button(Button::Start));
        assert_eq!(
            config.mapping_table().unwrap().get(0x1E),
            Action::Button(Button::Start)
        );

        config.set_mapping(0x1A, Action::None);
        assert_eq!(config.mapping_table().unwrap().get(0x1A), Action::None);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("hall_config.json")),
            ConfigFormat::Json
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("config.toml")),
            ConfigFormat::Toml
        );
        assert_eq!(ConfigFormat::from_path(Path::new("config")), ConfigFormat::Toml);
    }

    #[test]
    fn test_legacy_translation_passthrough() {
        assert_eq!(translate_legacy_label("Ninguna"), "None");
        assert_eq!(translate_legacy_label("Button LB"), "Button LB");
    }

    #[test]
    fn test_studio_labels_translate() {
        assert_eq!(translate_legacy_label("🔘 LB (Bumper Izq)"), "Button LB");
        assert_eq!(translate_legacy_label(" 🎮 RT - Acelerar "), "Right Trigger (RT) - Accelerate");
        // With and without the variation selector after the joystick emoji
        assert_eq!(translate_legacy_label("🕹\u{FE0F} Stick Der: ABAJO"), "Right Stick: DOWN");
        assert_eq!(translate_legacy_label("🕹 Stick Der: ABAJO"), "Right Stick: DOWN");
    }
}
