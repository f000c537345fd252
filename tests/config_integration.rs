//! Integration tests for config persistence.
//!
//! Exercise load/save through real files in both formats and check that a
//! loaded config produces the profile and mapping table the session uses.

use std::path::PathBuf;

use hallpad::config::{ConfigFormat, DeviceConfig, HallConfig};
use hallpad::device::DeviceSelector;
use hallpad::error::ConfigError;
use hallpad::mapping::{Action, Button, Direction};
use hallpad::profile::Curve;

/// Fresh scratch directory per test
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("hallpad-test-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

// ── Load / save ──

#[test]
fn missing_file_loads_defaults() {
    let dir = scratch_dir("missing");
    let config = HallConfig::load(&dir.join("nope.toml")).unwrap();
    assert_eq!(config.device_name, HallConfig::default().device_name);
    assert_eq!(config.mappings.len(), 6);
}

#[test]
fn toml_save_then_load() {
    let dir = scratch_dir("toml");
    let path = dir.join("nested").join("config.toml");

    let mut config = HallConfig::default();
    config.settings.deadzone = 40;
    config.settings.curve = Curve::Aggressive;
    config.set_mapping(0x2C, Action::Button(Button::Y));
    config.device = Some(DeviceConfig {
        vid: 0x41E4,
        pid: 0x211A,
        interface: Some(1),
        path: None,
    });
    config.save(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("curve = \"aggressive\""));
    assert!(text.contains("Space = \"Button Y\""));

    let loaded = HallConfig::load(&path).unwrap();
    assert_eq!(loaded.settings, config.settings);
    assert_eq!(loaded.mappings, config.mappings);
    assert_eq!(
        loaded.device_selector(),
        Some(DeviceSelector::Interface {
            vid: 0x41E4,
            pid: 0x211A,
            interface: Some(1),
        })
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn json_save_then_load() {
    let dir = scratch_dir("json");
    let path = dir.join("hall_config.json");

    let config = HallConfig::default();
    config.save(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.trim_start().starts_with('{'));

    let loaded = HallConfig::load(&path).unwrap();
    assert_eq!(loaded.mappings, config.mappings);
    assert_eq!(loaded.settings, config.settings);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn legacy_json_file_loads() {
    let dir = scratch_dir("legacy");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("hall_config.json");
    std::fs::write(
        &path,
        r#"{
            "mappings": {
                "26": "Stick Izquierdo: ARRIBA (Y+)",
                "4": "Stick Izquierdo: IZQUIERDA (X-)",
                "20": "Gatillo Izquierdo (LT) - Frenar",
                "41": "Something else entirely"
            },
            "settings": { "deadzone": 30, "sensitivity": 1.2, "max_pressure": 600, "curve": "fast" }
        }"#,
    )
    .unwrap();

    let config = HallConfig::load(&path).unwrap();
    let profile = config.profile().unwrap();
    assert_eq!(profile.curve, Curve::Fast);
    assert_eq!(profile.max_pressure, 600);

    let table = config.mapping_table().unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.get(26), Action::LeftStick(Direction::Up));
    assert_eq!(table.get(4), Action::LeftStick(Direction::Left));
    assert_eq!(table.get(20), Action::LeftTrigger);
    assert_eq!(table.get(41), Action::None);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn studio_json_file_loads() {
    let dir = scratch_dir("studio");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("mchose_config.json");
    // json.dump escapes non-ASCII, so labels arrive as surrogate pairs
    std::fs::write(
        &path,
        r#"{
  "mappings": {
    "26": "\ud83d\udd79\ufe0f Stick Izq: ARRIBA",
    "8": "\ud83c\udfae RT - Acelerar",
    "44": "\ud83d\udd18 LB (Bumper Izq)",
    "40": "\ud83d\udd18 Start",
    "12": "\ud83d\udd18 Bot\u00f3n Y"
  },
  "settings": {
    "deadzone": 30,
    "sensitivity": 1.0,
    "max_pressure": 600,
    "analog_mode": false,
    "curve": "smooth"
  }
}"#,
    )
    .unwrap();

    let config = HallConfig::load(&path).unwrap();
    let profile = config.profile().unwrap();
    assert_eq!(profile.curve, Curve::Exponential);
    assert!(!profile.analog);

    let table = config.mapping_table().unwrap();
    assert_eq!(table.len(), 5);
    assert_eq!(table.get(26), Action::LeftStick(Direction::Up));
    assert_eq!(table.get(8), Action::RightTrigger);
    assert_eq!(table.get(44), Action::Button(Button::LeftShoulder));
    assert_eq!(table.get(40), Action::Button(Button::Start));
    assert_eq!(table.get(12), Action::Button(Button::Y));

    let _ = std::fs::remove_dir_all(&dir);
}

// ── Rejections ──

#[test]
fn invalid_file_is_reported() {
    let dir = scratch_dir("invalid");
    std::fs::create_dir_all(&dir).unwrap();

    let bad_toml = dir.join("bad.toml");
    std::fs::write(&bad_toml, "settings = [").unwrap();
    assert!(matches!(
        HallConfig::load(&bad_toml),
        Err(ConfigError::Toml(_))
    ));

    let bad_pressure = dir.join("zero.toml");
    std::fs::write(&bad_pressure, "[settings]\nmax_pressure = 0\n").unwrap();
    assert!(matches!(
        HallConfig::load(&bad_pressure),
        Err(ConfigError::InvalidSetting(_))
    ));

    let bad_key = dir.join("key.json");
    std::fs::write(&bad_key, r#"{ "mappings": { "0x1FF": "Button A" } }"#).unwrap();
    assert!(matches!(
        HallConfig::load(&bad_key),
        Err(ConfigError::InvalidKey(_))
    ));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn parse_accepts_capitalised_sections() {
    let config = HallConfig::parse(
        r#"{ "Mappings": { "44": "Button A" }, "Settings": { "Deadzone": 12, "analog_mode": false } }"#,
        ConfigFormat::Json,
    )
    .unwrap();
    assert_eq!(config.settings.deadzone, 12);
    assert!(!config.settings.analog);
    assert_eq!(config.mapping_table().unwrap().get(44), Action::Button(Button::A));
}
