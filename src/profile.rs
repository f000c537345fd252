//! Tuning profile and response curves
//!
//! A `TuningProfile` is an immutable snapshot. Writers (the configuration
//! side) publish a whole new profile through [`Shared`]; the acquisition
//! thread loads the current `Arc` once per report and never sees a
//! half-updated value.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::error::ConfigError;

/// Response curve applied to normalized key travel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Curve {
    /// f(x) = x
    #[default]
    Linear,
    /// f(x) = x² (also read as `smooth`)
    Exponential,
    /// f(x) = 3x² − 2x³
    SCurve,
    /// f(x) = 1 − (1 − x)²
    Fast,
    /// f(x) = min(1, 1.5x) below 0.7, else 1
    Aggressive,
}

impl Curve {
    pub const ALL: &'static [Curve] = &[
        Curve::Linear,
        Curve::Exponential,
        Curve::SCurve,
        Curve::Fast,
        Curve::Aggressive,
    ];

    /// Config name of the curve
    pub fn name(&self) -> &'static str {
        match self {
            Curve::Linear => "linear",
            Curve::Exponential => "exponential",
            Curve::SCurve => "scurve",
            Curve::Fast => "fast",
            Curve::Aggressive => "aggressive",
        }
    }

    /// Look up a curve by name
    pub fn from_name(name: &str) -> Option<Curve> {
        match name.trim().to_ascii_lowercase().as_str() {
            "linear" => Some(Curve::Linear),
            "exponential" | "smooth" => Some(Curve::Exponential),
            "scurve" | "s-curve" | "s_curve" => Some(Curve::SCurve),
            "fast" => Some(Curve::Fast),
            "aggressive" => Some(Curve::Aggressive),
            _ => None,
        }
    }

    /// Apply the curve to a value in [0, 1]
    #[inline]
    pub fn apply(&self, x: f32) -> f32 {
        match self {
            Curve::Linear => x,
            Curve::Exponential => x * x,
            Curve::SCurve => 3.0 * x * x - 2.0 * x * x * x,
            Curve::Fast => 1.0 - (1.0 - x) * (1.0 - x),
            Curve::Aggressive => {
                if x < 0.7 {
                    (x * 1.5).min(1.0)
                } else {
                    1.0
                }
            }
        }
    }
}

// Unknown names degrade to linear so an old or hand-edited config still loads
impl From<String> for Curve {
    fn from(name: String) -> Self {
        Curve::from_name(&name).unwrap_or_else(|| {
            warn!("Unknown curve \"{}\", using linear", name);
            Curve::Linear
        })
    }
}

impl From<Curve> for String {
    fn from(curve: Curve) -> Self {
        curve.name().to_string()
    }
}

/// Signal conditioning parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningProfile {
    /// Raw magnitude at or below which a key reads as released
    #[serde(default, alias = "Deadzone")]
    pub deadzone: u16,
    /// Output multiplier applied after the curve
    #[serde(default = "default_sensitivity", alias = "Sensitivity")]
    pub sensitivity: f32,
    /// Raw magnitude that maps to full actuation
    #[serde(default = "default_max_pressure", alias = "MaxPressure")]
    pub max_pressure: u16,
    #[serde(default, alias = "Curve")]
    pub curve: Curve,
    /// When false, any key past the deadzone reads as fully actuated
    #[serde(default = "default_true", alias = "analog_mode")]
    pub analog: bool,
}

fn default_sensitivity() -> f32 {
    1.0
}
fn default_max_pressure() -> u16 {
    1600
}
fn default_true() -> bool {
    true
}

impl Default for TuningProfile {
    fn default() -> Self {
        Self {
            deadzone: 0,
            sensitivity: default_sensitivity(),
            max_pressure: default_max_pressure(),
            curve: Curve::default(),
            analog: true,
        }
    }
}

impl TuningProfile {
    /// Check values the conditioner cannot use meaningfully
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.sensitivity.is_finite() || self.sensitivity <= 0.0 {
            return Err(ConfigError::InvalidSetting(format!(
                "sensitivity must be a positive number, got {}",
                self.sensitivity
            )));
        }
        if self.max_pressure == 0 {
            return Err(ConfigError::InvalidSetting(
                "max_pressure must be greater than 0".to_string(),
            ));
        }
        if self.deadzone >= self.max_pressure {
            return Err(ConfigError::InvalidSetting(format!(
                "deadzone ({}) must be below max_pressure ({})",
                self.deadzone, self.max_pressure
            )));
        }
        Ok(())
    }
}

/// Single-writer, multi-reader cell with replace-the-reference semantics
///
/// Readers get an `Arc` to the value current at the time of the call and
/// keep using it even if a writer stores a new one meanwhile.
pub struct Shared<T> {
    inner: Arc<RwLock<Arc<T>>>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(value))),
        }
    }

    /// Current snapshot
    #[inline]
    pub fn load(&self) -> Arc<T> {
        self.inner.read().clone()
    }

    /// Publish a new value
    pub fn store(&self, value: T) {
        *self.inner.write() = Arc::new(value);
    }
}

impl<T: Clone> Shared<T> {
    /// Publish a modified copy of the current value
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut guard = self.inner.write();
        let mut next = T::clone(&guard);
        f(&mut next);
        *guard = Arc::new(next);
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_curve_reference_points() {
        assert_relative_eq!(Curve::Linear.apply(1.0), 1.0);
        assert_relative_eq!(Curve::Exponential.apply(0.5), 0.25);
        assert_relative_eq!(Curve::SCurve.apply(0.5), 0.5);
        assert_relative_eq!(Curve::Fast.apply(0.5), 0.75);
        assert_relative_eq!(Curve::Aggressive.apply(0.5), 0.75);
        assert_relative_eq!(Curve::Aggressive.apply(0.8), 1.0);
    }

    #[test]
    fn test_curves_fix_endpoints() {
        for curve in Curve::ALL {
            assert_relative_eq!(curve.apply(0.0), 0.0);
            assert_relative_eq!(curve.apply(1.0), 1.0);
        }
    }

    #[test]
    fn test_curve_names_roundtrip() {
        for curve in Curve::ALL {
            assert_eq!(Curve::from_name(curve.name()), Some(*curve));
        }
        assert_eq!(Curve::from_name("S-Curve"), Some(Curve::SCurve));
        assert_eq!(Curve::from_name("smooth"), Some(Curve::Exponential));
        assert_eq!(Curve::from(String::from("wobbly")), Curve::Linear);
    }

    #[test]
    fn test_profile_validate() {
        assert!(TuningProfile::default().validate().is_ok());

        let mut profile = TuningProfile::default();
        profile.sensitivity = 0.0;
        assert!(matches!(
            profile.validate(),
            Err(ConfigError::InvalidSetting(msg)) if msg.contains("sensitivity")
        ));

        let mut profile = TuningProfile::default();
        profile.deadzone = 2000;
        assert!(matches!(
            profile.validate(),
            Err(ConfigError::InvalidSetting(msg)) if msg.contains("deadzone")
        ));
    }

    #[test]
    fn test_shared_snapshot_survives_store() {
        let shared = Shared::new(TuningProfile::default());
        let before = shared.load();
        shared.update(|p| p.deadzone = 42);
        assert_eq!(before.deadzone, 0);
        assert_eq!(shared.load().deadzone, 42);
    }
}
