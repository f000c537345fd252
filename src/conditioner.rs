//! Per-key signal conditioning
//!
//! Maps a raw magnitude to a normalized actuation value in [0, 1]:
//! deadzone, normalization against `max_pressure`, response curve, then
//! sensitivity. No smoothing or filtering is applied, so the output depends
//! only on the current sample and profile.

use crate::keys::{LogicalKey, KEY_SPACE};
use crate::profile::TuningProfile;

/// Last observed state of one key
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KeyState {
    /// Last received magnitude
    pub raw: u16,
    /// Last conditioned value (0.0 - 1.0)
    pub filtered: f32,
}

/// Condition a raw magnitude against a profile
pub fn condition(raw: u16, profile: &TuningProfile) -> f32 {
    if raw <= profile.deadzone {
        return 0.0;
    }
    if !profile.analog {
        return 1.0;
    }

    let norm = if profile.max_pressure > 0 {
        (raw as f32 / profile.max_pressure as f32).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let curved = profile.curve.apply(norm);
    (curved * profile.sensitivity).clamp(0.0, 1.0)
}

/// Holds the state of every key seen during a session
pub struct SignalConditioner {
    keys: Box<[KeyState; KEY_SPACE]>,
}

impl SignalConditioner {
    pub fn new() -> Self {
        Self {
            keys: Box::new([KeyState::default(); KEY_SPACE]),
        }
    }

    /// Condition a sample and record it as the key's current state
    pub fn process(&mut self, key: LogicalKey, raw: u16, profile: &TuningProfile) -> f32 {
        let filtered = condition(raw, profile);
        self.keys[key as usize] = KeyState { raw, filtered };
        filtered
    }

    /// Force a key back to rest (key released)
    pub fn clear(&mut self, key: LogicalKey) {
        self.keys[key as usize] = KeyState::default();
    }

    /// Forget every key
    pub fn reset(&mut self) {
        self.keys.fill(KeyState::default());
    }

    #[inline]
    pub fn filtered(&self, key: LogicalKey) -> f32 {
        self.keys[key as usize].filtered
    }

    pub fn state(&self, key: LogicalKey) -> KeyState {
        self.keys[key as usize]
    }
}

impl Default for SignalConditioner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Curve;
    use approx::assert_relative_eq;

    fn profile(curve: Curve) -> TuningProfile {
        TuningProfile {
            deadzone: 30,
            sensitivity: 1.0,
            max_pressure: 600,
            curve,
            analog: true,
        }
    }

    #[test]
    fn test_deadzone_zeroes_and_resets() {
        let mut cond = SignalConditioner::new();
        let p = profile(Curve::Linear);

        assert!(cond.process(0x1A, 300, &p) > 0.0);
        assert_eq!(cond.process(0x1A, 30, &p), 0.0);
        assert_eq!(cond.filtered(0x1A), 0.0);
        // Repeated calls stay at rest
        assert_eq!(cond.process(0x1A, 10, &p), 0.0);
        assert_eq!(cond.state(0x1A).raw, 10);
    }

    #[test]
    fn test_linear_normalization() {
        let p = profile(Curve::Linear);
        assert_relative_eq!(condition(300, &p), 0.5);
        assert_relative_eq!(condition(600, &p), 1.0);
        // Beyond max_pressure saturates
        assert_relative_eq!(condition(900, &p), 1.0);
    }

    #[test]
    fn test_sensitivity_scales_and_caps() {
        let mut p = profile(Curve::Linear);
        p.sensitivity = 2.0;
        assert_relative_eq!(condition(150, &p), 0.5);
        assert_relative_eq!(condition(450, &p), 1.0);

        p.sensitivity = 0.5;
        assert_relative_eq!(condition(600, &p), 0.5);
    }

    #[test]
    fn test_curve_applied_after_normalization() {
        let p = profile(Curve::Exponential);
        assert_relative_eq!(condition(300, &p), 0.25);
        let p = profile(Curve::Fast);
        assert_relative_eq!(condition(300, &p), 0.75);
    }

    #[test]
    fn test_digital_mode() {
        let mut p = profile(Curve::Linear);
        p.analog = false;
        assert_eq!(condition(31, &p), 1.0);
        assert_eq!(condition(30, &p), 0.0);
    }

    #[test]
    fn test_zero_max_pressure_is_full_scale() {
        let mut p = profile(Curve::Linear);
        p.deadzone = 0;
        p.max_pressure = 0;
        assert_eq!(condition(1, &p), 1.0);
    }

    #[test]
    fn test_clear_resets_state() {
        let mut cond = SignalConditioner::new();
        let p = profile(Curve::Linear);
        cond.process(0x04, 450, &p);
        cond.clear(0x04);
        assert_eq!(cond.state(0x04), KeyState::default());
    }

    #[test]
    fn test_deterministic() {
        let p = profile(Curve::SCurve);
        let mut a = SignalConditioner::new();
        let mut b = SignalConditioner::new();
        // Different history must not change the result
        a.process(0x07, 580, &p);
        assert_eq!(a.process(0x07, 222, &p), b.process(0x07, 222, &p));
    }
}
