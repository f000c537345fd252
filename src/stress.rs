//! Synthetic throughput benchmark
//!
//! Drives the conditioner and resolver with a deterministic sample pattern
//! over six keys (WASD on the left stick, Q/E on the triggers). No device or
//! sink is involved.

use std::fmt;
use std::hint::black_box;
use std::time::{Duration, Instant};

use crate::mapping::{Action, Direction, MappingTable};
use crate::packet::AnalogSample;
use crate::profile::TuningProfile;
use crate::session::Pipeline;

pub const DEFAULT_ITERATIONS: u32 = 40_000;

/// Keys exercised by the run: W S A D Q E
const STRESS_KEYS: [(u8, Action); 6] = [
    (0x1A, Action::LeftStick(Direction::Up)),
    (0x16, Action::LeftStick(Direction::Down)),
    (0x04, Action::LeftStick(Direction::Left)),
    (0x07, Action::LeftStick(Direction::Right)),
    (0x14, Action::LeftTrigger),
    (0x08, Action::RightTrigger),
];

/// Outcome of a stress run
#[derive(Debug, Clone, Copy)]
pub struct StressReport {
    pub iterations: u32,
    pub elapsed: Duration,
    /// Samples that left their key active
    pub active_samples: u32,
}

impl StressReport {
    pub fn iterations_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.iterations as f64 / secs
        } else {
            0.0
        }
    }

    pub fn ms_per_iteration(&self) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.elapsed.as_secs_f64() * 1000.0 / self.iterations as f64
    }
}

impl fmt::Display for StressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.0} iter/s | {:.3} ms/iter",
            self.iterations_per_sec(),
            self.ms_per_iteration()
        )
    }
}

/// Raw magnitude fed on iteration `i`
pub fn stress_sample(i: u32, max_pressure: u16) -> u16 {
    ((i as u64 * 37) % max_pressure.max(1) as u64) as u16
}

/// Run `iterations` samples through the processing path
pub fn run(profile: &TuningProfile, iterations: u32) -> StressReport {
    let mapping: MappingTable = STRESS_KEYS.into_iter().collect();
    let mut pipeline = Pipeline::new();
    let mut active_samples = 0u32;

    let start = Instant::now();
    for i in 0..iterations {
        let (key, _) = STRESS_KEYS[i as usize % STRESS_KEYS.len()];
        let raw = stress_sample(i, profile.max_pressure);
        pipeline.apply_sample(AnalogSample { key, raw }, profile);
        if pipeline.active_keys().contains(key) {
            active_samples += 1;
        }
        black_box(pipeline.resolve(&mapping));
    }

    StressReport {
        iterations,
        elapsed: start.elapsed(),
        active_samples,
    }
}
