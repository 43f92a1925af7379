//! Random sources used by the learning engine and the actors
//!
//! Every random decision in the pipeline (exploration vs. exploitation, the
//! escalation coin-flip, synthetic sensor readings) is drawn from a
//! [`RandomSource`]. Production code uses [`SeededRandom`], scenario tests use
//! [`ScriptedRandom`] to force a particular branch.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng, distributions::Standard, rngs::StdRng};

/// Source of uniform random values
pub trait RandomSource: Send {
    /// Uniform value in `[0, 1)`
    fn next_unit(&mut self) -> f64;

    /// Uniform index in `[0, upper)`
    ///
    /// `upper` must be greater than zero.
    fn next_index(&mut self, upper: usize) -> usize;
}

/// `StdRng`-backed source, reproducible when constructed with a seed
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    /// Create a source from an explicit seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create a source seeded from the operating system
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded if a seed is given, entropy otherwise
    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&mut self) -> f64 {
        self.rng.sample(Standard)
    }

    fn next_index(&mut self, upper: usize) -> usize {
        self.rng.gen_range(0..upper)
    }
}

/// Replays a fixed list of unit values, cycling when exhausted
///
/// Indices are derived from the same values (`floor(value * upper)`), so a
/// script of `[0.55]` yields `55` for `next_index(100)`.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    values: VecDeque<f64>,
}

impl ScriptedRandom {
    /// Create a scripted source
    ///
    /// Values are clamped into `[0, 1)`. An empty script behaves like `[0.0]`.
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        let mut values: VecDeque<f64> = values
            .into_iter()
            .map(|v| v.clamp(0.0, 1.0 - f64::EPSILON))
            .collect();

        if values.is_empty() {
            values.push_back(0.0);
        }

        Self { values }
    }

    /// Source that always returns the same value
    pub fn constant(value: f64) -> Self {
        Self::new([value])
    }
}

impl RandomSource for ScriptedRandom {
    fn next_unit(&mut self) -> f64 {
        let value = self.values.pop_front().unwrap_or_default();
        self.values.push_back(value);
        value
    }

    fn next_index(&mut self, upper: usize) -> usize {
        let index = (self.next_unit() * upper as f64) as usize;
        index.min(upper.saturating_sub(1))
    }
}
