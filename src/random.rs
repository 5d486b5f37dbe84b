//! Random source port used by the delivery simulator.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

pub trait RandomSource {
    /// Uniform float in `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    /// Uniform index in `0..n`. `n` must be non-zero.
    fn pick(&mut self, n: usize) -> usize;
}

/// `rand`-backed source. Seed it for reproducible demo runs.
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    pub fn from_entropy() -> Self {
        StdRandom {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        StdRandom {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for StdRandom {
    fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn pick(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }
}

/// Replays fixed answers in order. Once a queue runs dry the source falls
/// back to `exhausted_float` (`1.0` by default, which never triggers a reply)
/// and `0` for picks.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    floats: VecDeque<f64>,
    picks: VecDeque<usize>,
    exhausted_float: f64,
}

impl Default for ScriptedRandom {
    fn default() -> Self {
        ScriptedRandom {
            floats: VecDeque::new(),
            picks: VecDeque::new(),
            exhausted_float: 1.0,
        }
    }
}

impl ScriptedRandom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_floats(mut self, floats: impl IntoIterator<Item = f64>) -> Self {
        self.floats.extend(floats);
        self
    }

    pub fn with_picks(mut self, picks: impl IntoIterator<Item = usize>) -> Self {
        self.picks.extend(picks);
        self
    }

    /// Value returned for floats after the scripted ones are used up.
    pub fn exhausted_with(mut self, value: f64) -> Self {
        self.exhausted_float = value;
        self
    }

    /// Every roll succeeds and every pick takes the first candidate.
    pub fn always() -> Self {
        Self::new().exhausted_with(0.0)
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f64(&mut self) -> f64 {
        self.floats.pop_front().unwrap_or(self.exhausted_float)
    }

    fn pick(&mut self, n: usize) -> usize {
        self.picks.pop_front().unwrap_or(0) % n.max(1)
    }
}
