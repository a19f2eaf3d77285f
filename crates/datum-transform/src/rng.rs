//! Random sources for training-phase geometry.
//!
//! A transformer owns exactly one source and draws from it once per crop
//! axis with slack and once for the mirror decision. Sources are never
//! shared: parallel pipelines build one transformer per worker.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Uniform integer generator
pub trait RandomSource {
    /// Draws a uniform integer from `[0, n)` and advances the state.
    ///
    /// `n` is always at least 1 when called by the transformer.
    fn next(&mut self, n: usize) -> usize;
}

/// ChaCha8-backed random source
#[derive(Debug, Clone)]
pub struct ChaChaSource {
    rng: ChaCha8Rng,
}

impl ChaChaSource {
    /// Creates the generator state, seeded from the process RNG when no seed is given
    pub fn init(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random::<u64>);
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for ChaChaSource {
    fn next(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }
}
