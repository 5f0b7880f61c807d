//! Deterministic per-row RNG.
//!
//! # Determinism strategy
//!
//! Each row draws from its own `SmallRng` seeded by:
//!
//!   seed = global_seed XOR (row * MIXING_CONSTANT) XOR (stream * STREAM_CONSTANT)
//!
//! Random draws therefore depend only on `(seed, row, stream)`, never on how
//! rows are split into chunks or which thread processes them.  A new
//! `stream` (typically the tick number) gives a fresh sequence per pass.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::RowId;

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;
/// Odd constant from SplitMix64, keeps stream and row contributions apart.
const STREAM_CONSTANT: u64 = 0xbf58_476d_1ce4_e5b9;

/// Per-row deterministic RNG, created on demand inside a chunk.
pub struct RowRng(SmallRng);

impl RowRng {
    /// Seed from the run's global seed, a row and a stream number.
    pub fn new(global_seed: u64, row: RowId, stream: u64) -> Self {
        let seed = global_seed
            ^ (row.0 as u64).wrapping_mul(MIXING_CONSTANT)
            ^ stream.wrapping_mul(STREAM_CONSTANT);
        RowRng(SmallRng::seed_from_u64(seed))
    }

    #[inline]
    pub fn inner(&mut self) -> &mut SmallRng {
        &mut self.0
    }

    /// Sample a uniformly distributed value of any `Standard`-distributed type.
    #[inline]
    pub fn random<T>(&mut self) -> T
    where
        rand::distributions::Standard: rand::distributions::Distribution<T>,
    {
        self.0.r#gen()
    }

    /// Generate a value uniformly in `range`.
    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }

    /// `true` with probability `p` (clamped to [0, 1]).
    #[inline]
    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.0.gen_bool(p.clamp(0.0, 1.0))
    }
}
