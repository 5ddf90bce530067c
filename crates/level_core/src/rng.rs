//! Random number generator abstraction for level generation.
//!
//! Every random draw of a run (start/goal placement, module choice, heap
//! tie-breaking) goes through one [`LevelRng`] handed to the generator, so a
//! run is fully reproducible from its seed.
//!
//! # Example
//!
//! ```ignore
//! use level_core::rng::{LevelRng, StdRandom};
//!
//! let mut rng = StdRandom::from_seed(42);
//! let cell = rng.next_usize_max(10); // 0..10
//! let coin = rng.next_bool();
//! ```

use crate::config::RANDOM_SEED;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of randomness for a generation run.
pub trait LevelRng {
    /// Returns a random usize in [0, max). Returns 0 if `max <= 1`.
    fn next_usize_max(&mut self, max: usize) -> usize;

    /// Returns a random boolean.
    fn next_bool(&mut self) -> bool;
}

/// Standard Rust RNG wrapper using `rand::rngs::StdRng`.
#[derive(Clone)]
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    /// Create a new StdRandom from an i32 seed.
    ///
    /// The seed's bit pattern is kept, so `n` and `-n` give different streams.
    pub fn from_seed(seed: i32) -> Self {
        Self::from_u64_seed(seed as u32 as u64)
    }

    /// Create from a u64 seed directly.
    pub fn from_u64_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl LevelRng for StdRandom {
    fn next_usize_max(&mut self, max: usize) -> usize {
        if max <= 1 {
            return 0;
        }
        self.rng.gen_range(0..max)
    }

    fn next_bool(&mut self) -> bool {
        self.rng.gen()
    }
}

/// Resolve the seed a run will use.
///
/// [`RANDOM_SEED`] (`-1`) is replaced by a seed derived from the clock; any
/// other value is returned unchanged.
pub fn resolve_seed(seed: i32) -> i32 {
    if seed != RANDOM_SEED {
        return seed;
    }

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    // Keep it non-negative and away from the sentinel
    (millis % i32::MAX as u128) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_random_ranges() {
        let mut rng = StdRandom::from_seed(42);
        for _ in 0..100 {
            let v = rng.next_usize_max(7);
            assert!(v < 7);
        }
    }

    #[test]
    fn test_empty_ranges() {
        let mut rng = StdRandom::from_seed(1);
        assert_eq!(rng.next_usize_max(0), 0);
        assert_eq!(rng.next_usize_max(1), 0);
    }

    #[test]
    fn test_std_random_is_deterministic() {
        let mut rng1 = StdRandom::from_seed(123);
        let mut rng2 = StdRandom::from_seed(123);
        for _ in 0..100 {
            assert_eq!(rng1.next_usize_max(1000), rng2.next_usize_max(1000));
            assert_eq!(rng1.next_bool(), rng2.next_bool());
        }
    }

    #[test]
    fn test_negated_seed_gives_different_stream() {
        let draws = |seed: i32| {
            let mut rng = StdRandom::from_seed(seed);
            (0..8).map(|_| rng.next_usize_max(1000)).collect::<Vec<_>>()
        };
        assert_ne!(draws(5), draws(-5));
        assert_ne!(draws(i32::MAX), draws(-i32::MAX));
        assert_eq!(draws(-5), draws(-5));
    }

    #[test]
    fn test_resolve_seed() {
        assert_eq!(resolve_seed(42), 42);
        assert_eq!(resolve_seed(0), 0);
        assert_eq!(resolve_seed(-7), -7);

        let seed = resolve_seed(RANDOM_SEED);
        assert!(seed >= 0);
    }
}
