//! Pseudo-random number generation for steal-order shuffling.
//!
//! Uses the xorshift64 algorithm: small, fast, and dependency-free. Each
//! worker seeds its generator from process entropy at startup so steal
//! sweeps differ across runs and across workers; tests may pin a seed for
//! repeatability.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};

/// A xorshift64 PRNG.
///
/// NOT cryptographically secure; its only job is to decorrelate steal
/// sweeps between workers.
#[derive(Debug, Clone)]
pub struct XorShiftRng {
    state: u64,
}

impl XorShiftRng {
    /// Creates a PRNG from a fixed seed.
    ///
    /// A zero seed would lock xorshift at zero forever, so it is replaced
    /// with 1.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Creates a PRNG seeded from a nondeterministic source.
    #[must_use]
    pub fn from_entropy() -> Self {
        // RandomState draws fresh keys per instance, which is all the
        // nondeterminism a steal shuffle needs.
        let mut hasher = RandomState::new().build_hasher();
        hasher.write_u64(0xa076_1d64_78bd_642f);
        Self::new(hasher.finish())
    }

    /// Generates the next pseudo-random u64 value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Generates a pseudo-random usize in the range `[0, bound)`.
    ///
    /// Uses rejection sampling to avoid modulo bias.
    ///
    /// # Panics
    ///
    /// Panics if `bound` is zero.
    #[inline]
    pub fn next_usize(&mut self, bound: usize) -> usize {
        assert!(bound > 0, "bound must be non-zero");
        let bound = bound as u64;
        let threshold = u64::MAX - (u64::MAX % bound);
        loop {
            let value = self.next_u64();
            if value < threshold {
                #[allow(clippy::cast_possible_truncation)]
                return (value % bound) as usize;
            }
        }
    }

    /// Shuffles a slice in place using the Fisher-Yates algorithm.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.next_usize(i + 1);
            slice.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_sequences_are_deterministic() {
        let mut a = XorShiftRng::new(42);
        let mut b = XorShiftRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn zero_seed_does_not_wedge() {
        let mut rng = XorShiftRng::new(0);
        assert_ne!(rng.next_u64(), 0);
    }

    #[test]
    fn entropy_seeds_differ_across_instances() {
        let mut a = XorShiftRng::from_entropy();
        let mut b = XorShiftRng::from_entropy();
        // Equal first draws would mean RandomState handed out equal keys.
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn next_usize_stays_in_bounds() {
        let mut rng = XorShiftRng::new(7);
        for bound in [1, 2, 3, 17, 1000] {
            for _ in 0..200 {
                assert!(rng.next_usize(bound) < bound);
            }
        }
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = XorShiftRng::new(99);
        let mut values: Vec<usize> = (0..64).collect();
        rng.shuffle(&mut values);

        let mut sorted = values.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..64).collect::<Vec<_>>());
    }
}
