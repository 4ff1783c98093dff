//! Seeded randomness for simulation runs.
//!
//! Everything random in a run (fault decisions, generated exports, batch
//! sizes) draws from a [`DeterministicRng`], so replaying a seed replays
//! the run.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Spreads the seeds of consecutive forks.
const FORK_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// ChaCha20 stream keyed by a `u64` seed.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    inner: ChaCha20Rng,
    seed: u64,
    forks: u64,
}

impl DeterministicRng {
    /// Stream for `seed`.
    ///
    /// ```
    /// use polystore::dst::DeterministicRng;
    /// let mut a = DeterministicRng::new(42);
    /// let mut b = DeterministicRng::new(42);
    /// assert_eq!(a.next_usize(0, 99), b.next_usize(0, 99));
    /// ```
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha20Rng::seed_from_u64(seed),
            seed,
            forks: 0,
        }
    }

    /// Seed this stream was created from.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform in `min..=max`.
    ///
    /// # Panics
    /// Panics if `min > max`.
    pub fn next_usize(&mut self, min: usize, max: usize) -> usize {
        assert!(min <= max, "min ({min}) must be <= max ({max})");
        self.inner.gen_range(min..=max)
    }

    /// `true` with the given probability.
    ///
    /// # Panics
    /// Panics if `probability` lies outside `[0, 1]`.
    pub fn next_bool(&mut self, probability: f64) -> bool {
        assert!(
            (0.0..=1.0).contains(&probability),
            "probability must be in [0, 1], got {probability}"
        );
        self.inner.gen_bool(probability)
    }

    /// A uniformly picked element of `items`.
    ///
    /// # Panics
    /// Panics if `items` is empty.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        assert!(!items.is_empty(), "cannot choose from empty slice");
        &items[self.next_usize(0, items.len() - 1)]
    }

    /// Child stream. The n-th fork of a seed is always the same stream
    /// and does not advance the parent.
    pub fn fork(&mut self) -> Self {
        self.forks += 1;
        Self::new(self.seed.wrapping_add(self.forks.wrapping_mul(FORK_STRIDE)))
    }
}
