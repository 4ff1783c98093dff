//! Run settings for a simulation.
//!
//! `TigerStyle`: A run is identified by its seed; print it, replay it.

use rand::Rng;
use std::env;

use crate::constants::DST_LATENCY_MS_DEFAULT;

/// Environment variable that pins the seed of a run.
pub const DST_SEED_ENV: &str = "DST_SEED";

/// Seed plus the knobs the simulated engines read.
#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    seed: u64,
    latency_ms: u64,
}

impl SimConfig {
    /// Fixed seed, default stall length.
    ///
    /// ```
    /// use polystore::dst::SimConfig;
    /// assert_eq!(SimConfig::with_seed(12345).seed(), 12345);
    /// ```
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            latency_ms: DST_LATENCY_MS_DEFAULT,
        }
    }

    /// Seed from `DST_SEED`, or a fresh one that gets logged for replay.
    ///
    /// # Panics
    /// Panics if `DST_SEED` is set to something other than a `u64`.
    #[must_use]
    pub fn from_env_or_random() -> Self {
        let seed = if let Ok(raw) = env::var(DST_SEED_ENV) {
            raw.trim()
                .parse::<u64>()
                .unwrap_or_else(|_| panic!("{DST_SEED_ENV} must be a u64, got {raw:?}"))
        } else {
            let seed = rand::thread_rng().gen::<u64>();
            tracing::info!(seed, "random simulation seed, set {DST_SEED_ENV} to replay");
            seed
        };
        Self::with_seed(seed)
    }

    /// Seed of the run.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// How long a `Latency` fault stalls a call.
    #[must_use]
    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    /// Same run with a different stall length.
    #[must_use]
    pub fn with_latency_ms(self, latency_ms: u64) -> Self {
        Self { latency_ms, ..self }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::from_env_or_random()
    }
}
