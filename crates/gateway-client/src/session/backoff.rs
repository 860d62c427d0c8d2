//! Reconnect backoff
//!
//! Exponential growth from a base delay up to a cap, with random downward
//! jitter. Consecutive delays never shrink until the backoff is reset.

use gateway_common::ReconnectConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: f64,
    attempts: u32,
    last: Duration,
    rng: StdRng,
}

impl Backoff {
    #[must_use]
    pub fn new(config: &ReconnectConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic jitter for tests
    #[must_use]
    pub fn seeded(config: &ReconnectConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &ReconnectConfig, rng: StdRng) -> Self {
        let jitter = if config.jitter.is_finite() {
            config.jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            base: config.base_delay(),
            max: config.max_delay(),
            jitter,
            attempts: 0,
            last: Duration::ZERO,
            rng,
        }
    }

    /// Delay before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let exponent = 2u32.saturating_pow(self.attempts);
        let raw = self.base.saturating_mul(exponent).min(self.max);
        let shave = raw.mul_f64(self.rng.gen_range(0.0..=self.jitter));

        let delay = raw.saturating_sub(shave).max(self.last).min(self.max);
        self.attempts = self.attempts.saturating_add(1);
        self.last = delay;
        delay
    }

    /// Consecutive failures since the last reset
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Called once a session is established again
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.last = Duration::ZERO;
    }
}

impl std::fmt::Debug for Backoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backoff")
            .field("base", &self.base)
            .field("max", &self.max)
            .field("jitter", &self.jitter)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}
