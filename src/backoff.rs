//! Exponential backoff with jitter for transient adapter errors.
//! Carried over from `scrapers/binance_session.rs`'s `BackoffCalculator` --
//! same formula, `rand` in place of the hand-rolled xorshift PRNG since
//! this crate already pulls `rand` in for other jitter (mock account
//! latency).

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub multiplier: f64,
    pub max_ms: u64,
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self { base_ms: 500, multiplier: 2.0, max_ms: 30_000, jitter_factor: 0.3 }
    }
}

pub struct BackoffCalculator {
    config: BackoffConfig,
    attempt: u32,
}

impl BackoffCalculator {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Computes the next backoff duration (base * multiplier^attempt,
    /// capped, then jittered by ±`jitter_factor`) and advances the attempt
    /// counter.
    pub fn next_backoff(&mut self) -> Duration {
        let base = (self.config.base_ms as f64) * self.config.multiplier.powi(self.attempt as i32);
        let capped = base.min(self.config.max_ms as f64);

        let jitter_range = capped * self.config.jitter_factor;
        let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        let final_ms = (capped + jitter).max(self.config.base_ms as f64);

        self.attempt += 1;
        Duration::from_millis(final_ms as u64)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
