// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Backoff Library
//!
//! Seven pure delay functions, each parameterized only by its
//! own config and the 1-based `attempt` number. Deterministic except
//! `jittered`/`network_adaptive`/`error_adaptive`, which take an injected
//! RNG sample in `[0, 1)` instead of reaching for a global RNG, so callers
//! (and these unit tests) stay reproducible.

use crate::value_objects::{ErrorKind, NetworkQuality};

#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub step_ms: u64,
    pub factor: f64,
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig {
            initial_ms: 500,
            max_ms: 30_000,
            step_ms: 1_000,
            factor: 2.0,
            jitter_factor: 0.2,
        }
    }
}

pub fn fixed(config: &BackoffConfig) -> u64 {
    config.initial_ms.min(config.max_ms)
}

pub fn linear(attempt: u32, config: &BackoffConfig) -> u64 {
    let delay = config.initial_ms + (attempt.saturating_sub(1) as u64) * config.step_ms;
    delay.min(config.max_ms)
}

pub fn exponential(attempt: u32, config: &BackoffConfig) -> u64 {
    let delay = (config.initial_ms as f64) * config.factor.powi(attempt.saturating_sub(1) as i32);
    (delay as u64).min(config.max_ms)
}

/// `rng_sample` must be in `[0, 1)`; the caller supplies it (e.g. from
/// `rand::random::<f64>()`) so this function stays pure and testable.
pub fn jittered(attempt: u32, config: &BackoffConfig, rng_sample: f64) -> u64 {
    let base = exponential(attempt, config) as f64;
    let half_spread = base * config.jitter_factor / 2.0;
    let jitter = (rng_sample * 2.0 - 1.0) * half_spread;
    (base + jitter).clamp(0.0, config.max_ms as f64) as u64
}

pub fn stepped(attempt: u32, intervals: &[u64]) -> u64 {
    if intervals.is_empty() {
        return 0;
    }
    let idx = (attempt.saturating_sub(1) as usize).min(intervals.len() - 1);
    intervals[idx]
}

/// `min(initial * (baseFactor * qualityFactor[quality])^(attempt-1), max)`;
/// `NetworkQuality::adaptive_factor` supplies the table.
pub fn network_adaptive(attempt: u32, config: &BackoffConfig, base_factor: f64, quality: NetworkQuality) -> u64 {
    let factor = base_factor * quality.adaptive_factor();
    let delay = (config.initial_ms as f64) * factor.powi(attempt.saturating_sub(1) as i32);
    (delay as u64).min(config.max_ms)
}

/// Same shape as `network_adaptive` but the factor comes from a per-kind
/// table instead of network quality.
pub fn error_adaptive(attempt: u32, config: &BackoffConfig, kind: ErrorKind) -> u64 {
    let factor = error_kind_factor(kind);
    let delay = (config.initial_ms as f64) * factor.powi(attempt.saturating_sub(1) as i32);
    (delay as u64).min(config.max_ms)
}

fn error_kind_factor(kind: ErrorKind) -> f64 {
    use ErrorKind::*;
    match kind {
        RateLimit => 2.5,
        Server | ServerUnreachable => 2.0,
        Network | Timeout | ConnectionReset | Dns => 1.5,
        _ => 1.2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_never_exceeds_max() {
        let config = BackoffConfig {
            initial_ms: 100_000,
            max_ms: 5_000,
            ..Default::default()
        };
        assert_eq!(fixed(&config), 5_000);
    }

    #[test]
    fn linear_increases_by_step_each_attempt() {
        let config = BackoffConfig::default();
        assert_eq!(linear(1, &config), config.initial_ms);
        assert_eq!(linear(2, &config), config.initial_ms + config.step_ms);
        assert_eq!(linear(3, &config), config.initial_ms + 2 * config.step_ms);
    }

    #[test]
    fn exponential_is_monotonically_increasing_until_capped() {
        let config = BackoffConfig::default();
        let mut prev = exponential(1, &config);
        for attempt in 2..8 {
            let next = exponential(attempt, &config);
            assert!(next >= prev);
            prev = next;
        }
    }

    #[test]
    fn jittered_stays_within_clamped_bounds() {
        let config = BackoffConfig::default();
        for sample in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let delay = jittered(3, &config, sample);
            assert!(delay <= config.max_ms);
        }
    }

    #[test]
    fn stepped_uses_last_interval_past_its_length() {
        let intervals = [100, 200, 400];
        assert_eq!(stepped(1, &intervals), 100);
        assert_eq!(stepped(3, &intervals), 400);
        assert_eq!(stepped(10, &intervals), 400);
    }

    #[test]
    fn network_adaptive_scales_with_quality_factor() {
        let config = BackoffConfig::default();
        let poor = network_adaptive(2, &config, 1.0, NetworkQuality::Poor);
        let excellent = network_adaptive(2, &config, 1.0, NetworkQuality::Excellent);
        assert!(poor > excellent);
    }

    #[test]
    fn error_adaptive_scales_with_kind_severity() {
        let config = BackoffConfig::default();
        let rate_limit = error_adaptive(3, &config, ErrorKind::RateLimit);
        let unknown = error_adaptive(3, &config, ErrorKind::Unknown);
        assert!(rate_limit > unknown);
    }
}
