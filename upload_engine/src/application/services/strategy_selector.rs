// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Strategy Selector
//!
//! Chooses which backoff strategy the Retry Engine uses for the next
//! attempt, given the classified error kind/group, current network quality,
//! attempt count, and (optionally) this instance's observed success-rate
//! history. Stats live on the selector instance, never a module-level
//! singleton, so independent `UploaderCore`s never leak retry history into
//! each other.

use parking_lot::Mutex;
use std::collections::HashMap;
use upload_engine_domain::value_objects::{BackoffStrategy, ErrorGroup, ErrorKind, NetworkQuality};

pub type CustomSelector = dyn Fn(SelectionContext) -> Option<BackoffStrategy> + Send + Sync;

#[derive(Debug, Clone, Copy)]
pub struct SelectionContext {
    pub kind: ErrorKind,
    pub group: ErrorGroup,
    pub attempt: u32,
    pub network_quality: Option<NetworkQuality>,
}

#[derive(Default)]
pub struct SelectorConfig {
    pub custom_selector: Option<Box<CustomSelector>>,
    pub kind_overrides: HashMap<ErrorKind, BackoffStrategy>,
    pub group_overrides: HashMap<ErrorGroup, BackoffStrategy>,
    pub adaptive_mode: bool,
    pub history_mode: bool,
    pub default_strategy: Option<BackoffStrategy>,
}

#[derive(Default, Clone, Copy)]
struct SuccessCounter {
    successes: u32,
    total: u32,
}

impl SuccessCounter {
    fn rate(&self) -> Option<f64> {
        if self.total < 3 {
            None
        } else {
            Some(self.successes as f64 / self.total as f64)
        }
    }
}

/// Tracks `(kind, strategy) -> success/total` plus a `strategy -> success/total`
/// rollup so history-mode selection (step 5 of the precedence list) can fall
/// back to the overall best strategy when a specific kind lacks ≥3 samples.
#[derive(Default)]
struct HistoryStats {
    per_kind: HashMap<(ErrorKind, BackoffStrategy), SuccessCounter>,
    per_strategy: HashMap<BackoffStrategy, SuccessCounter>,
}

pub struct StrategySelector {
    config: SelectorConfig,
    history: Mutex<HistoryStats>,
}

const ALL_STRATEGIES: [BackoffStrategy; 7] = [
    BackoffStrategy::Fixed,
    BackoffStrategy::Linear,
    BackoffStrategy::Exponential,
    BackoffStrategy::Jittered,
    BackoffStrategy::Stepped,
    BackoffStrategy::NetworkAdaptive,
    BackoffStrategy::ErrorAdaptive,
];

impl StrategySelector {
    pub fn new(config: SelectorConfig) -> Self {
        StrategySelector {
            config,
            history: Mutex::new(HistoryStats::default()),
        }
    }

    /// Six-step precedence: custom selector, kind map, group map, adaptive
    /// table, history lookup, default.
    pub fn select(&self, ctx: SelectionContext) -> BackoffStrategy {
        if let Some(custom) = &self.config.custom_selector {
            if let Some(strategy) = custom(ctx) {
                return strategy;
            }
        }
        if let Some(strategy) = self.config.kind_overrides.get(&ctx.kind) {
            return *strategy;
        }
        if let Some(strategy) = self.config.group_overrides.get(&ctx.group) {
            return *strategy;
        }
        if self.config.adaptive_mode {
            if let Some(quality) = ctx.network_quality {
                return Self::adaptive_strategy(ctx.group, ctx.attempt, quality);
            }
        }
        if self.config.history_mode && ctx.attempt > 1 {
            if let Some(strategy) = self.history_best(ctx.kind) {
                return strategy;
            }
        }
        self.config.default_strategy.unwrap_or(BackoffStrategy::Exponential)
    }

    /// Network-group errors: `poor & attempt>2 -> stepped`; `poor|low|medium
    /// -> jittered`; `good|excellent -> exponential`. Server-group errors:
    /// `poor|low -> stepped`; `rate_limit` handled upstream via kind
    /// override in practice, but falls here too: `-> stepped`; else
    /// `linear`. Any group, `attempt>3 -> stepped`; `attempt>1 ->
    /// exponential`; else `jittered`.
    fn adaptive_strategy(group: ErrorGroup, attempt: u32, quality: NetworkQuality) -> BackoffStrategy {
        use NetworkQuality::*;
        if group == ErrorGroup::Network {
            return match quality {
                Poor if attempt > 2 => BackoffStrategy::Stepped,
                Poor | Low | Medium => BackoffStrategy::Jittered,
                Good | Excellent => BackoffStrategy::Exponential,
                _ => BackoffStrategy::Jittered,
            };
        }
        if group == ErrorGroup::Server {
            return match quality {
                Poor | Low => BackoffStrategy::Stepped,
                _ => BackoffStrategy::Linear,
            };
        }
        if attempt > 3 {
            BackoffStrategy::Stepped
        } else if attempt > 1 {
            BackoffStrategy::Exponential
        } else {
            BackoffStrategy::Jittered
        }
    }

    fn history_best(&self, kind: ErrorKind) -> Option<BackoffStrategy> {
        let history = self.history.lock();
        let per_kind_best = ALL_STRATEGIES
            .iter()
            .filter_map(|s| history.per_kind.get(&(kind, *s)).and_then(|c| c.rate().map(|r| (*s, r))))
            .max_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((strategy, _)) = per_kind_best {
            return Some(strategy);
        }
        ALL_STRATEGIES
            .iter()
            .filter_map(|s| history.per_strategy.get(s).and_then(|c| c.rate().map(|r| (*s, r))))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(s, _)| s)
    }

    /// Records one `(kind, strategy, success)` outcome, updating both the
    /// per-kind-per-strategy and per-strategy rollup counters.
    pub fn record_outcome(&self, kind: ErrorKind, strategy: BackoffStrategy, success: bool) {
        let mut history = self.history.lock();
        let per_kind = history.per_kind.entry((kind, strategy)).or_default();
        per_kind.total += 1;
        per_kind.successes += success as u32;
        let per_strategy = history.per_strategy.entry(strategy).or_default();
        per_strategy.total += 1;
        per_strategy.successes += success as u32;
    }
}
