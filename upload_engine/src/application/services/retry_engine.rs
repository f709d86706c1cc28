// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Retry Engine
//!
//! Wraps a single chunk upload attempt: classify the failure, select a
//! backoff strategy, sleep the computed delay (honoring cancellation), and
//! recurse until the chunk succeeds, the error is non-recoverable, or the
//! per-kind attempt budget is exhausted. Every attempt outcome is recorded
//! with the `StrategySelector` so later attempts (in this upload, and later
//! uploads sharing the same core instance) benefit from the success-rate
//! history.

use crate::application::services::strategy_selector::{SelectionContext, StrategySelector};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use upload_engine_domain::services::backoff;
use upload_engine_domain::services::{classify, ClassifierConfig};
use upload_engine_domain::value_objects::{BackoffStrategy, FileId, NetworkQuality};
use upload_engine_domain::UploadError;

#[derive(Debug, Clone, Copy)]
pub struct RetryEngineConfig {
    pub backoff: backoff::BackoffConfig,
    pub stepped_intervals_ms: [u64; 4],
    pub adaptive_base_factor: f64,
    /// When `false`, retries use a flat `simple_delay_ms` wait up to
    /// `simple_max_retries` attempts instead of the classifier-driven
    /// strategy selection and per-kind backoff below. Non-recoverable
    /// errors still fail immediately either way.
    pub smart: bool,
    pub simple_max_retries: u32,
    pub simple_delay_ms: u64,
}

impl Default for RetryEngineConfig {
    fn default() -> Self {
        RetryEngineConfig {
            backoff: backoff::BackoffConfig::default(),
            stepped_intervals_ms: [1_000, 2_000, 4_000, 8_000],
            adaptive_base_factor: 1.0,
            smart: true,
            simple_max_retries: 3,
            simple_delay_ms: 1_000,
        }
    }
}

/// One observed retry attempt, emitted as the `smartRetry` event.
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    pub file_id: FileId,
    pub chunk_index: u64,
    pub attempt: u32,
    pub kind: upload_engine_domain::value_objects::ErrorKind,
    pub strategy: BackoffStrategy,
    pub delay_ms: u64,
}

/// Bounded ring of recent `RetryAttempt`s, pruned by the scheduler's
/// periodic sweep (`max(1 minute, retention / 10)`), kept here only for
/// inspection/testing; the success-rate bookkeeping itself lives on
/// `StrategySelector`.
pub struct RetryHistoryRing {
    entries: Mutex<VecDeque<(RetryAttempt, chrono::DateTime<chrono::Utc>)>>,
    retention: chrono::Duration,
}

impl RetryHistoryRing {
    pub fn new(retention: chrono::Duration) -> Self {
        RetryHistoryRing {
            entries: Mutex::new(VecDeque::new()),
            retention,
        }
    }

    pub fn push(&self, attempt: RetryAttempt, now: chrono::DateTime<chrono::Utc>) {
        let mut entries = self.entries.lock().unwrap();
        entries.push_back((attempt, now));
    }

    pub fn sweep(&self, now: chrono::DateTime<chrono::Utc>) {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|(_, ts)| now.signed_duration_since(*ts) <= self.retention);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cadence at which the owning scheduler should invoke `sweep`.
    pub fn sweep_interval(&self) -> chrono::Duration {
        let tenth = self.retention / 10;
        tenth.max(chrono::Duration::minutes(1))
    }
}

pub struct RetryEngine {
    config: RetryEngineConfig,
    selector: StrategySelector,
}

/// Result of retrying a single chunk upload to completion (success,
/// non-recoverable failure, or cancellation).
pub enum RetryOutcome<T> {
    Succeeded(T),
    Failed(UploadError),
    Cancelled,
}

impl RetryEngine {
    pub fn new(config: RetryEngineConfig, selector: StrategySelector) -> Self {
        RetryEngine { config, selector }
    }

    /// Runs `upload` (the adapter call), retrying on recoverable failures up
    /// to the classified error kind's max-retry cap. `on_retry` is invoked
    /// once per scheduled retry with the computed `RetryAttempt` (the caller
    /// publishes this as the `smartRetry` event and appends to its history
    /// ring). `network_quality` feeds the adaptive backoff functions when
    /// the selector's chosen strategy needs it.
    pub async fn run<T, F, Fut>(
        &self,
        file_id: &FileId,
        chunk_index: u64,
        cancellation: &CancellationToken,
        network_quality: NetworkQuality,
        classifier_config: &ClassifierConfig,
        mut on_retry: impl FnMut(RetryAttempt),
        mut upload: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UploadError>>,
    {
        let mut attempt: u32 = 1;
        let mut last_strategy = BackoffStrategy::Exponential;
        let mut last_kind: Option<upload_engine_domain::value_objects::ErrorKind> = None;
        loop {
            if cancellation.is_cancelled() {
                return RetryOutcome::Cancelled;
            }
            match upload().await {
                Ok(value) => {
                    if let Some(kind) = last_kind {
                        self.selector.record_outcome(kind, last_strategy, true);
                    }
                    return RetryOutcome::Succeeded(value);
                }
                Err(error) => {
                    let classification = classify(&error, classifier_config);
                    let max_retries = if self.config.smart { classification.suggested_max_retries } else { self.config.simple_max_retries };
                    if !classification.recoverable || attempt >= max_retries {
                        if self.config.smart {
                            self.selector.record_outcome(classification.kind, last_strategy, false);
                        }
                        return RetryOutcome::Failed(error);
                    }

                    let (strategy, delay_ms) = if self.config.smart {
                        let ctx = SelectionContext {
                            kind: classification.kind,
                            group: classification.group,
                            attempt,
                            network_quality: Some(network_quality),
                        };
                        let strategy = self.selector.select(ctx);
                        let delay_ms = self.compute_delay(strategy, attempt, classification.kind, network_quality);
                        (strategy, delay_ms)
                    } else {
                        (BackoffStrategy::Fixed, self.config.simple_delay_ms)
                    };
                    last_strategy = strategy;
                    last_kind = Some(classification.kind);

                    on_retry(RetryAttempt {
                        file_id: file_id.clone(),
                        chunk_index,
                        attempt,
                        kind: classification.kind,
                        strategy,
                        delay_ms,
                    });

                    tokio::select! {
                        _ = cancellation.cancelled() => return RetryOutcome::Cancelled,
                        _ = tokio::time::sleep(std::time::Duration::from_millis(delay_ms)) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn compute_delay(
        &self,
        strategy: BackoffStrategy,
        attempt: u32,
        kind: upload_engine_domain::value_objects::ErrorKind,
        quality: NetworkQuality,
    ) -> u64 {
        match strategy {
            BackoffStrategy::Fixed => backoff::fixed(&self.config.backoff),
            BackoffStrategy::Linear => backoff::linear(attempt, &self.config.backoff),
            BackoffStrategy::Exponential => backoff::exponential(attempt, &self.config.backoff),
            BackoffStrategy::Jittered => backoff::jittered(attempt, &self.config.backoff, rand::random::<f64>()),
            BackoffStrategy::Stepped => backoff::stepped(attempt, &self.config.stepped_intervals_ms),
            BackoffStrategy::NetworkAdaptive => backoff::network_adaptive(attempt, &self.config.backoff, self.config.adaptive_base_factor, quality),
            BackoffStrategy::ErrorAdaptive => backoff::error_adaptive(attempt, &self.config.backoff, kind),
        }
    }
}
