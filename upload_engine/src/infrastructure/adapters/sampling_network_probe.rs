// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Sampling Network Probe
//!
//! The reference `NetworkProbe`: callers feed observed
//! transfer rates in as they complete chunk uploads, this keeps a bounded
//! rolling average, and classifies it into a `NetworkQuality` tier against a
//! configurable threshold table. Change callbacks fire only when the tier
//! itself moves, not on every sample, so a chatty caller can't spam
//! subscribers with no-op notifications.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use upload_engine_domain::repositories::NetworkProbe;
use upload_engine_domain::value_objects::NetworkQuality;

#[derive(Debug, Clone, Copy)]
pub struct QualityThresholds {
    pub poor_bps: f64,
    pub low_bps: f64,
    pub medium_bps: f64,
    pub good_bps: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        QualityThresholds {
            poor_bps: 50_000.0,
            low_bps: 250_000.0,
            medium_bps: 1_000_000.0,
            good_bps: 5_000_000.0,
        }
    }
}

impl QualityThresholds {
    pub fn classify(&self, bytes_per_sec: f64) -> NetworkQuality {
        if bytes_per_sec <= 0.0 {
            NetworkQuality::Offline
        } else if bytes_per_sec < self.poor_bps {
            NetworkQuality::Poor
        } else if bytes_per_sec < self.low_bps {
            NetworkQuality::Low
        } else if bytes_per_sec < self.medium_bps {
            NetworkQuality::Medium
        } else if bytes_per_sec < self.good_bps {
            NetworkQuality::Good
        } else {
            NetworkQuality::Excellent
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SamplingNetworkProbeConfig {
    /// Number of most-recent bytes-per-second samples averaged together.
    pub window: usize,
    pub thresholds: QualityThresholds,
}

impl Default for SamplingNetworkProbeConfig {
    fn default() -> Self {
        SamplingNetworkProbeConfig { window: 20, thresholds: QualityThresholds::default() }
    }
}

type ChangeCallback = Box<dyn Fn(NetworkQuality) + Send + Sync>;

pub struct SamplingNetworkProbe {
    samples: Mutex<VecDeque<f64>>,
    config: SamplingNetworkProbeConfig,
    current: Mutex<NetworkQuality>,
    callbacks: Mutex<Vec<ChangeCallback>>,
}

impl SamplingNetworkProbe {
    pub fn new(config: SamplingNetworkProbeConfig) -> Self {
        SamplingNetworkProbe {
            samples: Mutex::new(VecDeque::with_capacity(config.window)),
            config,
            current: Mutex::new(NetworkQuality::Unknown),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Folds one observed bytes-per-second measurement into the rolling
    /// window and reclassifies. Fires registered callbacks only if the tier
    /// changed.
    pub fn record_sample(&self, bytes_per_sec: f64) {
        let average = {
            let mut samples = self.samples.lock();
            if samples.len() == self.config.window {
                samples.pop_front();
            }
            samples.push_back(bytes_per_sec);
            samples.iter().sum::<f64>() / samples.len() as f64
        };
        let classified = self.config.thresholds.classify(average);

        let changed = {
            let mut current = self.current.lock();
            if *current != classified {
                *current = classified;
                true
            } else {
                false
            }
        };
        if changed {
            for callback in self.callbacks.lock().iter() {
                callback(classified);
            }
        }
    }

    /// Convenience wrapper over `record_sample` for callers that only know
    /// bytes transferred and elapsed wall time (e.g. one completed chunk
    /// upload).
    pub fn record_transfer(&self, bytes: u64, elapsed: Duration) {
        let seconds = elapsed.as_secs_f64().max(0.001);
        self.record_sample(bytes as f64 / seconds);
    }
}

impl Default for SamplingNetworkProbe {
    fn default() -> Self {
        SamplingNetworkProbe::new(SamplingNetworkProbeConfig::default())
    }
}

#[async_trait::async_trait]
impl NetworkProbe for SamplingNetworkProbe {
    async fn quality(&self) -> NetworkQuality {
        *self.current.lock()
    }

    fn on_change(&self, callback: Box<dyn Fn(NetworkQuality) + Send + Sync>) {
        self.callbacks.lock().push(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn thresholds_classify_boundaries_correctly() {
        let thresholds = QualityThresholds::default();
        assert_eq!(thresholds.classify(0.0), NetworkQuality::Offline);
        assert_eq!(thresholds.classify(10_000.0), NetworkQuality::Poor);
        assert_eq!(thresholds.classify(10_000_000.0), NetworkQuality::Excellent);
    }

    #[tokio::test]
    async fn repeated_samples_settle_on_the_matching_tier() {
        let probe = SamplingNetworkProbe::new(SamplingNetworkProbeConfig::default());
        for _ in 0..5 {
            probe.record_sample(10_000_000.0);
        }
        assert_eq!(probe.quality().await, NetworkQuality::Excellent);
    }

    #[tokio::test]
    async fn callback_fires_only_on_tier_change() {
        let probe = SamplingNetworkProbe::new(SamplingNetworkProbeConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        probe.on_change(Box::new(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));
        probe.record_sample(10_000_000.0);
        probe.record_sample(10_000_000.0);
        probe.record_sample(10_000_000.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn window_bounds_sample_history() {
        let probe = SamplingNetworkProbe::new(SamplingNetworkProbeConfig { window: 2, thresholds: QualityThresholds::default() });
        probe.record_sample(10_000_000.0);
        probe.record_sample(10_000_000.0);
        probe.record_sample(0.0);
        probe.record_sample(0.0);
        assert_eq!(probe.quality().await, NetworkQuality::Offline);
    }

    #[test]
    fn record_transfer_derives_bytes_per_second() {
        let probe = SamplingNetworkProbe::new(SamplingNetworkProbeConfig::default());
        probe.record_transfer(10_000_000, Duration::from_secs(1));
        assert_eq!(*probe.current.lock(), NetworkQuality::Excellent);
    }
}
