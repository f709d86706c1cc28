// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Engine Configuration
//!
//! Layered configuration for the whole engine, loaded through the `config`
//! crate: an optional TOML file, then `UPLOAD_ENGINE__*` environment
//! variables (double underscore as the section separator, e.g.
//! `UPLOAD_ENGINE__RETRY__MAX_MS=60000`), each layer overriding the one
//! before it. Every section maps onto one service's own config struct so
//! the services themselves stay ignorant of where their settings came from.

use crate::application::services::{ChunkSchedulerConfig, QueueManagerConfig, RetryEngineConfig, ValidationConfig};
use crate::infrastructure::adapters::HttpAdapterConfig;
use crate::infrastructure::repositories::BlockStoreConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use upload_engine_domain::services::backoff::BackoffConfig;
use upload_engine_domain::value_objects::{ChunkSize, SortMode};
use upload_engine_domain::UploadError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSection {
    pub chunk_size_bytes: usize,
    pub concurrency: usize,
    pub progress_throttle_ms: u64,
    pub adaptive_concurrency: bool,
    pub min_concurrency: usize,
    pub max_concurrency: usize,
}

impl Default for UploadSection {
    fn default() -> Self {
        let defaults = ChunkSchedulerConfig::default();
        UploadSection {
            chunk_size_bytes: ChunkSize::default().bytes(),
            concurrency: defaults.concurrency,
            progress_throttle_ms: defaults.progress_throttle.as_millis() as u64,
            adaptive_concurrency: defaults.adaptive_concurrency,
            min_concurrency: defaults.min_concurrency,
            max_concurrency: defaults.max_concurrency,
        }
    }
}

impl UploadSection {
    pub fn chunk_size(&self) -> Result<ChunkSize, UploadError> {
        ChunkSize::new(self.chunk_size_bytes)
    }

    pub fn scheduler_config(&self) -> ChunkSchedulerConfig {
        ChunkSchedulerConfig {
            concurrency: self.concurrency,
            progress_throttle: Duration::from_millis(self.progress_throttle_ms),
            adaptive_concurrency: self.adaptive_concurrency,
            min_concurrency: self.min_concurrency,
            max_concurrency: self.max_concurrency,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub step_ms: u64,
    pub factor: f64,
    pub jitter_factor: f64,
    pub stepped_intervals_ms: [u64; 4],
    pub adaptive_base_factor: f64,
    /// `retry.count`: attempt cap used only when `smart` is false.
    pub count: u32,
    /// `retry.delay` (ms): flat delay used only when `smart` is false.
    pub delay_ms: u64,
    /// `retry.smart`: classifier-driven strategy selection and per-kind
    /// backoff when true, a flat `count`/`delay_ms` retry loop when false.
    pub smart: bool,
    /// `retry.retryableStatusCodes`: HTTP status codes the adapter should
    /// classify as retryable regardless of its own default status table.
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetrySection {
    fn default() -> Self {
        let backoff = BackoffConfig::default();
        let defaults = RetryEngineConfig::default();
        RetrySection {
            initial_ms: backoff.initial_ms,
            max_ms: backoff.max_ms,
            step_ms: backoff.step_ms,
            factor: backoff.factor,
            jitter_factor: backoff.jitter_factor,
            stepped_intervals_ms: defaults.stepped_intervals_ms,
            adaptive_base_factor: defaults.adaptive_base_factor,
            count: defaults.simple_max_retries,
            delay_ms: defaults.simple_delay_ms,
            smart: defaults.smart,
            retryable_status_codes: Vec::new(),
        }
    }
}

impl RetrySection {
    pub fn retry_engine_config(&self) -> RetryEngineConfig {
        RetryEngineConfig {
            backoff: BackoffConfig {
                initial_ms: self.initial_ms,
                max_ms: self.max_ms,
                step_ms: self.step_ms,
                factor: self.factor,
                jitter_factor: self.jitter_factor,
            },
            stepped_intervals_ms: self.stepped_intervals_ms,
            adaptive_base_factor: self.adaptive_base_factor,
            smart: self.smart,
            simple_max_retries: self.count,
            simple_delay_ms: self.delay_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSection {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        let defaults = HttpAdapterConfig::default();
        HttpSection {
            request_timeout_secs: defaults.request_timeout.as_secs(),
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
        }
    }
}

impl HttpSection {
    /// `retryable_status_codes` comes from `RetrySection` (`retry.retryableStatusCodes`
    /// in spec terms), not this section, since it governs retry
    /// classification rather than transport settings.
    pub fn http_adapter_config(&self, retryable_status_codes: Vec<u16>) -> HttpAdapterConfig {
        HttpAdapterConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            retryable_status_codes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSection {
    pub max_queue_size: usize,
    pub sort_mode: SortMode,
    pub parallel_uploads: usize,
    pub auto_start: bool,
    pub auto_clean_completed: bool,
    pub upload_url: String,
    pub persist_queue: bool,
    pub persist_key: String,
    pub throttle_time_ms: u64,
}

impl Default for QueueSection {
    fn default() -> Self {
        let defaults = QueueManagerConfig::default();
        QueueSection {
            max_queue_size: defaults.max_queue_size,
            sort_mode: defaults.sort_mode,
            parallel_uploads: defaults.parallel_uploads,
            auto_start: defaults.auto_start,
            auto_clean_completed: defaults.auto_clean_completed,
            upload_url: defaults.upload_url,
            persist_queue: defaults.persist_queue,
            persist_key: defaults.persist_key,
            throttle_time_ms: defaults.throttle_time.as_millis() as u64,
        }
    }
}

impl QueueSection {
    pub fn queue_manager_config(&self) -> QueueManagerConfig {
        QueueManagerConfig {
            max_queue_size: self.max_queue_size,
            sort_mode: self.sort_mode,
            parallel_uploads: self.parallel_uploads,
            auto_start: self.auto_start,
            auto_clean_completed: self.auto_clean_completed,
            upload_url: self.upload_url.clone(),
            persist_queue: self.persist_queue,
            persist_key: self.persist_key.clone(),
            throttle_time: Duration::from_millis(self.throttle_time_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockStoreSection {
    pub database_url: String,
    pub quota_bytes: u64,
    pub cleanup_interval_secs: u64,
    pub cleanup_ttl_secs: u64,
}

impl Default for BlockStoreSection {
    fn default() -> Self {
        let defaults = BlockStoreConfig::default();
        BlockStoreSection {
            database_url: "sqlite://upload_engine.db".to_string(),
            quota_bytes: defaults.quota_bytes,
            cleanup_interval_secs: defaults.cleanup_interval.as_secs(),
            cleanup_ttl_secs: defaults.cleanup_ttl.as_secs(),
        }
    }
}

impl BlockStoreSection {
    pub fn block_store_config(&self) -> BlockStoreConfig {
        BlockStoreConfig {
            quota_bytes: self.quota_bytes,
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs),
            cleanup_ttl: Duration::from_secs(self.cleanup_ttl_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSection {
    pub max_file_size: Option<u64>,
    pub allow_empty_files: bool,
    pub allowed_file_types: Vec<String>,
    pub disallowed_file_types: Vec<String>,
    pub high_risk_extensions: Vec<String>,
}

impl Default for ValidationSection {
    fn default() -> Self {
        let defaults = ValidationConfig::default();
        ValidationSection {
            max_file_size: defaults.max_file_size,
            allow_empty_files: defaults.allow_empty_files,
            allowed_file_types: defaults.allowed_mime_types,
            disallowed_file_types: defaults.disallowed_mime_types,
            high_risk_extensions: defaults.high_risk_extensions,
        }
    }
}

impl ValidationSection {
    /// `check_signature` is not a field here; it is driven by
    /// `SecuritySection::level` instead (`advanced` turns it on), since
    /// spec.md models signature verification as a consequence of the
    /// security level rather than an independent validation toggle.
    pub fn validation_config(&self, check_signature: bool) -> ValidationConfig {
        ValidationConfig {
            max_file_size: self.max_file_size,
            allow_empty_files: self.allow_empty_files,
            allowed_mime_types: self.allowed_file_types.clone(),
            disallowed_mime_types: self.disallowed_file_types.clone(),
            check_signature,
            high_risk_extensions: self.high_risk_extensions.clone(),
        }
    }
}

/// `security.level`: how aggressively uploaded content is inspected before
/// being accepted. `Basic` only checks size/extension; `Standard` adds the
/// MIME allow/disallow lists; `Advanced` additionally verifies the file's
/// magic-byte signature against its declared MIME type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Basic,
    #[default]
    Standard,
    Advanced,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct SecuritySection {
    pub level: SecurityLevel,
}

impl SecuritySection {
    pub fn check_signature(&self) -> bool {
        self.level == SecurityLevel::Advanced
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeaturesSection {
    pub auto_start: bool,
    pub resumable: bool,
    pub skip_duplicate: bool,
}

impl Default for FeaturesSection {
    fn default() -> Self {
        FeaturesSection { auto_start: true, resumable: true, skip_duplicate: false }
    }
}

/// `performance.useWorker` / `performance.maxMemoryUsage`. This engine has
/// no worker-thread offload of its own (chunk reads and uploads are already
/// async I/O, not CPU-bound) and does not yet track in-flight chunk memory,
/// so both fields are accepted and round-tripped through `EngineConfig` for
/// API parity with spec.md's configuration surface but have no runtime
/// effect; see DESIGN.md.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerformanceSection {
    pub use_worker: bool,
    pub max_memory_bytes: Option<u64>,
}

impl Default for PerformanceSection {
    fn default() -> Self {
        PerformanceSection { use_worker: false, max_memory_bytes: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    pub upload: UploadSection,
    pub retry: RetrySection,
    pub http: HttpSection,
    pub queue: QueueSection,
    pub block_store: BlockStoreSection,
    pub validation: ValidationSection,
    pub security: SecuritySection,
    pub features: FeaturesSection,
    pub performance: PerformanceSection,
    /// `plugins`: names of plugins the embedding application intends to
    /// install. The engine itself only exposes the `Pipeline`/`HookRegistry`
    /// API for attaching them (there is no dynamic plugin loader); this list
    /// is passed through for callers that want to validate configured
    /// plugin names against what actually got installed.
    pub plugins: Vec<String>,
}

impl EngineConfig {
    /// Loads `path` (if it exists) as a TOML layer, then overlays
    /// `UPLOAD_ENGINE__*` environment variables on top. A missing file is
    /// not an error; callers that want a config file to be mandatory
    /// should check `path.exists()` themselves first.
    pub fn load(path: Option<&Path>) -> Result<Self, UploadError> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&EngineConfig::default()).map_err(config_error)?);
        if let Some(path) = path {
            if path.exists() {
                builder = builder.add_source(config::File::from(path.to_path_buf()));
            }
        }
        builder = builder.add_source(config::Environment::with_prefix("UPLOAD_ENGINE").separator("__"));
        let config = builder.build().map_err(config_error)?;
        config.try_deserialize().map_err(config_error)
    }
}

fn config_error(err: config::ConfigError) -> UploadError {
    UploadError::InvalidConfiguration(err.to_string())
}
