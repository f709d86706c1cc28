// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Composition Root
//!
//! Wires every service named in `upload_engine::application::services` from
//! one `EngineConfig`, outside the enterprise layers as the
//! bootstrap module's architecture position requires. `build` is the single
//! place in the whole workspace that knows every concrete type; everything
//! downstream of it only sees traits and `Arc`s.

use std::sync::Arc;
use upload_engine::application::services::validation;
use upload_engine::application::services::{
    ChunkScheduler, EventBus, FingerprintConfig, FingerprintService, Pipeline, QueueManager, QueueManagerConfig, RetryEngine, SelectorConfig,
    StrategySelector, UploaderCore, UploaderCoreConfig,
};
use upload_engine::infrastructure::adapters::{HttpAdapter, SamplingNetworkProbe};
use upload_engine::infrastructure::config::EngineConfig;
use upload_engine::infrastructure::metrics::EngineMetrics;
use upload_engine::infrastructure::repositories::SqliteBlockStore;
use upload_engine_domain::repositories::{Adapter, BlockStore};
use upload_engine_domain::UploadError;

pub struct Engine {
    pub queue: Arc<QueueManager>,
    pub uploader: Arc<UploaderCore>,
    pub block_store: Arc<dyn BlockStore>,
    pub event_bus: EventBus,
    pub metrics: Arc<EngineMetrics>,
}

/// Builds every service from `config` and starts the queue's dispatcher.
/// The returned `Engine` owns an `Arc` to everything a CLI command needs;
/// dropping it (and every clone) stops the dispatcher loop.
pub async fn build(config: &EngineConfig) -> Result<Engine, UploadError> {
    let block_store: Arc<dyn BlockStore> = Arc::new(SqliteBlockStore::connect(&config.block_store.database_url, config.block_store.block_store_config()).await?);

    let adapter: Arc<dyn Adapter> = Arc::new(HttpAdapter::new(config.http.http_adapter_config(config.retry.retryable_status_codes.clone()))?);
    let network_probe = Arc::new(SamplingNetworkProbe::default());
    let event_bus = EventBus::new();

    let mut pipeline = Pipeline::new(Default::default());
    validation::register(&mut pipeline, config.validation.validation_config(config.security.check_signature()));
    let pipeline = Arc::new(pipeline);

    let retry_engine = Arc::new(RetryEngine::new(config.retry.retry_engine_config(), StrategySelector::new(SelectorConfig::default())));

    let scheduler = Arc::new(ChunkScheduler::new(
        Arc::clone(&adapter),
        Arc::clone(&block_store),
        Arc::clone(&pipeline),
        retry_engine,
        network_probe,
        event_bus.clone(),
        config.upload.scheduler_config(),
    ));

    let fingerprint = FingerprintService::new(Arc::clone(&adapter), FingerprintConfig::default());

    let uploader = Arc::new(UploaderCore::new(
        Arc::clone(&block_store),
        pipeline,
        scheduler,
        fingerprint,
        event_bus.clone(),
        UploaderCoreConfig {
            chunk_size: config.upload.chunk_size()?,
            resumable: config.features.resumable,
            skip_duplicate: config.features.skip_duplicate,
        },
    ));

    let queue_config: QueueManagerConfig = config.queue.queue_manager_config();
    let queue = QueueManager::new(Arc::clone(&uploader), Arc::clone(&adapter), event_bus.clone(), queue_config);
    queue.load_persisted().await?;
    queue.spawn_dispatcher();

    let metrics = Arc::new(EngineMetrics::new()?);
    metrics.subscribe(&event_bus);

    Ok(Engine { queue, uploader, block_store, event_bus, metrics })
}
