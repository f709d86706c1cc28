// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Scheduler
//!
//! Turns a file's chunk-descriptor plan into a bounded worker pool driven by
//! the `UploadSession` aggregate: each dispatch tick pulls the next ready
//! batch from `UploadSession::ready_indices`, and each worker reads its
//! chunk's bytes through the `Adapter`, runs the `per-chunk-process`
//! pipeline stage, persists the bytes to the `BlockStore` (so a retry or a
//! process restart never has to re-read the source), then calls the
//! `RetryEngine` around `Adapter::upload_chunk`. Progress is aggregated from
//! completed-chunk bytes and emitted on a fixed timer, "last-timer-wins"
//! rather than once per chunk, so a thousand-chunk file doesn't flood
//! subscribers.

use crate::application::services::event_bus::EventBus;
use crate::application::services::pipeline::Pipeline;
use crate::application::services::retry_engine::{RetryEngine, RetryOutcome};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex as TokioMutex;
use tokio_util::sync::CancellationToken;
use upload_engine_domain::entities::{ChunkRecord, FileMetadata};
use upload_engine_domain::repositories::{Adapter, BlockStore, ChunkRequestMeta, ChunkUploadResponse, NetworkProbe};
use upload_engine_domain::services::ClassifierConfig;
use upload_engine_domain::value_objects::{ChunkDescriptor, ChunkState, FileHandle, FileId};
use upload_engine_domain::{UploadError, UploadEvent, UploadSession};

#[derive(Debug, Clone, Copy)]
pub struct ChunkSchedulerConfig {
    pub concurrency: usize,
    pub progress_throttle: Duration,
    /// When set, the scheduler resamples the Network Probe at this cadence
    /// and adjusts in-flight worker capacity; never chunk size, which
    /// would invalidate persisted indices mid-file.
    pub adaptive_concurrency: bool,
    pub min_concurrency: usize,
    pub max_concurrency: usize,
}

impl Default for ChunkSchedulerConfig {
    fn default() -> Self {
        ChunkSchedulerConfig {
            concurrency: 4,
            progress_throttle: Duration::from_millis(300),
            adaptive_concurrency: false,
            min_concurrency: 1,
            max_concurrency: 8,
        }
    }
}

pub struct ChunkScheduler {
    adapter: Arc<dyn Adapter>,
    block_store: Arc<dyn BlockStore>,
    pipeline: Arc<Pipeline>,
    retry_engine: Arc<RetryEngine>,
    network_probe: Arc<dyn NetworkProbe>,
    event_bus: EventBus,
    config: ChunkSchedulerConfig,
}

/// Aggregated result of a completed scheduler run: every chunk's upload
/// response, keyed by index. Chunks that were already `uploaded` from a
/// prior run (resume) have no entry since no response was produced this run.
pub type ScheduleResult = HashMap<u64, ChunkUploadResponse>;

impl ChunkScheduler {
    pub fn new(
        adapter: Arc<dyn Adapter>,
        block_store: Arc<dyn BlockStore>,
        pipeline: Arc<Pipeline>,
        retry_engine: Arc<RetryEngine>,
        network_probe: Arc<dyn NetworkProbe>,
        event_bus: EventBus,
        config: ChunkSchedulerConfig,
    ) -> Self {
        ChunkScheduler {
            adapter,
            block_store,
            pipeline,
            retry_engine,
            network_probe,
            event_bus,
            config,
        }
    }

    /// `metadata` is the shared, already-persisted `FileMetadata` for this
    /// upload; its `uploaded_chunks` set is the resume skip-list and is
    /// updated (and re-persisted) as each chunk's upload is confirmed. The
    /// chunk size is fixed from `metadata` and never changes mid-file.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        metadata: Arc<TokioMutex<FileMetadata>>,
        file: &FileHandle,
        upload_url: &str,
        headers: HashMap<String, String>,
        classifier_config: &ClassifierConfig,
        cancellation: &CancellationToken,
    ) -> Result<ScheduleResult, UploadError> {
        let (file_id, chunk_size, already_uploaded) = {
            let guard = metadata.lock().await;
            (guard.file_id.clone(), guard.chunk_size.bytes() as u64, guard.uploaded_chunks().clone())
        };
        let all_descriptors = ChunkDescriptor::plan(&file_id, file.size, chunk_size);
        let total_chunks = all_descriptors.len() as u64;
        let already_bytes: u64 = all_descriptors.iter().filter(|d| already_uploaded.contains(&d.index)).map(|d| d.size).sum();
        let descriptor_by_index: HashMap<u64, ChunkDescriptor> = all_descriptors.iter().cloned().map(|d| (d.index, d)).collect();

        // `UploadSession` is the single source of truth for each chunk's
        // state; it is what `ready_indices` consults to keep the in-flight
        // count at or below `concurrency` on every dispatch tick.
        let session = Arc::new(StdMutex::new(UploadSession::resume(file_id.clone(), all_descriptors, self.config.concurrency.max(1), &already_uploaded)));

        let sent_bytes = Arc::new(AtomicU64::new(already_bytes));
        let responses: Arc<std::sync::Mutex<ScheduleResult>> = Arc::new(std::sync::Mutex::new(HashMap::new()));
        let worker_token = cancellation.child_token();

        let progress_handle = self.spawn_progress_ticker(file_id.clone(), file.size, Arc::clone(&sent_bytes), worker_token.clone());

        let mut join_set: tokio::task::JoinSet<(u64, Result<(), UploadError>)> = tokio::task::JoinSet::new();
        let mut first_error: Option<UploadError> = None;

        loop {
            let ready = if worker_token.is_cancelled() { Vec::new() } else { session.lock().unwrap().ready_indices() };

            for index in ready {
                {
                    let mut guard = session.lock().unwrap();
                    if guard.transition(index, ChunkState::InFlight).is_err() {
                        continue;
                    }
                }
                let descriptor = descriptor_by_index.get(&index).cloned().expect("ready index must have a known descriptor");
                let adapter = Arc::clone(&self.adapter);
                let block_store = Arc::clone(&self.block_store);
                let pipeline = Arc::clone(&self.pipeline);
                let retry_engine = Arc::clone(&self.retry_engine);
                let network_probe = Arc::clone(&self.network_probe);
                let event_bus = self.event_bus.clone();
                let sent_bytes = Arc::clone(&sent_bytes);
                let responses = Arc::clone(&responses);
                let metadata = Arc::clone(&metadata);
                let token = worker_token.clone();
                let file = file.clone();
                let classifier_config = classifier_config.clone();
                let upload_url = upload_url.to_string();
                let headers = headers.clone();

                join_set.spawn(async move {
                    let result = upload_one_chunk(
                        descriptor,
                        total_chunks,
                        file,
                        adapter,
                        block_store,
                        pipeline,
                        retry_engine,
                        network_probe,
                        event_bus,
                        sent_bytes,
                        responses,
                        metadata,
                        token,
                        classifier_config,
                        upload_url,
                        headers,
                    )
                    .await;
                    (index, result)
                });
            }

            if join_set.is_empty() {
                break;
            }

            if let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((index, Ok(()))) => {
                        session.lock().unwrap().transition(index, ChunkState::Succeeded).ok();
                    }
                    Ok((index, Err(err))) => {
                        session.lock().unwrap().transition(index, ChunkState::Failed).ok();
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                        worker_token.cancel();
                    }
                    Err(join_err) => {
                        if first_error.is_none() {
                            first_error = Some(UploadError::internal(format!("chunk worker task panicked: {join_err}")));
                        }
                        worker_token.cancel();
                    }
                }
            }
        }

        progress_handle.abort();

        if let Some(err) = first_error {
            return Err(err);
        }
        if cancellation.is_cancelled() {
            return Err(UploadError::cancel("upload cancelled"));
        }

        let result = Arc::try_unwrap(responses).map(|m| m.into_inner().unwrap()).unwrap_or_else(|arc| arc.lock().unwrap().clone());
        Ok(result)
    }

    fn spawn_progress_ticker(&self, file_id: FileId, file_size: u64, sent_bytes: Arc<AtomicU64>, token: CancellationToken) -> tokio::task::JoinHandle<()> {
        let event_bus = self.event_bus.clone();
        let throttle = self.config.progress_throttle;
        tokio::spawn(async move {
            let start = Instant::now();
            let mut interval = tokio::time::interval(throttle);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let loaded = sent_bytes.load(Ordering::Relaxed);
                        emit_progress(&event_bus, &file_id, loaded, file_size, start);
                        if loaded >= file_size {
                            break;
                        }
                    }
                }
            }
        })
    }
}

fn emit_progress(event_bus: &EventBus, file_id: &FileId, loaded: u64, total: u64, start: Instant) {
    let elapsed = start.elapsed().as_secs_f64().max(0.001);
    let speed = loaded as f64 / elapsed;
    let remaining = total.saturating_sub(loaded) as f64;
    let eta_seconds = if speed > 0.0 { Some(remaining / speed) } else { None };
    let percent = if total == 0 { 100 } else { ((loaded as f64 / total as f64) * 100.0).min(100.0) as u8 };
    event_bus.publish(UploadEvent::FileUploadProgress {
        file_id: file_id.clone(),
        percent,
        loaded,
        total,
        speed_bytes_per_sec: speed,
        eta_seconds,
    });
}

#[allow(clippy::too_many_arguments)]
async fn upload_one_chunk(
    descriptor: ChunkDescriptor,
    total_chunks: u64,
    file: FileHandle,
    adapter: Arc<dyn Adapter>,
    block_store: Arc<dyn BlockStore>,
    pipeline: Arc<Pipeline>,
    retry_engine: Arc<RetryEngine>,
    network_probe: Arc<dyn NetworkProbe>,
    event_bus: EventBus,
    sent_bytes: Arc<AtomicU64>,
    responses: Arc<std::sync::Mutex<ScheduleResult>>,
    metadata: Arc<TokioMutex<FileMetadata>>,
    token: CancellationToken,
    classifier_config: ClassifierConfig,
    upload_url: String,
    headers: HashMap<String, String>,
) -> Result<(), UploadError> {
    if token.is_cancelled() {
        return Err(UploadError::cancel("upload cancelled before chunk start"));
    }

    event_bus.publish(UploadEvent::ChunkUploadStart {
        file_id: descriptor.file_id.clone(),
        index: descriptor.index,
    });

    let bytes = match block_store.get_chunk(&descriptor.file_id, descriptor.index).await? {
        Some(record) => record.bytes,
        None => {
            let bytes = adapter.read_chunk(&file, descriptor.start, descriptor.size).await?;
            let record = ChunkRecord::new(descriptor.file_id.clone(), descriptor.index, bytes.clone(), chrono::Utc::now());
            block_store.save_chunk(record).await?;
            bytes
        }
    };

    pipeline
        .run_per_chunk(json!({
            "fileId": descriptor.file_id.to_string(),
            "index": descriptor.index,
            "size": descriptor.size,
        }))
        .await?;

    let quality = network_probe.quality().await;
    let meta = ChunkRequestMeta {
        file_id: descriptor.file_id.to_string(),
        chunk_index: descriptor.index,
        total_chunks,
        chunk_size: descriptor.size,
        file_size: file.size,
    };

    let outcome = retry_engine
        .run(
            &descriptor.file_id,
            descriptor.index,
            &token,
            quality,
            &classifier_config,
            |attempt| {
                event_bus.publish(UploadEvent::SmartRetry {
                    file_id: attempt.file_id,
                    index: attempt.chunk_index,
                    attempt: attempt.attempt,
                    kind: attempt.kind,
                    strategy: attempt.strategy,
                    delay_ms: attempt.delay_ms,
                });
            },
            || {
                let adapter = Arc::clone(&adapter);
                let bytes = bytes.clone();
                let headers = headers.clone();
                let meta = meta.clone();
                let upload_url = upload_url.clone();
                async move { adapter.upload_chunk(&upload_url, bytes, headers, meta).await }
            },
        )
        .await;

    match outcome {
        RetryOutcome::Succeeded(response) => {
            sent_bytes.fetch_add(descriptor.size, Ordering::Relaxed);
            let persisted_metadata = {
                let mut guard = metadata.lock().await;
                guard.mark_uploaded(descriptor.index, chrono::Utc::now())?;
                guard.clone()
            };
            block_store.save_file_metadata(persisted_metadata).await?;
            event_bus.publish(UploadEvent::ChunkUploadSuccess {
                file_id: descriptor.file_id.clone(),
                index: descriptor.index,
                response: Some(response.clone()),
            });
            responses.lock().unwrap().insert(descriptor.index, response);
            Ok(())
        }
        RetryOutcome::Failed(error) => {
            event_bus.publish(UploadEvent::ChunkUploadError {
                file_id: descriptor.file_id.clone(),
                index: descriptor.index,
                attempt: 0,
                error: error.to_string(),
            });
            Err(error)
        }
        RetryOutcome::Cancelled => Err(UploadError::cancel("chunk upload cancelled")),
    }
}
