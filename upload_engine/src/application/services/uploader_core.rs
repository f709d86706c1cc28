// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Uploader Core
//!
//! The `upload(file, options)` entry point: validate, derive
//! a stable `FileId` and open/create its `FileMetadata`, run the
//! `pre-process-file` pipeline (which includes the built-in validation hook
//! registered at priority `0`, per `services::validation::register`), hand
//! the file to the `ChunkScheduler`, run `post-process-file` on success, and
//! emit the `fileUpload:*` events around the whole sequence. Unrecoverable
//! failures leave persisted chunk/metadata state intact so the upload can be
//! resumed by calling `upload` again with the same file.

use crate::application::services::chunk_scheduler::{ChunkScheduler, ScheduleResult};
use crate::application::services::event_bus::EventBus;
use crate::application::services::fingerprint::FingerprintService;
use crate::application::services::pipeline::Pipeline;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tokio_util::sync::CancellationToken;
use upload_engine_domain::entities::FileMetadata;
use upload_engine_domain::repositories::BlockStore;
use upload_engine_domain::value_objects::{ChunkDescriptor, ChunkSize, FileHandle, FileId};
use upload_engine_domain::{UploadError, UploadEvent};

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub upload_url: String,
    pub headers: HashMap<String, String>,
    /// Deletes persisted chunk bytes (never metadata) once every chunk has
    /// succeeded and `post-process-file` has run.
    pub cleanup_chunks_on_complete: bool,
}

impl UploadOptions {
    pub fn new(upload_url: impl Into<String>) -> Self {
        UploadOptions {
            upload_url: upload_url.into(),
            headers: HashMap::new(),
            cleanup_chunks_on_complete: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub file_id: FileId,
    pub responses: ScheduleResult,
}

pub struct UploaderCoreConfig {
    pub chunk_size: ChunkSize,
    /// When `false`, an upload never resumes a prior attempt's persisted
    /// `FileMetadata`; any existing record for the file's fingerprint is
    /// discarded and the file re-chunked from scratch.
    pub resumable: bool,
    /// When `true`, a file whose fingerprint already has a *complete*
    /// persisted record (every chunk previously confirmed uploaded) skips
    /// re-upload entirely and returns immediately.
    pub skip_duplicate: bool,
}

impl Default for UploaderCoreConfig {
    fn default() -> Self {
        UploaderCoreConfig { chunk_size: ChunkSize::default(), resumable: true, skip_duplicate: false }
    }
}

pub struct UploaderCore {
    block_store: Arc<dyn BlockStore>,
    pipeline: Arc<Pipeline>,
    scheduler: Arc<ChunkScheduler>,
    fingerprint: FingerprintService,
    event_bus: EventBus,
    config: UploaderCoreConfig,
}

impl UploaderCore {
    pub fn new(
        block_store: Arc<dyn BlockStore>,
        pipeline: Arc<Pipeline>,
        scheduler: Arc<ChunkScheduler>,
        fingerprint: FingerprintService,
        event_bus: EventBus,
        config: UploaderCoreConfig,
    ) -> Self {
        UploaderCore {
            block_store,
            pipeline,
            scheduler,
            fingerprint,
            event_bus,
            config,
        }
    }

    /// Runs one file through the full upload sequence. Resume is implicit:
    /// if `FileMetadata` already exists for
    /// this file's fingerprint, only its remaining chunks are scheduled.
    pub async fn upload(&self, file: &FileHandle, options: UploadOptions, cancellation: &CancellationToken) -> Result<UploadResult, UploadError> {
        let pre_process_input = json!({
            "name": file.name,
            "size": file.size,
            "mimeType": file.mime_type,
        });
        // Validation (registered at priority 0 on this same stage) and any
        // user pre-process plugin both surface here as a non-persisting,
        // immediately-surfaced failure.
        self.pipeline.run_pre_process(pre_process_input).await?;

        let file_id = self.fingerprint.compute(file).await?;

        // The fingerprint computation above is the first suspension point
        // after entry; re-check before the next one creates persisted state.
        if cancellation.is_cancelled() {
            return Err(UploadError::cancel("upload cancelled before metadata was created"));
        }

        let metadata = self.open_or_create_metadata(file_id.clone(), file, cancellation).await?;

        if self.config.skip_duplicate && metadata.is_complete() {
            self.event_bus.publish(UploadEvent::FileUploadComplete { file_id: file_id.clone(), response: None });
            return Ok(UploadResult { file_id, responses: ScheduleResult::new() });
        }

        let metadata_handle = Arc::new(TokioMutex::new(metadata));

        self.event_bus.publish(UploadEvent::FileUploadStart {
            file_id: file_id.clone(),
            file: file.clone(),
        });

        let scheduled = self
            .scheduler
            .run(
                Arc::clone(&metadata_handle),
                file,
                &options.upload_url,
                options.headers.clone(),
                &Default::default(),
                cancellation,
            )
            .await;

        let responses = match scheduled {
            Ok(responses) => responses,
            Err(error @ UploadError::Cancel(_)) => {
                self.event_bus.publish(UploadEvent::FileUploadCancelled {
                    file_id: file_id.clone(),
                    reason: error.to_string(),
                });
                return Err(error);
            }
            Err(error) => {
                self.event_bus.publish(UploadEvent::FileUploadError {
                    file_id: file_id.clone(),
                    error: error.to_string(),
                });
                return Err(error);
            }
        };

        {
            let metadata = metadata_handle.lock().await;
            self.block_store.save_file_metadata(metadata.clone()).await?;
        }

        if let Err(error) = self
            .pipeline
            .run_post_process(json!({
                "fileId": file_id.to_string(),
                "chunkCount": responses.len(),
            }))
            .await
        {
            self.event_bus.publish(UploadEvent::FileUploadError {
                file_id: file_id.clone(),
                error: error.to_string(),
            });
            return Err(error);
        }

        if options.cleanup_chunks_on_complete {
            self.block_store.delete_file_chunks(&file_id).await?;
        }

        self.event_bus.publish(UploadEvent::FileUploadComplete { file_id: file_id.clone(), response: None });

        Ok(UploadResult { file_id, responses })
    }

    /// Opens the persisted `FileMetadata` for `file_id` if present, else
    /// creates and persists a new record. A `chunkSize`
    /// mismatch against an already-persisted record is a configuration
    /// error, not a silent re-chunk; the persisted value is authoritative.
    async fn open_or_create_metadata(&self, file_id: FileId, file: &FileHandle, cancellation: &CancellationToken) -> Result<FileMetadata, UploadError> {
        if let Some(existing) = self.block_store.get_file_metadata(&file_id).await? {
            if !self.config.resumable {
                self.block_store.delete_file_chunks(&file_id).await?;
                self.block_store.delete_file_metadata(&file_id).await?;
            } else {
                if existing.chunk_size != self.config.chunk_size {
                    return Err(UploadError::InvalidConfiguration(format!(
                        "resuming file {file_id} was chunked at {} bytes; current configuration requests {} bytes",
                        existing.chunk_size.bytes(),
                        self.config.chunk_size.bytes()
                    )));
                }
                return Ok(existing);
            }
        }

        // This is the first place a brand-new file's state is persisted;
        // a cancellation observed right up to here must leave no trace.
        if cancellation.is_cancelled() {
            return Err(UploadError::cancel("upload cancelled before metadata was created"));
        }

        let total_chunks = ChunkDescriptor::plan(&file_id, file.size, self.config.chunk_size.bytes() as u64).len() as u64;
        let metadata = FileMetadata::new(
            file_id,
            file.name.clone(),
            file.size,
            file.mime_type.clone().unwrap_or_else(|| "application/octet-stream".to_string()),
            self.config.chunk_size,
            total_chunks,
            chrono::Utc::now(),
        )?;
        self.block_store.save_file_metadata(metadata.clone()).await?;
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::fingerprint::FingerprintConfig;
    use crate::application::services::retry_engine::RetryEngine;
    use crate::application::services::strategy_selector::{SelectorConfig, StrategySelector};
    use crate::application::services::chunk_scheduler::ChunkSchedulerConfig;
    use async_trait::async_trait;
    use parking_lot::Mutex as PLMutex;
    use std::collections::HashMap as StdHashMap;
    use upload_engine_domain::entities::{ChunkRecord, StorageStats};
    use upload_engine_domain::repositories::{Adapter, ChunkRequestMeta, ChunkUploadResponse, NetworkProbe};
    use upload_engine_domain::value_objects::NetworkQuality;

    struct MockAdapter {
        bytes: Vec<u8>,
    }

    #[async_trait]
    impl Adapter for MockAdapter {
        async fn read_chunk(&self, _source: &FileHandle, start: u64, size: u64) -> Result<Vec<u8>, UploadError> {
            Ok(self.bytes[start as usize..(start + size) as usize].to_vec())
        }

        async fn upload_chunk(
            &self,
            _url: &str,
            _bytes: Vec<u8>,
            _headers: StdHashMap<String, String>,
            _meta: ChunkRequestMeta,
        ) -> Result<ChunkUploadResponse, UploadError> {
            Ok(ChunkUploadResponse { status: 200, body: None })
        }
    }

    #[derive(Default)]
    struct InMemoryStore {
        chunks: PLMutex<StdHashMap<(FileId, u64), ChunkRecord>>,
        metadata: PLMutex<StdHashMap<FileId, FileMetadata>>,
    }

    #[async_trait]
    impl BlockStore for InMemoryStore {
        async fn init(&self) -> Result<(), UploadError> {
            Ok(())
        }
        async fn save_chunk(&self, record: ChunkRecord) -> Result<(), UploadError> {
            self.chunks.lock().insert(record.key(), record);
            Ok(())
        }
        async fn get_chunk(&self, file_id: &FileId, index: u64) -> Result<Option<ChunkRecord>, UploadError> {
            Ok(self.chunks.lock().get(&(file_id.clone(), index)).cloned())
        }
        async fn has_chunk(&self, file_id: &FileId, index: u64) -> Result<bool, UploadError> {
            Ok(self.chunks.lock().contains_key(&(file_id.clone(), index)))
        }
        async fn delete_chunk(&self, file_id: &FileId, index: u64) -> Result<(), UploadError> {
            self.chunks.lock().remove(&(file_id.clone(), index));
            Ok(())
        }
        async fn delete_file_chunks(&self, file_id: &FileId) -> Result<(), UploadError> {
            self.chunks.lock().retain(|(f, _), _| f != file_id);
            Ok(())
        }
        async fn get_chunk_list(&self, file_id: &FileId) -> Result<Vec<u64>, UploadError> {
            let mut indices: Vec<u64> = self.chunks.lock().keys().filter(|(f, _)| f == file_id).map(|(_, i)| *i).collect();
            indices.sort_unstable();
            Ok(indices)
        }
        async fn save_file_metadata(&self, metadata: FileMetadata) -> Result<(), UploadError> {
            self.metadata.lock().insert(metadata.file_id.clone(), metadata);
            Ok(())
        }
        async fn get_file_metadata(&self, file_id: &FileId) -> Result<Option<FileMetadata>, UploadError> {
            Ok(self.metadata.lock().get(file_id).cloned())
        }
        async fn delete_file_metadata(&self, file_id: &FileId) -> Result<(), UploadError> {
            self.metadata.lock().remove(file_id);
            Ok(())
        }
        async fn stats(&self) -> Result<StorageStats, UploadError> {
            Ok(StorageStats::new(chrono::Utc::now()))
        }
        async fn cleanup(&self, _expiration: Option<chrono::Duration>) -> Result<(), UploadError> {
            Ok(())
        }
        async fn close(&self) -> Result<(), UploadError> {
            Ok(())
        }
    }

    struct AlwaysGoodProbe;

    #[async_trait]
    impl NetworkProbe for AlwaysGoodProbe {
        async fn quality(&self) -> NetworkQuality {
            NetworkQuality::Good
        }
        fn on_change(&self, _callback: Box<dyn Fn(NetworkQuality) + Send + Sync>) {}
    }

    fn core(adapter: Arc<dyn Adapter>, block_store: Arc<dyn BlockStore>, chunk_size: ChunkSize) -> UploaderCore {
        let pipeline = Arc::new(Pipeline::new(Default::default()));
        let scheduler = Arc::new(ChunkScheduler::new(
            Arc::clone(&adapter),
            Arc::clone(&block_store),
            Arc::clone(&pipeline),
            Arc::new(RetryEngine::new(Default::default(), StrategySelector::new(SelectorConfig::default()))),
            Arc::new(AlwaysGoodProbe),
            EventBus::new(),
            ChunkSchedulerConfig::default(),
        ));
        let fingerprint = FingerprintService::new(adapter, FingerprintConfig::default());
        UploaderCore::new(block_store, pipeline, scheduler, fingerprint, EventBus::new(), UploaderCoreConfig { chunk_size, ..Default::default() })
    }

    #[tokio::test]
    async fn uploads_a_small_file_end_to_end() {
        let bytes = vec![9u8; 150];
        let adapter: Arc<dyn Adapter> = Arc::new(MockAdapter { bytes });
        let block_store: Arc<dyn BlockStore> = Arc::new(InMemoryStore::default());
        let chunk_size = ChunkSize::new(100).unwrap();
        let core = core(adapter, Arc::clone(&block_store), chunk_size);
        let file = FileHandle::new("a.bin", 150);
        let token = CancellationToken::new();
        let result = core.upload(&file, UploadOptions::new("https://example/upload"), &token).await.unwrap();
        assert_eq!(result.responses.len(), 2);
    }

    #[tokio::test]
    async fn resuming_with_a_different_chunk_size_is_a_configuration_error() {
        let bytes = vec![1u8; 150];
        let adapter: Arc<dyn Adapter> = Arc::new(MockAdapter { bytes });
        let block_store: Arc<dyn BlockStore> = Arc::new(InMemoryStore::default());
        let file = FileHandle::new("a.bin", 150);
        let token = CancellationToken::new();

        let first = core(Arc::clone(&adapter), Arc::clone(&block_store), ChunkSize::new(100).unwrap());
        first.upload(&file, UploadOptions::new("https://example/upload"), &token).await.unwrap();

        let second = core(adapter, block_store, ChunkSize::new(65_536).unwrap());
        let result = second.upload(&file, UploadOptions::new("https://example/upload"), &token).await;
        assert!(matches!(result, Err(UploadError::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn cancelling_after_dispatch_begins_emits_a_distinct_cancelled_event() {
        struct CancellingAdapter {
            bytes: Vec<u8>,
            token: CancellationToken,
        }

        #[async_trait]
        impl Adapter for CancellingAdapter {
            async fn read_chunk(&self, _source: &FileHandle, start: u64, size: u64) -> Result<Vec<u8>, UploadError> {
                Ok(self.bytes[start as usize..(start + size) as usize].to_vec())
            }

            async fn upload_chunk(
                &self,
                _url: &str,
                _bytes: Vec<u8>,
                _headers: StdHashMap<String, String>,
                _meta: ChunkRequestMeta,
            ) -> Result<ChunkUploadResponse, UploadError> {
                // Simulates the caller cancelling once the upload is already
                // in flight, after at least one chunk has reached the adapter.
                self.token.cancel();
                Ok(ChunkUploadResponse { status: 200, body: None })
            }
        }

        let token = CancellationToken::new();
        let bytes = vec![4u8; 300];
        let adapter: Arc<dyn Adapter> = Arc::new(CancellingAdapter { bytes, token: token.clone() });
        let block_store: Arc<dyn BlockStore> = Arc::new(InMemoryStore::default());
        let pipeline = Arc::new(Pipeline::new(Default::default()));
        let event_bus = EventBus::new();
        let mut events = event_bus.subscribe();
        let scheduler = Arc::new(ChunkScheduler::new(
            Arc::clone(&adapter),
            Arc::clone(&block_store),
            Arc::clone(&pipeline),
            Arc::new(RetryEngine::new(Default::default(), StrategySelector::new(SelectorConfig::default()))),
            Arc::new(AlwaysGoodProbe),
            event_bus.clone(),
            ChunkSchedulerConfig { concurrency: 1, ..Default::default() },
        ));
        let fingerprint = FingerprintService::new(Arc::clone(&adapter), FingerprintConfig::default());
        let core = UploaderCore::new(
            block_store,
            pipeline,
            scheduler,
            fingerprint,
            event_bus.clone(),
            UploaderCoreConfig { chunk_size: ChunkSize::new(100).unwrap(), ..Default::default() },
        );

        let file = FileHandle::new("a.bin", 300);
        let result = core.upload(&file, UploadOptions::new("https://example/upload"), &token).await;
        assert!(matches!(result, Err(UploadError::Cancel(_))));

        let mut saw_cancelled = false;
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, UploadEvent::FileUploadError { .. }), "cancellation must not also publish a generic error event");
            if matches!(event, UploadEvent::FileUploadCancelled { .. }) {
                saw_cancelled = true;
            }
        }
        assert!(saw_cancelled, "expected a FileUploadCancelled event");
    }

    #[tokio::test]
    async fn cleanup_option_deletes_persisted_chunks_after_completion() {
        let bytes = vec![2u8; 100];
        let adapter: Arc<dyn Adapter> = Arc::new(MockAdapter { bytes });
        let block_store: Arc<dyn BlockStore> = Arc::new(InMemoryStore::default());
        let chunk_size = ChunkSize::new(100).unwrap();
        let core = core(adapter, Arc::clone(&block_store), chunk_size);
        let file = FileHandle::new("a.bin", 100);
        let token = CancellationToken::new();
        let mut options = UploadOptions::new("https://example/upload");
        options.cleanup_chunks_on_complete = true;
        let result = core.upload(&file, options, &token).await.unwrap();
        assert!(!block_store.has_chunk(&result.file_id, 0).await.unwrap());
    }
}
