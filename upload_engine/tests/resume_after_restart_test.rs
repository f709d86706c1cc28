// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! Resume-after-crash integration test: a second
//! `UploaderCore` pointed at the same on-disk `SqliteBlockStore` as a first,
//! interrupted run must only re-upload chunks the first run never
//! confirmed, and the chunk count already on disk must survive the
//! restart untouched.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use upload_engine::application::services::{
    ChunkScheduler, ChunkSchedulerConfig, EventBus, FingerprintConfig, FingerprintService, Pipeline, RetryEngine, SelectorConfig,
    StrategySelector, UploadOptions, UploaderCore, UploaderCoreConfig,
};
use upload_engine::infrastructure::repositories::{BlockStoreConfig, SqliteBlockStore};
use upload_engine_domain::repositories::{Adapter, ChunkRequestMeta, ChunkUploadResponse, NetworkProbe};
use upload_engine_domain::value_objects::{ChunkSize, FileHandle, NetworkQuality};
use upload_engine_domain::UploadError;

/// Uploads every chunk it is asked to, recording how many upload calls it
/// actually received so the test can assert only the unconfirmed chunks
/// were resent.
struct CountingAdapter {
    bytes: Vec<u8>,
    upload_calls: AtomicUsize,
}

#[async_trait]
impl Adapter for CountingAdapter {
    async fn read_chunk(&self, _source: &FileHandle, start: u64, size: u64) -> Result<Vec<u8>, UploadError> {
        Ok(self.bytes[start as usize..(start + size) as usize].to_vec())
    }

    async fn upload_chunk(
        &self,
        _url: &str,
        _bytes: Vec<u8>,
        _headers: HashMap<String, String>,
        _meta: ChunkRequestMeta,
    ) -> Result<ChunkUploadResponse, UploadError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ChunkUploadResponse { status: 200, body: None })
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

fn uploader(adapter: Arc<dyn Adapter>, block_store: Arc<SqliteBlockStore>, chunk_size: ChunkSize) -> UploaderCore {
    let block_store: Arc<dyn upload_engine_domain::repositories::BlockStore> = block_store;
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
    let fingerprint = FingerprintService::new(Arc::clone(&adapter), FingerprintConfig::default());
    UploaderCore::new(block_store, pipeline, scheduler, fingerprint, EventBus::new(), UploaderCoreConfig { chunk_size, ..Default::default() })
}

/// 10 MiB file, 2 MiB chunks (5 total). The first run's adapter fails
/// indices 3 and 4 outright (simulating a process crash mid-upload); the
/// first-run chunks 0-2 remain confirmed in the block store. A second,
/// independent `UploaderCore` pointed at the same database must resume and
/// upload only the two missing indices.
#[tokio::test]
async fn second_run_only_uploads_chunks_the_first_run_never_confirmed() {
    let file_size = 10 * 1024 * 1024u64;
    let chunk_size = ChunkSize::new(2 * 1024 * 1024).unwrap();
    let bytes = vec![5u8; file_size as usize];
    let file = FileHandle::new("movie.mp4", file_size);

    let db_file = tempfile::NamedTempFile::new().unwrap();
    let db_url = format!("sqlite://{}?mode=rwc", db_file.path().display());

    struct CrashingAdapter {
        inner: CountingAdapter,
    }

    #[async_trait]
    impl Adapter for CrashingAdapter {
        async fn read_chunk(&self, source: &FileHandle, start: u64, size: u64) -> Result<Vec<u8>, UploadError> {
            self.inner.read_chunk(source, start, size).await
        }
        async fn upload_chunk(
            &self,
            url: &str,
            bytes: Vec<u8>,
            headers: HashMap<String, String>,
            meta: ChunkRequestMeta,
        ) -> Result<ChunkUploadResponse, UploadError> {
            if meta.chunk_index >= 3 {
                return Err(UploadError::Network("simulated crash".into()));
            }
            self.inner.upload_chunk(url, bytes, headers, meta).await
        }
    }

    let first_adapter: Arc<dyn Adapter> = Arc::new(CrashingAdapter {
        inner: CountingAdapter { bytes: bytes.clone(), upload_calls: AtomicUsize::new(0) },
    });
    let first_store = Arc::new(SqliteBlockStore::connect(&db_url, BlockStoreConfig { quota_bytes: u64::MAX, ..Default::default() }).await.unwrap());
    let first_run = uploader(Arc::clone(&first_adapter), Arc::clone(&first_store), chunk_size);
    let token = CancellationToken::new();
    let first_result = first_run.upload(&file, UploadOptions::new("https://example/upload"), &token).await;
    assert!(first_result.is_err(), "simulated crash must surface as a failed upload");

    drop(first_run);
    drop(first_store);

    let second_adapter = Arc::new(CountingAdapter { bytes, upload_calls: AtomicUsize::new(0) });
    let second_store = Arc::new(SqliteBlockStore::connect(&db_url, BlockStoreConfig { quota_bytes: u64::MAX, ..Default::default() }).await.unwrap());
    let second_run = uploader(Arc::clone(&second_adapter) as Arc<dyn Adapter>, Arc::clone(&second_store), chunk_size);
    let token = CancellationToken::new();
    let result = second_run.upload(&file, UploadOptions::new("https://example/upload"), &token).await.unwrap();

    assert_eq!(result.responses.len(), 2, "only the two unconfirmed chunks should have been scheduled");
    assert_eq!(second_adapter.upload_calls.load(Ordering::SeqCst), 2, "the adapter should only see the two missing indices uploaded");

    // Chunk bytes for every index are cached in the block store as soon as
    // they are read (even the first run's indices 3/4, whose upload failed)
    // so a retry or a later resume never re-reads the source; only the
    // upload confirmation (`FileMetadata::uploaded_chunks`) distinguishes
    // "cached" from "confirmed".
    let chunk_list = second_store.get_chunk_list(&result.file_id).await.unwrap();
    assert_eq!(chunk_list, vec![0, 1, 2, 3, 4], "all five chunks' bytes remain cached across the restart");

    let metadata = second_store.get_file_metadata(&result.file_id).await.unwrap().unwrap();
    assert_eq!(metadata.uploaded_chunks().len(), 5, "all five chunks must be marked uploaded after the resumed run completes");
}
