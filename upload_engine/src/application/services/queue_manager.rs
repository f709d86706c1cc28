// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Queue Manager
//!
//! Drives many files through a shared `UploaderCore` under one concurrency
//! budget. Items are held in a single `Vec` behind a
//! `tokio::sync::Mutex`; a background dispatcher task wakes on a `Notify`
//! whenever the queue changes and starts as many `Pending` items as
//! `parallel_uploads` allows, tracking each active upload's
//! `CancellationToken` in `in_flight` so `pause`/`remove` can soft-cancel it
//! without losing already-persisted chunks.

use crate::application::services::event_bus::EventBus;
use crate::application::services::uploader_core::{UploadOptions, UploaderCore};
use dashmap::DashMap;
use parking_lot::Mutex as PLMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as TokioMutex, Notify};
use tokio_util::sync::CancellationToken;
use ulid::Ulid;
use upload_engine_domain::entities::QueueItem;
use upload_engine_domain::repositories::Adapter;
use upload_engine_domain::value_objects::{FileHandle, QueueItemStatus, QueuePriority, SortMode};
use upload_engine_domain::{UploadError, UploadEvent};

#[derive(Debug, Clone)]
pub struct QueueManagerConfig {
    pub max_queue_size: usize,
    pub sort_mode: SortMode,
    pub parallel_uploads: usize,
    pub auto_start: bool,
    pub auto_clean_completed: bool,
    pub upload_url: String,
    /// `persistQueue`: snapshot the queue to `persist_key` on every change,
    /// throttled to once per `throttle_time`.
    pub persist_queue: bool,
    /// `persistKey`: filesystem path the snapshot is written to/read from.
    pub persist_key: String,
    pub throttle_time: Duration,
}

impl Default for QueueManagerConfig {
    fn default() -> Self {
        QueueManagerConfig {
            max_queue_size: 1000,
            sort_mode: SortMode::Priority,
            parallel_uploads: 3,
            auto_start: true,
            auto_clean_completed: false,
            upload_url: String::new(),
            persist_queue: false,
            persist_key: "upload_queue.json".to_string(),
            throttle_time: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub uploading: usize,
    pub paused: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

pub struct QueueManager {
    items: TokioMutex<Vec<QueueItem>>,
    config: QueueManagerConfig,
    paused: AtomicBool,
    uploader: Arc<UploaderCore>,
    adapter: Arc<dyn Adapter>,
    event_bus: EventBus,
    in_flight: DashMap<Ulid, CancellationToken>,
    wake: Notify,
    last_persisted: PLMutex<Option<Instant>>,
}

impl QueueManager {
    pub fn new(uploader: Arc<UploaderCore>, adapter: Arc<dyn Adapter>, event_bus: EventBus, config: QueueManagerConfig) -> Arc<Self> {
        let paused = AtomicBool::new(!config.auto_start);
        Arc::new(QueueManager {
            items: TokioMutex::new(Vec::new()),
            config,
            paused,
            uploader,
            adapter,
            event_bus,
            in_flight: DashMap::new(),
            wake: Notify::new(),
            last_persisted: PLMutex::new(None),
        })
    }

    /// Loads a previously persisted snapshot from `persist_key` (a no-op if
    /// `persist_queue` is disabled or no snapshot exists yet) via `restore`.
    pub async fn load_persisted(&self) -> Result<(), UploadError> {
        if !self.config.persist_queue {
            return Ok(());
        }
        match tokio::fs::read_to_string(&self.config.persist_key).await {
            Ok(json) => self.restore(&json).await,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadError::Queue(format!("failed to read persisted queue at '{}': {err}", self.config.persist_key))),
        }
    }

    pub async fn add(&self, file: FileHandle, priority: QueuePriority) -> Result<Ulid, UploadError> {
        let mut items = self.items.lock().await;
        if items.len() >= self.config.max_queue_size {
            return Err(UploadError::Queue(format!("queue is full (max {})", self.config.max_queue_size)));
        }
        let item = QueueItem::new(Ulid::new(), file, priority, chrono::Utc::now());
        let id = item.id;
        items.push(item);
        self.publish_queue_change(&items);
        drop(items);
        self.wake.notify_one();
        Ok(id)
    }

    /// Cancels the item's in-flight upload (if any) and removes it from the
    /// queue entirely. Already-persisted chunks are untouched; the same
    /// file can be re-added and resumed later.
    pub async fn remove(&self, id: Ulid) -> Result<(), UploadError> {
        if let Some((_, token)) = self.in_flight.remove(&id) {
            token.cancel();
        }
        let mut items = self.items.lock().await;
        items.retain(|item| item.id != id);
        self.publish_queue_change(&items);
        Ok(())
    }

    /// Cancels every in-flight upload and empties the queue.
    pub async fn clear(&self) -> Result<(), UploadError> {
        for entry in self.in_flight.iter() {
            entry.value().cancel();
        }
        self.in_flight.clear();
        let mut items = self.items.lock().await;
        items.clear();
        self.publish_queue_change(&items);
        Ok(())
    }

    /// Unpauses dispatch. Does not itself spawn the dispatcher loop; call
    /// `spawn_dispatcher` once per `QueueManager` instance to do that.
    pub fn start(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Soft-cancels every in-flight upload (their persisted chunks survive)
    /// and stops new ones from starting until `resume`/`start`.
    pub async fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        for entry in self.in_flight.iter() {
            entry.value().cancel();
        }
        let mut items = self.items.lock().await;
        for item in items.iter_mut() {
            if item.status == QueueItemStatus::Uploading {
                let _ = item.transition(QueueItemStatus::Paused, chrono::Utc::now());
            }
        }
        self.publish_queue_change(&items);
    }

    pub async fn resume(&self) {
        {
            let mut items = self.items.lock().await;
            for item in items.iter_mut() {
                if item.status == QueueItemStatus::Paused {
                    let _ = item.transition(QueueItemStatus::Pending, chrono::Utc::now());
                }
            }
        }
        self.start();
    }

    pub async fn update_priority(&self, id: Ulid, priority: QueuePriority) -> Result<(), UploadError> {
        let mut items = self.items.lock().await;
        let item = items.iter_mut().find(|item| item.id == id).ok_or_else(|| UploadError::Queue(format!("no such queue item: {id}")))?;
        item.priority = priority;
        Ok(())
    }

    pub async fn get_items(&self) -> Vec<QueueItem> {
        self.items.lock().await.clone()
    }

    pub async fn get_active_items(&self) -> Vec<QueueItem> {
        self.items.lock().await.iter().filter(|item| item.status == QueueItemStatus::Uploading).cloned().collect()
    }

    pub async fn get_stats(&self) -> QueueStats {
        let items = self.items.lock().await;
        let mut stats = QueueStats { total: items.len(), ..Default::default() };
        for item in items.iter() {
            match item.status {
                QueueItemStatus::Pending => stats.pending += 1,
                QueueItemStatus::Uploading => stats.uploading += 1,
                QueueItemStatus::Paused => stats.paused += 1,
                QueueItemStatus::Completed => stats.completed += 1,
                QueueItemStatus::Failed => stats.failed += 1,
                QueueItemStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Serializes the queue to JSON for persistence across restarts. File
    /// handles are carried as-is; `restore` is responsible for verifying
    /// they're still reachable before resuming any upload.
    pub async fn serialize(&self) -> Result<String, UploadError> {
        let items = self.items.lock().await;
        serde_json::to_string(&*items).map_err(UploadError::from)
    }

    /// Restores a previously `serialize`d queue. An item
    /// whose file can no longer be reached through the adapter (moved,
    /// deleted, or otherwise inaccessible) is restored in the `Failed`
    /// state with an explanatory error rather than silently dropped or left
    /// `Pending` forever.
    pub async fn restore(&self, json: &str) -> Result<(), UploadError> {
        let mut restored: Vec<QueueItem> = serde_json::from_str(json)?;
        for item in restored.iter_mut() {
            if matches!(item.status, QueueItemStatus::Uploading) {
                // No dispatcher was running to own this upload across the
                // restart; treat it as having been soft-cancelled.
                item.status = QueueItemStatus::Paused;
            }
            match self.adapter.get_file_info(&item.file).await {
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => {
                    item.status = QueueItemStatus::Failed;
                    item.error = Some(format!("file '{}' is no longer reachable", item.file.name));
                }
            }
        }
        let mut items = self.items.lock().await;
        *items = restored;
        self.publish_queue_change(&items);
        Ok(())
    }

    /// Spawns the background dispatch loop. Must be called exactly once on
    /// an `Arc<QueueManager>`; the loop runs until every clone of the `Arc`
    /// is dropped.
    pub fn spawn_dispatcher(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.dispatch_loop().await })
    }

    async fn dispatch_loop(self: Arc<Self>) {
        loop {
            if self.paused.load(Ordering::SeqCst) {
                self.wake.notified().await;
                continue;
            }
            if self.in_flight.len() >= self.config.parallel_uploads.max(1) {
                self.wake.notified().await;
                continue;
            }
            let next = self.take_next_pending().await;
            match next {
                Some(item) => self.spawn_upload(item),
                None => self.wake.notified().await,
            }
        }
    }

    async fn take_next_pending(&self) -> Option<QueueItem> {
        let mut items = self.items.lock().await;
        sort_items(&mut items, self.config.sort_mode);
        let index = items.iter().position(|item| item.status == QueueItemStatus::Pending)?;
        let now = chrono::Utc::now();
        items[index].transition(QueueItemStatus::Uploading, now).ok()?;
        Some(items[index].clone())
    }

    fn spawn_upload(self: &Arc<Self>, item: QueueItem) {
        let manager = Arc::clone(self);
        let token = CancellationToken::new();
        manager.in_flight.insert(item.id, token.clone());

        tokio::spawn(async move {
            let options = UploadOptions::new(manager.config.upload_url.clone());
            let result = manager.uploader.upload(&item.file, options, &token).await;
            manager.in_flight.remove(&item.id);

            let mut items = manager.items.lock().await;
            if let Some(stored) = items.iter_mut().find(|i| i.id == item.id) {
                let now = chrono::Utc::now();
                match result {
                    Ok(_) => {
                        let _ = stored.transition(QueueItemStatus::Completed, now);
                    }
                    Err(error) if matches!(error, UploadError::Cancel(_)) => {
                        let _ = stored.transition(QueueItemStatus::Paused, now);
                    }
                    Err(error) => {
                        stored.record_failure(error.to_string());
                        let _ = stored.transition(QueueItemStatus::Failed, now);
                    }
                }
            }
            if manager.config.auto_clean_completed {
                items.retain(|i| i.status != QueueItemStatus::Completed);
            }
            manager.publish_queue_change(&items);
            drop(items);
            manager.wake.notify_one();
        });
    }

    fn publish_queue_change(&self, items: &[QueueItem]) {
        let active = items.iter().filter(|item| item.status == QueueItemStatus::Uploading).count();
        self.event_bus.publish(UploadEvent::QueueChange { queue_len: items.len(), active });
        self.maybe_persist(items);
    }

    /// Fires a debounced, fire-and-forget snapshot write when `persist_queue`
    /// is enabled; `throttle_time` bounds how often the queue is actually
    /// written regardless of how often it changes.
    fn maybe_persist(&self, items: &[QueueItem]) {
        if !self.config.persist_queue {
            return;
        }
        let due = {
            let mut last = self.last_persisted.lock();
            let now = Instant::now();
            let due = last.is_none_or(|t| now.duration_since(t) >= self.config.throttle_time);
            if due {
                *last = Some(now);
            }
            due
        };
        if !due {
            return;
        }
        let Ok(json) = serde_json::to_string(items) else { return };
        let path = self.config.persist_key.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::fs::write(&path, json).await {
                tracing::warn!(error = %err, path, "failed to persist queue snapshot");
            }
        });
    }
}

/// Orders `items` in place according to `mode`. `Fifo`
/// leaves insertion order untouched; `Lifo` reverses it; the others sort by
/// the named key, stable so ties keep their relative insertion order.
pub fn sort_items(items: &mut [QueueItem], mode: SortMode) {
    match mode {
        SortMode::Priority => items.sort_by(|a, b| b.priority.cmp(&a.priority)),
        SortMode::SizeAsc => items.sort_by_key(|item| item.file.size),
        SortMode::SizeDesc => items.sort_by_key(|item| std::cmp::Reverse(item.file.size)),
        SortMode::Fifo => {}
        SortMode::Lifo => items.reverse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::chunk_scheduler::{ChunkScheduler, ChunkSchedulerConfig};
    use crate::application::services::fingerprint::{FingerprintConfig, FingerprintService};
    use crate::application::services::pipeline::Pipeline;
    use crate::application::services::retry_engine::RetryEngine;
    use crate::application::services::strategy_selector::{SelectorConfig, StrategySelector};
    use crate::application::services::uploader_core::UploaderCoreConfig;
    use async_trait::async_trait;
    use parking_lot::Mutex as PLMutex;
    use std::collections::HashMap;
    use upload_engine_domain::entities::{ChunkRecord, FileMetadata, StorageStats};
    use upload_engine_domain::repositories::{BlockStore, ChunkRequestMeta, ChunkUploadResponse, NetworkProbe};
    use upload_engine_domain::value_objects::{ChunkSize, FileId, NetworkQuality};

    struct MockAdapter {
        bytes: PLMutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl Adapter for MockAdapter {
        async fn read_chunk(&self, source: &FileHandle, start: u64, size: u64) -> Result<Vec<u8>, UploadError> {
            let bytes = self.bytes.lock();
            let data = bytes.get(&source.name).cloned().unwrap_or_default();
            Ok(data[start as usize..(start + size) as usize].to_vec())
        }
        async fn upload_chunk(&self, _url: &str, _bytes: Vec<u8>, _headers: HashMap<String, String>, _meta: ChunkRequestMeta) -> Result<ChunkUploadResponse, UploadError> {
            Ok(ChunkUploadResponse { status: 200, body: None })
        }
        async fn get_file_info(&self, source: &FileHandle) -> Result<Option<serde_json::Value>, UploadError> {
            if self.bytes.lock().contains_key(&source.name) {
                Ok(Some(serde_json::json!({"size": source.size})))
            } else {
                Ok(None)
            }
        }
    }

    #[derive(Default)]
    struct InMemoryStore {
        chunks: PLMutex<HashMap<(FileId, u64), ChunkRecord>>,
        metadata: PLMutex<HashMap<FileId, FileMetadata>>,
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

    fn manager(max_queue_size: usize, parallel_uploads: usize, files: &[(&str, &[u8])]) -> Arc<QueueManager> {
        let mut bytes = HashMap::new();
        for (name, data) in files {
            bytes.insert(name.to_string(), data.to_vec());
        }
        let adapter: Arc<dyn Adapter> = Arc::new(MockAdapter { bytes: PLMutex::new(bytes) });
        let block_store: Arc<dyn BlockStore> = Arc::new(InMemoryStore::default());
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
        let uploader = Arc::new(UploaderCore::new(
            block_store,
            pipeline,
            scheduler,
            fingerprint,
            EventBus::new(),
            UploaderCoreConfig { chunk_size: ChunkSize::new(100).unwrap(), ..Default::default() },
        ));
        QueueManager::new(
            uploader,
            adapter,
            EventBus::new(),
            QueueManagerConfig { max_queue_size, parallel_uploads, upload_url: "https://example/upload".to_string(), ..Default::default() },
        )
    }

    #[tokio::test]
    async fn add_rejects_once_the_queue_is_full() {
        let manager = manager(1, 1, &[("a.bin", &[1u8; 10]), ("b.bin", &[2u8; 10])]);
        manager.add(FileHandle::new("a.bin", 10), QueuePriority::Normal).await.unwrap();
        let result = manager.add(FileHandle::new("b.bin", 10), QueuePriority::Normal).await;
        assert!(matches!(result, Err(UploadError::Queue(_))));
    }

    #[tokio::test]
    async fn stats_reflect_current_item_statuses() {
        let manager = manager(10, 1, &[("a.bin", &[1u8; 10])]);
        manager.add(FileHandle::new("a.bin", 10), QueuePriority::Normal).await.unwrap();
        let stats = manager.get_stats().await;
        assert_eq!(stats.total, 1);
        assert_eq!(stats.pending, 1);
    }

    #[tokio::test]
    async fn dispatcher_uploads_a_queued_file_to_completion() {
        let manager = manager(10, 1, &[("a.bin", &[7u8; 150])]);
        manager.add(FileHandle::new("a.bin", 150), QueuePriority::Normal).await.unwrap();
        manager.spawn_dispatcher();
        manager.start();

        for _ in 0..50 {
            if manager.get_stats().await.completed == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(manager.get_stats().await.completed, 1);
    }

    #[test]
    fn priority_sort_places_critical_before_low() {
        let mut items = vec![
            QueueItem::new(Ulid::new(), FileHandle::new("low.bin", 1), QueuePriority::Low, chrono::Utc::now()),
            QueueItem::new(Ulid::new(), FileHandle::new("crit.bin", 1), QueuePriority::Critical, chrono::Utc::now()),
        ];
        sort_items(&mut items, SortMode::Priority);
        assert_eq!(items[0].file.name, "crit.bin");
    }

    #[test]
    fn size_desc_sort_orders_largest_first() {
        let mut items = vec![
            QueueItem::new(Ulid::new(), FileHandle::new("small.bin", 10), QueuePriority::Normal, chrono::Utc::now()),
            QueueItem::new(Ulid::new(), FileHandle::new("big.bin", 1000), QueuePriority::Normal, chrono::Utc::now()),
        ];
        sort_items(&mut items, SortMode::SizeDesc);
        assert_eq!(items[0].file.name, "big.bin");
    }

    #[tokio::test]
    async fn restore_marks_unreachable_files_as_failed() {
        let manager = manager(10, 1, &[]);
        let items = vec![QueueItem::new(Ulid::new(), FileHandle::new("missing.bin", 10), QueuePriority::Normal, chrono::Utc::now())];
        let json = serde_json::to_string(&items).unwrap();
        manager.restore(&json).await.unwrap();
        let restored = manager.get_items().await;
        assert_eq!(restored[0].status, QueueItemStatus::Failed);
    }
}
