// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Block Store
//!
//! `sqlx`-backed implementation of the domain `BlockStore` port. Three
//! logical tables: `chunks(file_id, idx) -> blob`,
//! `metadata(file_id) -> json`, and a single-row `stats` table. Every
//! operation below runs as one transaction. Owns a periodic cleanup sweep
//! task (spawned on `connect`, cancelled on `close`) so stale metadata/chunks
//! are reclaimed without a caller having to remember to invoke `cleanup`.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use upload_engine_domain::entities::{ChunkRecord, FileMetadata, StorageStats};
use upload_engine_domain::repositories::BlockStore;
use upload_engine_domain::value_objects::FileId;
use upload_engine_domain::UploadError;

/// Tunables for a `SqliteBlockStore`: the byte quota enforced by
/// `save_chunk`, and the cadence/retention of its background cleanup sweep.
#[derive(Debug, Clone, Copy)]
pub struct BlockStoreConfig {
    pub quota_bytes: u64,
    pub cleanup_interval: Duration,
    pub cleanup_ttl: Duration,
}

impl Default for BlockStoreConfig {
    fn default() -> Self {
        BlockStoreConfig {
            quota_bytes: 10 * 1024 * 1024 * 1024,
            cleanup_interval: Duration::from_secs(3600),
            cleanup_ttl: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chunks (
    file_id TEXT NOT NULL,
    idx INTEGER NOT NULL,
    bytes BLOB NOT NULL,
    size INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (file_id, idx)
);
CREATE INDEX IF NOT EXISTS idx_chunks_file_id ON chunks (file_id);
CREATE INDEX IF NOT EXISTS idx_chunks_updated_at ON chunks (updated_at);
CREATE TABLE IF NOT EXISTS metadata (
    file_id TEXT PRIMARY KEY NOT NULL,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS stats (
    id INTEGER PRIMARY KEY CHECK (id = 0),
    total_bytes INTEGER NOT NULL,
    chunk_count INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);
";

pub struct SqliteBlockStore {
    pool: SqlitePool,
    quota_bytes: u64,
    cleanup_ttl: chrono::Duration,
    sweep_token: CancellationToken,
    sweep_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl SqliteBlockStore {
    pub async fn connect(database_url: &str, config: BlockStoreConfig) -> Result<Self, UploadError> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| UploadError::storage(format!("failed to connect to block store: {e}")))?;
        let cleanup_ttl = chrono::Duration::from_std(config.cleanup_ttl).unwrap_or_else(|_| chrono::Duration::days(7));
        let store = SqliteBlockStore {
            pool,
            quota_bytes: config.quota_bytes,
            cleanup_ttl,
            sweep_token: CancellationToken::new(),
            sweep_handle: Mutex::new(None),
        };
        store.init().await?;
        store.spawn_cleanup_sweep(config.cleanup_interval);
        Ok(store)
    }

    pub async fn in_memory(config: BlockStoreConfig) -> Result<Self, UploadError> {
        Self::connect(":memory:", config).await
    }

    /// Starts the periodic sweep that calls `cleanup` on `interval` until
    /// `close` cancels `sweep_token`. Errors from an individual sweep are
    /// logged, not propagated — a transient failure must not stop future
    /// sweeps.
    fn spawn_cleanup_sweep(&self, interval: Duration) {
        let pool = self.pool.clone();
        let ttl = self.cleanup_ttl;
        let token = self.sweep_token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = run_cleanup(&pool, ttl).await {
                            tracing::warn!(error = %err, "periodic block store cleanup sweep failed");
                        }
                    }
                }
            }
        });
        *self.sweep_handle.lock() = Some(handle);
    }

    async fn read_stats(&self, executor: impl sqlx::Executor<'_, Database = sqlx::Sqlite>) -> Result<StorageStats, UploadError> {
        let row = sqlx::query("SELECT total_bytes, chunk_count, updated_at FROM stats WHERE id = 0")
            .fetch_optional(executor)
            .await
            .map_err(|e| UploadError::storage(format!("failed to read stats: {e}")))?;
        match row {
            Some(row) => {
                let total_bytes: i64 = row.get("total_bytes");
                let chunk_count: i64 = row.get("chunk_count");
                let updated_at: String = row.get("updated_at");
                Ok(StorageStats {
                    total_bytes: total_bytes.max(0) as u64,
                    chunk_count: chunk_count.max(0) as u64,
                    updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            }
            None => Ok(StorageStats::new(Utc::now())),
        }
    }
}

#[async_trait]
impl BlockStore for SqliteBlockStore {
    async fn init(&self) -> Result<(), UploadError> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| UploadError::storage(format!("failed to initialize schema: {e}")))?;
        }
        sqlx::query("INSERT OR IGNORE INTO stats (id, total_bytes, chunk_count, updated_at) VALUES (0, 0, 0, ?)")
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| UploadError::storage(format!("failed to seed stats row: {e}")))?;
        Ok(())
    }

    async fn save_chunk(&self, record: ChunkRecord) -> Result<(), UploadError> {
        let mut tx = self.pool.begin().await.map_err(|e| UploadError::storage(e.to_string()))?;
        let stats = self.read_stats(&mut *tx).await?;
        if stats.would_exceed_quota(record.size, self.quota_bytes) {
            return Err(UploadError::Quota(format!(
                "saving {} bytes would exceed the {}-byte quota ({} already used)",
                record.size, self.quota_bytes, stats.total_bytes
            )));
        }
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO chunks (file_id, idx, bytes, size, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(file_id, idx) DO UPDATE SET bytes = excluded.bytes, size = excluded.size, updated_at = excluded.updated_at",
        )
        .bind(record.file_id.as_str())
        .bind(record.index as i64)
        .bind(&record.bytes)
        .bind(record.size as i64)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| UploadError::storage(format!("failed to save chunk: {e}")))?;

        sqlx::query(
            "UPDATE stats SET total_bytes = total_bytes + ?, chunk_count = chunk_count + 1, updated_at = ? WHERE id = 0",
        )
        .bind(record.size as i64)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| UploadError::storage(format!("failed to update stats: {e}")))?;

        tx.commit().await.map_err(|e| UploadError::storage(e.to_string()))?;
        Ok(())
    }

    async fn get_chunk(&self, file_id: &FileId, index: u64) -> Result<Option<ChunkRecord>, UploadError> {
        let row = sqlx::query("SELECT bytes, size, created_at, updated_at FROM chunks WHERE file_id = ? AND idx = ?")
            .bind(file_id.as_str())
            .bind(index as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| UploadError::storage(format!("failed to read chunk: {e}")))?;
        let Some(row) = row else { return Ok(None) };
        let bytes: Vec<u8> = row.get("bytes");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");
        Ok(Some(ChunkRecord {
            file_id: file_id.clone(),
            index,
            size: bytes.len() as u64,
            bytes,
            created_at: parse_rfc3339(&created_at),
            updated_at: parse_rfc3339(&updated_at),
        }))
    }

    async fn has_chunk(&self, file_id: &FileId, index: u64) -> Result<bool, UploadError> {
        let row = sqlx::query("SELECT 1 FROM chunks WHERE file_id = ? AND idx = ?")
            .bind(file_id.as_str())
            .bind(index as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| UploadError::storage(format!("failed to check chunk: {e}")))?;
        Ok(row.is_some())
    }

    async fn delete_chunk(&self, file_id: &FileId, index: u64) -> Result<(), UploadError> {
        let mut tx = self.pool.begin().await.map_err(|e| UploadError::storage(e.to_string()))?;
        let row = sqlx::query("SELECT size FROM chunks WHERE file_id = ? AND idx = ?")
            .bind(file_id.as_str())
            .bind(index as i64)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| UploadError::storage(e.to_string()))?;
        if let Some(row) = row {
            let size: i64 = row.get("size");
            sqlx::query("DELETE FROM chunks WHERE file_id = ? AND idx = ?")
                .bind(file_id.as_str())
                .bind(index as i64)
                .execute(&mut *tx)
                .await
                .map_err(|e| UploadError::storage(e.to_string()))?;
            decrement_stats(&mut tx, size).await?;
        }
        tx.commit().await.map_err(|e| UploadError::storage(e.to_string()))?;
        Ok(())
    }

    async fn delete_file_chunks(&self, file_id: &FileId) -> Result<(), UploadError> {
        let mut tx = self.pool.begin().await.map_err(|e| UploadError::storage(e.to_string()))?;
        let total: i64 = sqlx::query("SELECT COALESCE(SUM(size), 0) AS total FROM chunks WHERE file_id = ?")
            .bind(file_id.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| UploadError::storage(e.to_string()))?
            .get("total");
        let removed = sqlx::query("DELETE FROM chunks WHERE file_id = ?")
            .bind(file_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| UploadError::storage(e.to_string()))?
            .rows_affected();
        if removed > 0 {
            decrement_stats_count(&mut tx, total, removed as i64).await?;
        }
        tx.commit().await.map_err(|e| UploadError::storage(e.to_string()))?;
        Ok(())
    }

    async fn get_chunk_list(&self, file_id: &FileId) -> Result<Vec<u64>, UploadError> {
        let rows = sqlx::query("SELECT idx FROM chunks WHERE file_id = ? ORDER BY idx ASC")
            .bind(file_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| UploadError::storage(e.to_string()))?;
        Ok(rows.into_iter().map(|row| row.get::<i64, _>("idx") as u64).collect())
    }

    async fn save_file_metadata(&self, metadata: FileMetadata) -> Result<(), UploadError> {
        let data = serde_json::to_string(&metadata)?;
        sqlx::query(
            "INSERT INTO metadata (file_id, data, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(file_id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        )
        .bind(metadata.file_id.as_str())
        .bind(&data)
        .bind(metadata.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| UploadError::storage(format!("failed to save metadata: {e}")))?;
        Ok(())
    }

    async fn get_file_metadata(&self, file_id: &FileId) -> Result<Option<FileMetadata>, UploadError> {
        let row = sqlx::query("SELECT data FROM metadata WHERE file_id = ?")
            .bind(file_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| UploadError::storage(e.to_string()))?;
        match row {
            Some(row) => {
                let data: String = row.get("data");
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn delete_file_metadata(&self, file_id: &FileId) -> Result<(), UploadError> {
        sqlx::query("DELETE FROM metadata WHERE file_id = ?")
            .bind(file_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| UploadError::storage(e.to_string()))?;
        Ok(())
    }

    async fn stats(&self) -> Result<StorageStats, UploadError> {
        self.read_stats(&self.pool).await
    }

    async fn cleanup(&self, expiration: Option<chrono::Duration>) -> Result<(), UploadError> {
        run_cleanup(&self.pool, expiration.unwrap_or(self.cleanup_ttl)).await
    }

    /// Cancels the background sweep and closes the pool. Awaits the sweep
    /// task rather than merely aborting it so `close` only returns once no
    /// sweep-owned transaction can still be in flight against the pool.
    async fn close(&self) -> Result<(), UploadError> {
        self.sweep_token.cancel();
        let handle = self.sweep_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.pool.close().await;
        Ok(())
    }
}

/// Removes metadata older than `ttl` and its chunks, then removes orphan
/// chunks whose `file_id` has no metadata row. Shared by the on-demand
/// `cleanup` trait method and the periodic background sweep.
async fn run_cleanup(pool: &SqlitePool, ttl: chrono::Duration) -> Result<(), UploadError> {
    let cutoff = (Utc::now() - ttl).to_rfc3339();

    let mut tx = pool.begin().await.map_err(|e| UploadError::storage(e.to_string()))?;
    let stale_ids: Vec<String> = sqlx::query("SELECT file_id FROM metadata WHERE updated_at < ?")
        .bind(&cutoff)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| UploadError::storage(e.to_string()))?
        .into_iter()
        .map(|row| row.get::<String, _>("file_id"))
        .collect();

    for file_id in &stale_ids {
        let total: i64 = sqlx::query("SELECT COALESCE(SUM(size), 0) AS total FROM chunks WHERE file_id = ?")
            .bind(file_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| UploadError::storage(e.to_string()))?
            .get("total");
        let removed = sqlx::query("DELETE FROM chunks WHERE file_id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| UploadError::storage(e.to_string()))?
            .rows_affected();
        if removed > 0 {
            decrement_stats_count(&mut tx, total, removed as i64).await?;
        }
    }
    sqlx::query("DELETE FROM metadata WHERE updated_at < ?")
        .bind(&cutoff)
        .execute(&mut *tx)
        .await
        .map_err(|e| UploadError::storage(e.to_string()))?;

    // orphan sweep: chunks whose file_id no longer has metadata
    let orphans: Vec<String> = sqlx::query("SELECT DISTINCT file_id FROM chunks WHERE file_id NOT IN (SELECT file_id FROM metadata)")
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| UploadError::storage(e.to_string()))?
        .into_iter()
        .map(|row| row.get::<String, _>("file_id"))
        .collect();
    for file_id in &orphans {
        let total: i64 = sqlx::query("SELECT COALESCE(SUM(size), 0) AS total FROM chunks WHERE file_id = ?")
            .bind(file_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| UploadError::storage(e.to_string()))?
            .get("total");
        let removed = sqlx::query("DELETE FROM chunks WHERE file_id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| UploadError::storage(e.to_string()))?
            .rows_affected();
        if removed > 0 {
            decrement_stats_count(&mut tx, total, removed as i64).await?;
        }
    }

    tx.commit().await.map_err(|e| UploadError::storage(e.to_string()))?;
    Ok(())
}

fn parse_rfc3339(raw: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

async fn decrement_stats(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, size: i64) -> Result<(), UploadError> {
    decrement_stats_count(tx, size, 1).await
}

async fn decrement_stats_count(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, total_size: i64, count: i64) -> Result<(), UploadError> {
    sqlx::query(
        "UPDATE stats SET total_bytes = MAX(total_bytes - ?, 0), chunk_count = MAX(chunk_count - ?, 0), updated_at = ? WHERE id = 0",
    )
    .bind(total_size)
    .bind(count)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut **tx)
    .await
    .map_err(|e| UploadError::storage(format!("failed to decrement stats: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use upload_engine_domain::value_objects::ChunkSize;

    async fn store() -> SqliteBlockStore {
        SqliteBlockStore::in_memory(BlockStoreConfig { quota_bytes: 1_000_000, ..Default::default() }).await.unwrap()
    }

    #[tokio::test]
    async fn save_and_fetch_chunk_round_trips() {
        let store = store().await;
        let fid = FileId::from_parts("a.bin", 10, None, "d");
        store.save_chunk(ChunkRecord::new(fid.clone(), 0, vec![1, 2, 3], Utc::now())).await.unwrap();
        let fetched = store.get_chunk(&fid, 0).await.unwrap().unwrap();
        assert_eq!(fetched.bytes, vec![1, 2, 3]);
        assert!(store.has_chunk(&fid, 0).await.unwrap());
        assert!(!store.has_chunk(&fid, 1).await.unwrap());
    }

    #[tokio::test]
    async fn quota_is_enforced() {
        let store = SqliteBlockStore::in_memory(BlockStoreConfig { quota_bytes: 5, ..Default::default() }).await.unwrap();
        let fid = FileId::from_parts("a.bin", 10, None, "d");
        let result = store.save_chunk(ChunkRecord::new(fid, 0, vec![0u8; 10], Utc::now())).await;
        assert!(matches!(result, Err(UploadError::Quota(_))));
    }

    #[tokio::test]
    async fn delete_file_chunks_clears_stats() {
        let store = store().await;
        let fid = FileId::from_parts("a.bin", 10, None, "d");
        store.save_chunk(ChunkRecord::new(fid.clone(), 0, vec![1; 100], Utc::now())).await.unwrap();
        store.save_chunk(ChunkRecord::new(fid.clone(), 1, vec![2; 50], Utc::now())).await.unwrap();
        store.delete_file_chunks(&fid).await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_bytes, 0);
        assert_eq!(stats.chunk_count, 0);
    }

    #[tokio::test]
    async fn metadata_round_trips() {
        let store = store().await;
        let fid = FileId::from_parts("a.bin", 10, None, "d");
        let metadata = FileMetadata::new(fid.clone(), "a.bin".into(), 10, "application/octet-stream".into(), ChunkSize::default(), 1, Utc::now()).unwrap();
        store.save_file_metadata(metadata.clone()).await.unwrap();
        let fetched = store.get_file_metadata(&fid).await.unwrap().unwrap();
        assert_eq!(fetched.file_name, "a.bin");
        store.delete_file_metadata(&fid).await.unwrap();
        assert!(store.get_file_metadata(&fid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn background_sweep_reclaims_expired_metadata_without_an_explicit_cleanup_call() {
        let store = SqliteBlockStore::in_memory(BlockStoreConfig {
            cleanup_interval: Duration::from_millis(20),
            cleanup_ttl: Duration::from_millis(0),
            ..Default::default()
        })
        .await
        .unwrap();
        let fid = FileId::from_parts("a.bin", 10, None, "d");
        let metadata = FileMetadata::new(fid.clone(), "a.bin".into(), 10, "application/octet-stream".into(), ChunkSize::default(), 1, Utc::now()).unwrap();
        store.save_file_metadata(metadata).await.unwrap();
        store.save_chunk(ChunkRecord::new(fid.clone(), 0, vec![1, 2, 3], Utc::now())).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(store.get_file_metadata(&fid).await.unwrap().is_none(), "sweep should have expired the metadata on its own");
        assert!(store.get_chunk_list(&fid).await.unwrap().is_empty(), "sweep should have removed the now-orphaned chunk");
    }

    #[tokio::test]
    async fn close_cancels_the_background_sweep() {
        let store = store().await;
        store.close().await.unwrap();
        assert!(store.sweep_handle.lock().is_none(), "close must take and await the sweep handle");
    }
}
