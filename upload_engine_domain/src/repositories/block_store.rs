// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Block Store Port
//!
//! Repository interface for the transactional chunk/metadata persistence
//! layer. Infrastructure provides a `sqlx`-backed SQLite
//! implementation; the domain and application layers depend only on this
//! trait.

use crate::entities::{ChunkRecord, FileMetadata, StorageStats};
use crate::value_objects::FileId;
use crate::UploadError;
use async_trait::async_trait;

#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Opens/creates the schema. Must be safe to call more than once.
    async fn init(&self) -> Result<(), UploadError>;

    /// Rejects with `UploadError::Quota` when `stats.total_bytes + bytes.len()`
    /// would exceed the configured quota. Upserts the record and atomically
    /// increments stats on success.
    async fn save_chunk(&self, record: ChunkRecord) -> Result<(), UploadError>;

    async fn get_chunk(&self, file_id: &FileId, index: u64) -> Result<Option<ChunkRecord>, UploadError>;

    async fn has_chunk(&self, file_id: &FileId, index: u64) -> Result<bool, UploadError>;

    /// Decrements stats by the deleted record's size if it existed.
    async fn delete_chunk(&self, file_id: &FileId, index: u64) -> Result<(), UploadError>;

    /// Deletes every chunk for `file_id`, decrementing stats by their sum.
    async fn delete_file_chunks(&self, file_id: &FileId) -> Result<(), UploadError>;

    async fn get_chunk_list(&self, file_id: &FileId) -> Result<Vec<u64>, UploadError>;

    async fn save_file_metadata(&self, metadata: FileMetadata) -> Result<(), UploadError>;

    async fn get_file_metadata(&self, file_id: &FileId) -> Result<Option<FileMetadata>, UploadError>;

    async fn delete_file_metadata(&self, file_id: &FileId) -> Result<(), UploadError>;

    async fn stats(&self) -> Result<StorageStats, UploadError>;

    /// Removes metadata with `updated_at` older than `expiration` (default
    /// implementation-defined TTL when `None`) and its chunks, then removes
    /// orphan chunks whose `file_id` is absent from metadata.
    async fn cleanup(&self, expiration: Option<chrono::Duration>) -> Result<(), UploadError>;

    /// Releases the handle and any periodic cleanup timer owned by the
    /// store.
    async fn close(&self) -> Result<(), UploadError>;
}
