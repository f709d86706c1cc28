// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # File Metadata Entity
//!
//! Persisted record of one upload's progress, identified by `FileId`. Owned
//! exclusively by the Block Store; the Uploader Core
//! reads and updates it through the store's `saveFileMetadata` /
//! `getFileMetadata` contract rather than mutating a shared copy directly.

use crate::services::datetime_serde;
use crate::value_objects::{ChunkSize, FileId};
use crate::UploadError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileMetadata {
    pub file_id: FileId,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub file_hash: Option<String>,
    pub chunk_size: ChunkSize,
    pub total_chunks: u64,
    uploaded_chunks: BTreeSet<u64>,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_serde")]
    pub updated_at: DateTime<Utc>,
    pub custom: Option<serde_json::Value>,
}

impl FileMetadata {
    pub fn new(
        file_id: FileId,
        file_name: String,
        file_size: u64,
        file_type: String,
        chunk_size: ChunkSize,
        total_chunks: u64,
        now: DateTime<Utc>,
    ) -> Result<Self, UploadError> {
        if (chunk_size.bytes() as u64).saturating_mul(total_chunks) < file_size {
            return Err(UploadError::validation(format!(
                "chunk_size {} x total_chunks {} cannot cover file_size {}",
                chunk_size.bytes(),
                total_chunks,
                file_size
            )));
        }
        Ok(FileMetadata {
            file_id,
            file_name,
            file_size,
            file_type,
            file_hash: None,
            chunk_size,
            total_chunks,
            uploaded_chunks: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            custom: None,
        })
    }

    pub fn uploaded_chunks(&self) -> &BTreeSet<u64> {
        &self.uploaded_chunks
    }

    pub fn is_complete(&self) -> bool {
        self.uploaded_chunks.len() as u64 == self.total_chunks
    }

    /// Marks `index` uploaded. Persisted state only ever grows; there is
    /// deliberately no corresponding `unmark`.
    pub fn mark_uploaded(&mut self, index: u64, now: DateTime<Utc>) -> Result<(), UploadError> {
        if index >= self.total_chunks {
            return Err(UploadError::validation(format!(
                "chunk index {} out of range for {} total chunks",
                index, self.total_chunks
            )));
        }
        self.uploaded_chunks.insert(index);
        self.updated_at = now;
        Ok(())
    }

    pub fn with_file_hash(mut self, hash: String) -> Self {
        self.file_hash = Some(hash);
        self
    }

    pub fn with_custom(mut self, custom: serde_json::Value) -> Self {
        self.custom = Some(custom);
        self
    }
}
