// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Adapter Port
//!
//! The per-environment collaborator the core consumes for reading source
//! bytes and performing the actual HTTP upload. Required methods must be
//! implemented by every adapter;
//! optional methods have default no-op/`None` implementations so a minimal
//! adapter can still satisfy the trait.

use crate::value_objects::{FileHandle, NetworkQuality};
use crate::UploadError;
use async_trait::async_trait;
use std::collections::HashMap;

/// The response an adapter returns for one chunk upload request.
#[derive(Debug, Clone)]
pub struct ChunkUploadResponse {
    pub status: u16,
    pub body: Option<serde_json::Value>,
}

/// `(fileId, chunkIndex, totalChunks, chunkSize, fileSize)` placed in every
/// chunk request; adapters choose headers vs. form fields.
#[derive(Debug, Clone)]
pub struct ChunkRequestMeta {
    pub file_id: String,
    pub chunk_index: u64,
    pub total_chunks: u64,
    pub chunk_size: u64,
    pub file_size: u64,
}

#[async_trait]
pub trait Adapter: Send + Sync {
    async fn read_chunk(&self, source: &FileHandle, start: u64, size: u64) -> Result<Vec<u8>, UploadError>;

    async fn upload_chunk(
        &self,
        url: &str,
        bytes: Vec<u8>,
        headers: HashMap<String, String>,
        meta: ChunkRequestMeta,
    ) -> Result<ChunkUploadResponse, UploadError>;

    async fn get_file_info(&self, _source: &FileHandle) -> Result<Option<serde_json::Value>, UploadError> {
        Ok(None)
    }

    fn supports_feature(&self, _feature: &str) -> bool {
        false
    }

    async fn calculate_file_hash(&self, _source: &FileHandle) -> Result<Option<String>, UploadError> {
        Ok(None)
    }

    async fn get_network_quality(&self) -> Option<NetworkQuality> {
        None
    }

    async fn set_network_quality(&self, _quality: NetworkQuality) {}

    async fn dispose(&self) {}
}
