// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # File Chunk Value Object
//!
//! `FileChunk` pairs a `ChunkDescriptor` with the bytes read for it. Chunks
//! are read on demand by a scheduler worker (never materialized for a whole
//! file at once), processed through the per-chunk pipeline stage, and
//! handed to the Retry Engine for upload. Like the descriptor it wraps,
//! a `FileChunk` is immutable: "changes" (adding a checksum, transforming
//! the data through a pipeline hook) produce a new instance.

use crate::value_objects::ChunkDescriptor;
use crate::UploadError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileChunk {
    descriptor: ChunkDescriptor,
    data: Vec<u8>,
    checksum: Option<String>,
}

impl FileChunk {
    pub fn new(descriptor: ChunkDescriptor, data: Vec<u8>) -> Result<Self, UploadError> {
        if data.is_empty() {
            return Err(UploadError::InvalidChunk("chunk data cannot be empty".to_string()));
        }
        if data.len() as u64 != descriptor.size {
            return Err(UploadError::InvalidChunk(format!(
                "chunk data length {} does not match descriptor size {}",
                data.len(),
                descriptor.size
            )));
        }
        Ok(FileChunk {
            descriptor,
            data,
            checksum: None,
        })
    }

    pub fn descriptor(&self) -> &ChunkDescriptor {
        &self.descriptor
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    /// Replaces the chunk's bytes, e.g. after a pipeline transform. Clears
    /// any previously computed checksum since it no longer applies.
    pub fn with_data(&self, data: Vec<u8>) -> Result<Self, UploadError> {
        if data.is_empty() {
            return Err(UploadError::InvalidChunk("chunk data cannot be empty".to_string()));
        }
        Ok(FileChunk {
            descriptor: self.descriptor.clone(),
            data,
            checksum: None,
        })
    }

    pub fn with_checksum(&self, checksum: String) -> Self {
        FileChunk {
            descriptor: self.descriptor.clone(),
            data: self.data.clone(),
            checksum: Some(checksum),
        }
    }

    pub fn with_calculated_checksum(&self) -> Self {
        self.with_checksum(self.calculate_checksum())
    }

    pub fn calculate_checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.data);
        hex::encode(hasher.finalize())
    }

    pub fn verify_integrity(&self) -> Result<bool, UploadError> {
        match &self.checksum {
            Some(stored) => Ok(*stored == self.calculate_checksum()),
            None => Err(UploadError::InvalidChunk("no checksum available for verification".to_string())),
        }
    }
}
