// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Size Value Object
//!
//! Type-safe, validated byte count used to slice a source file into upload
//! chunks. Bounded so a misconfigured `chunkSize` ('auto' resolved or
//! explicit) can't produce degenerate chunking (zero-size chunks) or
//! runaway memory usage (a single multi-gigabyte "chunk").

use crate::UploadError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkSize(usize);

impl ChunkSize {
    /// Smallest allowed chunk: 64 KiB.
    pub const MIN_SIZE: usize = 64 * 1024;
    /// Largest allowed chunk: 512 MiB.
    pub const MAX_SIZE: usize = 512 * 1024 * 1024;
    /// Default chunk size used when the caller passes `'auto'` and no
    /// network/device profile is available to adapt from: 1 MiB.
    pub const DEFAULT_SIZE: usize = 1024 * 1024;

    pub fn new(bytes: usize) -> Result<Self, UploadError> {
        if bytes < Self::MIN_SIZE {
            return Err(UploadError::validation(format!(
                "chunk size {} is below the minimum of {} bytes",
                bytes,
                Self::MIN_SIZE
            )));
        }
        if bytes > Self::MAX_SIZE {
            return Err(UploadError::validation(format!(
                "chunk size {} exceeds the maximum of {} bytes",
                bytes,
                Self::MAX_SIZE
            )));
        }
        Ok(ChunkSize(bytes))
    }

    /// Constructs a `ChunkSize` without enforcing the minimum bound, used
    /// only for the final (possibly short) chunk in a file and for the
    /// zero-length placeholder produced by `FileChunk::without_data`.
    pub(crate) fn new_unchecked(bytes: usize) -> Self {
        ChunkSize(bytes.min(Self::MAX_SIZE))
    }

    pub fn from_kb(kb: usize) -> Result<Self, UploadError> {
        Self::new(kb.saturating_mul(1024))
    }

    pub fn from_mb(mb: usize) -> Result<Self, UploadError> {
        Self::new(mb.saturating_mul(1024 * 1024))
    }

    pub fn bytes(&self) -> usize {
        self.0
    }

    pub fn megabytes(&self) -> f64 {
        (self.0 as f64) / (1024.0 * 1024.0)
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        ChunkSize(Self::DEFAULT_SIZE)
    }
}
