// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Descriptor Value Object
//!
//! An immutable record describing one byte range of a file, derived once
//! per upload from `chunkSize` and never mutated afterwards. Descriptors
//! are produced lazily by the Chunk Scheduler; this module only defines the
//! shape and the pure derivation math.

use crate::value_objects::FileId;
use serde::{Deserialize, Serialize};

/// Immutable description of one chunk's position within a file.
///
/// # Invariants
/// - `start < end <= total file size`.
/// - `size == end - start`.
/// - The last descriptor for a file may have `size` smaller than the
///   nominal chunk size; empty trailing chunks are never produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub file_id: FileId,
    pub index: u64,
    pub start: u64,
    pub end: u64,
    pub size: u64,
    pub total: u64,
}

impl ChunkDescriptor {
    pub fn new(file_id: FileId, index: u64, start: u64, end: u64, total: u64) -> Self {
        debug_assert!(end >= start, "chunk end must not precede its start");
        ChunkDescriptor {
            file_id,
            index,
            start,
            end,
            size: end - start,
            total,
        }
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.total
    }

    /// Derives the full set of chunk descriptors for a file of the given
    /// size, split into chunks of `chunk_size` bytes. `ceil(file_size /
    /// chunk_size)` chunks are produced; the final chunk may be smaller.
    /// Trailing empty chunks (when `file_size` is an exact multiple of
    /// `chunk_size`) are never emitted as a separate zero-size descriptor.
    pub fn plan(file_id: &FileId, file_size: u64, chunk_size: u64) -> Vec<ChunkDescriptor> {
        if file_size == 0 {
            return Vec::new();
        }
        let total = file_size.div_ceil(chunk_size);
        let mut descriptors = Vec::with_capacity(total as usize);
        let mut start = 0u64;
        for index in 0..total {
            let end = (start + chunk_size).min(file_size);
            descriptors.push(ChunkDescriptor::new(file_id.clone(), index, start, end, total));
            start = end;
        }
        descriptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid() -> FileId {
        FileId::from_parts("f", 1, None, "digest")
    }

    #[test]
    fn even_split_produces_equal_sized_chunks() {
        let descriptors = ChunkDescriptor::plan(&fid(), 5_242_880, 1_048_576);
        assert_eq!(descriptors.len(), 5);
        for d in &descriptors {
            assert_eq!(d.size, 1_048_576);
        }
        assert_eq!(descriptors.last().unwrap().end, 5_242_880);
    }

    #[test]
    fn uneven_tail_shrinks_last_chunk() {
        let descriptors = ChunkDescriptor::plan(&fid(), 5_000_000, 1_048_576);
        assert_eq!(descriptors.len(), 5);
        assert_eq!(descriptors.last().unwrap().size, 5_000_000 - 4 * 1_048_576);
    }

    #[test]
    fn total_bytes_always_equal_file_size() {
        for (file_size, chunk_size) in [(5_242_880u64, 1_048_576u64), (5_000_000, 1_048_576), (1, 100), (100, 100)] {
            let descriptors = ChunkDescriptor::plan(&fid(), file_size, chunk_size);
            let sum: u64 = descriptors.iter().map(|d| d.size).sum();
            assert_eq!(sum, file_size);
            if let Some(last) = descriptors.last() {
                assert_eq!(last.end, file_size);
            }
        }
    }

    #[test]
    fn empty_file_produces_no_descriptors() {
        assert!(ChunkDescriptor::plan(&fid(), 0, 1_048_576).is_empty());
    }
}
