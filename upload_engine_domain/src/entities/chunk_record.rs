// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! Persisted chunk bytes, keyed by `(fileId, index)`.

use crate::services::datetime_serde;
use crate::value_objects::FileId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkRecord {
    pub file_id: FileId,
    pub index: u64,
    pub bytes: Vec<u8>,
    pub size: u64,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_serde")]
    pub updated_at: DateTime<Utc>,
}

impl ChunkRecord {
    pub fn new(file_id: FileId, index: u64, bytes: Vec<u8>, now: DateTime<Utc>) -> Self {
        let size = bytes.len() as u64;
        ChunkRecord {
            file_id,
            index,
            bytes,
            size,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> (FileId, u64) {
        (self.file_id.clone(), self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_tracks_byte_length() {
        let record = ChunkRecord::new(FileId::from_parts("f", 1, None, "d"), 0, vec![1, 2, 3, 4], Utc::now());
        assert_eq!(record.size, 4);
    }
}
