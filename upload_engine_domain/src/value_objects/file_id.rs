// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # File Identifier Value Object
//!
//! `FileId` is the stable identifier a resumed upload uses to find its
//! persisted chunks and metadata again. It is derived from `(name, size,
//! last_modified)` plus a content fingerprint sampled from the file itself,
//! so that re-selecting the same file on the same device after a crash
//! yields the same id without re-hashing the whole file.
//!
//! Sampling the actual bytes (head/middle/tail 1 MiB windows via the
//! adapter's `read_chunk`) is an I/O-bound concern and lives in the
//! application layer's fingerprint service; this module only provides the
//! pure, deterministic combination of already-sampled bytes into an id.

use crate::UploadError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Size of each of the three sampling windows (head/middle/tail).
pub const SAMPLE_WINDOW_SIZE: usize = 1024 * 1024;

/// Stable identifier for a file being uploaded, derived from metadata plus
/// a sampled content fingerprint.
///
/// # Invariant
/// The same bytes + name + timestamps yield the same `FileId` across
/// restarts on the same device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(String);

impl FileId {
    /// Builds a `FileId` from file metadata and an already-sampled content
    /// digest (see `sample_digest` / `fallback_digest` below).
    pub fn from_parts(name: &str, size: u64, last_modified: Option<i64>, content_digest: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(size.to_le_bytes());
        hasher.update(last_modified.unwrap_or(0).to_le_bytes());
        hasher.update(content_digest.as_bytes());
        let digest = hasher.finalize();
        FileId(hex::encode(digest))
    }

    /// Computes a SHA-256 hex digest over concatenated sample windows. Used
    /// when a cryptographic hasher is available (always, in this crate:
    /// `sha2` has no platform gating here, but adapters embedding this
    /// engine in constrained environments may prefer `fallback_digest`).
    pub fn sample_digest(samples: &[&[u8]]) -> String {
        let mut hasher = Sha256::new();
        for sample in samples {
            hasher.update(sample);
        }
        hex::encode(hasher.finalize())
    }

    /// Non-cryptographic 96-bit mix (FNV-1a extended to 96 bits via three
    /// independent offset basis values), used as a fallback fingerprint
    /// when no SHA-256 implementation is available to the host
    /// environment.
    pub fn fallback_digest(samples: &[&[u8]]) -> String {
        const OFFSET_BASES: [u64; 3] = [0xcbf29ce484222325, 0x9e3779b97f4a7c15, 0x2545f4914f6cdd1d];
        const PRIME: u64 = 0x100000001b3;

        let mut lanes = OFFSET_BASES;
        for sample in samples {
            for &byte in *sample {
                for lane in lanes.iter_mut() {
                    *lane ^= byte as u64;
                    *lane = lane.wrapping_mul(PRIME);
                }
            }
        }
        format!("{:016x}{:016x}{:08x}", lanes[0], lanes[1], (lanes[2] & 0xffff_ffff))
    }

    /// Parses a previously-serialized `FileId` back from its string form
    /// (used when restoring queue/metadata snapshots).
    pub fn parse(raw: &str) -> Result<Self, UploadError> {
        if raw.is_empty() {
            return Err(UploadError::validation("FileId cannot be empty"));
        }
        Ok(FileId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_yield_same_id() {
        let digest = FileId::sample_digest(&[b"head", b"middle", b"tail"]);
        let a = FileId::from_parts("movie.mp4", 123456, Some(42), &digest);
        let b = FileId::from_parts("movie.mp4", 123456, Some(42), &digest);
        assert_eq!(a, b);
    }

    #[test]
    fn different_names_yield_different_ids() {
        let digest = FileId::sample_digest(&[b"same-bytes"]);
        let a = FileId::from_parts("a.bin", 10, None, &digest);
        let b = FileId::from_parts("b.bin", 10, None, &digest);
        assert_ne!(a, b);
    }

    #[test]
    fn fallback_digest_is_deterministic_and_order_sensitive() {
        let d1 = FileId::fallback_digest(&[b"head", b"tail"]);
        let d2 = FileId::fallback_digest(&[b"head", b"tail"]);
        let d3 = FileId::fallback_digest(&[b"tail", b"head"]);
        assert_eq!(d1, d2);
        assert_ne!(d1, d3);
    }

    #[test]
    fn parse_rejects_empty_string() {
        assert!(FileId::parse("").is_err());
    }
}
