// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Fingerprint Service
//!
//! Samples head/middle/tail 1 MiB windows of a file through the `Adapter`
//! port and combines them into a stable `FileId`. The
//! sampling itself is the only I/O-bound piece of `FileId` derivation; the
//! pure hash-combination math lives on the domain value object.

use async_trait::async_trait;
use std::sync::Arc;
use upload_engine_domain::repositories::Adapter;
use upload_engine_domain::value_objects::{FileHandle, FileId, SAMPLE_WINDOW_SIZE};
use upload_engine_domain::UploadError;

#[derive(Debug, Clone, Copy)]
pub struct FingerprintConfig {
    /// Uses the cryptographic SHA-256 combiner when true; falls back to the
    /// non-cryptographic 96-bit mix for constrained host environments.
    pub use_cryptographic_hash: bool,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        FingerprintConfig { use_cryptographic_hash: true }
    }
}

pub struct FingerprintService {
    adapter: Arc<dyn Adapter>,
    config: FingerprintConfig,
}

impl FingerprintService {
    pub fn new(adapter: Arc<dyn Adapter>, config: FingerprintConfig) -> Self {
        FingerprintService { adapter, config }
    }

    /// Computes a stable `FileId` for `file`, sampling up to three
    /// non-overlapping-where-possible windows. Files smaller than three
    /// sample windows simply read whatever ranges exist; an empty file
    /// hashes zero sample bytes, which is still stable and unique per
    /// `(name, size, last_modified)`.
    pub async fn compute(&self, file: &FileHandle) -> Result<FileId, UploadError> {
        let windows = sample_windows(file.size);
        let mut samples = Vec::with_capacity(windows.len());
        for (start, len) in windows {
            if len == 0 {
                continue;
            }
            samples.push(self.adapter.read_chunk(file, start, len).await?);
        }
        let sample_refs: Vec<&[u8]> = samples.iter().map(|s| s.as_slice()).collect();
        let digest = if self.config.use_cryptographic_hash {
            FileId::sample_digest(&sample_refs)
        } else {
            FileId::fallback_digest(&sample_refs)
        };
        Ok(FileId::from_parts(&file.name, file.size, file.last_modified, &digest))
    }
}

/// Returns up to three `(start, len)` byte ranges covering the head,
/// middle, and tail of a file of `size` bytes, each capped at
/// `SAMPLE_WINDOW_SIZE`. Windows may overlap for small files; duplicated
/// bytes only make the fingerprint more stable, never less correct.
fn sample_windows(size: u64) -> Vec<(u64, u64)> {
    if size == 0 {
        return Vec::new();
    }
    let window = SAMPLE_WINDOW_SIZE as u64;
    let head = (0u64, window.min(size));
    let tail_start = size.saturating_sub(window);
    let tail = (tail_start, size - tail_start);
    let middle_start = (size / 2).saturating_sub(window / 2).min(size);
    let middle_len = window.min(size - middle_start);
    let middle = (middle_start, middle_len);
    vec![head, middle, tail]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use upload_engine_domain::repositories::{ChunkRequestMeta, ChunkUploadResponse};
    use upload_engine_domain::value_objects::NetworkQuality;

    struct FakeAdapter {
        bytes: Vec<u8>,
    }

    #[async_trait]
    impl Adapter for FakeAdapter {
        async fn read_chunk(&self, _source: &FileHandle, start: u64, size: u64) -> Result<Vec<u8>, UploadError> {
            let start = start as usize;
            let end = (start + size as usize).min(self.bytes.len());
            Ok(self.bytes[start..end].to_vec())
        }

        async fn upload_chunk(
            &self,
            _url: &str,
            _bytes: Vec<u8>,
            _headers: HashMap<String, String>,
            _meta: ChunkRequestMeta,
        ) -> Result<ChunkUploadResponse, UploadError> {
            unimplemented!("not exercised by fingerprint tests")
        }

        async fn get_network_quality(&self) -> Option<NetworkQuality> {
            None
        }
    }

    #[tokio::test]
    async fn same_bytes_and_metadata_yield_same_fingerprint() {
        let bytes = vec![42u8; 3_000_000];
        let file = FileHandle::new("movie.mp4", bytes.len() as u64);
        let adapter: Arc<dyn Adapter> = Arc::new(FakeAdapter { bytes });
        let service = FingerprintService::new(Arc::clone(&adapter), FingerprintConfig::default());
        let a = service.compute(&file).await.unwrap();
        let b = service.compute(&file).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn small_file_still_produces_a_fingerprint() {
        let bytes = vec![1, 2, 3, 4, 5];
        let file = FileHandle::new("tiny.bin", bytes.len() as u64);
        let adapter: Arc<dyn Adapter> = Arc::new(FakeAdapter { bytes });
        let service = FingerprintService::new(adapter, FingerprintConfig::default());
        let id = service.compute(&file).await.unwrap();
        assert!(!id.as_str().is_empty());
    }

    #[tokio::test]
    async fn empty_file_produces_a_stable_fingerprint() {
        let file = FileHandle::new("empty.bin", 0);
        let adapter: Arc<dyn Adapter> = Arc::new(FakeAdapter { bytes: vec![] });
        let service = FingerprintService::new(Arc::clone(&adapter), FingerprintConfig::default());
        let a = service.compute(&file).await.unwrap();
        let b = service.compute(&file).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn fallback_digest_is_used_when_configured() {
        let bytes = vec![9u8; 100];
        let file = FileHandle::new("f.bin", bytes.len() as u64);
        let adapter: Arc<dyn Adapter> = Arc::new(FakeAdapter { bytes });
        let service = FingerprintService::new(adapter, FingerprintConfig { use_cryptographic_hash: false });
        let id = service.compute(&file).await.unwrap();
        assert!(!id.as_str().is_empty());
    }

    #[tokio::test]
    async fn different_content_yields_different_fingerprint() {
        let file_a = FileHandle::new("f.bin", 3_000_000);
        let file_b = FileHandle::new("f.bin", 3_000_000);
        let adapter_a: Arc<dyn Adapter> = Arc::new(FakeAdapter { bytes: vec![1u8; 3_000_000] });
        let adapter_b: Arc<dyn Adapter> = Arc::new(FakeAdapter { bytes: vec![2u8; 3_000_000] });
        let a = FingerprintService::new(adapter_a, FingerprintConfig::default()).compute(&file_a).await.unwrap();
        let b = FingerprintService::new(adapter_b, FingerprintConfig::default()).compute(&file_b).await.unwrap();
        assert_ne!(a, b);
    }
}
