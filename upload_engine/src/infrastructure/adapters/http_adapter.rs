// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # HTTP Adapter
//!
//! The reference `Adapter` implementation: reads chunk bytes
//! off the local filesystem and uploads them as `multipart/form-data` over
//! `reqwest`, mapping both transport failures and non-2xx responses onto
//! `UploadError` so the Retry Engine's classifier never has to parse an
//! HTTP status code itself.

use super::file_adapter;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use upload_engine_domain::repositories::{Adapter, ChunkRequestMeta, ChunkUploadResponse};
use upload_engine_domain::value_objects::{FileHandle, NetworkQuality};
use upload_engine_domain::UploadError;

#[derive(Debug, Clone)]
pub struct HttpAdapterConfig {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Extra HTTP status codes to treat as retryable (classified as
    /// `UploadError::Server`) regardless of `status_error`'s default table —
    /// e.g. a `404` that the caller's backend only returns transiently
    /// during eventual-consistency windows.
    pub retryable_status_codes: Vec<u16>,
}

impl Default for HttpAdapterConfig {
    fn default() -> Self {
        HttpAdapterConfig {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            retryable_status_codes: Vec::new(),
        }
    }
}

pub struct HttpAdapter {
    client: reqwest::Client,
    retryable_status_codes: Vec<u16>,
    network_quality: RwLock<Option<NetworkQuality>>,
}

impl HttpAdapter {
    pub fn new(config: HttpAdapterConfig) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| UploadError::internal(format!("failed to build http client: {e}")))?;
        Ok(HttpAdapter {
            client,
            retryable_status_codes: config.retryable_status_codes,
            network_quality: RwLock::new(None),
        })
    }
}

#[async_trait]
impl Adapter for HttpAdapter {
    async fn read_chunk(&self, source: &FileHandle, start: u64, size: u64) -> Result<Vec<u8>, UploadError> {
        file_adapter::read_chunk(&source.name, start, size).await
    }

    async fn upload_chunk(&self, url: &str, bytes: Vec<u8>, headers: HashMap<String, String>, meta: ChunkRequestMeta) -> Result<ChunkUploadResponse, UploadError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name("chunk");
        let form = reqwest::multipart::Form::new().part("chunk", part);

        let mut request = self
            .client
            .post(url)
            .header("X-File-Id", meta.file_id.as_str())
            .header("X-Chunk-Index", meta.chunk_index.to_string())
            .header("X-Total-Chunks", meta.total_chunks.to_string())
            .header("X-Chunk-Size", meta.chunk_size.to_string())
            .header("X-File-Size", meta.file_size.to_string())
            .multipart(form);
        for (key, value) in &headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body, &self.retryable_status_codes));
        }
        let body = response.json::<serde_json::Value>().await.ok();
        Ok(ChunkUploadResponse { status, body })
    }

    async fn get_file_info(&self, source: &FileHandle) -> Result<Option<serde_json::Value>, UploadError> {
        file_adapter::file_info(&source.name).await
    }

    fn supports_feature(&self, feature: &str) -> bool {
        feature == "resume" || feature == "file-hash"
    }

    async fn calculate_file_hash(&self, source: &FileHandle) -> Result<Option<String>, UploadError> {
        file_adapter::sha256_hex(&source.name).await.map(Some)
    }

    async fn get_network_quality(&self) -> Option<NetworkQuality> {
        *self.network_quality.read().await
    }

    async fn set_network_quality(&self, quality: NetworkQuality) {
        *self.network_quality.write().await = Some(quality);
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> UploadError {
    if err.is_timeout() {
        UploadError::Timeout(err.to_string())
    } else if err.is_connect() {
        UploadError::Network(err.to_string())
    } else {
        UploadError::Adapter(err.to_string())
    }
}

/// Maps a non-2xx status to an `UploadError` variant the classifier already
/// knows how to score. `retryable` is consulted first so `retry.retryableStatusCodes`
/// can force a status that would otherwise fall into a non-retried bucket
/// (e.g. `404`, or even `401`/`403`) to be classified as the recoverable
/// `Server` kind instead.
fn status_error(status: u16, body: String, retryable: &[u16]) -> UploadError {
    if retryable.contains(&status) {
        return UploadError::Server(format!("{status}: {body}"));
    }
    match status {
        429 => UploadError::RateLimit(body),
        401 | 403 => UploadError::Auth(body),
        500..=599 => UploadError::Server(format!("{status}: {body}")),
        _ => UploadError::Api(format!("{status}: {body}")),
    }
}
