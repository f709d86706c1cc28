// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Upload Events
//!
//! The full event vocabulary emitted through the application layer's event
//! bus. Subscribers must tolerate out-of-order delivery of progress events
//! within a single tick.

use crate::repositories::ChunkUploadResponse;
use crate::value_objects::{BackoffStrategy, ErrorKind, FileHandle, FileId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UploadEvent {
    FileUploadStart {
        file_id: FileId,
        file: FileHandle,
    },
    ChunkUploadStart {
        file_id: FileId,
        index: u64,
    },
    ChunkUploadProgress {
        file_id: FileId,
        index: u64,
        loaded: u64,
        total: u64,
    },
    ChunkUploadSuccess {
        file_id: FileId,
        index: u64,
        #[serde(skip)]
        response: Option<ChunkUploadResponse>,
    },
    ChunkUploadError {
        file_id: FileId,
        index: u64,
        attempt: u32,
        error: String,
    },
    SmartRetry {
        file_id: FileId,
        index: u64,
        attempt: u32,
        kind: ErrorKind,
        strategy: BackoffStrategy,
        delay_ms: u64,
    },
    FileUploadProgress {
        file_id: FileId,
        percent: u8,
        loaded: u64,
        total: u64,
        speed_bytes_per_sec: f64,
        eta_seconds: Option<f64>,
    },
    FileUploadComplete {
        file_id: FileId,
        #[serde(skip)]
        response: Option<ChunkUploadResponse>,
    },
    FileUploadError {
        file_id: FileId,
        error: String,
    },
    /// The distinct terminal event for a cancelled upload. Suppresses
    /// further retries and any other terminal event for the same file;
    /// emitted instead of `FileUploadError` when the propagated failure is
    /// `UploadError::Cancel`.
    FileUploadCancelled {
        file_id: FileId,
        reason: String,
    },
    QueueChange {
        queue_len: usize,
        active: usize,
    },
}
