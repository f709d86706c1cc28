// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! A single hierarchical error type for the upload engine domain, following
//! the same shape as the error classifier's `ErrorKind` taxonomy: every
//! variant here is either a canonical error kind an adapter can raise, or a
//! domain-internal failure (chunking, validation, persistence).
//!
//! `UploadError` is deliberately flat (no nested error types) so the error
//! classifier in `services::error_classifier` can pattern-match on it
//! directly instead of string-sniffing, while still falling back to message
//! matching for opaque adapter errors.

use thiserror::Error;

/// Domain-specific errors for the upload engine.
///
/// Each variant corresponds to one of the canonical `kind`s enumerated by
/// the error classifier. Adapter implementations that cannot produce a
/// typed error should raise `UploadError::Adapter(message)`, which the
/// classifier falls back to pattern-matching on the message text.
#[derive(Error, Debug, Clone)]
pub enum UploadError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection reset: {0}")]
    ConnectionReset(String),

    #[error("dns resolution failed: {0}")]
    Dns(String),

    #[error("server unreachable: {0}")]
    ServerUnreachable(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("rate limited: {0}")]
    RateLimit(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("quota exceeded: {0}")]
    Quota(String),

    #[error("file error: {0}")]
    File(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("out of memory: {0}")]
    Memory(String),

    #[error("worker error: {0}")]
    Worker(String),

    #[error("merge failed: {0}")]
    Merge(String),

    #[error("security violation: {0}")]
    Security(String),

    #[error("data corruption detected: {0}")]
    DataCorruption(String),

    #[error("content encoding error: {0}")]
    ContentEncoding(String),

    #[error("data processing error: {0}")]
    DataProcessing(String),

    #[error("operation cancelled: {0}")]
    Cancel(String),

    #[error("invalid chunk: {0}")]
    InvalidChunk(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("block store error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("plugin error: {0}")]
    Plugin(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("adapter error: {0}")]
    Adapter(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl UploadError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn cancel(msg: impl Into<String>) -> Self {
        Self::Cancel(msg.into())
    }

    /// Returns the raw text the classifier should pattern-match on: the
    /// wrapped message for message-carrying variants.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        UploadError::File(err.to_string())
    }
}

impl From<serde_json::Error> for UploadError {
    fn from(err: serde_json::Error) -> Self {
        UploadError::Serialization(err.to_string())
    }
}
