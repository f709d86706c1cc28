// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Upload Engine
//!
//! The application and infrastructure layers of the chunked upload engine
//! (see `upload-engine-domain` for the pure core). This crate wires the
//! domain's ports to concrete I/O:
//!
//! - [`application::services::uploader_core`]: the single-file upload
//!   entry point: validate, fingerprint, chunk, schedule, and complete.
//! - [`application::services::queue_manager`]: a multi-file priority
//!   queue driving many uploads through a shared concurrency budget.
//! - [`application::services::chunk_scheduler`]: bounded-concurrency
//!   worker pool for one file's chunks, with resume support.
//! - [`application::services::retry_engine`] and
//!   [`application::services::strategy_selector`]: smart retry: classify,
//!   select a backoff strategy, wait, retry.
//! - [`application::services::hook_registry`] and
//!   [`application::services::pipeline`]: the three-stage plugin
//!   pipeline (`pre-process-file`, `per-chunk-process`, `post-process-file`).
//! - [`application::services::validation`]: built-in file validation,
//!   installed as a pipeline hook.
//! - [`infrastructure::adapters`]: the reference `HttpAdapter` and
//!   `SamplingNetworkProbe`.
//! - [`infrastructure::repositories::SqliteBlockStore`]: transactional
//!   chunk/metadata persistence with resume support.
//! - [`infrastructure::config`], [`infrastructure::logging`],
//!   [`infrastructure::metrics`]: the ambient stack: layered
//!   configuration, structured logging, and a Prometheus registry.

pub mod application;
pub mod infrastructure;

// Tests are organized as:
// - Unit tests: #[cfg(test)] modules within each source file
// - Integration tests: separate files in tests/ directory

pub use upload_engine_domain::value_objects::{BackoffStrategy, ChunkSize, ErrorKind, FileChunk, FileId, NetworkQuality};
pub use upload_engine_domain::{UploadError, UploadEvent};
