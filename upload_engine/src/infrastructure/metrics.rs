// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics
//!
//! A `prometheus` registry the bootstrap crate exposes on a `/metrics`
//! endpoint. `EngineMetrics::subscribe` drives every counter and gauge from
//! the same `UploadEvent`s the rest of the engine publishes, rather than
//! scraping service internals after the fact, so a crash mid-upload still
//! leaves accurate counters for whatever completed.

use crate::application::services::event_bus::EventBus;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use upload_engine_domain::value_objects::FileId;
use upload_engine_domain::{UploadError, UploadEvent};

pub struct EngineMetrics {
    pub registry: Registry,
    pub chunks_uploaded_total: IntCounter,
    pub chunks_failed_total: IntCounter,
    pub chunk_retries_total: IntCounter,
    pub active_uploads: IntGauge,
    pub queue_depth: IntGauge,
    pub upload_duration_seconds: Histogram,
}

impl EngineMetrics {
    pub fn new() -> Result<Self, UploadError> {
        let registry = Registry::new();

        let chunks_uploaded_total = IntCounter::with_opts(Opts::new("upload_engine_chunks_uploaded_total", "Chunks successfully uploaded"))
            .map_err(metrics_error)?;
        let chunks_failed_total = IntCounter::with_opts(Opts::new("upload_engine_chunks_failed_total", "Chunks that failed all retries")).map_err(metrics_error)?;
        let chunk_retries_total = IntCounter::with_opts(Opts::new("upload_engine_chunk_retries_total", "Chunk upload attempts that were retried")).map_err(metrics_error)?;
        let active_uploads = IntGauge::with_opts(Opts::new("upload_engine_active_uploads", "Files currently uploading")).map_err(metrics_error)?;
        let queue_depth = IntGauge::with_opts(Opts::new("upload_engine_queue_depth", "Files waiting in the upload queue")).map_err(metrics_error)?;
        let upload_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "upload_engine_upload_duration_seconds",
            "Wall-clock time to upload one file, start to finish",
        ))
        .map_err(metrics_error)?;

        registry.register(Box::new(chunks_uploaded_total.clone())).map_err(metrics_error)?;
        registry.register(Box::new(chunks_failed_total.clone())).map_err(metrics_error)?;
        registry.register(Box::new(chunk_retries_total.clone())).map_err(metrics_error)?;
        registry.register(Box::new(active_uploads.clone())).map_err(metrics_error)?;
        registry.register(Box::new(queue_depth.clone())).map_err(metrics_error)?;
        registry.register(Box::new(upload_duration_seconds.clone())).map_err(metrics_error)?;

        Ok(EngineMetrics {
            registry,
            chunks_uploaded_total,
            chunks_failed_total,
            chunk_retries_total,
            active_uploads,
            queue_depth,
            upload_duration_seconds,
        })
    }

    /// Renders the registry in Prometheus text exposition format, for a
    /// `/metrics` HTTP handler in the bootstrap crate.
    pub fn render(&self) -> Result<String, UploadError> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer).map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| UploadError::internal(format!("metrics output was not valid utf-8: {e}")))
    }

    /// Spawns a task that consumes `event_bus` for the life of the process
    /// and keeps every counter/gauge in sync. A lagged receiver just resumes
    /// from the next event; the per-file start times tracked here only cover
    /// upload duration, so a few dropped progress events never desync a
    /// counter.
    pub fn subscribe(self: &Arc<Self>, event_bus: &EventBus) -> tokio::task::JoinHandle<()> {
        let metrics = Arc::clone(self);
        let mut rx = event_bus.subscribe();
        tokio::spawn(async move {
            let mut started: HashMap<FileId, Instant> = HashMap::new();
            loop {
                match rx.recv().await {
                    Ok(event) => metrics.record(event, &mut started),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn record(&self, event: UploadEvent, started: &mut HashMap<FileId, Instant>) {
        match event {
            UploadEvent::FileUploadStart { file_id, .. } => {
                self.active_uploads.inc();
                started.insert(file_id, Instant::now());
            }
            UploadEvent::FileUploadComplete { file_id, .. } => {
                self.active_uploads.dec();
                if let Some(start) = started.remove(&file_id) {
                    self.upload_duration_seconds.observe(start.elapsed().as_secs_f64());
                }
            }
            UploadEvent::FileUploadError { file_id, .. } => {
                self.active_uploads.dec();
                started.remove(&file_id);
            }
            UploadEvent::FileUploadCancelled { file_id, .. } => {
                self.active_uploads.dec();
                started.remove(&file_id);
            }
            UploadEvent::ChunkUploadSuccess { .. } => self.chunks_uploaded_total.inc(),
            UploadEvent::ChunkUploadError { .. } => self.chunks_failed_total.inc(),
            UploadEvent::SmartRetry { .. } => self.chunk_retries_total.inc(),
            UploadEvent::QueueChange { queue_len, .. } => self.queue_depth.set(queue_len as i64),
            _ => {}
        }
    }
}

fn metrics_error(err: impl std::fmt::Display) -> UploadError {
    UploadError::internal(format!("metrics error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registry_renders_all_registered_metrics() {
        let metrics = EngineMetrics::new().unwrap();
        let text = metrics.render().unwrap();
        assert!(text.contains("upload_engine_chunks_uploaded_total"));
        assert!(text.contains("upload_engine_queue_depth"));
    }

    #[test]
    fn counters_and_gauges_reflect_updates() {
        let metrics = EngineMetrics::new().unwrap();
        metrics.chunks_uploaded_total.inc();
        metrics.active_uploads.set(3);
        let text = metrics.render().unwrap();
        assert!(text.contains("upload_engine_active_uploads 3"));
    }

    #[tokio::test]
    async fn subscribe_tracks_chunk_and_queue_events() {
        let metrics = Arc::new(EngineMetrics::new().unwrap());
        let event_bus = EventBus::new();
        let handle = metrics.subscribe(&event_bus);

        event_bus.publish(UploadEvent::ChunkUploadSuccess {
            file_id: FileId::from_parts("a.bin", 1, None, "d"),
            index: 0,
            response: None,
        });
        event_bus.publish(UploadEvent::QueueChange { queue_len: 5, active: 1 });

        // Give the subscriber task a turn to process both events.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(metrics.chunks_uploaded_total.get(), 1);
        assert_eq!(metrics.queue_depth.get(), 5);
        handle.abort();
    }

    #[tokio::test]
    async fn subscribe_tracks_upload_duration() {
        let metrics = Arc::new(EngineMetrics::new().unwrap());
        let event_bus = EventBus::new();
        let handle = metrics.subscribe(&event_bus);
        let file_id = FileId::from_parts("b.bin", 1, None, "d");

        event_bus.publish(UploadEvent::FileUploadStart {
            file_id: file_id.clone(),
            file: upload_engine_domain::value_objects::FileHandle::new("b.bin", 1),
        });
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        event_bus.publish(UploadEvent::FileUploadComplete { file_id, response: None });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(metrics.active_uploads.get(), 0);
        assert_eq!(metrics.upload_duration_seconds.get_sample_count(), 1);
        handle.abort();
    }
}
