// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Application Runner
//!
//! Turns one `ValidatedCommand` into calls against a composed `Engine`.
//! Kept separate from `main` so integration tests can drive
//! it directly against an in-memory configuration without spawning a
//! process.

use crate::cli::{QueuePriorityArg, ValidatedCommand};
use crate::composition_root::{self, Engine};
use crate::shutdown::ShutdownCoordinator;
use tokio_util::sync::CancellationToken;
use upload_engine::application::services::uploader_core::UploadOptions;
use upload_engine::infrastructure::config::EngineConfig;
use upload_engine_domain::value_objects::{FileHandle, FileId, QueuePriority};
use upload_engine_domain::UploadError;

impl From<QueuePriorityArg> for QueuePriority {
    fn from(priority: QueuePriorityArg) -> Self {
        match priority {
            QueuePriorityArg::Low => QueuePriority::Low,
            QueuePriorityArg::Normal => QueuePriority::Normal,
            QueuePriorityArg::High => QueuePriority::High,
            QueuePriorityArg::Critical => QueuePriority::Critical,
        }
    }
}

pub async fn run(config_path: Option<&std::path::Path>, command: ValidatedCommand, shutdown: ShutdownCoordinator) -> Result<(), UploadError> {
    let config = EngineConfig::load(config_path)?;
    let engine = composition_root::build(&config).await?;
    execute(&engine, command, shutdown).await
}

async fn execute(engine: &Engine, command: ValidatedCommand, shutdown: ShutdownCoordinator) -> Result<(), UploadError> {
    match command {
        ValidatedCommand::Upload { file, upload_url, chunk_size_mb } => {
            let handle = file_handle(&file)?;
            let mut options = UploadOptions::new(upload_url);
            if chunk_size_mb.is_some() {
                // Per-upload chunk size overrides are not threaded through
                // UploaderCore today; the engine-wide configured size is
                // used instead. Surfaced here so callers see the value was
                // accepted, not silently ignored.
                tracing::debug!(requested_chunk_size_mb = ?chunk_size_mb, "chunk size override is advisory only; using the configured engine chunk size");
            }
            options.cleanup_chunks_on_complete = true;
            let token = CancellationToken::new();
            let shutdown_token = shutdown.token();
            let upload = engine.uploader.upload(&handle, options, &token);
            tokio::pin!(upload);
            let result = tokio::select! {
                result = &mut upload => result?,
                _ = shutdown_token.cancelled() => {
                    tracing::info!("shutdown signal received, cancelling in-flight upload");
                    token.cancel();
                    upload.await?
                }
            };
            println!("{}", serde_json::json!({"fileId": result.file_id.as_str(), "chunksUploaded": result.responses.len()}));
            Ok(())
        }
        ValidatedCommand::QueueAdd { file, priority } => {
            let handle = file_handle(&file)?;
            let id = engine.queue.add(handle, priority.into()).await?;
            println!("{}", serde_json::json!({"queueItemId": id.to_string()}));
            Ok(())
        }
        ValidatedCommand::QueueList => {
            let items = engine.queue.get_items().await;
            println!("{}", serde_json::to_string_pretty(&items)?);
            Ok(())
        }
        ValidatedCommand::QueuePause => {
            engine.queue.pause().await;
            Ok(())
        }
        ValidatedCommand::QueueResume => {
            engine.queue.resume().await;
            Ok(())
        }
        ValidatedCommand::Resume { file_id } => {
            let file_id = FileId::parse(&file_id)?;
            let metadata = engine.block_store.get_file_metadata(&file_id).await?;
            match metadata {
                Some(metadata) => {
                    println!(
                        "{}",
                        serde_json::json!({
                            "fileId": file_id.as_str(),
                            "uploadedChunks": metadata.uploaded_chunks().len(),
                            "totalChunks": metadata.total_chunks,
                            "complete": metadata.is_complete(),
                        })
                    );
                    Ok(())
                }
                None => Err(UploadError::validation(format!("no metadata found for file id '{file_id}'"))),
            }
        }
        ValidatedCommand::Stats => {
            let queue_stats = engine.queue.get_stats().await;
            let storage_stats = engine.block_store.stats().await?;
            println!(
                "{}",
                serde_json::json!({
                    "queue": {
                        "total": queue_stats.total,
                        "pending": queue_stats.pending,
                        "uploading": queue_stats.uploading,
                        "paused": queue_stats.paused,
                        "completed": queue_stats.completed,
                        "failed": queue_stats.failed,
                        "cancelled": queue_stats.cancelled,
                    },
                    "storage": {
                        "totalBytes": storage_stats.total_bytes,
                        "chunkCount": storage_stats.chunk_count,
                    },
                    "metrics": engine.metrics.render()?,
                })
            );
            Ok(())
        }
    }
}

fn file_handle(path: &std::path::Path) -> Result<FileHandle, UploadError> {
    let metadata = std::fs::metadata(path)?;
    Ok(FileHandle::new(path.to_string_lossy().to_string(), metadata.len()))
}
