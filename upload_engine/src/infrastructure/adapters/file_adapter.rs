// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! Local-filesystem primitives shared by [`super::http_adapter::HttpAdapter`]:
//! ranged chunk reads, `stat`-style file info, and a streaming SHA-256 over
//! the whole file. Kept free of any `Adapter` trait ceremony so it can be
//! unit-tested directly against `tempfile` fixtures.

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use upload_engine_domain::UploadError;

pub async fn read_chunk(path: &str, start: u64, size: u64) -> Result<Vec<u8>, UploadError> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(start)).await?;
    let mut buf = vec![0u8; size as usize];
    file.read_exact(&mut buf)
        .await
        .map_err(|e| UploadError::File(format!("short read of {size} bytes at offset {start} in '{path}': {e}")))?;
    Ok(buf)
}

pub async fn file_info(path: &str) -> Result<Option<serde_json::Value>, UploadError> {
    let metadata = tokio::fs::metadata(path).await?;
    Ok(Some(serde_json::json!({
        "size": metadata.len(),
        "isFile": metadata.is_file(),
        "readonly": metadata.permissions().readonly(),
    })))
}

pub async fn sha256_hex(path: &str) -> Result<String, UploadError> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
