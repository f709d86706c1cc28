// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! One recorded retry attempt outcome, fed into the Strategy Selector's
//! history-based success-rate lookup and swept on a rolling TTL by the
//! Retry Engine.

use crate::services::datetime_serde;
use crate::value_objects::{BackoffStrategy, ErrorKind, FileId, NetworkQuality};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryHistoryEntry {
    pub file_id: FileId,
    pub chunk_index: u64,
    pub attempt: u32,
    pub error_kind: ErrorKind,
    pub strategy: BackoffStrategy,
    pub delay_ms: u64,
    #[serde(with = "datetime_serde")]
    pub timestamp: DateTime<Utc>,
    pub network_quality: NetworkQuality,
    pub success: Option<bool>,
}

impl RetryHistoryEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_id: FileId,
        chunk_index: u64,
        attempt: u32,
        error_kind: ErrorKind,
        strategy: BackoffStrategy,
        delay_ms: u64,
        timestamp: DateTime<Utc>,
        network_quality: NetworkQuality,
    ) -> Self {
        RetryHistoryEntry {
            file_id,
            chunk_index,
            attempt,
            error_kind,
            strategy,
            delay_ms,
            timestamp,
            network_quality,
            success: None,
        }
    }

    pub fn with_outcome(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>, retention: chrono::Duration) -> bool {
        now.signed_duration_since(self.timestamp) > retention
    }
}
