// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! Aggregate byte/chunk counters maintained by the Block Store's singleton
//! `stats` row. `total_bytes` is clamped at zero so
//! concurrent delete/decrement races can never drive it negative.

use crate::services::datetime_serde;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageStats {
    pub total_bytes: u64,
    pub chunk_count: u64,
    #[serde(with = "datetime_serde")]
    pub updated_at: DateTime<Utc>,
}

impl StorageStats {
    pub fn new(now: DateTime<Utc>) -> Self {
        StorageStats {
            total_bytes: 0,
            chunk_count: 0,
            updated_at: now,
        }
    }

    pub fn record_added(&mut self, size: u64, now: DateTime<Utc>) {
        self.total_bytes += size;
        self.chunk_count += 1;
        self.updated_at = now;
    }

    pub fn record_removed(&mut self, size: u64, now: DateTime<Utc>) {
        self.total_bytes = self.total_bytes.saturating_sub(size);
        self.chunk_count = self.chunk_count.saturating_sub(1);
        self.updated_at = now;
    }

    pub fn would_exceed_quota(&self, additional_bytes: u64, quota: u64) -> bool {
        self.total_bytes.saturating_add(additional_bytes) > quota
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removing_more_than_recorded_clamps_at_zero() {
        let mut stats = StorageStats::new(Utc::now());
        stats.record_added(10, Utc::now());
        stats.record_removed(100, Utc::now());
        assert_eq!(stats.total_bytes, 0);
        assert_eq!(stats.chunk_count, 0);
    }

    #[test]
    fn quota_check_is_exclusive_of_boundary() {
        let mut stats = StorageStats::new(Utc::now());
        stats.record_added(90, Utc::now());
        assert!(!stats.would_exceed_quota(10, 100));
        assert!(stats.would_exceed_quota(11, 100));
    }
}
