// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Queue Item Entity
//!
//! One file's position in the multi-file upload queue.
//! The Queue Manager is the sole mutator of `status`; everything else here
//! is read freely by the CLI/bootstrap layer for reporting.

use crate::services::datetime_serde;
use crate::value_objects::{FileHandle, QueueItemStatus, QueuePriority};
use crate::UploadError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueItem {
    pub id: ulid::Ulid,
    pub file: FileHandle,
    pub priority: QueuePriority,
    pub status: QueueItemStatus,
    progress: u8,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_serde::option")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(with = "datetime_serde::option")]
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub error: Option<String>,
    pub result: Option<serde_json::Value>,
    pub custom: Option<serde_json::Value>,
}

impl QueueItem {
    pub fn new(id: ulid::Ulid, file: FileHandle, priority: QueuePriority, now: DateTime<Utc>) -> Self {
        QueueItem {
            id,
            file,
            priority,
            status: QueueItemStatus::Pending,
            progress: 0,
            created_at: now,
            started_at: None,
            completed_at: None,
            retry_count: 0,
            error: None,
            result: None,
            custom: None,
        }
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Transitions `status`, validating against `QueueItemStatus`'s state
    /// machine and keeping the `progress == 100 ⇔ status == completed`
    /// invariant in lockstep.
    pub fn transition(&mut self, next: QueueItemStatus, now: DateTime<Utc>) -> Result<(), UploadError> {
        if !self.status.can_transition_to(next) {
            return Err(UploadError::Queue(format!("illegal queue item transition {:?} -> {:?}", self.status, next)));
        }
        match next {
            QueueItemStatus::Uploading if self.started_at.is_none() => self.started_at = Some(now),
            QueueItemStatus::Completed => {
                self.progress = 100;
                self.completed_at = Some(now);
            }
            QueueItemStatus::Failed | QueueItemStatus::Cancelled => self.completed_at = Some(now),
            _ => {}
        }
        self.status = next;
        Ok(())
    }

    pub fn update_progress(&mut self, percent: u8) -> Result<(), UploadError> {
        if percent > 100 {
            return Err(UploadError::validation("progress cannot exceed 100"));
        }
        if percent == 100 && self.status != QueueItemStatus::Completed {
            return Err(UploadError::validation("progress cannot reach 100 before status is completed"));
        }
        self.progress = percent;
        Ok(())
    }

    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.retry_count += 1;
    }

    pub fn with_custom(mut self, custom: serde_json::Value) -> Self {
        self.custom = Some(custom);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> QueueItem {
        QueueItem::new(ulid::Ulid::new(), FileHandle::new("a.bin", 10), QueuePriority::Normal, Utc::now())
    }

    #[test]
    fn completing_sets_progress_to_100() {
        let mut item = item();
        item.transition(QueueItemStatus::Uploading, Utc::now()).unwrap();
        item.transition(QueueItemStatus::Completed, Utc::now()).unwrap();
        assert_eq!(item.progress(), 100);
    }

    #[test]
    fn progress_cannot_reach_100_before_completed() {
        let mut item = item();
        item.transition(QueueItemStatus::Uploading, Utc::now()).unwrap();
        assert!(item.update_progress(100).is_err());
        assert!(item.update_progress(99).is_ok());
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let mut item = item();
        assert!(item.transition(QueueItemStatus::Completed, Utc::now()).is_err());
    }
}
