// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Upload Session Aggregate
//!
//! `UploadSession` is the aggregate root for a single file's upload: it owns
//! the full set of `ChunkDescriptor`s and the in-memory chunk-state map for
//! that file, and is the only place that state
//! transitions for a chunk are validated. Persisted completion lives
//! separately in the Block Store's `uploadedChunks` set; this aggregate
//! tracks the transient in-flight picture the Chunk Scheduler acts on.

use crate::value_objects::{ChunkDescriptor, ChunkState, FileId};
use crate::UploadError;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct UploadSession {
    file_id: FileId,
    descriptors: Vec<ChunkDescriptor>,
    states: HashMap<u64, ChunkState>,
    concurrency: usize,
}

impl UploadSession {
    pub fn new(file_id: FileId, descriptors: Vec<ChunkDescriptor>, concurrency: usize) -> Self {
        let states = descriptors.iter().map(|d| (d.index, ChunkState::Pending)).collect();
        UploadSession {
            file_id,
            descriptors,
            states,
            concurrency,
        }
    }

    /// Restores a session skipping indices already marked uploaded in
    /// persisted metadata, so the Chunk Scheduler's lazy descriptor sequence
    /// only yields work that actually remains.
    pub fn resume(file_id: FileId, descriptors: Vec<ChunkDescriptor>, concurrency: usize, already_uploaded: &std::collections::BTreeSet<u64>) -> Self {
        let states = descriptors
            .iter()
            .map(|d| {
                let state = if already_uploaded.contains(&d.index) {
                    ChunkState::Succeeded
                } else {
                    ChunkState::Pending
                };
                (d.index, state)
            })
            .collect();
        UploadSession {
            file_id,
            descriptors,
            states,
            concurrency,
        }
    }

    pub fn file_id(&self) -> &FileId {
        &self.file_id
    }

    pub fn descriptors(&self) -> &[ChunkDescriptor] {
        &self.descriptors
    }

    pub fn state_of(&self, index: u64) -> Option<ChunkState> {
        self.states.get(&index).copied()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn set_concurrency(&mut self, concurrency: usize) {
        self.concurrency = concurrency;
    }

    /// Enforces at most one in-flight transition per index at a time
    /// by routing every mutation through
    /// `ChunkState::can_transition_to`.
    pub fn transition(&mut self, index: u64, next: ChunkState) -> Result<(), UploadError> {
        let current = self
            .states
            .get(&index)
            .copied()
            .ok_or_else(|| UploadError::internal(format!("unknown chunk index {index} for file {}", self.file_id)))?;
        if !current.can_transition_to(next) {
            return Err(UploadError::internal(format!("illegal chunk transition {current:?} -> {next:?} at index {index}")));
        }
        self.states.insert(index, next);
        Ok(())
    }

    pub fn in_flight_count(&self) -> usize {
        self.states.values().filter(|s| **s == ChunkState::InFlight).count()
    }

    pub fn is_complete(&self) -> bool {
        self.states.values().all(|s| *s == ChunkState::Succeeded)
    }

    pub fn has_failed(&self) -> bool {
        self.states.values().any(|s| *s == ChunkState::Failed)
    }

    /// Next descriptor(s) eligible for dispatch: still `pending`, bounded so
    /// the caller never exceeds `concurrency - in_flight_count()` at once.
    pub fn ready_indices(&self) -> Vec<u64> {
        let budget = self.concurrency.saturating_sub(self.in_flight_count());
        self.descriptors
            .iter()
            .filter(|d| self.states.get(&d.index) == Some(&ChunkState::Pending))
            .take(budget)
            .map(|d| d.index)
            .collect()
    }

    pub fn sent_bytes(&self) -> u64 {
        self.descriptors.iter().filter(|d| self.states.get(&d.index) == Some(&ChunkState::Succeeded)).map(|d| d.size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> UploadSession {
        let fid = FileId::from_parts("f", 5_000_000, None, "d");
        let descriptors = ChunkDescriptor::plan(&fid, 5_000_000, 1_048_576);
        UploadSession::new(fid, descriptors, 2)
    }

    #[test]
    fn ready_indices_respects_concurrency_budget() {
        let mut session = session();
        session.transition(0, ChunkState::InFlight).unwrap();
        session.transition(1, ChunkState::InFlight).unwrap();
        assert!(session.ready_indices().is_empty());
    }

    #[test]
    fn is_complete_requires_all_succeeded() {
        let mut session = session();
        for d in session.descriptors().to_vec() {
            session.transition(d.index, ChunkState::InFlight).unwrap();
            session.transition(d.index, ChunkState::Succeeded).unwrap();
        }
        assert!(session.is_complete());
        assert_eq!(session.sent_bytes(), 5_000_000);
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let mut session = session();
        assert!(session.transition(0, ChunkState::Succeeded).is_err());
    }

    #[test]
    fn resume_marks_persisted_indices_succeeded() {
        let fid = FileId::from_parts("f", 5_000_000, None, "d");
        let descriptors = ChunkDescriptor::plan(&fid, 5_000_000, 1_048_576);
        let mut uploaded = std::collections::BTreeSet::new();
        uploaded.insert(0);
        uploaded.insert(1);
        let session = UploadSession::resume(fid, descriptors, 2, &uploaded);
        assert_eq!(session.state_of(0), Some(ChunkState::Succeeded));
        assert_eq!(session.state_of(2), Some(ChunkState::Pending));
    }
}
