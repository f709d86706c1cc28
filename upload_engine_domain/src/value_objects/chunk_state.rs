// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk State
//!
//! The lifecycle of a single chunk's upload attempt, as tracked by the
//! Uploader Core's in-memory chunk-state map. Persisted
//! completion is tracked separately by the Block Store's `uploaded_chunks`
//! set; this enum only models the transient in-flight state machine.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    InFlight,
    Succeeded,
    Failed,
    Retrying,
}

impl ChunkState {
    /// Whether `self -> next` is a legal transition:
    /// `pending -> in-flight -> {succeeded, retrying, failed}`;
    /// `retrying -> in-flight`; `succeeded`/`failed` are terminal for the
    /// attempt (a fresh retry re-enters at `in-flight` via `retrying`).
    pub fn can_transition_to(self, next: ChunkState) -> bool {
        use ChunkState::*;
        matches!(
            (self, next),
            (Pending, InFlight)
                | (InFlight, Succeeded)
                | (InFlight, Retrying)
                | (InFlight, Failed)
                | (Retrying, InFlight)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ChunkState::Succeeded | ChunkState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_only_advance_to_in_flight() {
        assert!(ChunkState::Pending.can_transition_to(ChunkState::InFlight));
        assert!(!ChunkState::Pending.can_transition_to(ChunkState::Succeeded));
    }

    #[test]
    fn retrying_returns_to_in_flight() {
        assert!(ChunkState::Retrying.can_transition_to(ChunkState::InFlight));
        assert!(!ChunkState::Retrying.can_transition_to(ChunkState::Succeeded));
    }

    #[test]
    fn succeeded_and_failed_are_terminal() {
        assert!(ChunkState::Succeeded.is_terminal());
        assert!(ChunkState::Failed.is_terminal());
        assert!(!ChunkState::InFlight.is_terminal());
    }
}
