// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! Immutable value objects: validated, self-contained data with no identity
//! of their own. Every type here constructs through a fallible or infallible
//! associated function and exposes `with_*` methods that return a new
//! instance rather than mutating in place.

mod backoff_strategy;
mod chunk_descriptor;
mod chunk_size;
mod chunk_state;
mod error_kind;
mod file_chunk;
mod file_handle;
mod file_id;
mod network_quality;
mod queue_priority;

pub use backoff_strategy::BackoffStrategy;
pub use chunk_descriptor::ChunkDescriptor;
pub use chunk_size::ChunkSize;
pub use chunk_state::ChunkState;
pub use error_kind::{ErrorGroup, ErrorKind};
pub use file_chunk::FileChunk;
pub use file_handle::FileHandle;
pub use file_id::{FileId, SAMPLE_WINDOW_SIZE};
pub use network_quality::NetworkQuality;
pub use queue_priority::{QueueItemStatus, QueuePriority, SortMode};
