// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! Aggregate roots: the one type per consistency boundary that owns and
//! validates state transitions across a cluster of entities/value objects.

mod upload_session;

pub use upload_session::UploadSession;
