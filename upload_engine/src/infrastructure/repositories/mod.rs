// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

mod sqlite_block_store;

pub use sqlite_block_store::{BlockStoreConfig, SqliteBlockStore};
