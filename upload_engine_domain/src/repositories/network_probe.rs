// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Network Probe Port
//!
//! Observable surface reporting the current `NetworkQuality` tier, consumed
//! by the Strategy Selector and Chunk Scheduler. The core depends only on
//! the ordinal tier, never on a concrete sampling method.

use crate::value_objects::NetworkQuality;
use async_trait::async_trait;

#[async_trait]
pub trait NetworkProbe: Send + Sync {
    async fn quality(&self) -> NetworkQuality;

    /// Registers a callback invoked whenever the sampled quality tier
    /// changes. Implementations that only support polling are free to never
    /// invoke it; callers must not assume delivery.
    fn on_change(&self, callback: Box<dyn Fn(NetworkQuality) + Send + Sync>);
}
