// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Network Quality
//!
//! Ordinal tier summarizing current transport conditions, consumed by the
//! Strategy Selector (adaptive backoff table) and the Chunk Scheduler
//! (adaptive concurrency). Reported by the Network Probe.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum NetworkQuality {
    Offline,
    Poor,
    Low,
    Medium,
    Good,
    Excellent,
    Unknown,
}

impl NetworkQuality {
    /// The default network-adaptive backoff quality factor for this tier,
    /// multiplied into the exponential base factor.
    pub fn adaptive_factor(self) -> f64 {
        match self {
            NetworkQuality::Excellent => 0.5,
            NetworkQuality::Good => 0.75,
            NetworkQuality::Medium => 1.0,
            NetworkQuality::Low => 1.5,
            NetworkQuality::Poor => 2.0,
            NetworkQuality::Offline => 3.0,
            NetworkQuality::Unknown => 1.0,
        }
    }

    pub fn is_network_group(self) -> bool {
        matches!(
            self,
            NetworkQuality::Offline | NetworkQuality::Poor | NetworkQuality::Low | NetworkQuality::Medium
        )
    }
}
