// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! The named backoff strategies the Backoff Library implements as pure
//! functions and the Strategy Selector chooses between.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    Exponential,
    Jittered,
    Stepped,
    NetworkAdaptive,
    ErrorAdaptive,
}

impl fmt::Display for BackoffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackoffStrategy::Fixed => "fixed",
            BackoffStrategy::Linear => "linear",
            BackoffStrategy::Exponential => "exponential",
            BackoffStrategy::Jittered => "jittered",
            BackoffStrategy::Stepped => "stepped",
            BackoffStrategy::NetworkAdaptive => "network-adaptive",
            BackoffStrategy::ErrorAdaptive => "error-adaptive",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_kebab_case_names() {
        assert_eq!(BackoffStrategy::NetworkAdaptive.to_string(), "network-adaptive");
        assert_eq!(BackoffStrategy::Fixed.to_string(), "fixed");
    }
}
