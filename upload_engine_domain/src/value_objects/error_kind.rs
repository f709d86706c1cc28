// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! Canonical error kinds and groups produced by the Error Classifier.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Timeout,
    ConnectionReset,
    Dns,
    ServerUnreachable,
    Server,
    RateLimit,
    Api,
    Auth,
    Permission,
    Quota,
    File,
    Validation,
    Memory,
    Worker,
    Merge,
    Security,
    DataCorruption,
    ContentEncoding,
    DataProcessing,
    Cancel,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorGroup {
    Network,
    Server,
    File,
    Resource,
    Permission,
    Security,
    Data,
    User,
    Environment,
    Other,
}

impl ErrorKind {
    /// Bucket this kind into its error group.
    pub fn group(self) -> ErrorGroup {
        use ErrorGroup::*;
        use ErrorKind::*;
        match self {
            Network | Timeout | ConnectionReset | Dns | ServerUnreachable => Network,
            Server | RateLimit | Api => Server,
            File | ContentEncoding => File,
            Memory | Worker => Resource,
            Permission | Auth => Permission,
            Security | DataCorruption => Security,
            Validation | DataProcessing | Merge => Data,
            Cancel => User,
            Quota => Resource,
            Unknown => Other,
        }
    }

    /// Default non-recoverable set (configurable additions live on
    /// `ClassifierConfig`, not here).
    pub fn is_recoverable_by_default(self) -> bool {
        !matches!(
            self,
            ErrorKind::Security | ErrorKind::Cancel | ErrorKind::Validation | ErrorKind::Permission | ErrorKind::Quota
        )
    }

    /// Table-driven default suggested max retries per kind; editable via
    /// `ClassifierConfig::max_retries_overrides`.
    pub fn default_max_retries(self) -> u32 {
        use ErrorKind::*;
        match self {
            Network | Timeout | ConnectionReset | ServerUnreachable => 5,
            Dns => 3,
            Server => 4,
            RateLimit => 6,
            Api => 3,
            Memory | Worker => 2,
            Auth | Permission | Quota | Validation | Security | Cancel => 0,
            DataCorruption | Merge | ContentEncoding | DataProcessing => 1,
            Unknown => 2,
        }
    }

    /// Default priority (lower sorts first / is more urgent to resolve).
    pub fn default_priority(self) -> u8 {
        use ErrorKind::*;
        match self {
            Security | DataCorruption => 0,
            Auth | Permission | Quota | Validation => 1,
            Cancel => 2,
            Server | RateLimit | Api => 3,
            Network | Timeout | ConnectionReset | Dns | ServerUnreachable => 4,
            Memory | Worker | Merge | ContentEncoding | DataProcessing => 5,
            Unknown => 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_is_never_recoverable() {
        assert!(!ErrorKind::Security.is_recoverable_by_default());
    }

    #[test]
    fn network_errors_group_together() {
        assert_eq!(ErrorKind::Timeout.group(), ErrorGroup::Network);
        assert_eq!(ErrorKind::Dns.group(), ErrorGroup::Network);
    }

    #[test]
    fn quota_has_zero_retries_by_default() {
        assert_eq!(ErrorKind::Quota.default_max_retries(), 0);
    }
}
