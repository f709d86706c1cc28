// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Error Classifier
//!
//! Pure function mapping any `UploadError` to a canonical classification:
//! `kind`, `group`, `recoverable`, `suggested_strategy`,
//! `suggested_max_retries`, `priority`. Typed `UploadError` variants are
//! matched directly; `UploadError::Adapter`/`UploadError::Unknown` fall back
//! to case-folded marker-substring matching on the message, since an
//! adapter may not be able to raise a typed domain error.

use crate::value_objects::{BackoffStrategy, ErrorKind};
use crate::UploadError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub group: crate::value_objects::ErrorGroup,
    pub recoverable: bool,
    pub suggested_strategy: BackoffStrategy,
    pub suggested_max_retries: u32,
    pub priority: u8,
}

/// Extra config beyond the kind-table defaults: non-recoverable overrides
/// and max-retry overrides, both editable per deployment.
#[derive(Debug, Clone, Default)]
pub struct ClassifierConfig {
    pub additional_non_recoverable: Vec<ErrorKind>,
    pub max_retries_overrides: Vec<(ErrorKind, u32)>,
}

pub fn classify(error: &UploadError, config: &ClassifierConfig) -> Classification {
    let kind = kind_of(error);
    classify_kind(kind, config)
}

fn classify_kind(kind: ErrorKind, config: &ClassifierConfig) -> Classification {
    let recoverable = kind.is_recoverable_by_default() && !config.additional_non_recoverable.contains(&kind);
    let suggested_max_retries = config
        .max_retries_overrides
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, v)| *v)
        .unwrap_or_else(|| kind.default_max_retries());
    Classification {
        kind,
        group: kind.group(),
        recoverable,
        suggested_strategy: default_strategy_for(kind),
        suggested_max_retries,
        priority: kind.default_priority(),
    }
}

fn default_strategy_for(kind: ErrorKind) -> BackoffStrategy {
    use ErrorKind::*;
    match kind {
        RateLimit => BackoffStrategy::Stepped,
        Network | Timeout | ConnectionReset | Dns | ServerUnreachable => BackoffStrategy::Jittered,
        Server | Api => BackoffStrategy::Linear,
        _ => BackoffStrategy::Exponential,
    }
}

/// Maps a typed `UploadError` to its canonical kind directly; the catch-all
/// arms fall back to message-sniffing for the opaque adapter/unknown
/// variants.
fn kind_of(error: &UploadError) -> ErrorKind {
    match error {
        UploadError::Network(_) => ErrorKind::Network,
        UploadError::Timeout(_) => ErrorKind::Timeout,
        UploadError::ConnectionReset(_) => ErrorKind::ConnectionReset,
        UploadError::Dns(_) => ErrorKind::Dns,
        UploadError::ServerUnreachable(_) => ErrorKind::ServerUnreachable,
        UploadError::Server(_) => ErrorKind::Server,
        UploadError::RateLimit(_) => ErrorKind::RateLimit,
        UploadError::Api(_) => ErrorKind::Api,
        UploadError::Auth(_) => ErrorKind::Auth,
        UploadError::Permission(_) => ErrorKind::Permission,
        UploadError::Quota(_) => ErrorKind::Quota,
        UploadError::File(_) => ErrorKind::File,
        UploadError::Validation(_) | UploadError::InvalidChunk(_) | UploadError::InvalidConfiguration(_) => ErrorKind::Validation,
        UploadError::Memory(_) => ErrorKind::Memory,
        UploadError::Worker(_) => ErrorKind::Worker,
        UploadError::Merge(_) => ErrorKind::Merge,
        UploadError::Security(_) => ErrorKind::Security,
        UploadError::DataCorruption(_) => ErrorKind::DataCorruption,
        UploadError::ContentEncoding(_) => ErrorKind::ContentEncoding,
        UploadError::DataProcessing(_) | UploadError::Serialization(_) => ErrorKind::DataProcessing,
        UploadError::Cancel(_) => ErrorKind::Cancel,
        UploadError::Adapter(message) | UploadError::Unknown(message) => classify_message(message),
        _ => ErrorKind::Unknown,
    }
}

fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    let markers: &[(&str, ErrorKind)] = &[
        ("timeout", ErrorKind::Timeout),
        ("offline", ErrorKind::Network),
        ("internet", ErrorKind::Network),
        ("network", ErrorKind::Network),
        ("dns", ErrorKind::Dns),
        ("resolve", ErrorKind::Dns),
        ("connection reset", ErrorKind::ConnectionReset),
        ("connection closed", ErrorKind::ConnectionReset),
        ("429", ErrorKind::RateLimit),
        ("rate limit", ErrorKind::RateLimit),
        ("500", ErrorKind::Server),
        ("503", ErrorKind::Server),
        ("permission", ErrorKind::Permission),
        ("denied", ErrorKind::Permission),
        ("404", ErrorKind::Api),
        ("not found", ErrorKind::Api),
    ];
    markers.iter().find(|(marker, _)| lower.contains(marker)).map(|(_, kind)| *kind).unwrap_or(ErrorKind::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_network_error_classifies_directly() {
        let classification = classify(&UploadError::Network("refused".into()), &ClassifierConfig::default());
        assert_eq!(classification.kind, ErrorKind::Network);
        assert!(classification.recoverable);
    }

    #[test]
    fn security_is_never_recoverable_even_with_empty_overrides() {
        let classification = classify(&UploadError::Security("tampered".into()), &ClassifierConfig::default());
        assert!(!classification.recoverable);
    }

    #[test]
    fn adapter_error_falls_back_to_message_sniffing() {
        let classification = classify(&UploadError::Adapter("Request timed out after 30s".into()), &ClassifierConfig::default());
        assert_eq!(classification.kind, ErrorKind::Timeout);
    }

    #[test]
    fn rate_limit_message_detects_429() {
        let classification = classify(&UploadError::Adapter("server responded 429".into()), &ClassifierConfig::default());
        assert_eq!(classification.kind, ErrorKind::RateLimit);
    }

    #[test]
    fn max_retries_override_takes_precedence_over_table_default() {
        let config = ClassifierConfig {
            additional_non_recoverable: vec![],
            max_retries_overrides: vec![(ErrorKind::Network, 1)],
        };
        let classification = classify(&UploadError::Network("x".into()), &config);
        assert_eq!(classification.suggested_max_retries, 1);
    }

    #[test]
    fn unmatched_message_classifies_as_unknown() {
        let classification = classify(&UploadError::Adapter("something odd happened".into()), &ClassifierConfig::default());
        assert_eq!(classification.kind, ErrorKind::Unknown);
    }
}
