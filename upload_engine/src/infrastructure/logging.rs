// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Logging
//!
//! Initializes a `tracing-subscriber` `fmt` layer driven by `RUST_LOG`
//! (falling back to `default_level` when unset). Call once, from the
//! bootstrap composition root, before constructing any service.

use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for local development and interactive CLI use.
    Pretty,
    /// One JSON object per line, for log aggregation in production.
    Json,
}

pub struct LoggingConfig {
    pub default_level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { default_level: "info".to_string(), format: LogFormat::Pretty }
    }
}

/// Installs the global `tracing` subscriber. Safe to call more than once
/// per process only in tests, where `try_init` silently no-ops on the
/// second call rather than panicking.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.default_level.clone()));
    let subscriber = fmt().with_env_filter(filter);
    let result = match config.format {
        LogFormat::Pretty => subscriber.try_init(),
        LogFormat::Json => subscriber.json().try_init(),
    };
    if let Err(err) = result {
        eprintln!("tracing subscriber already initialized: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_info_and_pretty_format() {
        let config = LoggingConfig::default();
        assert_eq!(config.default_level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn init_does_not_panic_when_called_repeatedly() {
        init(&LoggingConfig::default());
        init(&LoggingConfig::default());
    }
}
