// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Validation Layer
//!
//! Size, MIME allow-list, optional magic-byte signature, and
//! extension↔MIME agreement checks, run as `pre-process-file` pipeline
//! hooks ahead of any user-installed plugin (priority `0`). Each check is a
//! free function so it can be unit-tested directly; `register` is the only
//! piece that touches the `Pipeline`.

use crate::application::services::hook_registry::HookHandler;
use crate::application::services::pipeline::{Pipeline, PRE_PROCESS_FILE};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use upload_engine_domain::UploadError;

#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub max_file_size: Option<u64>,
    pub allow_empty_files: bool,
    pub allowed_mime_types: Vec<String>,
    pub disallowed_mime_types: Vec<String>,
    pub check_signature: bool,
    pub high_risk_extensions: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig {
            max_file_size: None,
            allow_empty_files: false,
            allowed_mime_types: Vec::new(),
            disallowed_mime_types: Vec::new(),
            check_signature: false,
            high_risk_extensions: vec!["exe".into(), "bat".into(), "cmd".into(), "scr".into(), "msi".into(), "sh".into()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// One leading-bytes signature a known file type begins with.
struct Signature {
    mime: &'static str,
    magic: &'static [u8],
}

const SIGNATURES: &[Signature] = &[
    Signature { mime: "image/png", magic: b"\x89PNG\r\n\x1a\n" },
    Signature { mime: "image/jpeg", magic: b"\xff\xd8\xff" },
    Signature { mime: "image/gif", magic: b"GIF87a" },
    Signature { mime: "image/gif", magic: b"GIF89a" },
    Signature { mime: "application/pdf", magic: b"%PDF-" },
    Signature { mime: "application/zip", magic: b"PK\x03\x04" },
];

/// Checks `file.size` against `maxFileSize` and the empty-file policy.
pub fn validate_size(size: u64, config: &ValidationConfig, report: &mut ValidationReport) {
    if let Some(max) = config.max_file_size {
        if size > max {
            report.valid = false;
            report.errors.push(format!("file size {size} exceeds maximum {max}"));
        }
    }
    if size == 0 && !config.allow_empty_files {
        report.valid = false;
        report.errors.push("empty files are not allowed".to_string());
    }
}

/// `mime_type` must exactly equal an allow-list entry, or match a
/// `prefix/*` wildcard entry. An empty allow-list accepts everything.
pub fn validate_mime_type(mime_type: Option<&str>, config: &ValidationConfig, report: &mut ValidationReport) {
    if config.allowed_mime_types.is_empty() {
        return;
    }
    let Some(mime_type) = mime_type else {
        report.valid = false;
        report.errors.push("mime type is required but was not provided".to_string());
        return;
    };
    let allowed = config.allowed_mime_types.iter().any(|entry| match entry.strip_suffix("/*") {
        Some(prefix) => mime_type.split('/').next() == Some(prefix),
        None => entry == mime_type,
    });
    if !allowed {
        report.valid = false;
        report.errors.push(format!("mime type '{mime_type}' is not in the allow-list"));
    }
}

/// Fails when `mime_type` exactly equals, or matches a `prefix/*` wildcard
/// against, an entry in `disallowed_mime_types`. Symmetric to
/// `validate_mime_type`'s allow-list matching.
pub fn validate_disallowed_mime_type(mime_type: Option<&str>, config: &ValidationConfig, report: &mut ValidationReport) {
    if config.disallowed_mime_types.is_empty() {
        return;
    }
    let Some(mime_type) = mime_type else { return };
    let disallowed = config.disallowed_mime_types.iter().any(|entry| match entry.strip_suffix("/*") {
        Some(prefix) => mime_type.split('/').next() == Some(prefix),
        None => entry == mime_type,
    });
    if disallowed {
        report.valid = false;
        report.errors.push(format!("mime type '{mime_type}' is explicitly disallowed"));
    }
}

/// Fails when `header` doesn't match any known signature for
/// `declared_mime`; files of an unrecognized type produce a warning, not an
/// error, since the signature table can never be exhaustive.
pub fn validate_signature(header: &[u8], declared_mime: Option<&str>, report: &mut ValidationReport) {
    let Some(declared_mime) = declared_mime else { return };
    let matches_declared = SIGNATURES.iter().any(|sig| sig.mime == declared_mime && header.starts_with(sig.magic));
    let matches_any_known = SIGNATURES.iter().any(|sig| header.starts_with(sig.magic));
    if matches_any_known && !matches_declared {
        report.valid = false;
        report.errors.push(format!("file signature does not match declared mime type '{declared_mime}'"));
    } else if !matches_any_known {
        report.warnings.push("file signature did not match any known type".to_string());
    }
}

/// Fails when the file name's extension is in the high-risk list.
pub fn validate_extension(file_name: &str, config: &ValidationConfig, report: &mut ValidationReport) {
    let Some(extension) = file_name.rsplit('.').next().map(|e| e.to_lowercase()) else {
        return;
    };
    if config.high_risk_extensions.iter().any(|risky| risky.eq_ignore_ascii_case(&extension)) {
        report.valid = false;
        report.errors.push(format!("extension '.{extension}' is not permitted"));
    }
}

pub fn validate(file_name: &str, size: u64, mime_type: Option<&str>, header: &[u8], config: &ValidationConfig) -> ValidationReport {
    let mut report = ValidationReport { valid: true, errors: Vec::new(), warnings: Vec::new() };
    validate_size(size, config, &mut report);
    validate_mime_type(mime_type, config, &mut report);
    validate_disallowed_mime_type(mime_type, config, &mut report);
    validate_extension(file_name, config, &mut report);
    if config.check_signature {
        validate_signature(header, mime_type, &mut report);
    }
    report
}

struct ValidationHook {
    config: ValidationConfig,
}

#[async_trait]
impl HookHandler for ValidationHook {
    async fn call(&self, input: Value) -> Result<Value, UploadError> {
        let name = input.get("name").and_then(Value::as_str).unwrap_or_default();
        let size = input.get("size").and_then(Value::as_u64).unwrap_or(0);
        let mime_type = input.get("mimeType").and_then(Value::as_str);
        let header: Vec<u8> = input
            .get("headerBytes")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(|v| v.as_u64().map(|b| b as u8)).collect())
            .unwrap_or_default();

        let report = validate(name, size, mime_type, &header, &self.config);
        if !report.valid {
            return Err(UploadError::validation(report.errors.join("; ")));
        }
        Ok(input)
    }
}

/// Registers the validation checks as a single `pre-process-file` handler
/// at priority `0`, ahead of any user plugin attached at a higher priority.
pub fn register(pipeline: &mut Pipeline, config: ValidationConfig) {
    pipeline.attach(PRE_PROCESS_FILE, "builtin:validation", 0, Arc::new(ValidationHook { config }));
}
