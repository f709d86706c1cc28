// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Codes
//!
//! Maps `UploadError` to the BSD `sysexits.h` conventions, so shell scripts
//! driving this CLI can branch on `$?` without parsing stderr.

use std::process::ExitCode as StdExitCode;
use upload_engine_domain::UploadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Ok = 0,
    /// EX_USAGE: bad CLI arguments.
    Usage = 64,
    /// EX_DATAERR: input file/data was invalid.
    DataErr = 65,
    /// EX_NOINPUT: input file could not be read.
    NoInput = 66,
    /// EX_UNAVAILABLE: a required service (network, storage) was unreachable.
    Unavailable = 69,
    /// EX_SOFTWARE: an internal invariant was violated.
    Software = 70,
    /// EX_IOERR: an I/O error occurred outside of reading the input.
    IoErr = 74,
    /// EX_TEMPFAIL: transient failure; retrying later may succeed.
    TempFail = 75,
    /// EX_NOPERM: permission was denied.
    NoPerm = 77,
}

impl From<ExitCode> for StdExitCode {
    fn from(code: ExitCode) -> Self {
        StdExitCode::from(code as u8)
    }
}

/// Maps a terminal `UploadError` to the exit code that best describes it.
/// Retryable categories (`Network`, `Timeout`, `RateLimit`, ...) map to
/// `TempFail` since a caller scripting around this CLI can reasonably retry
/// the whole process on that code.
pub fn map_error_to_exit_code(error: &UploadError) -> ExitCode {
    match error {
        UploadError::Validation(_) | UploadError::InvalidChunk(_) | UploadError::InvalidConfiguration(_) => ExitCode::DataErr,
        UploadError::File(_) => ExitCode::NoInput,
        UploadError::Auth(_) | UploadError::Permission(_) => ExitCode::NoPerm,
        UploadError::Network(_)
        | UploadError::Timeout(_)
        | UploadError::ConnectionReset(_)
        | UploadError::Dns(_)
        | UploadError::ServerUnreachable(_)
        | UploadError::Server(_)
        | UploadError::RateLimit(_) => ExitCode::TempFail,
        UploadError::Storage(_) | UploadError::Quota(_) => ExitCode::Unavailable,
        UploadError::Serialization(_) | UploadError::DataCorruption(_) | UploadError::ContentEncoding(_) | UploadError::DataProcessing(_) => {
            ExitCode::IoErr
        }
        UploadError::Cancel(_) => ExitCode::Ok,
        _ => ExitCode::Software,
    }
}

pub fn result_to_exit_code(result: Result<(), UploadError>) -> StdExitCode {
    match result {
        Ok(()) => StdExitCode::from(ExitCode::Ok),
        Err(error) => {
            tracing::error!(error = %error, "upload-engine exited with an error");
            StdExitCode::from(map_error_to_exit_code(&error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_data_err() {
        assert_eq!(map_error_to_exit_code(&UploadError::validation("bad input")), ExitCode::DataErr);
    }

    #[test]
    fn network_errors_map_to_tempfail() {
        assert_eq!(map_error_to_exit_code(&UploadError::Network("down".to_string())), ExitCode::TempFail);
    }

    #[test]
    fn cancellation_is_not_an_error_exit() {
        assert_eq!(map_error_to_exit_code(&UploadError::cancel("user requested")), ExitCode::Ok);
    }

    #[test]
    fn permission_errors_map_to_noperm() {
        assert_eq!(map_error_to_exit_code(&UploadError::Auth("token expired".to_string())), ExitCode::NoPerm);
    }
}
