// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Upload Engine Bootstrap
//!
//! The composition root: everything that sits **outside** the domain/
//! application/infrastructure layers of the `upload-engine` crate.
//!
//! - `cli`: `clap`-derived argument parsing plus security validation
//!   (path canonicalization, range checks) kept separate from parsing
//!   itself.
//! - `composition_root`: wires every application service named in
//!   `upload_engine::application::services` from one `EngineConfig`.
//! - `app`: turns one validated CLI command into calls against the
//!   composed `Engine`.
//! - `signals`: SIGINT/SIGTERM/SIGHUP handling that drives graceful
//!   shutdown through a `ShutdownCoordinator`.
//! - `shutdown`: cancellation token and grace-period coordination, used
//!   by `signals` and available to any long-running bootstrap task.
//! - `logger`: a minimal, trait-based logging façade for bootstrap-phase
//!   messages, distinct from the engine's own `tracing` setup.
//! - `exit_code`: maps a terminal `UploadError` to a `sysexits.h`-style
//!   process exit code.

pub mod app;
pub mod cli;
pub mod composition_root;
pub mod exit_code;
pub mod logger;
pub mod shutdown;
pub mod signals;

pub use cli::{parse_and_validate, ValidatedCli, ValidatedCommand};
pub use exit_code::{map_error_to_exit_code, result_to_exit_code, ExitCode};
