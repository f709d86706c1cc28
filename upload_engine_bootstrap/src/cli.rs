// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface
//!
//! `clap`-derived parsing for the engine's seven subcommands:
//! `upload`, `queue add`, `queue list`, `queue pause`, `queue resume`,
//! `resume <file-id>`, `stats`. Parsing and security validation are kept as
//! two separate steps: `parse_cli` never touches the filesystem,
//! `validate_cli` canonicalizes and range-checks everything clap accepted,
//! so a malformed path is rejected before any service is constructed.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "upload-engine", version, about = "Chunked upload engine CLI")]
pub struct Cli {
    /// Path to a TOML config file. Missing files are not an error; see
    /// `EngineConfig::load`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enables debug-level logging regardless of `RUST_LOG`.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Uploads a single file end to end, blocking until it completes.
    Upload {
        file: PathBuf,
        #[arg(long)]
        upload_url: String,
        #[arg(long)]
        chunk_size_mb: Option<usize>,
    },
    /// Manipulates the multi-file upload queue.
    #[command(subcommand)]
    Queue(QueueCommands),
    /// Resumes a previously interrupted upload by its file id.
    Resume { file_id: String },
    /// Prints queue and block-store statistics as JSON.
    Stats,
}

#[derive(Debug, Subcommand)]
pub enum QueueCommands {
    /// Adds a file to the queue at the given priority (default: normal).
    Add {
        file: PathBuf,
        #[arg(long)]
        priority: Option<String>,
    },
    /// Lists every item currently in the queue.
    List,
    /// Soft-cancels in-flight uploads and stops starting new ones.
    Pause,
    /// Resumes dispatch after a `pause`.
    Resume,
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid value for --{arg}: {reason}")]
    InvalidValue { arg: String, reason: String },
    #[error("path does not exist or is not readable: {0}")]
    InvalidPath(String),
}

/// Canonicalizes and range-checks a path that must already exist on disk.
struct SecureArgParser;

impl SecureArgParser {
    fn validate_existing_path(raw: &str) -> Result<PathBuf, ParseError> {
        let path = PathBuf::from(raw);
        path.canonicalize().map_err(|_| ParseError::InvalidPath(raw.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub command: ValidatedCommand,
    pub verbose: bool,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum ValidatedCommand {
    Upload { file: PathBuf, upload_url: String, chunk_size_mb: Option<usize> },
    QueueAdd { file: PathBuf, priority: QueuePriorityArg },
    QueueList,
    QueuePause,
    QueueResume,
    Resume { file_id: String },
    Stats,
}

#[derive(Debug, Clone, Copy, Default)]
pub enum QueuePriorityArg {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl std::str::FromStr for QueuePriorityArg {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "low" => Ok(QueuePriorityArg::Low),
            "normal" => Ok(QueuePriorityArg::Normal),
            "high" => Ok(QueuePriorityArg::High),
            "critical" => Ok(QueuePriorityArg::Critical),
            other => Err(ParseError::InvalidValue {
                arg: "priority".to_string(),
                reason: format!("'{other}' is not one of low, normal, high, critical"),
            }),
        }
    }
}

pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    validate_cli(parse_cli())
}

fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    let command = match cli.command {
        Commands::Upload { file, upload_url, chunk_size_mb } => {
            let file = SecureArgParser::validate_existing_path(&file.to_string_lossy())?;
            if let Some(size) = chunk_size_mb {
                if size == 0 || size > 1024 {
                    return Err(ParseError::InvalidValue {
                        arg: "chunk-size-mb".to_string(),
                        reason: "must be between 1 and 1024 MB".to_string(),
                    });
                }
            }
            ValidatedCommand::Upload { file, upload_url, chunk_size_mb }
        }
        Commands::Queue(QueueCommands::Add { file, priority }) => {
            let file = SecureArgParser::validate_existing_path(&file.to_string_lossy())?;
            let priority = match priority {
                Some(raw) => raw.parse()?,
                None => QueuePriorityArg::default(),
            };
            ValidatedCommand::QueueAdd { file, priority }
        }
        Commands::Queue(QueueCommands::List) => ValidatedCommand::QueueList,
        Commands::Queue(QueueCommands::Pause) => ValidatedCommand::QueuePause,
        Commands::Queue(QueueCommands::Resume) => ValidatedCommand::QueueResume,
        Commands::Resume { file_id } => ValidatedCommand::Resume { file_id },
        Commands::Stats => ValidatedCommand::Stats,
    };

    Ok(ValidatedCli { command, verbose: cli.verbose, config: cli.config })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_priority_parses_case_insensitively() {
        assert!(matches!("HIGH".parse::<QueuePriorityArg>(), Ok(QueuePriorityArg::High)));
        assert!(matches!("low".parse::<QueuePriorityArg>(), Ok(QueuePriorityArg::Low)));
    }

    #[test]
    fn queue_priority_rejects_unknown_values() {
        assert!("urgent".parse::<QueuePriorityArg>().is_err());
    }

    #[test]
    fn validating_a_nonexistent_upload_file_is_a_path_error() {
        let cli = Cli {
            config: None,
            verbose: false,
            command: Commands::Upload {
                file: PathBuf::from("/no/such/file-for-sure.bin"),
                upload_url: "https://example/upload".to_string(),
                chunk_size_mb: None,
            },
        };
        assert!(matches!(validate_cli(cli), Err(ParseError::InvalidPath(_))));
    }

    #[test]
    fn oversized_chunk_size_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let cli = Cli {
            config: None,
            verbose: false,
            command: Commands::Upload {
                file: file.path().to_path_buf(),
                upload_url: "https://example/upload".to_string(),
                chunk_size_mb: Some(2048),
            },
        };
        assert!(matches!(validate_cli(cli), Err(ParseError::InvalidValue { .. })));
    }
}
