// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! Entry point: parse and validate the CLI, install logging, run the
//! requested command, map the result to a Unix exit code.

use upload_engine::infrastructure::logging::{self, LoggingConfig};
use upload_engine_bootstrap::shutdown::ShutdownCoordinator;
use upload_engine_bootstrap::{app, cli, exit_code, signals};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let validated = match cli::parse_and_validate() {
        Ok(validated) => validated,
        Err(err) => {
            eprintln!("{err}");
            return std::process::ExitCode::from(64);
        }
    };

    let log_level = if validated.verbose { "debug" } else { "info" };
    logging::init(&LoggingConfig { default_level: log_level.to_string(), ..Default::default() });

    let shutdown = ShutdownCoordinator::default();
    tokio::spawn(signals::wait_for_shutdown_signal(shutdown.clone()));

    let result = app::run(validated.config.as_deref(), validated.command, shutdown).await;
    exit_code::result_to_exit_code(result)
}
