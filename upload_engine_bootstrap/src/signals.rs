// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Signal Handling
//!
//! Listens for `SIGINT`/`SIGTERM` (and `SIGHUP` on Unix) and drives a
//! `ShutdownCoordinator` from them: on receipt, the
//! composition root pauses the queue manager (soft-cancel, chunks already
//! persisted survive) and waits out the grace period for in-flight chunks
//! before the process exits.

use crate::shutdown::ShutdownCoordinator;

/// Waits for a termination signal, then initiates shutdown on `coordinator`.
/// Runs until the first signal arrives; callers typically `tokio::spawn`
/// this alongside the application's main work.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal(coordinator: ShutdownCoordinator) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        _ = sigint.recv() => tracing::info!("received SIGINT"),
        _ = sighup.recv() => tracing::info!("received SIGHUP"),
    }

    coordinator.initiate_shutdown();
}

#[cfg(windows)]
pub async fn wait_for_shutdown_signal(coordinator: ShutdownCoordinator) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("received Ctrl-C");
    coordinator.initiate_shutdown();
}
