// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown coordination with signal handling.
//!
//! Installs handlers for SIGTERM and SIGINT (Ctrl+C), triggering a
//! [`CancellationToken`] that the scheduler loop monitors. The scheduler is
//! then given a bounded time to flush and unsubscribe before the process
//! exits.

use std::time::Duration;

use lectern_core::LecternError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancels the returned token on the first SIGINT (Ctrl+C) or SIGTERM.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        info!(signal, "shutdown requested");
        trigger.cancel();
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM, only Ctrl+C stops the tracker");
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "Ctrl+C"
}

/// Waits up to `timeout` for the scheduler task to finish its final flush.
///
/// Returns `false` if the task had to be abandoned.
pub async fn drain_scheduler(
    task: JoinHandle<Result<(), LecternError>>,
    timeout: Duration,
) -> bool {
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(()))) => {
            info!("scheduler drained");
            true
        }
        Ok(Ok(Err(e))) => {
            warn!(error = %e, "scheduler stopped with an error");
            true
        }
        Ok(Err(e)) => {
            warn!(error = %e, "scheduler task did not complete");
            true
        }
        Err(_) => {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "scheduler did not stop in time, pending realtime changes may be lost"
            );
            false
        }
    }
}
