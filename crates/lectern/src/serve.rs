// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lectern serve` command implementation.
//!
//! Opens the tracker, starts the sync scheduler (interval sync, connectivity
//! polling, realtime flushes) and logs a periodic status summary until a
//! shutdown signal arrives. On shutdown the scheduler gets a bounded window
//! to flush pending realtime changes before storage is closed.

use std::time::Duration;

use lectern_app::{Tracker, drain_scheduler, install_signal_handler};
use lectern_config::LecternConfig;
use lectern_core::LecternError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(300);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the `lectern serve` command.
pub async fn run_serve(config: LecternConfig) -> Result<(), LecternError> {
    info!(
        name = %config.app.name,
        branch = %config.app.branch,
        host = ?config.app.host,
        "starting lectern"
    );
    let tracker = crate::open_tracker(config).await?;
    if tracker.is_degraded() {
        warn!("no storage driver is usable, records will not survive a restart");
    }

    let cancel = install_signal_handler();
    let scheduler = tracker.spawn_scheduler(cancel.clone()).await;
    if scheduler.is_none() {
        info!("no remote backend configured, serving local storage only");
    }

    status_monitor(&tracker, &cancel).await;

    if let Some(task) = scheduler {
        drain_scheduler(task, DRAIN_TIMEOUT).await;
    }
    tracker.shutdown().await?;
    info!("lectern serve shutdown complete");
    Ok(())
}

/// Log a status summary every few minutes until cancelled.
async fn status_monitor(tracker: &Tracker, cancel: &CancellationToken) {
    let mut interval = tokio::time::interval(STATUS_LOG_INTERVAL);
    // Skip the first immediate tick.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match tracker.status().await {
                    Ok(status) if status.pending_pushes > 0 || !status.online => {
                        info!(
                            online = status.online,
                            storage = status.storage_engine.as_deref().unwrap_or("none"),
                            pending = status.pending_pushes,
                            sync_cycles = status.sync_cycles,
                            "status"
                        );
                    }
                    Ok(status) => {
                        debug!(sync_cycles = status.sync_cycles, "status: all records synced");
                    }
                    Err(e) => {
                        warn!(error = %e, "status check failed (non-fatal)");
                    }
                }
            }
            _ = cancel.cancelled() => {
                info!("status monitor shutting down");
                break;
            }
        }
    }
}
