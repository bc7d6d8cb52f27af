// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use lectern_sync::SyncState;
use serde::Serialize;

/// Snapshot of the tracker for status displays and `--json` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerStatus {
    pub online: bool,
    pub remote_configured: bool,
    /// Name of the active storage driver.
    pub storage_engine: Option<String>,
    /// No configured driver was usable; data lives in memory only.
    pub degraded: bool,
    pub students: usize,
    pub attendance: usize,
    /// Records still carrying placeholder ids or unpushed edits.
    pub pending_pushes: usize,
    pub last_sync: Option<DateTime<Utc>>,
    pub full_sync_completed: bool,
    pub sync_state: SyncState,
    pub sync_cycles: u64,
    pub last_sync_error: Option<String>,
    /// Realtime changes waiting for the next flush.
    pub realtime_pending: usize,
}
