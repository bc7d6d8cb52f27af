// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outcomes and status of sync cycles.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

/// What started a sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SyncTrigger {
    Startup,
    Interval,
    /// Connectivity came back.
    Reconnect,
    /// Explicit request; bypasses the throttle.
    Force,
}

/// Why a cycle did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The previous cycle started less than the minimum spacing ago.
    Throttled,
    /// Another cycle is still running.
    InFlight,
    Offline,
    Disabled,
}

/// Result of one push pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub students_created: usize,
    pub students_updated: usize,
    pub attendance_inserted: usize,
    /// Entries found already stored remotely and rewritten without inserting.
    pub attendance_matched: usize,
    /// Entries still inside the push grace period.
    pub deferred: usize,
    /// Records that failed and stay unsynced until the next cycle.
    pub failures: usize,
}

impl PushReport {
    /// True if anything was rewritten locally.
    pub fn changed(&self) -> bool {
        self.students_created
            + self.students_updated
            + self.attendance_inserted
            + self.attendance_matched
            > 0
    }
}

/// Result of one pull pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PullReport {
    /// The full history was requested.
    pub bootstrap: bool,
    pub students: usize,
    pub attendance_fetched: usize,
    /// Local-only entries carried through the merge.
    pub local_only_kept: usize,
    /// Local-only entries replaced by a remote copy of the same event.
    pub superseded: usize,
}

/// Summary of a completed cycle. Pass failures are recorded in `errors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub trigger: SyncTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub push: Option<PushReport>,
    pub pull: Option<PullReport>,
    pub errors: Vec<String>,
}

impl SyncReport {
    pub(crate) fn new(trigger: SyncTrigger, started_at: DateTime<Utc>) -> Self {
        Self {
            trigger,
            started_at,
            finished_at: started_at,
            push: None,
            pull: None,
            errors: Vec::new(),
        }
    }

    /// Both passes ran without error.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// What [`run_cycle`](crate::SyncOrchestrator::run_cycle) did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum SyncOutcome {
    Skipped { reason: SkipReason },
    Completed(SyncReport),
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Skipped { .. } => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Skipped { reason } => Some(*reason),
            Self::Completed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Running,
    Disabled,
}

/// Observable state of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub cycles: u64,
    pub last_started: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_report: Option<SyncReport>,
}
