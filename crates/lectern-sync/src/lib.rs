// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronization between the local store and the remote backend.
//!
//! - [`merge`] canonicalizes attendance from local and remote provenance.
//! - [`orchestrator`] runs push and pull passes under a throttle and an
//!   in-flight guard.
//! - [`realtime`] batches change-feed notifications and folds them into
//!   local state.
//! - [`connectivity`] tracks online/offline from platform events and polling.
//! - [`scheduler`] drives all of the above from one cooperative loop.

pub mod connectivity;
pub mod merge;
pub mod orchestrator;
pub mod realtime;
pub mod report;
pub mod scheduler;

pub use connectivity::{ConnectivityMonitor, Transition};
pub use orchestrator::{SyncOrchestrator, SyncSettings};
pub use realtime::{RealtimeIngestor, RefreshCallback};
pub use report::{
    PullReport, PushReport, SkipReason, SyncOutcome, SyncReport, SyncState, SyncStatus,
    SyncTrigger,
};
pub use scheduler::{Scheduler, SchedulerHandle, TimerName};
