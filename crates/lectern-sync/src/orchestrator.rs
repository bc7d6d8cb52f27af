// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync Orchestrator: push and pull passes between the local store and the
//! remote backend.
//!
//! A cycle is `Idle -> Throttled (skip) | Running { push, pull } -> Idle`.
//! Automatic triggers respect a minimum spacing between cycle starts; forced
//! syncs bypass it. An in-flight guard makes overlapping cycles impossible,
//! whatever the trigger.
//!
//! Sync is best-effort background work: per-record push failures and pass
//! failures are logged and recorded in the cycle report, never returned to
//! the caller of [`SyncOrchestrator::run_cycle`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lectern_config::LecternConfig;
use lectern_config::model::HostKind;
use lectern_core::{
    AttendanceEntry, AttendanceProbe, Clock, LecternError, OfflinePatch, RemoteBackend, Student,
    attendance_diff,
};
use lectern_storage::StorageManager;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::connectivity::ConnectivityMonitor;
use crate::merge::{adopt_remote, merge_fuzzy};
use crate::report::{
    PullReport, PushReport, SkipReason, SyncOutcome, SyncReport, SyncState, SyncStatus,
    SyncTrigger,
};

/// Timing and windowing for sync cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Automatic triggers are ignored when false. Forced syncs still run.
    pub enabled: bool,
    pub interval: Duration,
    pub min_spacing: Duration,
    /// How far back local-only attendance is pushed.
    pub push_window: Duration,
    /// How far back attendance is pulled after the bootstrap.
    pub pull_window: Duration,
    /// Local-only entries younger than this are left for the next cycle.
    /// `None` on hosts with private local storage.
    pub push_grace: Option<Duration>,
    pub match_tolerance: Duration,
}

impl SyncSettings {
    pub fn from_config(config: &LecternConfig) -> Self {
        let sync = &config.sync;
        let push_grace = match config.app.host {
            HostKind::Desktop | HostKind::Headless => None,
            HostKind::Browser => Some(sync.push_grace()),
        };
        Self {
            enabled: sync.enabled,
            interval: sync.interval(),
            min_spacing: sync.min_spacing(),
            push_window: days(sync.push_window_days),
            pull_window: days(sync.pull_window_days),
            push_grace,
            match_tolerance: sync.match_tolerance(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_config(&LecternConfig::default())
    }
}

fn days(n: u32) -> Duration {
    Duration::from_secs(u64::from(n) * 86_400)
}

fn span(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

/// `now` minus `d`, clamped to the earliest representable instant.
fn back_from(now: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(span(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Default)]
struct Tracking {
    cycles: u64,
    last_started: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
    last_error: Option<String>,
    last_report: Option<SyncReport>,
}

/// A student pushed during a pass, before and after the round-trip.
struct Pushed {
    before: Student,
    after: Student,
}

pub struct SyncOrchestrator {
    storage: Arc<StorageManager>,
    remote: Arc<dyn RemoteBackend>,
    connectivity: Arc<ConnectivityMonitor>,
    clock: Arc<dyn Clock>,
    settings: SyncSettings,
    in_flight: Mutex<()>,
    tracking: Mutex<Tracking>,
}

impl SyncOrchestrator {
    pub fn new(
        storage: Arc<StorageManager>,
        remote: Arc<dyn RemoteBackend>,
        connectivity: Arc<ConnectivityMonitor>,
        clock: Arc<dyn Clock>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            storage,
            remote,
            connectivity,
            clock,
            settings,
            in_flight: Mutex::new(()),
            tracking: Mutex::new(Tracking::default()),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Run one cycle unless it has to be skipped.
    pub async fn run_cycle(&self, trigger: SyncTrigger) -> SyncOutcome {
        let forced = trigger == SyncTrigger::Force;
        if !forced && !self.settings.enabled {
            return skipped(trigger, SkipReason::Disabled);
        }

        let Ok(_guard) = self.in_flight.try_lock() else {
            return skipped(trigger, SkipReason::InFlight);
        };

        let now = self.clock.now();
        let last_started = self.tracking.lock().await.last_started;
        if !forced
            && let Some(last) = last_started
            && now - last < span(self.settings.min_spacing)
        {
            return skipped(trigger, SkipReason::Throttled);
        }

        if !self.connectivity.is_online() && !(forced && self.connectivity.probe().await) {
            return skipped(trigger, SkipReason::Offline);
        }

        self.tracking.lock().await.last_started = Some(now);
        info!(trigger = %trigger, "sync cycle started");
        let mut report = SyncReport::new(trigger, now);

        match self.push_pass().await {
            Ok(push) => report.push = Some(push),
            Err(e) => {
                warn!(error = %e, "push pass failed");
                report.errors.push(format!("push: {e}"));
            }
        }
        match self.pull_pass().await {
            Ok(pull) => report.pull = Some(pull),
            Err(e) => {
                warn!(error = %e, "pull pass failed, local state left unchanged");
                report.errors.push(format!("pull: {e}"));
            }
        }

        report.finished_at = self.clock.now();
        info!(
            trigger = %trigger,
            pushed = report.push.as_ref().map_or(0, |p| p.attendance_inserted + p.students_created),
            fetched = report.pull.as_ref().map_or(0, |p| p.attendance_fetched),
            errors = report.errors.len(),
            "sync cycle finished"
        );

        let mut tracking = self.tracking.lock().await;
        tracking.cycles += 1;
        if report.is_clean() {
            tracking.last_success = Some(report.finished_at);
            tracking.last_error = None;
        } else {
            tracking.last_error = Some(report.errors.join("; "));
        }
        tracking.last_report = Some(report.clone());
        SyncOutcome::Completed(report)
    }

    /// Run a cycle now, bypassing the throttle.
    pub async fn force_sync(&self) -> SyncOutcome {
        self.run_cycle(SyncTrigger::Force).await
    }

    pub async fn status(&self) -> SyncStatus {
        let state = if !self.settings.enabled {
            SyncState::Disabled
        } else if self.in_flight.try_lock().is_err() {
            SyncState::Running
        } else {
            SyncState::Idle
        };
        let tracking = self.tracking.lock().await;
        SyncStatus {
            state,
            cycles: tracking.cycles,
            last_started: tracking.last_started,
            last_success: tracking.last_success,
            last_error: tracking.last_error.clone(),
            last_report: tracking.last_report.clone(),
        }
    }

    /// Push local-only students, dirty student edits, and local-only
    /// attendance; rewrite placeholder identifiers on success.
    ///
    /// Errors only when the local store cannot be read or written. Remote
    /// failures are counted per record.
    pub async fn push_pass(&self) -> Result<PushReport, LecternError> {
        let data = self.storage.load().await?;
        let now = self.clock.now();
        let mut report = PushReport::default();

        let mut pushed: Vec<Pushed> = Vec::new();
        for student in data.students.iter().filter(|s| !s.is_synced()) {
            match self.remote.insert_student(student).await {
                Ok(after) => {
                    debug!(student_id = %student.student_id, id = %after.id, "student pushed");
                    report.students_created += 1;
                    pushed.push(Pushed {
                        before: student.clone(),
                        after,
                    });
                }
                Err(e) => {
                    report.failures += 1;
                    warn!(student_id = %student.student_id, error = %e, "student push failed, retrying next cycle");
                }
            }
        }
        for student in data.students.iter().filter(|s| s.is_synced() && s.dirty) {
            match self.remote.update_student(student).await {
                Ok(after) => {
                    debug!(student_id = %student.student_id, "student update pushed");
                    report.students_updated += 1;
                    pushed.push(Pushed {
                        before: student.clone(),
                        after,
                    });
                }
                Err(e) => {
                    report.failures += 1;
                    warn!(student_id = %student.student_id, error = %e, "student update failed, retrying next cycle");
                }
            }
        }

        let cutoff = back_from(now, self.settings.push_window);
        let mut rewrites: Vec<(String, AttendanceEntry)> = Vec::new();
        for entry in data
            .attendance
            .iter()
            .filter(|e| !e.is_synced() && e.timestamp >= cutoff)
        {
            if let Some(grace) = self.settings.push_grace
                && now - entry.timestamp < span(grace)
            {
                report.deferred += 1;
                continue;
            }

            let mut outgoing = entry.clone();
            if outgoing.student_uuid.is_none()
                && let Some(p) = pushed
                    .iter()
                    .find(|p| p.after.student_id == outgoing.student_id && p.after.is_synced())
            {
                outgoing.student_uuid = Some(p.after.id.clone());
            }

            match self.push_attendance(&outgoing).await {
                Ok((stored, matched)) => {
                    if matched {
                        report.attendance_matched += 1;
                    } else {
                        report.attendance_inserted += 1;
                    }
                    debug!(
                        student_id = %entry.student_id,
                        from = %entry.id,
                        to = %stored.id,
                        matched,
                        "attendance pushed"
                    );
                    rewrites.push((entry.id.clone(), adopt_remote(&outgoing, stored)));
                }
                Err(e) => {
                    report.failures += 1;
                    warn!(student_id = %entry.student_id, id = %entry.id, error = %e, "attendance push failed, retrying next cycle");
                }
            }
        }

        if !report.changed() {
            return Ok(report);
        }

        let mut patch = OfflinePatch::new()
            .remove_attendance(rewrites.iter().map(|(old, _)| old.clone()))
            .upsert_attendance(rewrites.into_iter().map(|(_, entry)| entry));
        if !pushed.is_empty() {
            // Re-read so edits made while the pass was talking to the
            // backend are not overwritten.
            let fresh = self.storage.load().await?;
            patch = patch.with_students(rebase_students(fresh.students, &pushed));
        }
        self.storage.save(&patch).await?;

        info!(
            students_created = report.students_created,
            students_updated = report.students_updated,
            attendance_inserted = report.attendance_inserted,
            attendance_matched = report.attendance_matched,
            failures = report.failures,
            "push pass complete"
        );
        Ok(report)
    }

    /// Insert an entry unless the backend already holds the same event.
    async fn push_attendance(
        &self,
        entry: &AttendanceEntry,
    ) -> Result<(AttendanceEntry, bool), LecternError> {
        let probe = AttendanceProbe::for_entry(entry, self.settings.match_tolerance);
        if let Some(found) = self.remote.find_matching_attendance(&probe).await? {
            return Ok((found, true));
        }
        let stored = self.remote.insert_attendance(entry).await?;
        Ok((stored, false))
    }

    /// Fetch remote state and merge it with local-only records.
    ///
    /// The first pull on an envelope without the bootstrap flag requests the
    /// whole attendance history; later pulls request the rolling window. Any
    /// network failure returns before local state is touched.
    pub async fn pull_pass(&self) -> Result<PullReport, LecternError> {
        let bootstrap = !self.storage.load().await?.full_sync_completed;
        let since = (!bootstrap).then(|| back_from(self.clock.now(), self.settings.pull_window));
        if bootstrap {
            info!("requesting full attendance history");
        }

        let fetched_students = self.remote.fetch_students().await?;
        let fetched = self.remote.fetch_attendance(since).await?;

        let local = self.storage.load().await?;
        let students = overlay_students(fetched_students, &local.students);

        let local_only: Vec<AttendanceEntry> = local
            .attendance
            .iter()
            .filter(|e| !e.is_synced())
            .cloned()
            .collect();
        let merged = merge_fuzzy(&fetched, &local_only, self.settings.match_tolerance);

        let merged_ids: HashSet<&str> = merged.iter().map(|e| e.id.as_str()).collect();
        let touched: Vec<AttendanceEntry> = local
            .attendance
            .iter()
            .filter(|e| !e.is_synced() || merged_ids.contains(e.id.as_str()))
            .cloned()
            .collect();
        let (upserts, removals) = attendance_diff(&touched, &merged);

        let report = PullReport {
            bootstrap,
            students: students.len(),
            attendance_fetched: fetched.len(),
            local_only_kept: local_only.len().saturating_sub(removals.len()),
            superseded: removals.len(),
        };

        let patch = OfflinePatch::new()
            .with_students(students)
            .remove_attendance(removals)
            .upsert_attendance(upserts)
            .with_last_sync(self.clock.now())
            .with_full_sync_completed(true);
        self.storage.save(&patch).await?;

        info!(
            bootstrap,
            students = report.students,
            fetched = report.attendance_fetched,
            superseded = report.superseded,
            "pull pass complete"
        );
        Ok(report)
    }
}

fn skipped(trigger: SyncTrigger, reason: SkipReason) -> SyncOutcome {
    debug!(trigger = %trigger, reason = %reason, "sync cycle skipped");
    SyncOutcome::Skipped { reason }
}

/// Apply pushed students onto the current registry.
///
/// A record edited again while it was in flight keeps the edit, takes the
/// assigned id, and stays dirty for the next cycle.
fn rebase_students(current: Vec<Student>, pushed: &[Pushed]) -> Vec<Student> {
    let by_id: HashMap<&str, &Pushed> = pushed.iter().map(|p| (p.before.id.as_str(), p)).collect();
    current
        .into_iter()
        .map(|student| match by_id.get(student.id.as_str()) {
            Some(p) if student == p.before => p.after.clone().keep_local_fields(&student),
            Some(p) => Student {
                id: p.after.id.clone(),
                dirty: true,
                ..student
            },
            None => student,
        })
        .collect()
}

/// Fetched registry with unpushed local edits laid over it, plus local-only
/// students whose business key the backend does not already hold.
fn overlay_students(fetched: Vec<Student>, local: &[Student]) -> Vec<Student> {
    let held: HashMap<&str, &Student> = local
        .iter()
        .filter(|s| s.is_synced())
        .map(|s| (s.id.as_str(), s))
        .collect();

    let mut out: Vec<Student> = fetched
        .into_iter()
        .map(|s| match held.get(s.id.as_str()) {
            Some(edited) if edited.dirty => (*edited).clone(),
            Some(held) => s.keep_local_fields(held),
            None => s,
        })
        .collect();

    let known: HashMap<(String, String), usize> = out
        .iter()
        .enumerate()
        .map(|(slot, s)| ((s.library.clone(), s.student_id.clone()), slot))
        .collect();
    for student in local.iter().filter(|s| !s.is_synced()) {
        match known.get(&(student.library.clone(), student.student_id.clone())) {
            Some(&slot) => {
                debug!(student_id = %student.student_id, "local-only student already registered remotely");
                out[slot] = out[slot].clone().keep_local_fields(student);
            }
            None => out.push(student.clone()),
        }
    }
    out
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
