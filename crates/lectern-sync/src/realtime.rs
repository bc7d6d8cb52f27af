// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime Change Ingestor.
//!
//! Notifications are coalesced per (table, row id) and applied together on a
//! single flush. The first pending change arms one deadline for the whole
//! batch; later changes join the batch without moving it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use lectern_core::{
    Change, ChangeEvent, LecternError, OfflineData, OfflinePatch, Student, Table,
    attendance_diff,
};
use lectern_storage::StorageManager;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::merge::{Fold, dedup_exact, fold_into};

/// Called after every successful flush with the refreshed envelope.
pub type RefreshCallback = Arc<dyn Fn(&OfflineData) + Send + Sync>;

#[derive(Default)]
struct PendingBatch {
    order: Vec<(Table, String)>,
    changes: HashMap<(Table, String), ChangeEvent>,
    deadline: Option<Instant>,
}

impl PendingBatch {
    fn push(&mut self, event: ChangeEvent) {
        let key = (event.table(), event.entity_id().to_string());
        if self.changes.insert(key.clone(), event).is_none() {
            self.order.push(key);
        }
    }

    fn drain(mut self) -> Vec<ChangeEvent> {
        self.order
            .iter()
            .filter_map(|key| self.changes.remove(key))
            .collect()
    }
}

pub struct RealtimeIngestor {
    storage: Arc<StorageManager>,
    flush_delay: Duration,
    tolerance: Duration,
    pending: Mutex<PendingBatch>,
    on_refresh: Option<RefreshCallback>,
}

impl RealtimeIngestor {
    pub fn new(storage: Arc<StorageManager>, flush_delay: Duration, tolerance: Duration) -> Self {
        Self {
            storage,
            flush_delay,
            tolerance,
            pending: Mutex::new(PendingBatch::default()),
            on_refresh: None,
        }
    }

    pub fn with_refresh(mut self, callback: RefreshCallback) -> Self {
        self.on_refresh = Some(callback);
        self
    }

    /// Queue a change. Returns the deadline of the batch it joined.
    pub async fn enqueue(&self, event: ChangeEvent) -> Instant {
        debug!(table = %event.table(), kind = event.kind(), id = event.entity_id(), "change queued");
        let mut batch = self.pending.lock().await;
        batch.push(event);
        *batch
            .deadline
            .get_or_insert_with(|| Instant::now() + self.flush_delay)
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.order.len()
    }

    /// When the current batch is due, if one is pending.
    pub async fn next_deadline(&self) -> Option<Instant> {
        self.pending.lock().await.deadline
    }

    /// Apply every pending change and persist once.
    ///
    /// Returns the number of changes applied. On a storage failure the batch
    /// is put back so the next flush retries it.
    pub async fn flush(&self) -> Result<usize, LecternError> {
        let batch = std::mem::take(&mut *self.pending.lock().await);
        let events = batch.drain();
        if events.is_empty() {
            return Ok(0);
        }

        match self.apply(&events).await {
            Ok(data) => {
                info!(applied = events.len(), "realtime batch applied");
                if let Some(callback) = &self.on_refresh {
                    callback(&data);
                }
                Ok(events.len())
            }
            Err(e) => {
                warn!(error = %e, pending = events.len(), "realtime batch failed, will retry");
                self.restore(events).await;
                Err(e)
            }
        }
    }

    async fn apply(&self, events: &[ChangeEvent]) -> Result<OfflineData, LecternError> {
        let mut data = self.storage.load().await?;
        let students_before = data.students.clone();
        let attendance_before = data.attendance.clone();

        for event in events {
            match event {
                ChangeEvent::Student(change) => apply_student(&mut data.students, change),
                ChangeEvent::Attendance(Change::Insert(entry) | Change::Update(entry)) => {
                    let fold = fold_into(&mut data.attendance, entry.clone(), self.tolerance);
                    if let Fold::Replaced(old) = &fold
                        && old.id != entry.id
                    {
                        debug!(from = %old.id, to = %entry.id, "local copy superseded by feed");
                    }
                }
                ChangeEvent::Attendance(Change::Delete { id }) => {
                    data.attendance.retain(|e| &e.id != id);
                }
            }
        }
        data.attendance = dedup_exact(&data.attendance);

        let (upserts, removals) = attendance_diff(&attendance_before, &data.attendance);
        let mut patch = OfflinePatch::new()
            .remove_attendance(removals)
            .upsert_attendance(upserts);
        if data.students != students_before {
            patch = patch.with_students(data.students.clone());
        }
        self.storage.save(&patch).await?;
        Ok(data)
    }

    /// Put failed changes back unless a newer change for the same row arrived.
    async fn restore(&self, events: Vec<ChangeEvent>) {
        let mut batch = self.pending.lock().await;
        for event in events {
            let key = (event.table(), event.entity_id().to_string());
            if !batch.changes.contains_key(&key) {
                batch.changes.insert(key.clone(), event);
                batch.order.push(key);
            }
        }
        if batch.deadline.is_none() {
            batch.deadline = Some(Instant::now() + self.flush_delay);
        }
    }
}

fn apply_student(students: &mut Vec<Student>, change: &Change<Student>) {
    match change {
        Change::Insert(incoming) | Change::Update(incoming) => {
            match students.iter_mut().find(|s| s.id == incoming.id) {
                Some(held) if held.dirty => {
                    debug!(id = %held.id, "keeping unpushed local edit over feed update");
                }
                Some(held) => *held = incoming.clone().keep_local_fields(held),
                None => students.push(incoming.clone()),
            }
        }
        Change::Delete { id } => students.retain(|s| &s.id != id),
    }
}
