// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The offline envelope persisted by the storage manager, and the partial
//! write ([`OfflinePatch`]) every driver accepts.
//!
//! Attendance is never overwritten wholesale. A patch carries upserts keyed by
//! the composite key (business key, timestamp, direction) and an explicit list
//! of identifiers to drop, so concurrent writers that each persist only what
//! they changed cannot erase each other's events.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AttendanceEntry, CompositeKey, DocumentLink, Student};

/// Everything held locally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineData {
    #[serde(default)]
    pub students: Vec<Student>,
    /// Newest first.
    #[serde(default)]
    pub attendance: Vec<AttendanceEntry>,
    #[serde(default)]
    pub documents: Vec<DocumentLink>,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    /// Set once the one-time full-history download has completed.
    #[serde(default)]
    pub full_sync_completed: bool,
}

impl OfflineData {
    /// Apply a partial write in place.
    ///
    /// Removals are applied first, then upserts. An upsert replaces any stored
    /// entry with the same identifier or the same composite key.
    pub fn apply(&mut self, patch: &OfflinePatch) {
        if let Some(students) = &patch.students {
            self.students = students.clone();
        }

        if !patch.attendance_removals.is_empty() || !patch.attendance_upserts.is_empty() {
            let upserts = collapse_by_composite_key(&patch.attendance_upserts);
            let removed: HashSet<&str> = patch
                .attendance_removals
                .iter()
                .map(String::as_str)
                .chain(upserts.iter().map(|e| e.id.as_str()))
                .collect();
            let replaced: HashSet<CompositeKey> =
                upserts.iter().map(AttendanceEntry::composite_key).collect();

            self.attendance.retain(|e| {
                !removed.contains(e.id.as_str()) && !replaced.contains(&e.composite_key())
            });
            self.attendance.extend(upserts);
            sort_newest_first(&mut self.attendance);
        }

        if let Some(documents) = &patch.documents {
            self.documents = documents.clone();
        }
        if let Some(last_sync) = patch.last_sync {
            self.last_sync = Some(last_sync);
        }
        if let Some(done) = patch.full_sync_completed {
            self.full_sync_completed = done;
        }
    }

    /// Number of students and attendance entries still carrying placeholders.
    pub fn pending_push_count(&self) -> usize {
        self.students.iter().filter(|s| !s.is_synced() || s.dirty).count()
            + self.attendance.iter().filter(|e| !e.is_synced()).count()
    }
}

/// A partial write of the offline envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfflinePatch {
    /// Replaces the student registry when present.
    pub students: Option<Vec<Student>>,
    /// Attendance entries to insert or replace.
    pub attendance_upserts: Vec<AttendanceEntry>,
    /// Attendance identifiers to delete.
    pub attendance_removals: Vec<String>,
    pub documents: Option<Vec<DocumentLink>>,
    pub last_sync: Option<DateTime<Utc>>,
    pub full_sync_completed: Option<bool>,
}

impl OfflinePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// A patch that writes an entire envelope.
    pub fn full(data: OfflineData) -> Self {
        Self {
            students: Some(data.students),
            attendance_upserts: data.attendance,
            attendance_removals: Vec::new(),
            documents: Some(data.documents),
            last_sync: data.last_sync,
            full_sync_completed: Some(data.full_sync_completed),
        }
    }

    pub fn with_students(mut self, students: Vec<Student>) -> Self {
        self.students = Some(students);
        self
    }

    pub fn upsert_attendance(mut self, entries: impl IntoIterator<Item = AttendanceEntry>) -> Self {
        self.attendance_upserts.extend(entries);
        self
    }

    pub fn remove_attendance(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.attendance_removals.extend(ids);
        self
    }

    pub fn with_documents(mut self, documents: Vec<DocumentLink>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn with_last_sync(mut self, at: DateTime<Utc>) -> Self {
        self.last_sync = Some(at);
        self
    }

    pub fn with_full_sync_completed(mut self, done: bool) -> Self {
        self.full_sync_completed = Some(done);
        self
    }

    /// True if applying this patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.students.is_none()
            && self.attendance_upserts.is_empty()
            && self.attendance_removals.is_empty()
            && self.documents.is_none()
            && self.last_sync.is_none()
            && self.full_sync_completed.is_none()
    }
}

/// Compute the upserts and removals that turn `before` into `after`.
///
/// Entries whose content is unchanged are not re-written.
pub fn attendance_diff(
    before: &[AttendanceEntry],
    after: &[AttendanceEntry],
) -> (Vec<AttendanceEntry>, Vec<String>) {
    let before_by_id: HashMap<&str, &AttendanceEntry> =
        before.iter().map(|e| (e.id.as_str(), e)).collect();
    let after_ids: HashSet<&str> = after.iter().map(|e| e.id.as_str()).collect();

    let upserts = after
        .iter()
        .filter(|e| before_by_id.get(e.id.as_str()) != Some(e))
        .cloned()
        .collect();
    let removals = before
        .iter()
        .filter(|e| !after_ids.contains(e.id.as_str()))
        .map(|e| e.id.clone())
        .collect();
    (upserts, removals)
}

/// Collapse entries sharing an identifier or composite key; the later one wins.
pub fn collapse_by_composite_key(entries: &[AttendanceEntry]) -> Vec<AttendanceEntry> {
    let mut slots: Vec<Option<AttendanceEntry>> = Vec::with_capacity(entries.len());
    let mut by_key: HashMap<CompositeKey, usize> = HashMap::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let key = entry.composite_key();
        if let Some(&old) = by_key.get(&key) {
            slots[old] = None;
        }
        if let Some(&old) = by_id.get(&entry.id) {
            slots[old] = None;
        }
        let slot = slots.len();
        by_key.insert(key, slot);
        by_id.insert(entry.id.clone(), slot);
        slots.push(Some(entry.clone()));
    }

    slots.into_iter().flatten().collect()
}

/// Sort attendance newest first; ties keep their relative order.
pub fn sort_newest_first(entries: &mut [AttendanceEntry]) {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
