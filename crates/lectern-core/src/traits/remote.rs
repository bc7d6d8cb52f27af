// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote row API contract.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::LecternError;
use crate::types::{AttendanceEntry, Direction, Student};

/// Lookup for an already-synced copy of a local attendance event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceProbe {
    pub student_id: String,
    /// Used instead of the business key when it is a valid remote id.
    pub student_uuid: Option<String>,
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
    pub tolerance: Duration,
}

impl AttendanceProbe {
    pub fn for_entry(entry: &AttendanceEntry, tolerance: Duration) -> Self {
        Self {
            student_id: entry.student_id.clone(),
            student_uuid: entry
                .student_uuid
                .clone()
                .filter(|id| crate::ids::is_remote_id(id)),
            direction: entry.direction,
            timestamp: entry.timestamp,
            tolerance,
        }
    }

    /// Inclusive lower and upper bounds of the match window.
    pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let tol = chrono::Duration::from_std(self.tolerance).unwrap_or(chrono::Duration::zero());
        (self.timestamp - tol, self.timestamp + tol)
    }
}

/// The remote relational backend holding the authoritative tables.
#[async_trait]
pub trait RemoteBackend: Send + Sync + 'static {
    /// Cheap reachability check used by connectivity polling.
    async fn ping(&self) -> Result<(), LecternError>;

    /// The whole student registry.
    async fn fetch_students(&self) -> Result<Vec<Student>, LecternError>;

    /// Attendance newer than `since`, or the entire history when `None`.
    async fn fetch_attendance(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AttendanceEntry>, LecternError>;

    /// Create a student; returns the stored row with its assigned id.
    async fn insert_student(&self, student: &Student) -> Result<Student, LecternError>;

    /// Update an existing student by id.
    async fn update_student(&self, student: &Student) -> Result<Student, LecternError>;

    /// Create an attendance event; returns the stored row with its assigned id.
    async fn insert_attendance(
        &self,
        entry: &AttendanceEntry,
    ) -> Result<AttendanceEntry, LecternError>;

    /// Find a stored event matching the probe, if one exists.
    async fn find_matching_attendance(
        &self,
        probe: &AttendanceProbe,
    ) -> Result<Option<AttendanceEntry>, LecternError>;
}
