// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory remote backend for deterministic sync tests.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lectern_core::{AttendanceEntry, AttendanceProbe, LecternError, RemoteBackend, Student};

/// One call made against the mock, in order of arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Ping,
    FetchStudents,
    FetchAttendance { since: Option<DateTime<Utc>> },
    InsertStudent { student_id: String },
    UpdateStudent { id: String },
    InsertAttendance { student_id: String },
    FindMatchingAttendance { student_id: String },
}

#[derive(Default)]
struct State {
    students: Vec<Student>,
    attendance: Vec<AttendanceEntry>,
    next_ids: VecDeque<String>,
    failing_keys: HashSet<String>,
    calls: Vec<RemoteCall>,
    latency: Option<Duration>,
}

/// A remote backend holding both tables in memory.
///
/// Inserts assign UUIDs (or the ids queued with [`MockRemote::queue_ids`]).
/// While offline every call fails with a remote error.
#[derive(Default)]
pub struct MockRemote {
    state: Mutex<State>,
    offline: AtomicBool,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Ids handed out by the next inserts, in order.
    pub fn queue_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .lock()
            .unwrap()
            .next_ids
            .extend(ids.into_iter().map(Into::into));
    }

    /// Make inserts for this business key fail.
    pub fn fail_inserts_for(&self, student_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_keys
            .insert(student_id.to_string());
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().unwrap().latency = Some(latency);
    }

    pub fn seed_student(&self, student: Student) {
        self.state.lock().unwrap().students.push(as_stored(student));
    }

    pub fn seed_attendance(&self, entry: AttendanceEntry) {
        self.state.lock().unwrap().attendance.push(entry);
    }

    pub fn students(&self) -> Vec<Student> {
        self.state.lock().unwrap().students.clone()
    }

    pub fn attendance(&self) -> Vec<AttendanceEntry> {
        self.state.lock().unwrap().attendance.clone()
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Number of insert calls of either table.
    pub fn insert_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    RemoteCall::InsertStudent { .. } | RemoteCall::InsertAttendance { .. }
                )
            })
            .count()
    }

    async fn enter(&self, call: RemoteCall) -> Result<(), LecternError> {
        let latency = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(LecternError::Remote {
                message: "network unreachable".into(),
                source: None,
            });
        }
        Ok(())
    }

    fn next_id(state: &mut State) -> String {
        state
            .next_ids
            .pop_front()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

/// A student as the backend keeps it: no device-only fields, never dirty.
fn as_stored(student: Student) -> Student {
    Student {
        biometric_template: None,
        dirty: false,
        ..student
    }
}

#[async_trait]
impl RemoteBackend for MockRemote {
    async fn ping(&self) -> Result<(), LecternError> {
        self.enter(RemoteCall::Ping).await
    }

    async fn fetch_students(&self) -> Result<Vec<Student>, LecternError> {
        self.enter(RemoteCall::FetchStudents).await?;
        Ok(self.students())
    }

    async fn fetch_attendance(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AttendanceEntry>, LecternError> {
        self.enter(RemoteCall::FetchAttendance { since }).await?;
        let mut rows: Vec<AttendanceEntry> = self
            .attendance()
            .into_iter()
            .filter(|e| since.is_none_or(|s| e.timestamp >= s))
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(rows)
    }

    async fn insert_student(&self, student: &Student) -> Result<Student, LecternError> {
        self.enter(RemoteCall::InsertStudent {
            student_id: student.student_id.clone(),
        })
        .await?;
        let mut state = self.state.lock().unwrap();
        if state.failing_keys.contains(&student.student_id) {
            return Err(LecternError::Remote {
                message: format!("insert rejected for {}", student.student_id),
                source: None,
            });
        }
        let stored = Student {
            id: Self::next_id(&mut state),
            ..as_stored(student.clone())
        };
        state.students.push(stored.clone());
        Ok(stored)
    }

    async fn update_student(&self, student: &Student) -> Result<Student, LecternError> {
        self.enter(RemoteCall::UpdateStudent {
            id: student.id.clone(),
        })
        .await?;
        let mut state = self.state.lock().unwrap();
        let stored = as_stored(student.clone());
        match state.students.iter_mut().find(|s| s.id == student.id) {
            Some(slot) => *slot = stored.clone(),
            None => {
                return Err(LecternError::Remote {
                    message: format!("no student with id {}", student.id),
                    source: None,
                });
            }
        }
        Ok(stored)
    }

    async fn insert_attendance(
        &self,
        entry: &AttendanceEntry,
    ) -> Result<AttendanceEntry, LecternError> {
        self.enter(RemoteCall::InsertAttendance {
            student_id: entry.student_id.clone(),
        })
        .await?;
        let mut state = self.state.lock().unwrap();
        if state.failing_keys.contains(&entry.student_id) {
            return Err(LecternError::Remote {
                message: format!("insert rejected for {}", entry.student_id),
                source: None,
            });
        }
        let stored = AttendanceEntry {
            id: Self::next_id(&mut state),
            ..entry.clone()
        };
        state.attendance.push(stored.clone());
        Ok(stored)
    }

    async fn find_matching_attendance(
        &self,
        probe: &AttendanceProbe,
    ) -> Result<Option<AttendanceEntry>, LecternError> {
        self.enter(RemoteCall::FindMatchingAttendance {
            student_id: probe.student_id.clone(),
        })
        .await?;
        let (from, to) = probe.window();
        Ok(self.attendance().into_iter().find(|e| {
            let same_owner = match &probe.student_uuid {
                Some(uuid) => e.student_uuid.as_deref() == Some(uuid.as_str()),
                None => e.student_id == probe.student_id,
            };
            same_owner && e.direction == probe.direction && e.timestamp >= from && e.timestamp <= to
        }))
    }
}
