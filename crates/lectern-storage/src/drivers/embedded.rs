// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded transactional object-store driver.
//!
//! Persists students, attendance, and metadata as JSON objects in three named
//! stores. Loads return only the most recent attendance window to bound
//! memory; saves replace rows that share a composite key with an incoming one.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lectern_core::envelope::{collapse_by_composite_key, sort_newest_first};
use lectern_core::{
    AttendanceEntry, Clock, LecternError, OfflineData, OfflinePatch, StorageDriver, Student,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

pub const DRIVER_NAME: &str = "embedded";

pub const STUDENTS_STORE: &str = "students";
pub const ATTENDANCE_STORE: &str = "attendance";
pub const META_STORE: &str = "meta";

/// One write inside an atomic [`ObjectStore::commit`].
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectOp {
    Put {
        store: String,
        key: String,
        value: Value,
    },
    Delete {
        store: String,
        key: String,
    },
    Clear {
        store: String,
    },
}

/// A named-store, key-to-JSON facility with atomic multi-store commits.
///
/// Hosts with a browser-grade embedded database implement this over it; the
/// native build ships [`MemoryObjectStore`].
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Whether the facility is present in this host.
    async fn is_present(&self) -> bool;

    async fn get(&self, store: &str, key: &str) -> Result<Option<Value>, LecternError>;

    async fn get_all(&self, store: &str) -> Result<Vec<Value>, LecternError>;

    /// Objects whose top-level `field` equals `value`.
    async fn get_by_index(
        &self,
        store: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Value>, LecternError> {
        Ok(self
            .get_all(store)
            .await?
            .into_iter()
            .filter(|v| v.get(field) == Some(value))
            .collect())
    }

    /// Apply every operation or none.
    async fn commit(&self, ops: Vec<ObjectOp>) -> Result<(), LecternError>;
}

/// In-process object store.
#[derive(Debug)]
pub struct MemoryObjectStore {
    present: bool,
    stores: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            present: true,
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// A store that reports itself absent.
    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::new()
        }
    }

    /// Number of objects in a store.
    pub async fn len(&self, store: &str) -> usize {
        self.stores.read().await.get(store).map_or(0, BTreeMap::len)
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn is_present(&self) -> bool {
        self.present
    }

    async fn get(&self, store: &str, key: &str) -> Result<Option<Value>, LecternError> {
        Ok(self
            .stores
            .read()
            .await
            .get(store)
            .and_then(|s| s.get(key))
            .cloned())
    }

    async fn get_all(&self, store: &str) -> Result<Vec<Value>, LecternError> {
        Ok(self
            .stores
            .read()
            .await
            .get(store)
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn commit(&self, ops: Vec<ObjectOp>) -> Result<(), LecternError> {
        if !self.present {
            return Err(LecternError::Unavailable {
                driver: DRIVER_NAME.into(),
                reason: "object store is not present".into(),
            });
        }
        let mut stores = self.stores.write().await;
        for op in ops {
            match op {
                ObjectOp::Put { store, key, value } => {
                    stores.entry(store).or_default().insert(key, value);
                }
                ObjectOp::Delete { store, key } => {
                    if let Some(s) = stores.get_mut(&store) {
                        s.remove(&key);
                    }
                }
                ObjectOp::Clear { store } => {
                    stores.remove(&store);
                }
            }
        }
        Ok(())
    }
}

/// Persistence driver over an [`ObjectStore`].
pub struct EmbeddedDriver {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl EmbeddedDriver {
    pub fn new(store: Arc<dyn ObjectStore>, clock: Arc<dyn Clock>, window_days: u32) -> Self {
        Self {
            store,
            clock,
            window: Duration::days(i64::from(window_days)),
        }
    }

    async fn ensure_present(&self) -> Result<(), LecternError> {
        if self.store.is_present().await {
            Ok(())
        } else {
            Err(LecternError::Unavailable {
                driver: DRIVER_NAME.into(),
                reason: "no embedded object store in this host".into(),
            })
        }
    }

    async fn meta<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, LecternError> {
        self.store
            .get(META_STORE, key)
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(LecternError::storage)
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, LecternError> {
    serde_json::to_value(value).map_err(LecternError::storage)
}

fn from_values<T: DeserializeOwned>(values: Vec<Value>) -> Result<Vec<T>, LecternError> {
    values
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<_, _>>()
        .map_err(LecternError::storage)
}

fn put(store: &str, key: &str, value: Value) -> ObjectOp {
    ObjectOp::Put {
        store: store.into(),
        key: key.into(),
        value,
    }
}

#[async_trait]
impl StorageDriver for EmbeddedDriver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    async fn is_available(&self) -> bool {
        self.store.is_present().await
    }

    async fn load(&self) -> Result<OfflineData, LecternError> {
        self.ensure_present().await?;

        let students: Vec<Student> = from_values(self.store.get_all(STUDENTS_STORE).await?)?;
        let cutoff = self.clock.now() - self.window;
        let mut attendance: Vec<AttendanceEntry> =
            from_values(self.store.get_all(ATTENDANCE_STORE).await?)?;
        attendance.retain(|e| e.timestamp >= cutoff);
        sort_newest_first(&mut attendance);

        let data = OfflineData {
            students,
            attendance,
            documents: self.meta("documents").await?.unwrap_or_default(),
            last_sync: self.meta::<DateTime<Utc>>("lastSync").await?,
            full_sync_completed: self.meta("fullSyncCompleted").await?.unwrap_or(false),
        };
        debug!(
            students = data.students.len(),
            attendance = data.attendance.len(),
            "embedded load"
        );
        Ok(data)
    }

    async fn save(&self, patch: &OfflinePatch) -> Result<(), LecternError> {
        if patch.is_empty() {
            return Ok(());
        }
        self.ensure_present().await?;
        let mut ops = Vec::new();

        if let Some(students) = &patch.students {
            ops.push(ObjectOp::Clear {
                store: STUDENTS_STORE.into(),
            });
            for student in students {
                ops.push(put(STUDENTS_STORE, &student.id, to_value(student)?));
            }
        }

        for id in &patch.attendance_removals {
            ops.push(ObjectOp::Delete {
                store: ATTENDANCE_STORE.into(),
                key: id.clone(),
            });
        }

        for entry in collapse_by_composite_key(&patch.attendance_upserts) {
            let key = entry.composite_key();
            let same_student = self
                .store
                .get_by_index(
                    ATTENDANCE_STORE,
                    "studentId",
                    &Value::from(entry.student_id.clone()),
                )
                .await?;
            for existing in from_values::<AttendanceEntry>(same_student)? {
                if existing.id != entry.id && existing.composite_key() == key {
                    ops.push(ObjectOp::Delete {
                        store: ATTENDANCE_STORE.into(),
                        key: existing.id,
                    });
                }
            }
            ops.push(put(ATTENDANCE_STORE, &entry.id, to_value(&entry)?));
        }

        if let Some(documents) = &patch.documents {
            ops.push(put(META_STORE, "documents", to_value(documents)?));
        }
        if let Some(at) = patch.last_sync {
            ops.push(put(META_STORE, "lastSync", to_value(&at)?));
        }
        if let Some(done) = patch.full_sync_completed {
            ops.push(put(META_STORE, "fullSyncCompleted", Value::Bool(done)));
        }

        let count = ops.len();
        self.store.commit(ops).await?;
        debug!(ops = count, "embedded save");
        Ok(())
    }

    async fn clear(&self) -> Result<(), LecternError> {
        self.ensure_present().await?;
        self.store
            .commit(
                [STUDENTS_STORE, ATTENDANCE_STORE, META_STORE]
                    .into_iter()
                    .map(|store| ObjectOp::Clear {
                        store: store.into(),
                    })
                    .collect(),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use lectern_core::{CaptureMethod, Direction};
    use lectern_test_utils::ManualClock;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap()
    }

    fn driver() -> (EmbeddedDriver, Arc<MemoryObjectStore>) {
        let store = Arc::new(MemoryObjectStore::new());
        let clock = Arc::new(ManualClock::new(now()));
        (EmbeddedDriver::new(store.clone(), clock, 30), store)
    }

    fn entry(id: &str, key: &str, at: DateTime<Utc>) -> AttendanceEntry {
        AttendanceEntry {
            id: id.into(),
            student_uuid: None,
            student_id: key.into(),
            student_name: key.into(),
            timestamp: at,
            direction: Direction::CheckIn,
            method: CaptureMethod::Manual,
            purpose: None,
            contact: None,
            library: "main".into(),
            course: None,
            year: None,
            level: None,
            strand: None,
        }
    }

    #[tokio::test]
    async fn load_returns_only_the_recent_window() {
        let (driver, store) = driver();
        let patch = OfflinePatch::new().upsert_attendance([
            entry("recent", "S1", now() - Duration::days(2)),
            entry("old", "S1", now() - Duration::days(45)),
        ]);
        driver.save(&patch).await.unwrap();

        let data = driver.load().await.unwrap();
        assert_eq!(data.attendance.len(), 1);
        assert_eq!(data.attendance[0].id, "recent");
        assert_eq!(store.len(ATTENDANCE_STORE).await, 2);
    }

    #[tokio::test]
    async fn save_replaces_rows_with_same_composite_key() {
        let (driver, store) = driver();
        let at = now() - Duration::hours(1);
        driver
            .save(&OfflinePatch::new().upsert_attendance([entry("local-x", "S1", at)]))
            .await
            .unwrap();
        driver
            .save(&OfflinePatch::new().upsert_attendance([entry("remote-x", "S1", at)]))
            .await
            .unwrap();

        assert_eq!(store.len(ATTENDANCE_STORE).await, 1);
        assert_eq!(driver.load().await.unwrap().attendance[0].id, "remote-x");
    }

    #[tokio::test]
    async fn metadata_round_trips() {
        let (driver, _) = driver();
        driver
            .save(
                &OfflinePatch::new()
                    .with_last_sync(now())
                    .with_full_sync_completed(true),
            )
            .await
            .unwrap();
        let data = driver.load().await.unwrap();
        assert_eq!(data.last_sync, Some(now()));
        assert!(data.full_sync_completed);

        driver.clear().await.unwrap();
        assert_eq!(driver.load().await.unwrap(), OfflineData::default());
    }

    #[tokio::test]
    async fn absent_store_reports_unavailable() {
        let driver = EmbeddedDriver::new(
            Arc::new(MemoryObjectStore::absent()),
            Arc::new(ManualClock::new(now())),
            30,
        );
        assert!(!driver.is_available().await);
        assert!(matches!(
            driver.load().await,
            Err(LecternError::Unavailable { .. })
        ));
    }
}
