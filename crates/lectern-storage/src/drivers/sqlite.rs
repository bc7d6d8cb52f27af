// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed relational driver.
//!
//! The database is lazily opened on first use. Sensitive columns are sealed
//! through [`FieldCipher`] when one is configured; rows written without a
//! cipher stay readable so a store can hold a mix of both during migration.

use std::path::Path;

use async_trait::async_trait;
use lectern_config::model::{HostKind, StorageConfig};
use lectern_core::envelope::collapse_by_composite_key;
use lectern_core::{LecternError, OfflineData, OfflinePatch, StorageDriver, Student};
use rusqlite::{OptionalExtension, params};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::crypto::FieldCipher;
use crate::database::{Database, DatabaseOptions, map_tr_err};
use crate::rows::{
    ATTENDANCE_COLUMNS, AttendanceRecord, STUDENT_COLUMNS, StudentRecord, attendance_from_record,
    attendance_to_record, parse_timestamp, student_from_record, student_to_record,
};

pub const DRIVER_NAME: &str = "sqlite";

pub const META_LAST_SYNC: &str = "lastSync";
pub const META_FULL_SYNC_COMPLETED: &str = "fullSyncCompleted";
pub const META_KEY_REF: &str = "keyRef";
pub const META_DOCUMENTS: &str = "documents";

/// SQLite-backed persistence driver.
pub struct SqliteDriver {
    path: String,
    options: DatabaseOptions,
    filesystem_access: bool,
    cipher: Option<FieldCipher>,
    db: OnceCell<Database>,
}

impl SqliteDriver {
    /// Create a driver for the database file at `path`.
    ///
    /// The file is not opened until the first load or save.
    pub fn new(path: impl Into<String>, options: DatabaseOptions) -> Self {
        Self {
            path: path.into(),
            options,
            filesystem_access: true,
            cipher: None,
            db: OnceCell::new(),
        }
    }

    pub fn from_config(config: &StorageConfig, host: HostKind) -> Self {
        Self::new(
            config.database_path.clone(),
            DatabaseOptions {
                wal_mode: config.wal_mode,
                busy_timeout_ms: config.busy_timeout_ms,
            },
        )
        .with_filesystem_access(host == HostKind::Desktop || host == HostKind::Headless)
    }

    /// Seal sensitive columns with this cipher on every write.
    pub fn with_cipher(mut self, cipher: FieldCipher) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Whether the host grants direct filesystem access.
    pub fn with_filesystem_access(mut self, allowed: bool) -> Self {
        self.filesystem_access = allowed;
        self
    }

    pub fn is_encrypting(&self) -> bool {
        self.cipher.is_some()
    }

    async fn db(&self) -> Result<&Database, LecternError> {
        if !self.filesystem_access {
            return Err(LecternError::Unavailable {
                driver: DRIVER_NAME.into(),
                reason: "host has no direct filesystem access".into(),
            });
        }
        self.db
            .get_or_try_init(|| async {
                let db = Database::open(&self.path, &self.options).await?;
                self.check_key_ref(&db).await?;
                debug!(path = %self.path, encrypted = self.cipher.is_some(), "sqlite driver initialized");
                Ok(db)
            })
            .await
    }

    /// Record the key reference on first use and reject a different key later.
    async fn check_key_ref(&self, db: &Database) -> Result<(), LecternError> {
        let Some(cipher) = &self.cipher else {
            return Ok(());
        };
        let key_ref = cipher.key_ref();
        let stored = db
            .connection()
            .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
                let existing: Option<String> = conn
                    .query_row(
                        "SELECT value FROM meta WHERE key = ?1",
                        params![META_KEY_REF],
                        |row| row.get(0),
                    )
                    .optional()?;
                if existing.is_none() {
                    conn.execute(
                        "INSERT INTO meta (key, value) VALUES (?1, ?2)",
                        params![META_KEY_REF, key_ref],
                    )?;
                }
                Ok(existing)
            })
            .await
            .map_err(map_tr_err)?;

        match stored {
            Some(stored) if stored != cipher.key_ref() => Err(LecternError::Crypto(format!(
                "encryption key does not match the key this database was written with ({stored})"
            ))),
            _ => Ok(()),
        }
    }

    /// Look up a student by RFID tag, using the digest column for sealed rows.
    pub async fn find_student_by_rfid(&self, rfid: &str) -> Result<Option<Student>, LecternError> {
        let db = self.db().await?;
        let plain = rfid.trim().to_string();
        let digest = self.cipher.as_ref().map(|c| c.rfid_digest(&plain));
        let record = db
            .connection()
            .call(move |conn| -> Result<Option<StudentRecord>, rusqlite::Error> {
                conn.query_row(
                    &format!(
                        "SELECT {STUDENT_COLUMNS} FROM students \
                         WHERE rfid_digest = ?1 OR (encrypted = 0 AND rfid = ?2) LIMIT 1"
                    ),
                    params![digest, plain],
                    StudentRecord::from_row,
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)?;
        record
            .map(|r| student_from_record(r, self.cipher.as_ref()))
            .transpose()
    }
}

#[async_trait]
impl StorageDriver for SqliteDriver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    async fn is_available(&self) -> bool {
        if !self.filesystem_access {
            return false;
        }
        if self.path == ":memory:" || self.db.initialized() {
            return true;
        }
        match Path::new(&self.path).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                tokio::fs::create_dir_all(parent).await.is_ok()
            }
            _ => true,
        }
    }

    async fn load(&self) -> Result<OfflineData, LecternError> {
        let db = self.db().await?;
        type Loaded = (Vec<StudentRecord>, Vec<AttendanceRecord>, Vec<(String, String)>);
        let (students, attendance, meta) = db
            .connection()
            .call(|conn| -> Result<Loaded, rusqlite::Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {STUDENT_COLUMNS} FROM students ORDER BY student_id"
                ))?;
                let students = stmt
                    .query_map([], StudentRecord::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;

                let mut stmt = conn.prepare(&format!(
                    "SELECT {ATTENDANCE_COLUMNS} FROM attendance ORDER BY timestamp_ms DESC"
                ))?;
                let attendance = stmt
                    .query_map([], AttendanceRecord::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;

                let mut stmt = conn.prepare("SELECT key, value FROM meta")?;
                let meta = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((students, attendance, meta))
            })
            .await
            .map_err(map_tr_err)?;

        let cipher = self.cipher.as_ref();
        let mut data = OfflineData {
            students: students
                .into_iter()
                .map(|r| student_from_record(r, cipher))
                .collect::<Result<_, _>>()?,
            attendance: attendance
                .into_iter()
                .map(|r| attendance_from_record(r, cipher))
                .collect::<Result<_, _>>()?,
            ..Default::default()
        };

        for (key, value) in meta {
            match key.as_str() {
                META_LAST_SYNC => data.last_sync = Some(parse_timestamp(&value)?),
                META_FULL_SYNC_COMPLETED => data.full_sync_completed = value == "true",
                META_DOCUMENTS => match serde_json::from_str(&value) {
                    Ok(documents) => data.documents = documents,
                    Err(e) => warn!(error = %e, "ignoring unreadable document list"),
                },
                _ => {}
            }
        }

        debug!(
            students = data.students.len(),
            attendance = data.attendance.len(),
            "sqlite load"
        );
        Ok(data)
    }

    async fn save(&self, patch: &OfflinePatch) -> Result<(), LecternError> {
        if patch.is_empty() {
            return Ok(());
        }
        let db = self.db().await?;
        let cipher = self.cipher.as_ref();

        let students = patch
            .students
            .as_ref()
            .map(|list| {
                list.iter()
                    .map(|s| student_to_record(s, cipher))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;
        let upserts = collapse_by_composite_key(&patch.attendance_upserts)
            .iter()
            .map(|e| attendance_to_record(e, cipher))
            .collect::<Result<Vec<_>, _>>()?;
        let removals = patch.attendance_removals.clone();
        let documents = patch
            .documents
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(LecternError::storage)?;
        let last_sync = patch.last_sync.map(|t| t.to_rfc3339());
        let full_sync_completed = patch.full_sync_completed;

        let upserted = upserts.len();
        db.connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                if let Some(students) = &students {
                    tx.execute("DELETE FROM students", [])?;
                    for record in students {
                        record.insert(&tx)?;
                    }
                }
                for id in &removals {
                    tx.execute("DELETE FROM attendance WHERE id = ?1", params![id])?;
                }
                for record in &upserts {
                    record.upsert(&tx)?;
                }

                let set_meta = |key: &str, value: String| {
                    tx.execute(
                        "INSERT INTO meta (key, value) VALUES (?1, ?2) \
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                        params![key, value],
                    )
                    .map(|_| ())
                };
                if let Some(documents) = documents {
                    set_meta(META_DOCUMENTS, documents)?;
                }
                if let Some(at) = last_sync {
                    set_meta(META_LAST_SYNC, at)?;
                }
                if let Some(done) = full_sync_completed {
                    set_meta(META_FULL_SYNC_COMPLETED, done.to_string())?;
                }
                tx.commit()
            })
            .await
            .map_err(map_tr_err)?;

        debug!(upserted, removed = patch.attendance_removals.len(), "sqlite save");
        Ok(())
    }

    async fn clear(&self) -> Result<(), LecternError> {
        let db = self.db().await?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM attendance", [])?;
                tx.execute("DELETE FROM students", [])?;
                tx.execute("DELETE FROM meta WHERE key <> ?1", params![META_KEY_REF])?;
                tx.commit()
            })
            .await
            .map_err(map_tr_err)?;
        debug!("sqlite store cleared");
        Ok(())
    }

    async fn close(&self) -> Result<(), LecternError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use lectern_core::{AttendanceEntry, CaptureMethod, Direction, DocumentLink, Role};

    use super::*;

    fn driver(dir: &tempfile::TempDir) -> SqliteDriver {
        let path = dir.path().join("lectern.db");
        SqliteDriver::new(path.to_str().unwrap(), DatabaseOptions::default())
    }

    fn student(id: &str, key: &str) -> Student {
        Student {
            id: id.into(),
            student_id: key.into(),
            name: format!("Student {key}"),
            email: None,
            phone: Some("0917".into()),
            course: Some("BSCS".into()),
            year: None,
            level: None,
            strand: None,
            library: "main".into(),
            role: Role::Student,
            rfid: Some(format!("RF-{key}")),
            biometric_template: None,
            last_scan: None,
            registered_at: Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap(),
            dirty: false,
        }
    }

    fn entry(id: &str, key: &str, secs: u32) -> AttendanceEntry {
        AttendanceEntry {
            id: id.into(),
            student_uuid: None,
            student_id: key.into(),
            student_name: format!("Student {key}"),
            timestamp: Utc.with_ymd_and_hms(2026, 2, 2, 9, 0, secs).unwrap(),
            direction: Direction::CheckIn,
            method: CaptureMethod::Barcode,
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
    async fn save_then_load_returns_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(&dir);
        assert!(driver.is_available().await);

        let at = Utc.with_ymd_and_hms(2026, 2, 2, 10, 0, 0).unwrap();
        let patch = OfflinePatch::new()
            .with_students(vec![student("local-1", "S1")])
            .upsert_attendance([entry("local-a", "S1", 0), entry("local-b", "S1", 30)])
            .with_documents(vec![DocumentLink {
                id: "d1".into(),
                title: "Handbook".into(),
                url: "https://example.edu/handbook.pdf".into(),
                library: None,
                created_at: None,
            }])
            .with_last_sync(at)
            .with_full_sync_completed(true);
        driver.save(&patch).await.unwrap();

        let data = driver.load().await.unwrap();
        assert_eq!(data.students, vec![student("local-1", "S1")]);
        let ids: Vec<&str> = data.attendance.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["local-b", "local-a"]);
        assert_eq!(data.documents.len(), 1);
        assert_eq!(data.last_sync, Some(at));
        assert!(data.full_sync_completed);
    }

    #[tokio::test]
    async fn composite_key_upsert_rewrites_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(&dir);
        driver
            .save(&OfflinePatch::new().upsert_attendance([entry("local-a", "S1", 0)]))
            .await
            .unwrap();
        let synced = entry("2b9f1c1e-6f1e-4c39-9a59-1a3c4b7d8e90", "S1", 0);
        driver
            .save(&OfflinePatch::new().upsert_attendance([synced.clone()]))
            .await
            .unwrap();

        let data = driver.load().await.unwrap();
        assert_eq!(data.attendance, vec![synced]);
    }

    #[tokio::test]
    async fn partial_save_leaves_other_fields_alone() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(&dir);
        driver
            .save(
                &OfflinePatch::new()
                    .with_students(vec![student("local-1", "S1")])
                    .upsert_attendance([entry("local-a", "S1", 0)]),
            )
            .await
            .unwrap();
        driver
            .save(&OfflinePatch::new().upsert_attendance([entry("local-b", "S2", 5)]))
            .await
            .unwrap();

        let data = driver.load().await.unwrap();
        assert_eq!(data.students.len(), 1);
        assert_eq!(data.attendance.len(), 2);
        assert!(!data.full_sync_completed);
    }

    #[tokio::test]
    async fn encrypted_rows_round_trip_and_rfid_lookup_uses_digest() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(&dir).with_cipher(FieldCipher::new([9u8; 32]));
        driver
            .save(&OfflinePatch::new().with_students(vec![student("local-1", "S1")]))
            .await
            .unwrap();

        let raw_name: String = driver
            .db()
            .await
            .unwrap()
            .connection()
            .call(|conn| -> Result<String, rusqlite::Error> {
                conn.query_row("SELECT name FROM students", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_ne!(raw_name, "Student S1");

        let found = driver.find_student_by_rfid("RF-S1").await.unwrap();
        assert_eq!(found.map(|s| s.student_id), Some("S1".to_string()));
        assert!(driver.find_student_by_rfid("RF-S9").await.unwrap().is_none());
        assert_eq!(driver.load().await.unwrap().students[0].name, "Student S1");
    }

    #[tokio::test]
    async fn mixed_plain_and_sealed_rows_are_readable() {
        let dir = tempfile::tempdir().unwrap();
        let plain = driver(&dir);
        plain
            .save(&OfflinePatch::new().upsert_attendance([entry("local-a", "S1", 0)]))
            .await
            .unwrap();
        plain.close().await.unwrap();
        drop(plain);

        let sealed = driver(&dir).with_cipher(FieldCipher::new([9u8; 32]));
        sealed
            .save(&OfflinePatch::new().upsert_attendance([entry("local-b", "S2", 1)]))
            .await
            .unwrap();
        assert_eq!(sealed.load().await.unwrap().attendance.len(), 2);
    }

    #[tokio::test]
    async fn wrong_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let first = driver(&dir).with_cipher(FieldCipher::new([1u8; 32]));
        first.save(&OfflinePatch::new().with_students(vec![])).await.unwrap();
        first.close().await.unwrap();
        drop(first);

        let second = driver(&dir).with_cipher(FieldCipher::new([2u8; 32]));
        assert!(matches!(second.load().await, Err(LecternError::Crypto(_))));
    }

    #[tokio::test]
    async fn clear_empties_store() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(&dir);
        driver
            .save(
                &OfflinePatch::new()
                    .upsert_attendance([entry("local-a", "S1", 0)])
                    .with_full_sync_completed(true),
            )
            .await
            .unwrap();
        driver.clear().await.unwrap();
        assert_eq!(driver.load().await.unwrap(), OfflineData::default());
    }

    #[tokio::test]
    async fn browser_host_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(&dir).with_filesystem_access(false);
        assert!(!driver.is_available().await);
        assert!(matches!(driver.load().await, Err(LecternError::Unavailable { .. })));
    }
}
