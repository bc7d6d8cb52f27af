// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The composition root.
//!
//! [`Tracker`] builds the storage drivers, the storage manager, the sync
//! orchestrator and the realtime ingestor from configuration plus the
//! host-provided [`Facilities`], and exposes the operations the UI calls.
//! Nothing here is a global: each tracker owns its collaborators and is torn
//! down with [`Tracker::shutdown`].

use std::sync::Arc;

use lectern_config::model::{LecternConfig, StorageConfig};
use lectern_core::envelope::sort_newest_first;
use lectern_core::ids::new_placeholder_id;
use lectern_core::types::{VISITOR_PREFIX, truncate_to_millis};
use lectern_core::{
    AttendanceEntry, ChangeFeed, Clock, DocumentLink, LecternError, OfflinePatch, RemoteBackend,
    StorageDriver, Student,
};
use lectern_storage::{
    BlobStore, EmbeddedDriver, FieldCipher, FileBlobStore, FlatDriver, MemoryBlobStore,
    MemoryObjectStore, ObjectStore, SqliteDriver, StorageManager,
};
use lectern_sync::{
    ConnectivityMonitor, RealtimeIngestor, Scheduler, SchedulerHandle, SkipReason,
    SyncOrchestrator, SyncOutcome, SyncSettings, SyncState, Transition,
};
use secrecy::SecretString;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cooldown::CooldownPolicy;
use crate::facilities::Facilities;
use crate::requests::{NewAttendance, NewStudent};
use crate::status::TrackerStatus;

pub struct Tracker {
    config: LecternConfig,
    storage: Arc<StorageManager>,
    sqlite: Option<Arc<SqliteDriver>>,
    remote: Option<Arc<dyn RemoteBackend>>,
    feed: Option<Arc<dyn ChangeFeed>>,
    clock: Arc<dyn Clock>,
    connectivity: Arc<ConnectivityMonitor>,
    orchestrator: Option<Arc<SyncOrchestrator>>,
    ingestor: Option<Arc<RealtimeIngestor>>,
    cooldown: CooldownPolicy,
    degraded: bool,
    scheduler: Mutex<Option<SchedulerHandle>>,
    /// Serializes read-check-write sequences of UI operations.
    writes: Mutex<()>,
}

impl Tracker {
    /// Build every collaborator and select a storage driver.
    ///
    /// When no configured driver is usable the tracker still starts, backed
    /// by an in-memory flat store, and reports itself degraded.
    pub async fn init(config: LecternConfig, facilities: Facilities) -> Result<Self, LecternError> {
        let Facilities {
            remote,
            feed,
            clock,
            object_store,
            blob_store,
            drivers,
            on_refresh,
        } = facilities;

        let (drivers, sqlite) = match drivers {
            Some(drivers) => (drivers, None),
            None => configured_drivers(&config, &clock, object_store, blob_store)?,
        };

        let mut storage = StorageManager::new(drivers);
        let mut degraded = false;
        match storage.init().await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => {
                error!(error = %e, "falling back to memory-only storage");
                let memory: Arc<dyn StorageDriver> =
                    Arc::new(FlatDriver::new(Arc::new(MemoryBlobStore::new())));
                storage = StorageManager::new(vec![memory]);
                storage.init().await?;
                degraded = true;
            }
            Err(e) => return Err(e),
        }
        let storage = Arc::new(storage);

        let connectivity = Arc::new(ConnectivityMonitor::new(remote.clone()));
        let orchestrator = remote.clone().map(|remote| {
            Arc::new(SyncOrchestrator::new(
                storage.clone(),
                remote,
                connectivity.clone(),
                clock.clone(),
                SyncSettings::from_config(&config),
            ))
        });

        let feed = feed.filter(|_| config.realtime.enabled);
        let ingestor = feed.as_ref().map(|_| {
            let ingestor = RealtimeIngestor::new(
                storage.clone(),
                config.realtime.flush_delay(),
                config.sync.match_tolerance(),
            );
            Arc::new(match on_refresh {
                Some(callback) => ingestor.with_refresh(callback),
                None => ingestor,
            })
        });

        let driver = storage.current_driver_name().await;
        info!(
            driver = driver.as_deref().unwrap_or("none"),
            degraded,
            remote = remote.is_some(),
            realtime = feed.is_some(),
            branch = %config.app.branch,
            "tracker initialized"
        );

        Ok(Self {
            cooldown: CooldownPolicy::new(config.attendance.cooldown()),
            config,
            storage,
            sqlite,
            remote,
            feed,
            clock,
            connectivity,
            orchestrator,
            ingestor,
            degraded,
            scheduler: Mutex::new(None),
            writes: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &LecternConfig {
        &self.config
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Start the sync scheduler on the current runtime.
    ///
    /// Returns `None` when no remote backend is configured.
    pub async fn spawn_scheduler(
        &self,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<Result<(), LecternError>>> {
        let orchestrator = self.orchestrator.clone()?;
        let (scheduler, handle) = Scheduler::new(
            orchestrator,
            self.connectivity.clone(),
            self.config.sync.connectivity_poll(),
        );
        let scheduler = match (&self.feed, &self.ingestor) {
            (Some(feed), Some(ingestor)) => scheduler.with_realtime(feed.clone(), ingestor.clone()),
            _ => scheduler,
        };
        *self.scheduler.lock().await = Some(handle);
        Some(tokio::spawn(scheduler.run(cancel)))
    }

    /// Flush pending realtime changes and close the storage drivers.
    pub async fn shutdown(&self) -> Result<(), LecternError> {
        self.scheduler.lock().await.take();
        if let Some(ingestor) = &self.ingestor
            && let Err(e) = ingestor.flush().await
        {
            warn!(error = %e, "realtime flush on shutdown failed");
        }
        self.storage.shutdown().await?;
        info!("tracker shut down");
        Ok(())
    }

    /// Registered students, with `last_scan` derived from attendance.
    pub async fn students(&self) -> Result<Vec<Student>, LecternError> {
        let data = self.storage.load().await?;
        let mut students = data.students;
        for student in &mut students {
            student.last_scan = data
                .attendance
                .iter()
                .filter(|e| e.student_id == student.student_id)
                .map(|e| e.timestamp)
                .max();
        }
        Ok(students)
    }

    /// Attendance, newest first.
    pub async fn attendance(&self) -> Result<Vec<AttendanceEntry>, LecternError> {
        let mut attendance = self.storage.load().await?.attendance;
        sort_newest_first(&mut attendance);
        Ok(attendance)
    }

    /// Record a scan or manual entry locally.
    ///
    /// Fails with [`LecternError::Cooldown`] when the same student recorded
    /// the same direction less than the cooldown ago. The entry carries a
    /// placeholder id until the next push.
    pub async fn add_attendance(&self, new: NewAttendance) -> Result<AttendanceEntry, LecternError> {
        let key = new.key()?.to_string();
        let _guard = self.writes.lock().await;
        let data = self.storage.load().await?;
        let at = truncate_to_millis(new.timestamp.unwrap_or_else(|| self.clock.now()));

        if let Err(e) = self.cooldown.check(&data.attendance, &key, new.direction, at) {
            debug!(student_id = %key, direction = %new.direction, "scan rejected by cooldown");
            return Err(e);
        }

        let branch = &self.config.app.branch;
        let mut entry = AttendanceEntry {
            id: new_placeholder_id(),
            student_uuid: None,
            student_id: key.clone(),
            student_name: String::new(),
            timestamp: at,
            direction: new.direction,
            method: new.method,
            purpose: new.purpose,
            contact: new.contact,
            library: branch.clone(),
            course: None,
            year: None,
            level: None,
            strand: None,
        };

        if key.starts_with(VISITOR_PREFIX) {
            entry.student_name = new
                .visitor_name
                .filter(|name| !name.trim().is_empty())
                .ok_or_else(|| LecternError::Validation("visitor entries need a name".into()))?;
        } else {
            let student = data
                .students
                .iter()
                .find(|s| s.student_id == key && &s.library == branch)
                .or_else(|| data.students.iter().find(|s| s.student_id == key))
                .ok_or_else(|| {
                    LecternError::Validation(format!("no registered student with id `{key}`"))
                })?;
            entry.student_name = student.name.clone();
            entry.enrich_from(student);
        }

        self.storage
            .save(&OfflinePatch::new().upsert_attendance([entry.clone()]))
            .await?;
        info!(
            student_id = %entry.student_id,
            direction = %entry.direction,
            method = %entry.method,
            "attendance recorded"
        );
        Ok(entry)
    }

    /// Register a student, straight to the backend when online.
    ///
    /// Offline (or when the backend refuses) the student is kept under a
    /// placeholder id and created by the next push.
    pub async fn register_student(&self, new: NewStudent) -> Result<Student, LecternError> {
        new.validate()?;
        let library = new
            .library
            .clone()
            .unwrap_or_else(|| self.config.app.branch.clone());
        let key = new.student_id.trim().to_string();

        let _guard = self.writes.lock().await;
        let data = self.storage.load().await?;
        ensure_unique_key(&data.students, &key, &library, None)?;

        let mut student = Student {
            id: new_placeholder_id(),
            student_id: key,
            name: new.name.trim().to_string(),
            email: new.email,
            phone: new.phone,
            course: new.course,
            year: new.year,
            level: new.level,
            strand: new.strand,
            library,
            role: new.role,
            rfid: new.rfid.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
            biometric_template: None,
            last_scan: None,
            registered_at: self.clock.now(),
            dirty: false,
        };

        if let Some(remote) = &self.remote
            && self.connectivity.is_online()
        {
            match remote.insert_student(&student).await {
                Ok(stored) => student = stored,
                Err(e) => {
                    warn!(student_id = %student.student_id, error = %e, "remote registration failed, keeping placeholder");
                    if e.is_transient() {
                        self.connectivity.report(false);
                    }
                }
            }
        }

        let mut data = self.storage.load().await?;
        data.students.push(student.clone());
        self.storage
            .save(&OfflinePatch::new().with_students(data.students))
            .await?;
        info!(student_id = %student.student_id, synced = student.is_synced(), "student registered");
        Ok(student)
    }

    /// Replace a student's record. Synced students are flagged for an update
    /// push.
    pub async fn update_student(&self, student: Student) -> Result<Student, LecternError> {
        let _guard = self.writes.lock().await;
        let mut data = self.storage.load().await?;
        let idx = data
            .students
            .iter()
            .position(|s| s.id == student.id)
            .ok_or_else(|| LecternError::Validation(format!("no student with id `{}`", student.id)))?;
        ensure_unique_key(
            &data.students,
            &student.student_id,
            &student.library,
            Some(student.id.as_str()),
        )?;

        let updated = Student {
            dirty: student.is_synced(),
            registered_at: data.students[idx].registered_at,
            ..student
        };
        data.students[idx] = updated.clone();
        self.storage
            .save(&OfflinePatch::new().with_students(data.students))
            .await?;
        debug!(id = %updated.id, dirty = updated.dirty, "student updated");
        Ok(updated)
    }

    /// Look a student up by business key or RFID tag.
    pub async fn find_student(&self, key_or_rfid: &str) -> Result<Option<Student>, LecternError> {
        let needle = key_or_rfid.trim();
        if needle.is_empty() {
            return Ok(None);
        }
        let students = self.students().await?;
        if let Some(student) = students.iter().find(|s| s.student_id == needle) {
            return Ok(Some(student.clone()));
        }

        if let Some(sqlite) = &self.sqlite
            && self.storage.current_driver_name().await.as_deref() == Some(sqlite.name())
        {
            return sqlite.find_student_by_rfid(needle).await;
        }
        Ok(students
            .into_iter()
            .find(|s| s.rfid.as_deref() == Some(needle)))
    }

    pub async fn documents(&self) -> Result<Vec<DocumentLink>, LecternError> {
        Ok(self.storage.load().await?.documents)
    }

    pub async fn set_documents(&self, documents: Vec<DocumentLink>) -> Result<(), LecternError> {
        self.storage
            .save(&OfflinePatch::new().with_documents(documents))
            .await
    }

    /// A platform online/offline event.
    pub fn report_connectivity(&self, online: bool) -> Transition {
        self.connectivity.report(online)
    }

    /// Ping the backend now and record the result.
    pub async fn check_connectivity(&self) -> bool {
        self.connectivity.probe().await
    }

    pub async fn status(&self) -> Result<TrackerStatus, LecternError> {
        let data = self.storage.load().await?;
        let sync = match &self.orchestrator {
            Some(orchestrator) => Some(orchestrator.status().await),
            None => None,
        };
        let realtime_pending = match &self.ingestor {
            Some(ingestor) => ingestor.pending_len().await,
            None => 0,
        };

        Ok(TrackerStatus {
            online: self.connectivity.is_online(),
            remote_configured: self.remote.is_some(),
            storage_engine: self.storage.current_driver_name().await,
            degraded: self.degraded,
            students: data.students.len(),
            attendance: data.attendance.len(),
            pending_pushes: data.pending_push_count(),
            last_sync: data.last_sync,
            full_sync_completed: data.full_sync_completed,
            sync_state: sync.as_ref().map_or(SyncState::Disabled, |s| s.state),
            sync_cycles: sync.as_ref().map_or(0, |s| s.cycles),
            last_sync_error: sync.and_then(|s| s.last_error),
            realtime_pending,
        })
    }

    /// Run one sync cycle now, through the scheduler when it is running.
    pub async fn force_sync(&self) -> SyncOutcome {
        let Some(orchestrator) = &self.orchestrator else {
            return SyncOutcome::Skipped {
                reason: SkipReason::Offline,
            };
        };

        let handle = self.scheduler.lock().await.clone();
        if let Some(handle) = handle {
            match handle.force_sync().await {
                Ok(outcome) => return outcome,
                Err(e) => {
                    debug!(error = %e, "scheduler gone, syncing inline");
                    self.scheduler.lock().await.take();
                }
            }
        }
        orchestrator.force_sync().await
    }

    /// Copy all local data into another configured driver and switch to it.
    pub async fn migrate_storage(&self, target: &str) -> Result<(), LecternError> {
        let _guard = self.writes.lock().await;
        self.storage.migrate_to(target).await
    }
}

fn ensure_unique_key(
    students: &[Student],
    key: &str,
    library: &str,
    except_id: Option<&str>,
) -> Result<(), LecternError> {
    let taken = students.iter().any(|s| {
        s.student_id == key && s.library == library && except_id != Some(s.id.as_str())
    });
    if taken {
        return Err(LecternError::Validation(format!(
            "student id `{key}` is already registered in branch `{library}`"
        )));
    }
    Ok(())
}

fn field_cipher(config: &StorageConfig) -> Result<Option<FieldCipher>, LecternError> {
    if !config.encrypt_sensitive {
        return Ok(None);
    }
    let key = config.encryption_key.as_deref().ok_or_else(|| {
        LecternError::Config("storage.encryption_key is required for encryption".into())
    })?;
    FieldCipher::from_hex(&SecretString::from(key.to_string())).map(Some)
}

type Drivers = (Vec<Arc<dyn StorageDriver>>, Option<Arc<SqliteDriver>>);

/// Drivers named in `storage.drivers`, in preference order.
fn configured_drivers(
    config: &LecternConfig,
    clock: &Arc<dyn Clock>,
    object_store: Option<Arc<dyn ObjectStore>>,
    blob_store: Option<Arc<dyn BlobStore>>,
) -> Result<Drivers, LecternError> {
    let mut drivers: Vec<Arc<dyn StorageDriver>> = Vec::new();
    let mut sqlite = None;

    for name in &config.storage.drivers {
        match name.as_str() {
            "sqlite" => {
                let mut driver = SqliteDriver::from_config(&config.storage, config.app.host);
                if let Some(cipher) = field_cipher(&config.storage)? {
                    driver = driver.with_cipher(cipher);
                }
                let driver = Arc::new(driver);
                sqlite = Some(driver.clone());
                drivers.push(driver);
            }
            "embedded" => {
                let store: Arc<dyn ObjectStore> = match &object_store {
                    Some(store) => store.clone(),
                    None if config.storage.embedded_enabled => Arc::new(MemoryObjectStore::new()),
                    None => Arc::new(MemoryObjectStore::absent()),
                };
                drivers.push(Arc::new(EmbeddedDriver::new(
                    store,
                    clock.clone(),
                    config.storage.attendance_window_days,
                )));
            }
            "flat" => {
                let store: Arc<dyn BlobStore> = match &blob_store {
                    Some(store) => store.clone(),
                    None => Arc::new(FileBlobStore::new(&config.storage.flat_path)),
                };
                drivers.push(Arc::new(FlatDriver::new(store)));
            }
            other => {
                return Err(LecternError::Config(format!(
                    "unknown storage driver `{other}`"
                )));
            }
        }
    }
    Ok((drivers, sqlite))
}
