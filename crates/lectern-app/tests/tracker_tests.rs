// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracker operations end to end over mock collaborators and real drivers.

use std::sync::Arc;
use std::time::Duration;

use lectern_app::{Facilities, NewAttendance, NewStudent, Tracker};
use lectern_config::model::{HostKind, LecternConfig};
use lectern_core::{Direction, DocumentLink, LecternError, OfflineData, StorageDriver};
use lectern_sync::{SkipReason, SyncState};
use lectern_test_utils::fixtures::{at, synced_student};
use lectern_test_utils::{ManualClock, MockDriver, MockRemote};
use tokio_util::sync::CancellationToken;

const U1: &str = "0b7f3c0e-6d1a-4c5e-9f5b-2a4e8c1d7b90";

struct Desk {
    tracker: Tracker,
    driver: Arc<MockDriver>,
    remote: Arc<MockRemote>,
    clock: Arc<ManualClock>,
}

async fn desk(data: OfflineData) -> Desk {
    let driver = Arc::new(MockDriver::new("sqlite").with_data(data));
    let remote = Arc::new(MockRemote::new());
    let clock = Arc::new(ManualClock::new(at(9, 0, 0)));
    let facilities = Facilities::default()
        .with_drivers(vec![driver.clone() as Arc<dyn StorageDriver>])
        .with_remote(remote.clone())
        .with_clock(clock.clone());
    let tracker = Tracker::init(LecternConfig::default(), facilities)
        .await
        .unwrap();
    Desk {
        tracker,
        driver,
        remote,
        clock,
    }
}

fn registry(students: Vec<lectern_core::Student>) -> OfflineData {
    OfflineData {
        students,
        full_sync_completed: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn offline_scan_is_pushed_on_reconnect_and_not_duplicated() {
    let s123 = synced_student("S123");
    let d = desk(registry(vec![s123.clone()])).await;
    d.remote.seed_student(s123.clone());
    d.remote.set_offline(true);
    d.remote.queue_ids([U1]);

    let scan = d
        .tracker
        .add_attendance(NewAttendance::scan("S123", Direction::CheckIn))
        .await
        .unwrap();
    assert!(!scan.is_synced());
    assert_eq!(scan.course.as_deref(), Some("BSIT"));
    assert_eq!(scan.student_uuid.as_deref(), Some(s123.id.as_str()));
    assert_eq!(d.tracker.status().await.unwrap().pending_pushes, 1);

    d.clock.set(at(9, 0, 5));
    d.remote.set_offline(false);
    d.tracker.report_connectivity(true);
    let outcome = d.tracker.force_sync().await;
    assert_eq!(
        outcome.report().unwrap().push.as_ref().unwrap().attendance_inserted,
        1
    );

    d.clock.set(at(9, 1, 0));
    assert!(d.tracker.force_sync().await.report().unwrap().is_clean());

    let attendance = d.tracker.attendance().await.unwrap();
    assert_eq!(attendance.len(), 1);
    assert_eq!(attendance[0].id, U1);
    assert_eq!(d.remote.attendance().len(), 1);

    let status = d.tracker.status().await.unwrap();
    assert_eq!(status.pending_pushes, 0);
    assert_eq!(status.last_sync, Some(at(9, 1, 0)));
    assert_eq!(status.sync_state, SyncState::Idle);
}

#[tokio::test]
async fn repeat_scan_inside_cooldown_is_rejected() {
    let d = desk(registry(vec![synced_student("S1")])).await;
    d.tracker
        .add_attendance(NewAttendance::scan("S1", Direction::CheckIn))
        .await
        .unwrap();

    d.clock.advance(Duration::from_secs(20));
    let err = d
        .tracker
        .add_attendance(NewAttendance::scan("S1", Direction::CheckIn))
        .await
        .unwrap_err();
    assert!(err.is_cooldown());
    assert!(!err.is_transient());

    d.tracker
        .add_attendance(NewAttendance::scan("S1", Direction::CheckOut))
        .await
        .unwrap();
    d.clock.advance(Duration::from_secs(40));
    d.tracker
        .add_attendance(NewAttendance::scan("S1", Direction::CheckIn))
        .await
        .unwrap();
    assert_eq!(d.driver.snapshot().attendance.len(), 3);
}

#[tokio::test]
async fn unknown_students_are_refused_and_visitors_need_a_name() {
    let d = desk(OfflineData::default()).await;
    let err = d
        .tracker
        .add_attendance(NewAttendance::scan("S404", Direction::CheckIn))
        .await
        .unwrap_err();
    assert!(matches!(err, LecternError::Validation(_)));

    let visit = d
        .tracker
        .add_attendance(
            NewAttendance::visitor("Ada Lovelace", Direction::CheckIn).with_purpose("research"),
        )
        .await
        .unwrap();
    assert!(visit.is_visitor());
    assert_eq!(visit.student_name, "Ada Lovelace");
    assert_eq!(visit.purpose.as_deref(), Some("research"));
}

#[tokio::test]
async fn registration_is_remote_first_when_online() {
    let d = desk(OfflineData::default()).await;
    d.remote.queue_ids([U1]);
    assert!(d.tracker.check_connectivity().await);

    let student = d
        .tracker
        .register_student(NewStudent::new("S1", "Grace Hopper"))
        .await
        .unwrap();
    assert_eq!(student.id, U1);
    assert_eq!(student.library, "main");
    assert_eq!(d.remote.students().len(), 1);
    assert_eq!(d.driver.snapshot().students, vec![student]);
}

#[tokio::test]
async fn offline_registration_keeps_a_placeholder_and_rejects_duplicates() {
    let d = desk(OfflineData::default()).await;
    d.remote.set_offline(true);

    let student = d
        .tracker
        .register_student(NewStudent::new("S1", "Grace Hopper"))
        .await
        .unwrap();
    assert!(!student.is_synced());
    assert!(d.remote.students().is_empty());

    let err = d
        .tracker
        .register_student(NewStudent::new("S1", "Someone Else"))
        .await
        .unwrap_err();
    assert!(matches!(err, LecternError::Validation(_)));

    let other_branch = NewStudent {
        library: Some("annex".into()),
        ..NewStudent::new("S1", "Annex Student")
    };
    d.tracker.register_student(other_branch).await.unwrap();
    assert_eq!(d.tracker.students().await.unwrap().len(), 2);
}

#[tokio::test]
async fn editing_a_synced_student_marks_it_dirty() {
    let s1 = synced_student("S1");
    let d = desk(registry(vec![s1.clone()])).await;

    let mut edit = s1.clone();
    edit.name = "Renamed".into();
    let updated = d.tracker.update_student(edit).await.unwrap();
    assert!(updated.dirty);
    assert_eq!(updated.registered_at, s1.registered_at);
    assert_eq!(d.driver.snapshot().students[0].name, "Renamed");

    let mut ghost = s1.clone();
    ghost.id = "missing".into();
    assert!(d.tracker.update_student(ghost).await.is_err());
}

#[tokio::test]
async fn students_are_found_by_key_or_rfid() {
    let mut s1 = synced_student("S1");
    s1.rfid = Some("04A1B2C3".into());
    let d = desk(registry(vec![s1.clone(), synced_student("S2")])).await;

    let by_key = d.tracker.find_student("S2").await.unwrap().unwrap();
    assert_eq!(by_key.student_id, "S2");
    let by_rfid = d.tracker.find_student(" 04A1B2C3 ").await.unwrap().unwrap();
    assert_eq!(by_rfid.id, s1.id);
    assert!(d.tracker.find_student("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn last_scan_is_derived_from_attendance() {
    let d = desk(registry(vec![synced_student("S1")])).await;
    d.clock.set(at(10, 30, 0));
    d.tracker
        .add_attendance(NewAttendance::scan("S1", Direction::CheckIn))
        .await
        .unwrap();
    let students = d.tracker.students().await.unwrap();
    assert_eq!(students[0].last_scan, Some(at(10, 30, 0)));
}

#[tokio::test]
async fn documents_pass_through_storage() {
    let d = desk(OfflineData::default()).await;
    let docs = vec![DocumentLink {
        id: "doc-1".into(),
        title: "Library rules".into(),
        url: "https://example.org/rules.pdf".into(),
        library: Some("main".into()),
        created_at: None,
    }];
    d.tracker.set_documents(docs.clone()).await.unwrap();
    assert_eq!(d.tracker.documents().await.unwrap(), docs);
}

#[tokio::test]
async fn without_any_usable_driver_the_tracker_degrades_to_memory() {
    let driver = Arc::new(MockDriver::new("sqlite").unavailable());
    let facilities =
        Facilities::default().with_drivers(vec![driver as Arc<dyn StorageDriver>]);
    let tracker = Tracker::init(LecternConfig::default(), facilities)
        .await
        .unwrap();
    assert!(tracker.is_degraded());

    let status = tracker.status().await.unwrap();
    assert!(status.degraded);
    assert_eq!(status.storage_engine.as_deref(), Some("flat"));
    assert!(!status.remote_configured);
    assert_eq!(status.sync_state, SyncState::Disabled);

    tracker
        .register_student(NewStudent::new("S1", "Memory Only"))
        .await
        .unwrap();
    assert_eq!(tracker.students().await.unwrap().len(), 1);
    assert_eq!(
        tracker.force_sync().await.skip_reason(),
        Some(SkipReason::Offline)
    );
}

#[tokio::test]
async fn configured_drivers_persist_and_migrate() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = LecternConfig::default();
    config.storage.database_path = dir.path().join("lectern.db").to_string_lossy().into_owned();
    config.storage.flat_path = dir.path().join("blobs").to_string_lossy().into_owned();

    let tracker = Tracker::init(config.clone(), Facilities::default())
        .await
        .unwrap();
    assert_eq!(
        tracker.status().await.unwrap().storage_engine.as_deref(),
        Some("sqlite")
    );
    tracker
        .register_student(NewStudent::new("S1", "Disk Student"))
        .await
        .unwrap();
    tracker
        .add_attendance(NewAttendance::scan("S1", Direction::CheckIn))
        .await
        .unwrap();

    tracker.migrate_storage("flat").await.unwrap();
    let status = tracker.status().await.unwrap();
    assert_eq!(status.storage_engine.as_deref(), Some("flat"));
    assert_eq!(status.students, 1);
    assert_eq!(status.attendance, 1);
    assert!(tracker.migrate_storage("floppy").await.is_err());
    tracker.shutdown().await.unwrap();

    config.storage.drivers = vec!["flat".into()];
    let reopened = Tracker::init(config, Facilities::default()).await.unwrap();
    assert_eq!(reopened.attendance().await.unwrap().len(), 1);
}

#[tokio::test]
async fn browser_hosts_skip_the_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = LecternConfig::default();
    config.app.host = HostKind::Browser;
    config.storage.embedded_enabled = true;
    config.storage.database_path = dir.path().join("lectern.db").to_string_lossy().into_owned();
    config.storage.flat_path = dir.path().join("blobs").to_string_lossy().into_owned();

    let tracker = Tracker::init(config, Facilities::default()).await.unwrap();
    assert_eq!(
        tracker.status().await.unwrap().storage_engine.as_deref(),
        Some("embedded")
    );
    assert!(!dir.path().join("lectern.db").exists());
}

#[tokio::test]
async fn force_sync_goes_through_the_running_scheduler() {
    let d = desk(OfflineData::default()).await;
    let cancel = CancellationToken::new();
    let task = d.tracker.spawn_scheduler(cancel.clone()).await.unwrap();

    let outcome = d.tracker.force_sync().await;
    assert!(outcome.report().is_some());
    assert!(d.tracker.status().await.unwrap().online);

    cancel.cancel();
    task.await.unwrap().unwrap();

    d.clock.advance(Duration::from_secs(5));
    assert!(d.tracker.force_sync().await.report().is_some());
    d.tracker.shutdown().await.unwrap();
}
