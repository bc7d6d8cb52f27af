// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage manager behavior over the real drivers.

use std::sync::Arc;

use lectern_core::{OfflinePatch, StorageDriver};
use lectern_storage::{
    DatabaseOptions, EmbeddedDriver, FileBlobStore, FlatDriver, MemoryBlobStore,
    MemoryObjectStore, SqliteDriver, StorageManager,
};
use lectern_test_utils::{ManualClock, fixtures};

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(fixtures::at(12, 0, 0)))
}

#[tokio::test]
async fn desktop_prefers_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = SqliteDriver::new(
        dir.path().join("lectern.db").to_str().unwrap(),
        DatabaseOptions::default(),
    );
    let embedded = EmbeddedDriver::new(Arc::new(MemoryObjectStore::absent()), clock(), 30);
    let flat = FlatDriver::new(Arc::new(FileBlobStore::new(dir.path().join("blobs"))));

    let manager = StorageManager::new(vec![
        Arc::new(sqlite) as Arc<dyn StorageDriver>,
        Arc::new(embedded),
        Arc::new(flat),
    ]);
    manager.init().await.unwrap();
    assert_eq!(manager.current_driver_name().await.as_deref(), Some("sqlite"));

    let entry = fixtures::check_in("S123", fixtures::at(9, 0, 0));
    manager
        .save(&OfflinePatch::new().upsert_attendance([entry.clone()]))
        .await
        .unwrap();
    assert_eq!(manager.load().await.unwrap().attendance, vec![entry]);
    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn browser_host_without_object_store_lands_on_flat() {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = SqliteDriver::new(
        dir.path().join("lectern.db").to_str().unwrap(),
        DatabaseOptions::default(),
    )
    .with_filesystem_access(false);
    let embedded = EmbeddedDriver::new(Arc::new(MemoryObjectStore::absent()), clock(), 30);
    let flat = FlatDriver::new(Arc::new(MemoryBlobStore::new()));

    let manager = StorageManager::new(vec![
        Arc::new(sqlite) as Arc<dyn StorageDriver>,
        Arc::new(embedded),
        Arc::new(flat),
    ]);
    manager.init().await.unwrap();
    assert_eq!(manager.current_driver_name().await.as_deref(), Some("flat"));
}

#[tokio::test]
async fn quota_failure_falls_back_to_next_tier() {
    let small_flat = FlatDriver::new(Arc::new(MemoryBlobStore::with_quota(8)));
    let embedded = EmbeddedDriver::new(Arc::new(MemoryObjectStore::new()), clock(), 30);

    let manager = StorageManager::new(vec![
        Arc::new(small_flat) as Arc<dyn StorageDriver>,
        Arc::new(embedded),
    ]);
    manager.init().await.unwrap();
    assert_eq!(manager.current_driver_name().await.as_deref(), Some("flat"));

    manager
        .save(&OfflinePatch::new().with_students(vec![fixtures::student("S1")]))
        .await
        .unwrap();
    assert_eq!(manager.current_driver_name().await.as_deref(), Some("embedded"));
    assert_eq!(manager.load().await.unwrap().students.len(), 1);
}

#[tokio::test]
async fn migrate_from_sqlite_to_flat_keeps_everything() {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = SqliteDriver::new(
        dir.path().join("lectern.db").to_str().unwrap(),
        DatabaseOptions::default(),
    );
    let flat = FlatDriver::new(Arc::new(FileBlobStore::new(dir.path().join("blobs"))));
    let manager = StorageManager::new(vec![
        Arc::new(sqlite) as Arc<dyn StorageDriver>,
        Arc::new(flat),
    ]);

    let patch = OfflinePatch::new()
        .with_students(vec![fixtures::synced_student("S1")])
        .upsert_attendance([
            fixtures::check_in("S1", fixtures::at(9, 0, 0)),
            fixtures::check_out("S1", fixtures::at(11, 0, 0)),
        ])
        .with_last_sync(fixtures::at(11, 5, 0))
        .with_full_sync_completed(true);
    manager.save(&patch).await.unwrap();
    let before = manager.load().await.unwrap();

    manager.migrate_to("flat").await.unwrap();
    assert_eq!(manager.current_driver_name().await.as_deref(), Some("flat"));
    assert_eq!(manager.load().await.unwrap(), before);
}
