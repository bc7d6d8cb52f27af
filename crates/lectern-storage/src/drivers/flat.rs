// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flat fallback driver: the whole envelope as one JSON blob under one key.
//!
//! The blob is not queryable, so every save reads the current blob, applies
//! the patch to it, and writes the result back.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use lectern_core::{LecternError, OfflineData, OfflinePatch, StorageDriver};
use tokio::sync::Mutex;
use tracing::debug;

pub const DRIVER_NAME: &str = "flat";

/// The key the envelope is stored under.
pub const BLOB_KEY: &str = "lectern.offline_data";

/// A simple key-value blob facility.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    async fn is_present(&self) -> bool;
    async fn get(&self, key: &str) -> Result<Option<String>, LecternError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), LecternError>;
    async fn remove(&self, key: &str) -> Result<(), LecternError>;
}

/// One file per key inside a directory. Writes go to a temporary file that is
/// renamed over the target.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn is_present(&self) -> bool {
        tokio::fs::create_dir_all(&self.dir).await.is_ok()
    }

    async fn get(&self, key: &str) -> Result<Option<String>, LecternError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LecternError::storage(e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), LecternError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(LecternError::storage)?;
        let target = self.path_for(key);
        let tmp = target.with_extension("json.tmp");
        tokio::fs::write(&tmp, value)
            .await
            .map_err(LecternError::storage)?;
        tokio::fs::rename(&tmp, &target)
            .await
            .map_err(LecternError::storage)
    }

    async fn remove(&self, key: &str) -> Result<(), LecternError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LecternError::storage(e)),
        }
    }
}

/// In-process blob store with an optional size quota.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: std::sync::Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes larger than `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::default()
        }
    }

    fn blobs(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, LecternError> {
        self.blobs
            .lock()
            .map_err(|_| LecternError::Internal("blob store lock poisoned".into()))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn is_present(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Result<Option<String>, LecternError> {
        Ok(self.blobs()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), LecternError> {
        if let Some(quota) = self.quota
            && value.len() > quota
        {
            return Err(LecternError::storage(std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                format!("blob of {} bytes exceeds quota of {quota}", value.len()),
            )));
        }
        self.blobs()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), LecternError> {
        self.blobs()?.remove(key);
        Ok(())
    }
}

/// Persistence driver over a [`BlobStore`].
pub struct FlatDriver {
    store: Arc<dyn BlobStore>,
    write_lock: Mutex<()>,
}

impl FlatDriver {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<OfflineData, LecternError> {
        match self.store.get(BLOB_KEY).await? {
            Some(blob) => serde_json::from_str(&blob).map_err(LecternError::storage),
            None => Ok(OfflineData::default()),
        }
    }
}

#[async_trait]
impl StorageDriver for FlatDriver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    async fn is_available(&self) -> bool {
        self.store.is_present().await
    }

    async fn load(&self) -> Result<OfflineData, LecternError> {
        self.read().await
    }

    async fn save(&self, patch: &OfflinePatch) -> Result<(), LecternError> {
        if patch.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let mut data = self.read().await?;
        data.apply(patch);
        let blob = serde_json::to_string(&data).map_err(LecternError::storage)?;
        self.store.set(BLOB_KEY, &blob).await?;
        debug!(bytes = blob.len(), attendance = data.attendance.len(), "flat save");
        Ok(())
    }

    async fn clear(&self) -> Result<(), LecternError> {
        let _guard = self.write_lock.lock().await;
        self.store.remove(BLOB_KEY).await
    }
}
