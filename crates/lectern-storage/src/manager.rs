// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage Manager: driver selection, failover, and migration.
//!
//! Drivers are held in preference order. The first driver that reports
//! available and completes a trial load becomes active. When the active
//! driver fails an operation, the remaining lower-preference drivers are
//! tried in order and the first to succeed becomes active for good; there is
//! no automatic return to a higher-preference driver.

use std::future::Future;
use std::sync::Arc;

use lectern_core::{LecternError, OfflineData, OfflinePatch, StorageDriver};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Single load/save/clear contract over an ordered list of drivers.
pub struct StorageManager {
    drivers: Vec<Arc<dyn StorageDriver>>,
    active: RwLock<Option<usize>>,
}

impl StorageManager {
    /// Create a manager over drivers in preference order.
    pub fn new(drivers: Vec<Arc<dyn StorageDriver>>) -> Self {
        Self {
            drivers,
            active: RwLock::new(None),
        }
    }

    /// Names of all configured drivers, in preference order.
    pub fn driver_names(&self) -> Vec<String> {
        self.drivers.iter().map(|d| d.name().to_string()).collect()
    }

    /// Probe drivers in order and adopt the first usable one.
    ///
    /// Idempotent: returns immediately if a driver is already active.
    pub async fn init(&self) -> Result<(), LecternError> {
        if self.active.read().await.is_some() {
            return Ok(());
        }
        let mut active = self.active.write().await;
        if active.is_some() {
            return Ok(());
        }

        let mut attempts = Vec::new();
        for (idx, driver) in self.drivers.iter().enumerate() {
            if !driver.is_available().await {
                info!(driver = driver.name(), "storage driver not available");
                attempts.push(format!("{}: unavailable", driver.name()));
                continue;
            }
            match driver.load().await {
                Ok(_) => {
                    info!(driver = driver.name(), "storage driver selected");
                    *active = Some(idx);
                    return Ok(());
                }
                Err(e) => {
                    warn!(driver = driver.name(), error = %e, "storage driver failed trial load");
                    attempts.push(format!("{}: {e}", driver.name()));
                }
            }
        }

        error!(attempts = ?attempts, "no storage driver available");
        Err(LecternError::NoStorageAvailable { attempts })
    }

    /// Name of the active driver, if one has been selected.
    pub async fn current_driver_name(&self) -> Option<String> {
        self.active
            .read()
            .await
            .map(|idx| self.drivers[idx].name().to_string())
    }

    pub async fn load(&self) -> Result<OfflineData, LecternError> {
        self.with_fallback("load", |driver| async move { driver.load().await })
            .await
    }

    pub async fn save(&self, patch: &OfflinePatch) -> Result<(), LecternError> {
        if patch.is_empty() {
            return Ok(());
        }
        self.with_fallback("save", |driver| async move { driver.save(patch).await })
            .await
    }

    pub async fn clear(&self) -> Result<(), LecternError> {
        self.with_fallback("clear", |driver| async move { driver.clear().await })
            .await
    }

    /// Copy the active driver's data into `target` and make it active.
    pub async fn migrate_to(&self, target: &str) -> Result<(), LecternError> {
        self.init().await?;
        let target_idx = self
            .drivers
            .iter()
            .position(|d| d.name() == target)
            .ok_or_else(|| {
                LecternError::Validation(format!(
                    "unknown storage driver `{target}` (configured: {})",
                    self.driver_names().join(", ")
                ))
            })?;

        let mut active = self.active.write().await;
        let source_idx = active.ok_or_else(|| LecternError::Internal("no active driver".into()))?;
        if source_idx == target_idx {
            return Ok(());
        }

        let destination = &self.drivers[target_idx];
        if !destination.is_available().await {
            return Err(LecternError::Unavailable {
                driver: target.to_string(),
                reason: "driver reports unavailable".into(),
            });
        }

        let data = self.drivers[source_idx].load().await?;
        let (students, attendance) = (data.students.len(), data.attendance.len());
        destination.clear().await?;
        destination.save(&OfflinePatch::full(data)).await?;
        *active = Some(target_idx);

        info!(
            from = self.drivers[source_idx].name(),
            to = target,
            students,
            attendance,
            "storage migrated"
        );
        Ok(())
    }

    /// Close every driver. Errors are logged, the first one is returned.
    pub async fn shutdown(&self) -> Result<(), LecternError> {
        let mut first_err = None;
        for driver in &self.drivers {
            if let Err(e) = driver.close().await {
                warn!(driver = driver.name(), error = %e, "storage driver close failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn with_fallback<T, F, Fut>(&self, op: &'static str, run: F) -> Result<T, LecternError>
    where
        F: Fn(Arc<dyn StorageDriver>) -> Fut,
        Fut: Future<Output = Result<T, LecternError>>,
    {
        self.init().await?;
        let Some(start) = *self.active.read().await else {
            return Err(LecternError::NoStorageAvailable {
                attempts: Vec::new(),
            });
        };

        let primary = self.drivers[start].clone();
        let mut attempts = Vec::new();
        match run(primary.clone()).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(
                    driver = primary.name(),
                    op,
                    error = %e,
                    "storage operation failed, trying fallbacks"
                );
                attempts.push(format!("{}: {e}", primary.name()));
            }
        }

        for idx in start + 1..self.drivers.len() {
            let driver = self.drivers[idx].clone();
            if !driver.is_available().await {
                attempts.push(format!("{}: unavailable", driver.name()));
                continue;
            }
            match run(driver.clone()).await {
                Ok(value) => {
                    let mut active = self.active.write().await;
                    if *active == Some(start) {
                        *active = Some(idx);
                    }
                    warn!(
                        from = primary.name(),
                        to = driver.name(),
                        op,
                        "storage driver switched"
                    );
                    return Ok(value);
                }
                Err(e) => {
                    warn!(
                        driver = driver.name(),
                        op,
                        error = %e,
                        "fallback storage driver failed"
                    );
                    attempts.push(format!("{}: {e}", driver.name()));
                }
            }
        }

        error!(op, attempts = ?attempts, "every storage driver failed");
        Err(LecternError::NoStorageAvailable { attempts })
    }
}

#[cfg(test)]
mod tests {
    use lectern_test_utils::MockDriver;

    use super::*;

    fn manager(drivers: &[&Arc<MockDriver>]) -> StorageManager {
        StorageManager::new(
            drivers
                .iter()
                .map(|d| Arc::clone(d) as Arc<dyn StorageDriver>)
                .collect(),
        )
    }

    #[tokio::test]
    async fn init_picks_first_available_driver() {
        let a = Arc::new(MockDriver::new("sqlite").unavailable());
        let b = Arc::new(MockDriver::new("embedded"));
        let manager = manager(&[&a, &b]);
        manager.init().await.unwrap();
        assert_eq!(manager.current_driver_name().await.as_deref(), Some("embedded"));
    }

    #[tokio::test]
    async fn init_skips_driver_failing_trial_load() {
        let a = Arc::new(MockDriver::new("sqlite"));
        a.fail_loads(true);
        let b = Arc::new(MockDriver::new("flat"));
        let manager = manager(&[&a, &b]);
        manager.init().await.unwrap();
        assert_eq!(manager.current_driver_name().await.as_deref(), Some("flat"));
    }

    #[tokio::test]
    async fn save_falls_back_and_switches_permanently() {
        let a = Arc::new(MockDriver::new("sqlite"));
        let b = Arc::new(MockDriver::new("embedded"));
        let manager = manager(&[&a, &b]);
        manager.init().await.unwrap();

        a.fail_saves(true);
        manager
            .save(&OfflinePatch::new().with_full_sync_completed(true))
            .await
            .unwrap();
        assert_eq!(manager.current_driver_name().await.as_deref(), Some("embedded"));
        assert!(b.snapshot().full_sync_completed);

        a.fail_saves(false);
        manager
            .save(&OfflinePatch::new().with_full_sync_completed(false))
            .await
            .unwrap();
        assert_eq!(manager.current_driver_name().await.as_deref(), Some("embedded"));
        assert_eq!(a.save_count(), 1);
    }

    #[tokio::test]
    async fn every_driver_failing_is_fatal() {
        let a = Arc::new(MockDriver::new("sqlite"));
        let b = Arc::new(MockDriver::new("flat"));
        let manager = manager(&[&a, &b]);
        manager.init().await.unwrap();
        a.fail_saves(true);
        b.fail_saves(true);

        let err = manager
            .save(&OfflinePatch::new().with_full_sync_completed(true))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(manager.current_driver_name().await.as_deref(), Some("sqlite"));
    }

    #[tokio::test]
    async fn no_available_driver_fails_init() {
        let a = Arc::new(MockDriver::new("sqlite").unavailable());
        let manager = manager(&[&a]);
        assert!(matches!(
            manager.init().await,
            Err(LecternError::NoStorageAvailable { .. })
        ));
    }

    #[tokio::test]
    async fn migrate_copies_data_and_switches() {
        let a = Arc::new(MockDriver::new("sqlite"));
        let b = Arc::new(MockDriver::new("flat"));
        let manager = manager(&[&a, &b]);
        manager
            .save(&OfflinePatch::new().with_full_sync_completed(true))
            .await
            .unwrap();

        manager.migrate_to("flat").await.unwrap();
        assert_eq!(manager.current_driver_name().await.as_deref(), Some("flat"));
        assert!(b.snapshot().full_sync_completed);

        let err = manager.migrate_to("cloud").await.unwrap_err();
        assert!(matches!(err, LecternError::Validation(_)));
    }
}
