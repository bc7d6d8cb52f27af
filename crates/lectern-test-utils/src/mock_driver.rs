// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory storage driver with scriptable failures.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use lectern_core::{LecternError, OfflineData, OfflinePatch, StorageDriver};

/// A driver that keeps the envelope in memory.
///
/// Loads and saves can be made to fail on demand, and every save is recorded.
pub struct MockDriver {
    name: String,
    available: AtomicBool,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    loads: AtomicUsize,
    saves: AtomicUsize,
    data: Mutex<OfflineData>,
    patches: Mutex<Vec<OfflinePatch>>,
}

impl MockDriver {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: AtomicBool::new(true),
            fail_loads: AtomicBool::new(false),
            fail_saves: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
            data: Mutex::new(OfflineData::default()),
            patches: Mutex::new(Vec::new()),
        }
    }

    /// Start with this envelope.
    pub fn with_data(self, data: OfflineData) -> Self {
        *self.data.lock().unwrap() = data;
        self
    }

    /// Report unavailable from `is_available`.
    pub fn unavailable(self) -> Self {
        self.available.store(false, Ordering::SeqCst);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Current stored envelope.
    pub fn snapshot(&self) -> OfflineData {
        self.data.lock().unwrap().clone()
    }

    /// Every patch that was saved successfully, in order.
    pub fn patches(&self) -> Vec<OfflinePatch> {
        self.patches.lock().unwrap().clone()
    }

    /// Number of load attempts, including failed ones.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of save attempts, including failed ones.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn injected(&self, op: &str) -> LecternError {
        LecternError::storage(std::io::Error::other(format!(
            "{} {op} failed (injected)",
            self.name
        )))
    }
}

#[async_trait]
impl StorageDriver for MockDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn load(&self) -> Result<OfflineData, LecternError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(self.injected("load"));
        }
        Ok(self.snapshot())
    }

    async fn save(&self, patch: &OfflinePatch) -> Result<(), LecternError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(self.injected("save"));
        }
        self.data.lock().unwrap().apply(patch);
        self.patches.lock().unwrap().push(patch.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), LecternError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(self.injected("clear"));
        }
        *self.data.lock().unwrap() = OfflineData::default();
        Ok(())
    }
}
