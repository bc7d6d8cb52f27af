// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local persistence driver contract.

use async_trait::async_trait;

use crate::envelope::{OfflineData, OfflinePatch};
use crate::error::LecternError;

/// A local persistence tier (file-backed SQL, embedded object store, flat blob).
///
/// Drivers report failures as [`LecternError::Unavailable`] when their
/// facility is missing and [`LecternError::Storage`] otherwise. Fallback
/// between drivers is the storage manager's job, never the driver's.
#[async_trait]
pub trait StorageDriver: Send + Sync + 'static {
    /// Stable driver name (`sqlite`, `embedded`, `flat`).
    fn name(&self) -> &str;

    /// Whether the facility this driver needs is present.
    async fn is_available(&self) -> bool;

    /// Load the envelope.
    async fn load(&self) -> Result<OfflineData, LecternError>;

    /// Apply a partial write.
    async fn save(&self, patch: &OfflinePatch) -> Result<(), LecternError>;

    /// Remove everything this driver holds.
    async fn clear(&self) -> Result<(), LecternError>;

    /// Flush and release resources. Defaults to a no-op.
    async fn close(&self) -> Result<(), LecternError> {
        Ok(())
    }
}
