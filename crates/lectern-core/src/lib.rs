// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Lectern attendance tracker.
//!
//! This crate owns the domain model (students, attendance events, the offline
//! envelope), the error taxonomy shared by every layer, and the traits that
//! separate the sync engine from its collaborators: local persistence drivers,
//! the remote row API, the realtime change feed, and the clock.

pub mod change;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod traits;
pub mod types;

pub use change::{Change, ChangeEvent, Table};
pub use envelope::{OfflineData, OfflinePatch, attendance_diff};
pub use error::LecternError;
pub use types::{
    AttendanceEntry, CaptureMethod, CompositeKey, Direction, DocumentLink, Role, Student,
};

pub use traits::{AttendanceProbe, ChangeFeed, Clock, RemoteBackend, StorageDriver, SystemClock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lectern_error_has_all_variants() {
        let _config = LecternError::Config("test".into());
        let _storage = LecternError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _unavailable = LecternError::Unavailable {
            driver: "sqlite".into(),
            reason: "no filesystem".into(),
        };
        let _fatal = LecternError::NoStorageAvailable {
            attempts: vec!["sqlite".into(), "flat".into()],
        };
        let _remote = LecternError::Remote {
            message: "test".into(),
            source: None,
        };
        let _timeout = LecternError::Timeout {
            duration: std::time::Duration::from_secs(15),
        };
        let _cooldown = LecternError::Cooldown {
            student_id: "S123".into(),
            direction: Direction::CheckIn,
            remaining: std::time::Duration::from_secs(12),
        };
        let _validation = LecternError::Validation("test".into());
        let _crypto = LecternError::Crypto("test".into());
        let _internal = LecternError::Internal("test".into());
    }

    #[test]
    fn all_trait_objects_are_constructible() {
        fn _assert_driver(_: &dyn StorageDriver) {}
        fn _assert_remote(_: &dyn RemoteBackend) {}
        fn _assert_feed(_: &dyn ChangeFeed) {}
        fn _assert_clock(_: &dyn Clock) {}
    }
}
