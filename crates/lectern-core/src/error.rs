// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Lectern attendance tracker.

use std::time::Duration;

use thiserror::Error;

use crate::types::Direction;

/// The primary error type used across storage, sync, and application layers.
///
/// Merge conflicts and duplicate events are resolved deterministically by the
/// merge engine and never appear here.
#[derive(Debug, Error)]
pub enum LecternError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// A storage driver's prerequisite facility is absent. Triggers fallback.
    #[error("storage driver `{driver}` unavailable: {reason}")]
    Unavailable { driver: String, reason: String },

    /// A local read or write failed (I/O, quota, corruption, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Every configured storage driver failed the requested operation.
    #[error("no storage driver available (tried: {})", .attempts.join(", "))]
    NoStorageAvailable { attempts: Vec<String> },

    /// Remote backend errors (HTTP failure, unexpected status, decode failure).
    #[error("remote error: {message}")]
    Remote {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// A repeat scan arrived inside the cooldown window.
    #[error("please wait {}s before recording another {direction} for {student_id}", .remaining.as_secs().max(1))]
    Cooldown {
        student_id: String,
        direction: Direction,
        remaining: Duration,
    },

    /// Input rejected by a business rule (duplicate business key, empty name).
    #[error("validation error: {0}")]
    Validation(String),

    /// Confidentiality transform failures (bad key, tampered ciphertext).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LecternError {
    /// Wraps any error as a transient storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Wraps any error as a remote failure with a message prefix.
    pub fn remote<E>(message: impl Into<String>, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Remote {
            message: message.into(),
            source: Some(Box::new(err)),
        }
    }

    /// True when no storage is left and the caller must degrade to memory-only.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoStorageAvailable { .. })
    }

    /// True for failures worth retrying on the next scheduled attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Remote { .. } | Self::Timeout { .. }
        )
    }

    /// True for the deliberate "please wait" rejection.
    pub fn is_cooldown(&self) -> bool {
        matches!(self, Self::Cooldown { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_helpers() {
        let fatal = LecternError::NoStorageAvailable {
            attempts: vec!["sqlite".into()],
        };
        assert!(fatal.is_fatal());
        assert!(!fatal.is_transient());

        let timeout = LecternError::Timeout {
            duration: Duration::from_secs(1),
        };
        assert!(timeout.is_transient());

        let cooldown = LecternError::Cooldown {
            student_id: "S1".into(),
            direction: Direction::CheckOut,
            remaining: Duration::from_millis(300),
        };
        assert!(cooldown.is_cooldown());
        assert!(!cooldown.is_transient());
    }

    #[test]
    fn cooldown_message_shows_at_least_one_second() {
        let err = LecternError::Cooldown {
            student_id: "S123".into(),
            direction: Direction::CheckIn,
            remaining: Duration::from_millis(200),
        };
        assert_eq!(
            err.to_string(),
            "please wait 1s before recording another check-in for S123"
        );
    }

    #[test]
    fn no_storage_lists_attempts() {
        let err = LecternError::NoStorageAvailable {
            attempts: vec!["sqlite".into(), "embedded".into(), "flat".into()],
        };
        assert_eq!(
            err.to_string(),
            "no storage driver available (tried: sqlite, embedded, flat)"
        );
    }
}
