// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for domain records used across test suites.

use chrono::{DateTime, TimeZone, Utc};
use lectern_core::ids::new_placeholder_id;
use lectern_core::{AttendanceEntry, CaptureMethod, Direction, Role, Student};

/// A fixed test day, at the given wall-clock time (UTC).
pub fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, hour, minute, second)
        .single()
        .unwrap()
}

/// A fresh remote-format identifier.
pub fn remote_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A local-only student with a placeholder id.
pub fn student(key: &str) -> Student {
    Student {
        id: new_placeholder_id(),
        student_id: key.to_string(),
        name: format!("Student {key}"),
        email: None,
        phone: None,
        course: Some("BSIT".into()),
        year: Some("3".into()),
        level: None,
        strand: None,
        library: "main".into(),
        role: Role::Student,
        rfid: None,
        biometric_template: None,
        last_scan: None,
        registered_at: at(8, 0, 0),
        dirty: false,
    }
}

/// A student that already carries a remote id.
pub fn synced_student(key: &str) -> Student {
    Student {
        id: remote_id(),
        ..student(key)
    }
}

/// A local-only check-in with a placeholder id and no academic fields.
pub fn check_in(key: &str, timestamp: DateTime<Utc>) -> AttendanceEntry {
    entry(&new_placeholder_id(), key, timestamp, Direction::CheckIn)
}

/// A local-only check-out with a placeholder id.
pub fn check_out(key: &str, timestamp: DateTime<Utc>) -> AttendanceEntry {
    entry(&new_placeholder_id(), key, timestamp, Direction::CheckOut)
}

/// An attendance entry with explicit id and direction.
pub fn entry(
    id: &str,
    key: &str,
    timestamp: DateTime<Utc>,
    direction: Direction,
) -> AttendanceEntry {
    AttendanceEntry {
        id: id.to_string(),
        student_uuid: None,
        student_id: key.to_string(),
        student_name: format!("Student {key}"),
        timestamp,
        direction,
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

/// The same event as stored remotely: remote id and academic fields filled.
pub fn remote_copy(local: &AttendanceEntry, id: &str) -> AttendanceEntry {
    AttendanceEntry {
        id: id.to_string(),
        course: Some("BSIT".into()),
        year: Some("3".into()),
        ..local.clone()
    }
}
