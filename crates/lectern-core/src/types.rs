// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by storage, sync, and the application layer.
//!
//! These are the internal representations. The remote wire format
//! (`snake_case` rows) and the local SQLite row format each have their own
//! mapping functions in the crates that own those boundaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::ids;

/// Direction of an attendance event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Direction {
    CheckIn,
    CheckOut,
}

/// How an attendance event was captured.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CaptureMethod {
    Barcode,
    Biometric,
    #[default]
    Manual,
    Rfid,
}

/// Whether a registered person is a student or a staff member.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Staff,
}

/// A registered student or staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Storage identifier: a placeholder until the backend assigns a UUID.
    pub id: String,
    /// Business key, unique within a branch.
    pub student_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub strand: Option<String>,
    /// Library branch affiliation.
    pub library: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub rfid: Option<String>,
    #[serde(default)]
    pub biometric_template: Option<String>,
    /// Derived from attendance; never authoritative.
    #[serde(default)]
    pub last_scan: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
    /// Edited locally and not yet pushed.
    #[serde(default)]
    pub dirty: bool,
}

impl Student {
    /// True once the backend has assigned this record a permanent identifier.
    pub fn is_synced(&self) -> bool {
        !ids::needs_push(&self.id)
    }

    /// This record with the fields the backend never stores taken from `held`,
    /// the locally held copy it replaces.
    pub fn keep_local_fields(mut self, held: &Student) -> Student {
        if self.biometric_template.is_none() {
            self.biometric_template = held.biometric_template.clone();
        }
        self
    }
}

/// An attendance event (check-in or check-out).
///
/// The student's business key and display name are denormalized so the event
/// stays self-describing when the student record is not held locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub id: String,
    /// Permanent identifier of the owning student, when known.
    #[serde(default)]
    pub student_uuid: Option<String>,
    /// Business key, or a synthesized visitor key for visitor entries.
    pub student_id: String,
    pub student_name: String,
    /// Event time, not insertion time.
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    #[serde(default)]
    pub method: CaptureMethod,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    pub library: String,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub strand: Option<String>,
}

/// Prefix of synthesized business keys used for walk-in visitors.
pub const VISITOR_PREFIX: &str = "VISITOR-";

impl AttendanceEntry {
    /// True once the backend has assigned this event a permanent identifier.
    pub fn is_synced(&self) -> bool {
        !ids::needs_push(&self.id)
    }

    /// True if the academic classifier (course) is present and non-blank.
    pub fn has_course(&self) -> bool {
        self.course.as_deref().is_some_and(|c| !c.trim().is_empty())
    }

    /// True for visitor-type entries whose key is synthesized.
    pub fn is_visitor(&self) -> bool {
        self.student_id.starts_with(VISITOR_PREFIX)
    }

    /// Storage-level duplicate key: (business key, timestamp in ms, direction).
    pub fn composite_key(&self) -> CompositeKey {
        CompositeKey {
            student_id: self.student_id.clone(),
            timestamp_ms: self.timestamp.timestamp_millis(),
            direction: self.direction,
        }
    }

    /// Copy the academic classifiers from a student record.
    pub fn enrich_from(&mut self, student: &Student) {
        self.student_uuid = student
            .is_synced()
            .then(|| student.id.clone())
            .or_else(|| self.student_uuid.take());
        self.course = student.course.clone();
        self.year = student.year.clone();
        self.level = student.level.clone();
        self.strand = student.strand.clone();
    }
}

/// Exact identity of an attendance event at the storage level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey {
    pub student_id: String,
    pub timestamp_ms: i64,
    pub direction: Direction,
}

/// A link to a library document. Passed through storage untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentLink {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Truncate a timestamp to millisecond precision, the precision every
/// storage tier keeps.
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}
