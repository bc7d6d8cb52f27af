// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire-format rows for the `students` and `attendance` tables.
//!
//! Field names match the remote columns (`snake_case`). Direction travels as
//! `type` and role as `user_type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Students ---

/// A `students` row as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRow {
    pub id: String,
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
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub rfid: Option<String>,
    #[serde(default)]
    pub last_scan: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of a student insert or update. The backend assigns `id` and
/// `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewStudentRow {
    pub student_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub course: Option<String>,
    pub year: Option<String>,
    pub level: Option<String>,
    pub strand: Option<String>,
    pub library: String,
    pub user_type: String,
    pub rfid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scan: Option<DateTime<Utc>>,
}

// --- Attendance ---

/// An `attendance` row as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRow {
    pub id: String,
    #[serde(default)]
    pub student_uuid: Option<String>,
    pub student_id: String,
    pub student_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub direction: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub strand: Option<String>,
}

/// Body of an attendance insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAttendanceRow {
    pub student_uuid: Option<String>,
    pub student_id: String,
    pub student_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub direction: String,
    pub method: String,
    pub purpose: Option<String>,
    pub contact: Option<String>,
    pub library: String,
    pub course: Option<String>,
    pub year: Option<String>,
    pub level: Option<String>,
    pub strand: Option<String>,
}

/// Error body returned by the row API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}
