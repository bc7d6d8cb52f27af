// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Field-by-field mapping between wire rows and domain types.

use chrono::{DateTime, Utc};
use lectern_core::{AttendanceEntry, CaptureMethod, Direction, LecternError, Role, Student};

use crate::types::{AttendanceRow, NewAttendanceRow, NewStudentRow, StudentRow};

pub fn student_from_row(row: StudentRow) -> Student {
    Student {
        id: row.id,
        student_id: row.student_id,
        name: row.name,
        email: row.email,
        phone: row.phone,
        course: row.course,
        year: row.year,
        level: row.level,
        strand: row.strand,
        library: row.library.unwrap_or_default(),
        role: row
            .user_type
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or(Role::Student),
        rfid: row.rfid,
        biometric_template: None,
        last_scan: row.last_scan,
        registered_at: row.created_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        dirty: false,
    }
}

/// Insert/update body for a student. Local-only fields (id, biometric
/// template, dirty flag) are not sent.
pub fn new_student_row(student: &Student) -> NewStudentRow {
    NewStudentRow {
        student_id: student.student_id.clone(),
        name: student.name.clone(),
        email: student.email.clone(),
        phone: student.phone.clone(),
        course: student.course.clone(),
        year: student.year.clone(),
        level: student.level.clone(),
        strand: student.strand.clone(),
        library: student.library.clone(),
        user_type: student.role.to_string(),
        rfid: student.rfid.clone(),
        last_scan: student.last_scan,
    }
}

pub fn attendance_from_row(row: AttendanceRow) -> Result<AttendanceEntry, LecternError> {
    let direction: Direction = row.direction.parse().map_err(|_| LecternError::Remote {
        message: format!("attendance row {} has unknown type `{}`", row.id, row.direction),
        source: None,
    })?;
    Ok(AttendanceEntry {
        id: row.id,
        student_uuid: row.student_uuid,
        student_id: row.student_id,
        student_name: row.student_name,
        timestamp: row.timestamp,
        direction,
        method: row
            .method
            .as_deref()
            .and_then(|m| m.parse().ok())
            .unwrap_or(CaptureMethod::Manual),
        purpose: row.purpose,
        contact: row.contact,
        library: row.library.unwrap_or_default(),
        course: row.course,
        year: row.year,
        level: row.level,
        strand: row.strand,
    })
}

/// Insert body for an attendance event. A placeholder student reference is
/// never sent.
pub fn new_attendance_row(entry: &AttendanceEntry) -> NewAttendanceRow {
    NewAttendanceRow {
        student_uuid: entry
            .student_uuid
            .clone()
            .filter(|id| lectern_core::ids::is_remote_id(id)),
        student_id: entry.student_id.clone(),
        student_name: entry.student_name.clone(),
        timestamp: entry.timestamp,
        direction: entry.direction.to_string(),
        method: entry.method.to_string(),
        purpose: entry.purpose.clone(),
        contact: entry.contact.clone(),
        library: entry.library.clone(),
        course: entry.course.clone(),
        year: entry.year.clone(),
        level: entry.level.clone(),
        strand: entry.strand.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_json() -> serde_json::Value {
        serde_json::json!({
            "id": "0d5e1f3c-8a1b-4b77-9d0a-3f4c5b6a7e81",
            "student_id": "S123",
            "student_name": "Ana Reyes",
            "student_uuid": null,
            "timestamp": "2026-05-04T09:00:00+00:00",
            "type": "check-out",
            "method": "rfid",
            "library": "main",
            "course": "BSIT"
        })
    }

    #[test]
    fn attendance_row_maps_type_to_direction() {
        let row: AttendanceRow = serde_json::from_value(row_json()).unwrap();
        let entry = attendance_from_row(row).unwrap();
        assert_eq!(entry.direction, Direction::CheckOut);
        assert_eq!(entry.method, CaptureMethod::Rfid);
        assert_eq!(entry.course.as_deref(), Some("BSIT"));
        assert!(entry.is_synced());
    }

    #[test]
    fn unknown_direction_is_rejected() {
        let mut json = row_json();
        json["type"] = "sideways".into();
        let row: AttendanceRow = serde_json::from_value(json).unwrap();
        assert!(attendance_from_row(row).is_err());
    }

    #[test]
    fn new_attendance_row_drops_placeholder_student_reference() {
        let row: AttendanceRow = serde_json::from_value(row_json()).unwrap();
        let mut entry = attendance_from_row(row).unwrap();
        entry.student_uuid = Some("local-0123456789abcdef0123456789abcdef".into());
        let body = serde_json::to_value(new_attendance_row(&entry)).unwrap();
        assert!(body["student_uuid"].is_null());
        assert_eq!(body["type"], "check-out");
        assert!(body.get("id").is_none());
    }

    #[test]
    fn student_row_defaults_role_and_library() {
        let row: StudentRow = serde_json::from_value(serde_json::json!({
            "id": "0d5e1f3c-8a1b-4b77-9d0a-3f4c5b6a7e81",
            "student_id": "S9",
            "name": "Lee",
            "user_type": "staff"
        }))
        .unwrap();
        let student = student_from_row(row);
        assert_eq!(student.role, Role::Staff);
        assert_eq!(student.library, "");
        assert!(!student.dirty);

        let body = serde_json::to_value(new_student_row(&student)).unwrap();
        assert_eq!(body["user_type"], "staff");
        assert!(body.get("last_scan").is_none());
    }
}
