// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local row format for the SQLite driver and its mapping to domain types.
//!
//! Rows are read and written as plain column values inside the connection
//! thread; decryption and timestamp parsing happen outside it so failures
//! surface as [`LecternError`] rather than SQLite errors.

use chrono::{DateTime, Utc};
use lectern_core::{AttendanceEntry, CaptureMethod, Direction, LecternError, Role, Student};

use crate::crypto::FieldCipher;

/// Column values of one `students` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    pub id: String,
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
    pub rfid_digest: Option<String>,
    pub biometric_template: Option<String>,
    pub last_scan: Option<String>,
    pub registered_at: String,
    pub dirty: bool,
    pub encrypted: bool,
}

/// Column values of one `attendance` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub id: String,
    pub student_uuid: Option<String>,
    pub student_id: String,
    pub student_name: String,
    pub timestamp_ms: i64,
    pub direction: String,
    pub method: String,
    pub purpose: Option<String>,
    pub contact: Option<String>,
    pub library: String,
    pub course: Option<String>,
    pub year: Option<String>,
    pub level: Option<String>,
    pub strand: Option<String>,
    pub encrypted: bool,
}

pub const STUDENT_COLUMNS: &str = "id, student_id, name, email, phone, course, year, level, \
     strand, library, user_type, rfid, rfid_digest, biometric_template, last_scan, \
     registered_at, dirty, encrypted";

pub const ATTENDANCE_COLUMNS: &str = "id, student_uuid, student_id, student_name, timestamp_ms, \
     type, method, purpose, contact, library, course, year, level, strand, encrypted";

impl StudentRecord {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            student_id: row.get(1)?,
            name: row.get(2)?,
            email: row.get(3)?,
            phone: row.get(4)?,
            course: row.get(5)?,
            year: row.get(6)?,
            level: row.get(7)?,
            strand: row.get(8)?,
            library: row.get(9)?,
            user_type: row.get(10)?,
            rfid: row.get(11)?,
            rfid_digest: row.get(12)?,
            biometric_template: row.get(13)?,
            last_scan: row.get(14)?,
            registered_at: row.get(15)?,
            dirty: row.get(16)?,
            encrypted: row.get(17)?,
        })
    }

    pub fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO students ({STUDENT_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
            ),
            rusqlite::params![
                self.id,
                self.student_id,
                self.name,
                self.email,
                self.phone,
                self.course,
                self.year,
                self.level,
                self.strand,
                self.library,
                self.user_type,
                self.rfid,
                self.rfid_digest,
                self.biometric_template,
                self.last_scan,
                self.registered_at,
                self.dirty,
                self.encrypted,
            ],
        )?;
        Ok(())
    }
}

impl AttendanceRecord {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            student_uuid: row.get(1)?,
            student_id: row.get(2)?,
            student_name: row.get(3)?,
            timestamp_ms: row.get(4)?,
            direction: row.get(5)?,
            method: row.get(6)?,
            purpose: row.get(7)?,
            contact: row.get(8)?,
            library: row.get(9)?,
            course: row.get(10)?,
            year: row.get(11)?,
            level: row.get(12)?,
            strand: row.get(13)?,
            encrypted: row.get(14)?,
        })
    }

    /// Insert, first dropping any row with the same id or composite key.
    pub fn upsert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
        conn.execute(
            "DELETE FROM attendance WHERE id = ?1 \
             OR (student_id = ?2 AND timestamp_ms = ?3 AND type = ?4)",
            rusqlite::params![self.id, self.student_id, self.timestamp_ms, self.direction],
        )?;
        conn.execute(
            &format!(
                "INSERT INTO attendance ({ATTENDANCE_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            rusqlite::params![
                self.id,
                self.student_uuid,
                self.student_id,
                self.student_name,
                self.timestamp_ms,
                self.direction,
                self.method,
                self.purpose,
                self.contact,
                self.library,
                self.course,
                self.year,
                self.level,
                self.strand,
                self.encrypted,
            ],
        )?;
        Ok(())
    }
}

/// Map a student to its row, sealing sensitive columns when a cipher is set.
pub fn student_to_record(
    student: &Student,
    cipher: Option<&FieldCipher>,
) -> Result<StudentRecord, LecternError> {
    let mut record = StudentRecord {
        id: student.id.clone(),
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
        rfid_digest: None,
        biometric_template: student.biometric_template.clone(),
        last_scan: student.last_scan.map(|t| t.to_rfc3339()),
        registered_at: student.registered_at.to_rfc3339(),
        dirty: student.dirty,
        encrypted: false,
    };

    if let Some(cipher) = cipher {
        record.name = cipher.seal(&student.name)?;
        record.email = cipher.seal_opt(student.email.as_deref())?;
        record.phone = cipher.seal_opt(student.phone.as_deref())?;
        record.rfid = cipher.seal_opt(student.rfid.as_deref())?;
        record.rfid_digest = student.rfid.as_deref().map(|r| cipher.rfid_digest(r));
        record.biometric_template = cipher.seal_opt(student.biometric_template.as_deref())?;
        record.encrypted = true;
    }
    Ok(record)
}

/// Map a row back to a student, opening sealed columns.
pub fn student_from_record(
    record: StudentRecord,
    cipher: Option<&FieldCipher>,
) -> Result<Student, LecternError> {
    let mut record = record;
    if record.encrypted {
        let cipher = cipher.ok_or_else(|| sealed_without_key("student", &record.id))?;
        record.name = cipher.open(&record.name)?;
        record.email = cipher.open_opt(record.email.as_deref())?;
        record.phone = cipher.open_opt(record.phone.as_deref())?;
        record.rfid = cipher.open_opt(record.rfid.as_deref())?;
        record.biometric_template = cipher.open_opt(record.biometric_template.as_deref())?;
    }

    Ok(Student {
        id: record.id,
        student_id: record.student_id,
        name: record.name,
        email: record.email,
        phone: record.phone,
        course: record.course,
        year: record.year,
        level: record.level,
        strand: record.strand,
        library: record.library,
        role: record.user_type.parse().unwrap_or(Role::Student),
        rfid: record.rfid,
        biometric_template: record.biometric_template,
        last_scan: record.last_scan.as_deref().map(parse_timestamp).transpose()?,
        registered_at: parse_timestamp(&record.registered_at)?,
        dirty: record.dirty,
    })
}

/// Map an attendance entry to its row.
pub fn attendance_to_record(
    entry: &AttendanceEntry,
    cipher: Option<&FieldCipher>,
) -> Result<AttendanceRecord, LecternError> {
    let mut record = AttendanceRecord {
        id: entry.id.clone(),
        student_uuid: entry.student_uuid.clone(),
        student_id: entry.student_id.clone(),
        student_name: entry.student_name.clone(),
        timestamp_ms: entry.timestamp.timestamp_millis(),
        direction: entry.direction.to_string(),
        method: entry.method.to_string(),
        purpose: entry.purpose.clone(),
        contact: entry.contact.clone(),
        library: entry.library.clone(),
        course: entry.course.clone(),
        year: entry.year.clone(),
        level: entry.level.clone(),
        strand: entry.strand.clone(),
        encrypted: false,
    };

    if let Some(cipher) = cipher {
        record.student_name = cipher.seal(&entry.student_name)?;
        record.contact = cipher.seal_opt(entry.contact.as_deref())?;
        record.encrypted = true;
    }
    Ok(record)
}

/// Map a row back to an attendance entry.
pub fn attendance_from_record(
    record: AttendanceRecord,
    cipher: Option<&FieldCipher>,
) -> Result<AttendanceEntry, LecternError> {
    let mut record = record;
    if record.encrypted {
        let cipher = cipher.ok_or_else(|| sealed_without_key("attendance", &record.id))?;
        record.student_name = cipher.open(&record.student_name)?;
        record.contact = cipher.open_opt(record.contact.as_deref())?;
    }

    let direction: Direction = record.direction.parse().map_err(|_| {
        LecternError::Internal(format!(
            "attendance row {} has unknown type `{}`",
            record.id, record.direction
        ))
    })?;
    let timestamp = DateTime::from_timestamp_millis(record.timestamp_ms).ok_or_else(|| {
        LecternError::Internal(format!("attendance row {} has an out-of-range timestamp", record.id))
    })?;

    Ok(AttendanceEntry {
        id: record.id,
        student_uuid: record.student_uuid,
        student_id: record.student_id,
        student_name: record.student_name,
        timestamp,
        direction,
        method: record.method.parse().unwrap_or(CaptureMethod::Manual),
        purpose: record.purpose,
        contact: record.contact,
        library: record.library,
        course: record.course,
        year: record.year,
        level: record.level,
        strand: record.strand,
    })
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, LecternError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(LecternError::storage)
}

fn sealed_without_key(table: &str, id: &str) -> LecternError {
    LecternError::Crypto(format!(
        "{table} row {id} is encrypted but no encryption key is configured"
    ))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn student() -> Student {
        Student {
            id: "local-0001".into(),
            student_id: "S123".into(),
            name: "Ana Reyes".into(),
            email: Some("ana@example.edu".into()),
            phone: None,
            course: Some("BSIT".into()),
            year: Some("2".into()),
            level: None,
            strand: None,
            library: "main".into(),
            role: Role::Staff,
            rfid: Some("04A1B2".into()),
            biometric_template: None,
            last_scan: None,
            registered_at: Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap(),
            dirty: true,
        }
    }

    #[test]
    fn plain_student_maps_both_ways() {
        let record = student_to_record(&student(), None).unwrap();
        assert!(!record.encrypted);
        assert_eq!(record.user_type, "staff");
        assert_eq!(record.name, "Ana Reyes");
        assert_eq!(student_from_record(record, None).unwrap(), student());
    }

    #[test]
    fn sealed_student_hides_sensitive_columns() {
        let cipher = FieldCipher::new([3u8; 32]);
        let record = student_to_record(&student(), Some(&cipher)).unwrap();
        assert!(record.encrypted);
        assert_ne!(record.name, "Ana Reyes");
        assert_ne!(record.rfid.as_deref(), Some("04A1B2"));
        assert_eq!(record.rfid_digest, Some(cipher.rfid_digest("04A1B2")));
        assert_eq!(record.course.as_deref(), Some("BSIT"));

        let err = student_from_record(record.clone(), None).unwrap_err();
        assert!(matches!(err, LecternError::Crypto(_)));
        assert_eq!(student_from_record(record, Some(&cipher)).unwrap(), student());
    }

    #[test]
    fn attendance_record_keeps_direction_on_the_wire_format() {
        let entry = AttendanceEntry {
            id: "local-a".into(),
            student_uuid: None,
            student_id: "S123".into(),
            student_name: "Ana Reyes".into(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap(),
            direction: Direction::CheckOut,
            method: CaptureMethod::Rfid,
            purpose: None,
            contact: None,
            library: "main".into(),
            course: None,
            year: None,
            level: None,
            strand: None,
        };
        let record = attendance_to_record(&entry, None).unwrap();
        assert_eq!(record.direction, "check-out");
        assert_eq!(record.method, "rfid");
        assert_eq!(attendance_from_record(record, None).unwrap(), entry);
    }
}
