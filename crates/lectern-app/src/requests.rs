// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inputs to the tracker's write operations.

use chrono::{DateTime, Utc};
use lectern_core::types::VISITOR_PREFIX;
use lectern_core::{CaptureMethod, Direction, LecternError, Role};
use serde::Deserialize;

/// A scan or manual entry to record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewAttendance {
    /// Business key of a registered student, or a synthesized visitor key.
    pub student_id: String,
    pub direction: Direction,
    #[serde(default)]
    pub method: CaptureMethod,
    /// Display name for visitors; ignored for registered students.
    #[serde(default)]
    pub visitor_name: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    /// Event time; defaults to now.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewAttendance {
    pub fn scan(student_id: impl Into<String>, direction: Direction) -> Self {
        Self {
            student_id: student_id.into(),
            direction,
            method: CaptureMethod::default(),
            visitor_name: None,
            purpose: None,
            contact: None,
            timestamp: None,
        }
    }

    /// A walk-in visitor, keyed by a normalized form of their name.
    pub fn visitor(name: &str, direction: Direction) -> Self {
        let key = name
            .split_whitespace()
            .map(str::to_uppercase)
            .collect::<Vec<_>>()
            .join("-");
        Self {
            visitor_name: Some(name.trim().to_string()),
            ..Self::scan(format!("{VISITOR_PREFIX}{key}"), direction)
        }
    }

    pub fn with_method(mut self, method: CaptureMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub(crate) fn key(&self) -> Result<&str, LecternError> {
        let key = self.student_id.trim();
        if key.is_empty() || key == VISITOR_PREFIX {
            return Err(LecternError::Validation(
                "attendance needs a student id".into(),
            ));
        }
        Ok(key)
    }
}

/// A student or staff member to register.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewStudent {
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
    pub role: Role,
    #[serde(default)]
    pub rfid: Option<String>,
    /// Branch affiliation; defaults to the configured branch.
    #[serde(default)]
    pub library: Option<String>,
}

impl NewStudent {
    pub fn new(student_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), LecternError> {
        if self.student_id.trim().is_empty() {
            return Err(LecternError::Validation("student id must not be empty".into()));
        }
        if self.student_id.trim().starts_with(VISITOR_PREFIX) {
            return Err(LecternError::Validation(format!(
                "student id must not start with `{VISITOR_PREFIX}`"
            )));
        }
        if self.name.trim().is_empty() {
            return Err(LecternError::Validation("name must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visitor_key_is_normalized() {
        let visit = NewAttendance::visitor("  Ada   Lovelace ", Direction::CheckIn);
        assert_eq!(visit.student_id, "VISITOR-ADA-LOVELACE");
        assert_eq!(visit.visitor_name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn blank_keys_are_rejected() {
        assert!(NewAttendance::scan("  ", Direction::CheckIn).key().is_err());
        assert!(NewAttendance::visitor("", Direction::CheckIn).key().is_err());
        assert_eq!(
            NewAttendance::scan(" S1 ", Direction::CheckIn).key().unwrap(),
            "S1"
        );
    }

    #[test]
    fn student_validation() {
        assert!(NewStudent::new("S1", "Ada").validate().is_ok());
        assert!(NewStudent::new("", "Ada").validate().is_err());
        assert!(NewStudent::new("S1", " ").validate().is_err());
        assert!(NewStudent::new("VISITOR-X", "Ada").validate().is_err());
    }
}
