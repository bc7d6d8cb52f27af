// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change notifications delivered by the remote realtime feed.

use strum::{Display, EnumString};

use crate::types::{AttendanceEntry, Student};

/// Remote tables the feed reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Table {
    Students,
    Attendance,
}

/// A single row-level change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<T> {
    Insert(T),
    Update(T),
    /// Deletes carry only the old row's identifier.
    Delete { id: String },
}

impl<T> Change<T> {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Insert(_) => "insert",
            Self::Update(_) => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// A change to either table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Student(Change<Student>),
    Attendance(Change<AttendanceEntry>),
}

impl ChangeEvent {
    pub fn table(&self) -> Table {
        match self {
            Self::Student(_) => Table::Students,
            Self::Attendance(_) => Table::Attendance,
        }
    }

    /// Identifier of the affected row.
    pub fn entity_id(&self) -> &str {
        match self {
            Self::Student(Change::Insert(s) | Change::Update(s)) => &s.id,
            Self::Attendance(Change::Insert(e) | Change::Update(e)) => &e.id,
            Self::Student(Change::Delete { id }) | Self::Attendance(Change::Delete { id }) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Student(c) => c.kind(),
            Self::Attendance(c) => c.kind(),
        }
    }
}
