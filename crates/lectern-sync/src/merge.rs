// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deduplication and merge of attendance events.
//!
//! Two events are the same logical event when they share business key and
//! direction and their timestamps are within a tolerance. Which copy survives
//! is decided by [`outranks`]: a copy carrying a course beats one without, a
//! backend-assigned id beats a placeholder, and a later timestamp beats an
//! earlier one. When all three are equal the copy already held is kept.
//!
//! Nothing in this module performs I/O.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lectern_core::envelope::sort_newest_first;
use lectern_core::{AttendanceEntry, Direction};

/// Default window inside which two events are considered the same.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(10);

/// Collapse events sharing (business key, direction, timestamp second).
///
/// The latest timestamp in each group survives; on a tie the entry later in
/// `entries` wins. Output is sorted newest first.
pub fn dedup_exact(entries: &[AttendanceEntry]) -> Vec<AttendanceEntry> {
    let mut kept: Vec<AttendanceEntry> = Vec::with_capacity(entries.len());
    let mut groups: HashMap<(&str, Direction, i64), usize> = HashMap::new();

    for entry in entries {
        let group = (
            entry.student_id.as_str(),
            entry.direction,
            entry.timestamp.timestamp(),
        );
        match groups.get(&group) {
            Some(&slot) => {
                if entry.timestamp >= kept[slot].timestamp {
                    kept[slot] = entry.clone();
                }
            }
            None => {
                groups.insert(group, kept.len());
                kept.push(entry.clone());
            }
        }
    }

    sort_newest_first(&mut kept);
    kept
}

/// True if `a` and `b` record the same logical event.
pub fn is_same_event(a: &AttendanceEntry, b: &AttendanceEntry, tolerance: Duration) -> bool {
    a.student_id == b.student_id
        && a.direction == b.direction
        && within(a.timestamp, b.timestamp, tolerance)
}

fn within(a: DateTime<Utc>, b: DateTime<Utc>, tolerance: Duration) -> bool {
    let apart = a - b;
    match apart.num_microseconds() {
        Some(micros) => u128::from(micros.unsigned_abs()) <= tolerance.as_micros(),
        // Too far apart to count in microseconds.
        None => u128::from(apart.num_milliseconds().unsigned_abs()) <= tolerance.as_millis(),
    }
}

/// True if `candidate` should replace `incumbent` as the copy of one event.
pub fn outranks(candidate: &AttendanceEntry, incumbent: &AttendanceEntry) -> bool {
    rank(candidate) > rank(incumbent)
}

fn rank(entry: &AttendanceEntry) -> (bool, bool, DateTime<Utc>) {
    (entry.has_course(), entry.is_synced(), entry.timestamp)
}

/// What [`fold_into`] did with an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fold {
    /// No copy was held; the entry was added.
    Inserted,
    /// The entry replaced the returned copy.
    Replaced(AttendanceEntry),
    /// A better copy was already held.
    Ignored,
}

/// Fold one entry into `list`.
///
/// An entry with the identifier of a held row replaces it outright. Otherwise
/// the first held row that is the same event is compared by [`outranks`].
/// The list is not re-sorted.
pub fn fold_into(
    list: &mut Vec<AttendanceEntry>,
    entry: AttendanceEntry,
    tolerance: Duration,
) -> Fold {
    if let Some(slot) = list.iter().position(|held| held.id == entry.id) {
        return Fold::Replaced(std::mem::replace(&mut list[slot], entry));
    }
    match list
        .iter()
        .position(|held| is_same_event(held, &entry, tolerance))
    {
        Some(slot) if outranks(&entry, &list[slot]) => {
            Fold::Replaced(std::mem::replace(&mut list[slot], entry))
        }
        Some(_) => Fold::Ignored,
        None => {
            list.push(entry);
            Fold::Inserted
        }
    }
}

/// Merge two provenances into one list, newest first.
///
/// `primary` is folded first, so on a full tie its copy is the one kept.
pub fn merge_fuzzy(
    primary: &[AttendanceEntry],
    secondary: &[AttendanceEntry],
    tolerance: Duration,
) -> Vec<AttendanceEntry> {
    let mut merged = Vec::with_capacity(primary.len() + secondary.len());
    for entry in primary.iter().chain(secondary) {
        fold_into(&mut merged, entry.clone(), tolerance);
    }
    sort_newest_first(&mut merged);
    merged
}

/// The local copy of an event once the backend acknowledged it as `remote`.
///
/// The result always carries the remote identifier. Content comes from
/// whichever copy ranks higher.
pub fn adopt_remote(local: &AttendanceEntry, remote: AttendanceEntry) -> AttendanceEntry {
    if outranks(&remote, local) {
        remote
    } else {
        AttendanceEntry {
            id: remote.id,
            student_uuid: local.student_uuid.clone().or(remote.student_uuid),
            ..local.clone()
        }
    }
}
