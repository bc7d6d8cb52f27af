// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repeat-scan suppression.

use std::time::Duration;

use chrono::{DateTime, Utc};
use lectern_core::{AttendanceEntry, Direction, LecternError};

/// Minimum spacing between two events of the same direction for one student.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    window: Duration,
}

impl CooldownPolicy {
    /// A zero window disables the check.
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Reject `direction` for `student_id` at `at` if the previous event of
    /// the same direction in `history` is inside the window.
    pub fn check(
        &self,
        history: &[AttendanceEntry],
        student_id: &str,
        direction: Direction,
        at: DateTime<Utc>,
    ) -> Result<(), LecternError> {
        if self.window.is_zero() {
            return Ok(());
        }
        let Some(previous) = history
            .iter()
            .filter(|e| e.student_id == student_id && e.direction == direction)
            .map(|e| e.timestamp)
            .max()
        else {
            return Ok(());
        };

        // A previous event stamped after `at` (clock skew) counts as just now.
        let elapsed = (at - previous).to_std().unwrap_or(Duration::ZERO);
        if elapsed >= self.window {
            return Ok(());
        }
        Err(LecternError::Cooldown {
            student_id: student_id.to_string(),
            direction,
            remaining: self.window - elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use lectern_test_utils::fixtures::{at, check_in, check_out};

    use super::*;

    fn policy() -> CooldownPolicy {
        CooldownPolicy::new(Duration::from_secs(60))
    }

    #[test]
    fn repeat_scan_inside_window_is_rejected() {
        let history = vec![check_in("S1", at(9, 0, 0))];
        let err = policy()
            .check(&history, "S1", Direction::CheckIn, at(9, 0, 20))
            .unwrap_err();
        assert!(err.is_cooldown());
        match err {
            LecternError::Cooldown { remaining, .. } => {
                assert_eq!(remaining, Duration::from_secs(40));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn other_direction_and_other_student_are_not_affected() {
        let history = vec![check_in("S1", at(9, 0, 0))];
        assert!(policy()
            .check(&history, "S1", Direction::CheckOut, at(9, 0, 5))
            .is_ok());
        assert!(policy()
            .check(&history, "S2", Direction::CheckIn, at(9, 0, 5))
            .is_ok());
    }

    #[test]
    fn window_boundary_is_allowed() {
        let history = vec![check_out("S1", at(9, 0, 0))];
        assert!(policy()
            .check(&history, "S1", Direction::CheckOut, at(9, 1, 0))
            .is_ok());
    }

    #[test]
    fn latest_event_decides() {
        let history = vec![check_in("S1", at(8, 0, 0)), check_in("S1", at(9, 0, 0))];
        assert!(policy()
            .check(&history, "S1", Direction::CheckIn, at(9, 0, 30))
            .is_err());
    }

    #[test]
    fn zero_window_disables_check() {
        let history = vec![check_in("S1", at(9, 0, 0))];
        assert!(CooldownPolicy::new(Duration::ZERO)
            .check(&history, "S1", Direction::CheckIn, at(9, 0, 0))
            .is_ok());
    }
}
