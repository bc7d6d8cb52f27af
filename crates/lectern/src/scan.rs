// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lectern scan` command implementation.

use lectern_app::NewAttendance;
use lectern_config::LecternConfig;
use lectern_core::{CaptureMethod, Direction, LecternError};

#[derive(Debug)]
pub struct ScanRequest {
    /// Student id, or a visitor's name.
    pub subject: String,
    pub check_out: bool,
    pub method: CaptureMethod,
    pub visitor: bool,
    pub purpose: Option<String>,
}

impl ScanRequest {
    fn into_attendance(self) -> NewAttendance {
        let direction = if self.check_out {
            Direction::CheckOut
        } else {
            Direction::CheckIn
        };
        let mut new = if self.visitor {
            NewAttendance::visitor(&self.subject, direction)
        } else {
            NewAttendance::scan(self.subject, direction)
        };
        new = new.with_method(self.method);
        match self.purpose {
            Some(purpose) => new.with_purpose(purpose),
            None => new,
        }
    }
}

/// Record one attendance event locally. The entry is pushed by the next sync.
pub async fn run_scan(config: LecternConfig, request: ScanRequest) -> Result<(), LecternError> {
    let tracker = crate::open_tracker(config).await?;
    let result = tracker.add_attendance(request.into_attendance()).await;
    tracker.shutdown().await?;

    let entry = result?;
    println!(
        "{} {} at {}",
        entry.direction,
        entry.student_name,
        entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}
