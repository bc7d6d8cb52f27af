// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lectern sync` command implementation.

use lectern_config::LecternConfig;
use lectern_core::LecternError;
use lectern_sync::{SyncOutcome, SyncReport};

/// Run one forced cycle and print what it did.
///
/// Exits non-zero when a pass failed, so cron jobs notice.
pub async fn run_sync(config: LecternConfig, json: bool) -> Result<(), LecternError> {
    let tracker = crate::open_tracker(config).await?;
    let outcome = tracker.force_sync().await;
    tracker.shutdown().await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        for line in describe(&outcome) {
            println!("{line}");
        }
    }

    match outcome.report() {
        Some(report) if !report.is_clean() => Err(LecternError::Remote {
            message: format!("sync finished with errors: {}", report.errors.join("; ")),
            source: None,
        }),
        _ => Ok(()),
    }
}

fn describe(outcome: &SyncOutcome) -> Vec<String> {
    match outcome {
        SyncOutcome::Skipped { reason } => vec![format!("sync skipped: {reason}")],
        SyncOutcome::Completed(report) => describe_report(report),
    }
}

fn describe_report(report: &SyncReport) -> Vec<String> {
    let elapsed = (report.finished_at - report.started_at).num_milliseconds();
    let mut lines = vec![format!("sync completed in {elapsed}ms ({})", report.trigger)];
    if let Some(push) = &report.push {
        lines.push(format!(
            "  push: {} students created, {} updated, {} records inserted, {} matched, {} deferred, {} failed",
            push.students_created,
            push.students_updated,
            push.attendance_inserted,
            push.attendance_matched,
            push.deferred,
            push.failures
        ));
    }
    if let Some(pull) = &report.pull {
        let kind = if pull.bootstrap { "full history" } else { "recent window" };
        lines.push(format!(
            "  pull ({kind}): {} students, {} records fetched, {} local-only kept, {} superseded",
            pull.students, pull.attendance_fetched, pull.local_only_kept, pull.superseded
        ));
    }
    for error in &report.errors {
        lines.push(format!("  error: {error}"));
    }
    lines
}
