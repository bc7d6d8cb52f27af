// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lectern status` command implementation.
//!
//! Opens local storage, probes the remote backend once, and prints what is
//! stored, what is waiting to be pushed, and when the last sync finished.

use std::io::IsTerminal;

use chrono::{DateTime, Utc};
use lectern_app::TrackerStatus;
use lectern_config::LecternConfig;
use lectern_core::LecternError;

/// Run the `lectern status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(config: LecternConfig, json: bool, plain: bool) -> Result<(), LecternError> {
    let tracker = crate::open_tracker(config).await?;
    tracker.check_connectivity().await;
    let status = tracker.status().await?;
    tracker.shutdown().await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&status, Utc::now(), use_color);
    }
    Ok(())
}

/// Format the time since `then` as a short human-readable string.
fn format_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h ago")
    } else if hours > 0 {
        format!("{hours}h {minutes}m ago")
    } else if minutes > 0 {
        format!("{minutes}m ago")
    } else {
        format!("{secs}s ago")
    }
}

fn print_status(status: &TrackerStatus, now: DateTime<Utc>, use_color: bool) {
    let storage = status.storage_engine.as_deref().unwrap_or("none");
    let last_sync = status
        .last_sync
        .map(|at| format_age(at, now))
        .unwrap_or_else(|| "never".to_string());

    println!();
    println!("  lectern status");
    println!("  {}", "-".repeat(35));

    if use_color {
        use colored::Colorize;
        let network = match (status.remote_configured, status.online) {
            (false, _) => "not configured".yellow(),
            (true, true) => "online".green(),
            (true, false) => "offline".red(),
        };
        println!("    Remote:   {network}");
        if status.degraded {
            println!("    Storage:  {} {}", storage, "(memory only)".red());
        } else {
            println!("    Storage:  {}", storage.green());
        }
    } else {
        let network = match (status.remote_configured, status.online) {
            (false, _) => "[--] not configured",
            (true, true) => "[OK] online",
            (true, false) => "[FAIL] offline",
        };
        println!("    Remote:   {network}");
        let suffix = if status.degraded { " (memory only)" } else { "" };
        println!("    Storage:  {storage}{suffix}");
    }

    println!("    Students: {}", status.students);
    println!(
        "    Records:  {} ({} waiting to push)",
        status.attendance, status.pending_pushes
    );
    println!("    Synced:   {last_sync} ({})", status.sync_state);
    if let Some(error) = &status.last_sync_error {
        println!("    Error:    {error}");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use lectern_sync::SyncState;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
    }

    #[test]
    fn format_age_seconds() {
        assert_eq!(format_age(now() - chrono::Duration::seconds(42), now()), "42s ago");
    }

    #[test]
    fn format_age_hours() {
        assert_eq!(
            format_age(now() - chrono::Duration::minutes(62), now()),
            "1h 2m ago"
        );
    }

    #[test]
    fn format_age_days() {
        assert_eq!(format_age(now() - chrono::Duration::hours(50), now()), "2d 2h ago");
    }

    #[test]
    fn future_timestamps_read_as_now() {
        assert_eq!(format_age(now() + chrono::Duration::seconds(5), now()), "0s ago");
    }

    #[test]
    fn status_serializes_for_scripts() {
        let status = TrackerStatus {
            online: false,
            remote_configured: true,
            storage_engine: Some("sqlite".into()),
            degraded: false,
            students: 3,
            attendance: 7,
            pending_pushes: 2,
            last_sync: None,
            full_sync_completed: false,
            sync_state: SyncState::Idle,
            sync_cycles: 0,
            last_sync_error: None,
            realtime_pending: 0,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"storage_engine\":\"sqlite\""));
        assert!(json.contains("\"pending_pushes\":2"));
        assert!(json.contains("\"sync_state\":\"idle\""));
    }
}
