// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lectern migrate` command implementation.

use lectern_config::LecternConfig;
use lectern_core::LecternError;

/// Copy everything from the active driver into `target`.
///
/// The next start still picks the first usable driver in `storage.drivers`.
pub async fn run_migrate(config: LecternConfig, target: &str) -> Result<(), LecternError> {
    let first_choice = config.storage.drivers.first().cloned();
    let tracker = crate::open_tracker(config).await?;
    let before = tracker.status().await?;
    tracker.migrate_storage(target).await?;
    let after = tracker.status().await?;
    tracker.shutdown().await?;

    println!(
        "migrated {} students and {} records from {} to {}",
        after.students,
        after.attendance,
        before.storage_engine.as_deref().unwrap_or("none"),
        target
    );
    if first_choice.as_deref() != Some(target) {
        println!("set storage.drivers to start with \"{target}\" to keep using it");
    }
    Ok(())
}
