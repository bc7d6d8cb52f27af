// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lectern - offline-first attendance storage and sync.
//!
//! This is the binary entry point for a library front desk.

mod migrate;
mod scan;
mod serve;
mod status;
mod sync;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lectern_app::{Facilities, Tracker};
use lectern_config::LecternConfig;
use lectern_core::{CaptureMethod, LecternError};

/// Lectern - offline-first attendance storage and sync.
#[derive(Parser, Debug)]
#[command(name = "lectern", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the tracker and its sync scheduler until SIGINT or SIGTERM.
    Serve,
    /// Run one forced sync cycle and print its report.
    Sync {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show storage, connectivity and sync state.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Copy local data into another storage driver.
    Migrate {
        /// Target driver: sqlite, embedded or flat.
        #[arg(long)]
        to: String,
    },
    /// Record an attendance event.
    Scan {
        /// Student id, or the visitor's name with --visitor.
        student_id: String,
        /// Record a check-out instead of a check-in.
        #[arg(long)]
        check_out: bool,
        /// How the event was captured.
        #[arg(long, default_value = "manual")]
        method: CaptureMethod,
        /// Treat the argument as a walk-in visitor's name.
        #[arg(long)]
        visitor: bool,
        /// Reason for the visit.
        #[arg(long)]
        purpose: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => lectern_config::load_and_validate_path(path),
        None => lectern_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            lectern_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => {
            init_tracing(&config.app.log_level);
            serve::run_serve(config).await
        }
        Some(Commands::Sync { json }) => {
            init_tracing("warn");
            sync::run_sync(config, json).await
        }
        Some(Commands::Status { json, plain }) => {
            init_tracing("warn");
            status::run_status(config, json, plain).await
        }
        Some(Commands::Migrate { to }) => {
            init_tracing("warn");
            migrate::run_migrate(config, &to).await
        }
        Some(Commands::Scan {
            student_id,
            check_out,
            method,
            visitor,
            purpose,
        }) => {
            init_tracing("warn");
            let request = scan::ScanRequest {
                subject: student_id,
                check_out,
                method,
                visitor,
                purpose,
            };
            scan::run_scan(config, request).await
        }
        None => {
            println!("lectern: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("lectern: {e}");
        std::process::exit(1);
    }
}

/// Build a tracker over the configured remote, feed and storage.
pub(crate) async fn open_tracker(config: LecternConfig) -> Result<Tracker, LecternError> {
    let facilities = Facilities::from_config(&config)?;
    Tracker::init(config, facilities).await
}

/// Initializes the tracing subscriber with the given log level.
///
/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lectern={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn scan_parses_direction_and_method() {
        let cli = Cli::try_parse_from([
            "lectern", "scan", "S123", "--check-out", "--method", "rfid",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Scan {
                student_id,
                check_out,
                method,
                visitor,
                ..
            }) => {
                assert_eq!(student_id, "S123");
                assert!(check_out);
                assert_eq!(method, CaptureMethod::Rfid);
                assert!(!visitor);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(Cli::try_parse_from(["lectern", "scan", "S1", "--method", "telepathy"]).is_err());
    }

    #[test]
    fn migrate_requires_a_target() {
        assert!(Cli::try_parse_from(["lectern", "migrate"]).is_err());
        assert!(Cli::try_parse_from(["lectern", "migrate", "--to", "flat"]).is_ok());
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = lectern_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.app.branch, "main");
    }
}
