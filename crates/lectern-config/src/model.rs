// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Lectern attendance tracker.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Lectern configuration.
///
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LecternConfig {
    /// Application identity and host environment.
    #[serde(default)]
    pub app: AppConfig,

    /// Local persistence settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Remote row API settings.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Sync cadence and windows.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Realtime change feed settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Attendance capture rules.
    #[serde(default)]
    pub attendance: AttendanceConfig,
}

/// The environment the tracker runs in. Decides which storage tiers exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    /// Desktop shell with direct filesystem access; file-backed SQL is available.
    #[default]
    Desktop,
    /// Browser-like host; only embedded and flat stores exist.
    Browser,
    /// Server or kiosk without a desktop shell.
    Headless,
}

/// Application identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Display name of this installation.
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Library branch this installation records attendance for.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Host environment.
    #[serde(default)]
    pub host: HostKind,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            log_level: default_log_level(),
            branch: default_branch(),
            host: HostKind::default(),
        }
    }
}

fn default_app_name() -> String {
    "lectern".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

/// Local persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// SQLite busy timeout, generous for slow or networked filesystems.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Driver preference order.
    #[serde(default = "default_drivers")]
    pub drivers: Vec<String>,

    /// Directory holding the flat fallback blob.
    #[serde(default = "default_flat_path")]
    pub flat_path: String,

    /// Provide an in-process embedded object store on native hosts.
    #[serde(default)]
    pub embedded_enabled: bool,

    /// Days of attendance the embedded driver returns on load.
    #[serde(default = "default_attendance_window_days")]
    pub attendance_window_days: u32,

    /// Encrypt sensitive student columns in the SQLite store.
    #[serde(default)]
    pub encrypt_sensitive: bool,

    /// Hex-encoded 256-bit key for the sensitive-column transform.
    #[serde(default)]
    pub encryption_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
            drivers: default_drivers(),
            flat_path: default_flat_path(),
            embedded_enabled: false,
            attendance_window_days: default_attendance_window_days(),
            encrypt_sensitive: false,
            encryption_key: None,
        }
    }
}

fn data_dir() -> std::path::PathBuf {
    dirs::data_dir()
        .map(|p| p.join("lectern"))
        .unwrap_or_else(|| std::path::PathBuf::from("."))
}

fn default_database_path() -> String {
    data_dir()
        .join("lectern.db")
        .to_string_lossy()
        .into_owned()
}

fn default_flat_path() -> String {
    data_dir().join("blobs").to_string_lossy().into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_drivers() -> Vec<String> {
    vec!["sqlite".into(), "embedded".into(), "flat".into()]
}

fn default_attendance_window_days() -> u32 {
    30
}

/// Remote row API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    /// Base URL of the backend. `None` runs permanently offline.
    #[serde(default)]
    pub url: Option<String>,

    /// API key sent as `apikey` and bearer token.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_request_timeout_secs() -> u64 {
    15
}

/// Sync cadence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Run background sync at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Interval between timer-triggered cycles.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Minimum spacing between cycles; forced syncs bypass it.
    #[serde(default = "default_min_spacing_secs")]
    pub min_spacing_secs: u64,

    /// Days of attendance considered by the push pass.
    #[serde(default = "default_push_window_days")]
    pub push_window_days: u32,

    /// Days of attendance fetched by a routine pull pass.
    #[serde(default = "default_pull_window_days")]
    pub pull_window_days: u32,

    /// Age a local entry must reach before it is pushed. Ignored on desktop hosts.
    #[serde(default = "default_push_grace_secs")]
    pub push_grace_secs: u64,

    /// Interval between connectivity probes.
    #[serde(default = "default_connectivity_poll_secs")]
    pub connectivity_poll_secs: u64,

    /// Timestamp tolerance for treating two events as the same.
    #[serde(default = "default_match_tolerance_secs")]
    pub match_tolerance_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
            min_spacing_secs: default_min_spacing_secs(),
            push_window_days: default_push_window_days(),
            pull_window_days: default_pull_window_days(),
            push_grace_secs: default_push_grace_secs(),
            connectivity_poll_secs: default_connectivity_poll_secs(),
            match_tolerance_secs: default_match_tolerance_secs(),
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn min_spacing(&self) -> Duration {
        Duration::from_secs(self.min_spacing_secs)
    }

    pub fn push_grace(&self) -> Duration {
        Duration::from_secs(self.push_grace_secs)
    }

    pub fn connectivity_poll(&self) -> Duration {
        Duration::from_secs(self.connectivity_poll_secs)
    }

    pub fn match_tolerance(&self) -> Duration {
        Duration::from_secs(self.match_tolerance_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    60
}

fn default_min_spacing_secs() -> u64 {
    30
}

fn default_push_window_days() -> u32 {
    7
}

fn default_pull_window_days() -> u32 {
    30
}

fn default_push_grace_secs() -> u64 {
    5
}

fn default_connectivity_poll_secs() -> u64 {
    15
}

fn default_match_tolerance_secs() -> u64 {
    10
}

/// Realtime change feed configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeConfig {
    /// Subscribe to the change feed when a remote is configured.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Batching delay after the first pending change.
    #[serde(default = "default_flush_delay_ms")]
    pub flush_delay_ms: u64,

    /// Websocket heartbeat interval.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Delay before reconnecting a dropped feed.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            flush_delay_ms: default_flush_delay_ms(),
            heartbeat_secs: default_heartbeat_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

impl RealtimeConfig {
    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }
}

fn default_flush_delay_ms() -> u64 {
    2_000
}

fn default_heartbeat_secs() -> u64 {
    30
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

/// Attendance capture configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AttendanceConfig {
    /// Minimum interval between two same-direction scans of one student.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl AttendanceConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

fn default_cooldown_secs() -> u64 {
    60
}
