// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as known driver names, key lengths, and non-zero windows.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::LecternConfig;

/// Driver names the storage manager knows how to build.
pub const KNOWN_DRIVERS: &[&str] = &["sqlite", "embedded", "flat"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns all collected validation errors (does not fail fast).
pub fn validate_config(config: &LecternConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    if config.app.branch.trim().is_empty() {
        invalid("app.branch must not be empty".to_string());
    }

    if config.storage.database_path.trim().is_empty() {
        invalid("storage.database_path must not be empty".to_string());
    }

    if config.storage.flat_path.trim().is_empty() {
        invalid("storage.flat_path must not be empty".to_string());
    }

    if config.storage.drivers.is_empty() {
        invalid("storage.drivers must name at least one driver".to_string());
    }

    let mut seen = HashSet::new();
    for driver in &config.storage.drivers {
        if !KNOWN_DRIVERS.contains(&driver.as_str()) {
            invalid(format!(
                "storage.drivers contains unknown driver `{driver}` (known: {})",
                KNOWN_DRIVERS.join(", ")
            ));
        }
        if !seen.insert(driver) {
            invalid(format!("storage.drivers lists `{driver}` more than once"));
        }
    }

    if config.storage.attendance_window_days == 0 {
        invalid("storage.attendance_window_days must be at least 1".to_string());
    }

    if config.storage.encrypt_sensitive {
        match config.storage.encryption_key.as_deref() {
            None => invalid(
                "storage.encryption_key is required when storage.encrypt_sensitive is true"
                    .to_string(),
            ),
            Some(key) if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()) => {
                invalid("storage.encryption_key must be 64 hex characters (256 bits)".to_string())
            }
            Some(_) => {}
        }
    }

    if let Some(url) = config.remote.url.as_deref()
        && !(url.starts_with("https://") || url.starts_with("http://"))
    {
        invalid(format!("remote.url `{url}` must start with https:// or http://"));
    }

    if config.remote.request_timeout_secs == 0 {
        invalid("remote.request_timeout_secs must be at least 1".to_string());
    }

    if config.sync.interval_secs == 0 {
        invalid("sync.interval_secs must be at least 1".to_string());
    }

    if config.sync.min_spacing_secs == 0 {
        invalid("sync.min_spacing_secs must be at least 1".to_string());
    }

    if config.sync.push_window_days == 0 || config.sync.pull_window_days == 0 {
        invalid("sync.push_window_days and sync.pull_window_days must be at least 1".to_string());
    }

    if config.sync.connectivity_poll_secs == 0 {
        invalid("sync.connectivity_poll_secs must be at least 1".to_string());
    }

    if config.realtime.flush_delay_ms == 0 {
        invalid("realtime.flush_delay_ms must be greater than zero".to_string());
    }

    if config.realtime.heartbeat_secs == 0 {
        invalid("realtime.heartbeat_secs must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        let config = LecternConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn unknown_and_duplicate_drivers_fail_validation() {
        let mut config = LecternConfig::default();
        config.storage.drivers = vec!["sqlite".into(), "redis".into(), "sqlite".into()];
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "unknown driver `redis`"));
        assert!(has_message(&errors, "more than once"));
    }

    #[test]
    fn encryption_requires_a_valid_key() {
        let mut config = LecternConfig::default();
        config.storage.encrypt_sensitive = true;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "encryption_key is required"));

        config.storage.encryption_key = Some("abc".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "64 hex characters"));

        config.storage.encryption_key = Some("a".repeat(64));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn remote_url_needs_a_scheme() {
        let mut config = LecternConfig::default();
        config.remote.url = Some("db.example.org".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "remote.url"));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = LecternConfig::default();
        config.sync.interval_secs = 0;
        config.sync.min_spacing_secs = 0;
        config.realtime.flush_delay_ms = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
