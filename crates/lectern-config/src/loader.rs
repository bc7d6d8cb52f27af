// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./lectern.toml` > `~/.config/lectern/lectern.toml` > `/etc/lectern/lectern.toml`
//! with environment variable overrides via `LECTERN_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::LecternConfig;

/// Sections recognized in `LECTERN_<SECTION>_<KEY>` environment variables.
const ENV_SECTIONS: &[&str] = &[
    "app",
    "storage",
    "remote",
    "sync",
    "realtime",
    "attendance",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/lectern/lectern.toml` (system-wide)
/// 3. `~/.config/lectern/lectern.toml` (user XDG config)
/// 4. `./lectern.toml` (local directory)
/// 5. `LECTERN_*` environment variables
pub fn load_config() -> Result<LecternConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<LecternConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LecternConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LecternConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LecternConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(LecternConfig::default()))
        .merge(Toml::file("/etc/lectern/lectern.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("lectern/lectern.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("lectern.toml"))
        .merge(env_provider())
}

/// Environment provider mapping `LECTERN_SYNC_INTERVAL_SECS` to `sync.interval_secs`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores themselves.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("LECTERN_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_first_section_only() {
        assert_eq!(map_env_key("sync_interval_secs"), "sync.interval_secs");
        assert_eq!(
            map_env_key("storage_encryption_key"),
            "storage.encryption_key"
        );
        assert_eq!(map_env_key("realtime_flush_delay_ms"), "realtime.flush_delay_ms");
        assert_eq!(map_env_key("unknown"), "unknown");
    }
}
