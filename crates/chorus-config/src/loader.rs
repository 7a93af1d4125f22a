// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./chorus.toml` > `~/.config/chorus/chorus.toml` > `/etc/chorus/chorus.toml`
//! with environment variable overrides via `CHORUS_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ChorusConfig;

/// Top-level sections that environment variables may address.
const SECTIONS: &[&str] = &[
    "service",
    "storage",
    "session",
    "retry",
    "handshake",
    "generation",
    "bridge",
    "admin",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/chorus/chorus.toml` (system-wide)
/// 3. `~/.config/chorus/chorus.toml` (user XDG config)
/// 4. `./chorus.toml` (local directory)
/// 5. `CHORUS_*` environment variables
pub fn load_config() -> Result<ChorusConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ChorusConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChorusConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ChorusConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChorusConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The TOML files consulted by [`load_config`], lowest precedence first.
pub fn config_files() -> Vec<PathBuf> {
    let mut files = vec![PathBuf::from("/etc/chorus/chorus.toml")];
    if let Some(dir) = dirs::config_dir() {
        files.push(dir.join("chorus").join("chorus.toml"));
    }
    let local = std::env::current_dir()
        .map(|dir| dir.join("chorus.toml"))
        .unwrap_or_else(|_| PathBuf::from("chorus.toml"));
    files.push(local);
    files
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    config_files()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(ChorusConfig::default())),
            |figment, file| figment.merge(Toml::file(file)),
        )
        .merge(env_provider())
}

/// Environment provider mapping `CHORUS_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Only the leading section name is converted, so keys that contain another
/// section's name (`CHORUS_BRIDGE_SESSION_DIR`) stay intact.
fn env_provider() -> Env {
    Env::prefixed("CHORUS_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
