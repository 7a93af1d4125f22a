// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Chorus session engine.
//!
//! Layered TOML files plus `CHORUS_*` overrides, deserialized strictly and
//! checked semantically. Every problem is reported at once as a miette
//! diagnostic.
//!
//! # Usage
//!
//! ```no_run
//! use chorus_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("decision interval: {}s", config.session.decision_interval_secs);
//! ```

use std::path::{Path, PathBuf};

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{config_files, load_config, load_config_from_path, load_config_from_str};
pub use model::{
    AdminConfig, BridgeConfig, ChorusConfig, GenerationConfig, HandshakeConfig, RetryConfig,
    ServiceConfig, SessionConfig, StorageConfig,
};

/// Load configuration from the XDG hierarchy and validate it.
///
/// Returns either a valid `ChorusConfig` or every diagnostic found.
pub fn load_and_validate() -> Result<ChorusConfig, Vec<ConfigError>> {
    finish(loader::load_config(), || read_sources(&loader::config_files()))
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<ChorusConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        read_sources(&[path.to_path_buf()])
    })
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<ChorusConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Turn a figment result into diagnostics, reading sources only on failure.
fn finish(
    loaded: Result<ChorusConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<ChorusConfig, Vec<ConfigError>> {
    let config = loaded.map_err(|err| diagnostic::figment_to_config_errors(err, &sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

fn read_sources(paths: &[PathBuf]) -> Vec<(String, String)> {
    paths
        .iter()
        .filter_map(|path| {
            std::fs::read_to_string(path)
                .ok()
                .map(|content| (path.display().to_string(), content))
        })
        .collect()
}
