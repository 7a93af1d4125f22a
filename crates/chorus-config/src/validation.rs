// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as positive intervals, coherent backoff bounds, and bind addresses.

use crate::diagnostic::ConfigError;
use crate::model::ChorusConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &ChorusConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |key: &'static str, problem: String| errors.push(ConfigError::invalid(key, problem));

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path", "must not be empty".into());
    }

    let session = &config.session;
    for (key, value) in [
        ("session.decision_interval_secs", session.decision_interval_secs),
        ("session.poll_interval_secs", session.poll_interval_secs),
        ("handshake.input_timeout_secs", config.handshake.input_timeout_secs),
        ("handshake.submit_timeout_secs", config.handshake.submit_timeout_secs),
        ("generation.timeout_secs", config.generation.timeout_secs),
        ("bridge.request_timeout_secs", config.bridge.request_timeout_secs),
    ] {
        if value == 0 {
            fail(key, "must be greater than zero".into());
        }
    }

    if session.buffer_size == 0 {
        fail("session.buffer_size", "must be at least 1".into());
    }
    if session.history_fetch_limit == 0 {
        fail("session.history_fetch_limit", "must be at least 1".into());
    }

    let retry = &config.retry;
    if retry.max_attempts == 0 {
        fail("retry.max_attempts", "must be at least 1".into());
    }
    if retry.multiplier < 1.0 {
        fail(
            "retry.multiplier",
            format!("must be at least 1.0, got {}", retry.multiplier),
        );
    }
    if retry.initial_delay_ms > retry.max_delay_ms {
        fail(
            "retry.initial_delay_ms",
            format!(
                "({}) must not exceed retry.max_delay_ms ({})",
                retry.initial_delay_ms, retry.max_delay_ms
            ),
        );
    }

    if !(0.0..=2.0).contains(&config.generation.temperature) {
        fail(
            "generation.temperature",
            format!("must be between 0.0 and 2.0, got {}", config.generation.temperature),
        );
    }

    if config.bridge.command.trim().is_empty() {
        fail("bridge.command", "must not be empty".into());
    }

    let addr = config.admin.bind_address.trim();
    if addr.is_empty() {
        fail("admin.bind_address", "must not be empty".into());
    } else if addr.parse::<std::net::IpAddr>().is_err() && !is_hostname(addr) {
        fail(
            "admin.bind_address",
            format!("`{addr}` is not a valid IP address or hostname"),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_hostname(addr: &str) -> bool {
    addr.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
