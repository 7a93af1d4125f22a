// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Chorus configuration system.

use chorus_config::diagnostic::ConfigError;
use chorus_config::model::ChorusConfig;
use chorus_config::{load_and_validate_str, load_config_from_str};
use serial_test::serial;

/// Valid TOML with known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_chorus_config() {
    let toml = r#"
[service]
name = "chorus-test"
log_level = "debug"

[storage]
database_path = "/tmp/chorus-test.db"
wal_mode = false

[session]
decision_interval_secs = 3
poll_interval_secs = 45
buffer_size = 20
log_dir = "/tmp/chorus-logs"

[retry]
max_attempts = 5
initial_delay_ms = 250
max_delay_ms = 4000
multiplier = 1.5

[generation]
default_model = "deepseek-chat"
temperature = 0.2

[bridge]
command = "/usr/local/bin/sidecar"
args = ["--quiet"]

[admin]
port = 9090
api_token = "secret"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "chorus-test");
    assert_eq!(config.storage.database_path, "/tmp/chorus-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.session.decision_interval_secs, 3);
    assert_eq!(config.session.poll_interval_secs, 45);
    assert_eq!(config.session.buffer_size, 20);
    assert_eq!(config.session.log_dir.as_deref(), Some("/tmp/chorus-logs"));
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.multiplier, 1.5);
    assert_eq!(config.generation.default_model, "deepseek-chat");
    assert_eq!(config.bridge.args, vec!["--quiet"]);
    assert_eq!(config.admin.port, 9090);
    assert_eq!(config.admin.api_token.as_deref(), Some("secret"));
}

/// Omitted sections fall back to their defaults.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML is valid");
    let defaults = ChorusConfig::default();
    assert_eq!(config.session.decision_interval_secs, 5);
    assert_eq!(config.session.poll_interval_secs, 30);
    assert_eq!(config.session.buffer_size, 10);
    assert_eq!(config.session.stimulus_delimiter, "\n---\n");
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.retry.initial_delay_ms, 1000);
    assert_eq!(config.retry.max_delay_ms, 10_000);
    assert_eq!(config.handshake.input_timeout_secs, 300);
    assert_eq!(config.handshake.submit_timeout_secs, 5);
    assert_eq!(config.generation.default_model, defaults.generation.default_model);
}

/// A typo in a section key is reported with a suggestion.
#[test]
fn unknown_key_suggests_correction() {
    let toml = r#"
[session]
bufer_size = 4
"#;

    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "bufer_size");
            assert_eq!(suggestion.as_deref(), Some("buffer_size"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

/// Wrong value types surface as type errors rather than panics.
#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[retry]
max_attempts = "three"
"#;

    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }));
}

/// Semantic validation runs after a successful parse.
#[test]
fn zero_poll_interval_fails_validation() {
    let toml = r#"
[session]
poll_interval_secs = 0
"#;

    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| e.to_string().contains("session.poll_interval_secs"))
    );
}

/// `CHORUS_<SECTION>_<KEY>` overrides the file, including keys that embed another section name.
#[test]
#[serial]
fn env_vars_override_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chorus.toml");
    std::fs::write(&path, "[session]\npoll_interval_secs = 30\n").unwrap();

    // SAFETY: every test touching the environment runs under `#[serial]`.
    unsafe {
        std::env::set_var("CHORUS_SESSION_POLL_INTERVAL_SECS", "45");
        std::env::set_var("CHORUS_BRIDGE_SESSION_DIR", "/srv/chorus/sessions");
    }
    let result = chorus_config::load_and_validate_path(&path);
    unsafe {
        std::env::remove_var("CHORUS_SESSION_POLL_INTERVAL_SECS");
        std::env::remove_var("CHORUS_BRIDGE_SESSION_DIR");
    }

    let config = result.unwrap();
    assert_eq!(config.session.poll_interval_secs, 45);
    assert_eq!(config.bridge.session_dir, "/srv/chorus/sessions");
}
