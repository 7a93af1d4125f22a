// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Chorus session engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Chorus configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChorusConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Defaults for per-account session behaviour.
    #[serde(default)]
    pub session: SessionConfig,

    /// Backoff for transport sends and history fetches.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Interactive login timeouts.
    #[serde(default)]
    pub handshake: HandshakeConfig,

    /// Reply generation endpoint settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Transport sidecar settings.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Administrative HTTP surface.
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Instance name, used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "chorus".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("chorus").join("chorus.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("chorus.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Defaults applied when an account leaves a behaviour knob unset.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Seconds between decision-and-reply cycles.
    #[serde(default = "default_decision_interval_secs")]
    pub decision_interval_secs: u64,

    /// Seconds between history polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Maximum buffered messages per conversation.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Minimum seconds between replies in one conversation.
    #[serde(default = "default_reply_interval_secs")]
    pub reply_interval_secs: u64,

    /// Seconds between the parts of a split reply.
    #[serde(default = "default_multi_message_interval_secs")]
    pub multi_message_interval_secs: u64,

    /// Messages requested per history poll.
    #[serde(default = "default_history_fetch_limit")]
    pub history_fetch_limit: usize,

    /// Role/content pairs of generation history kept per conversation.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    /// Split fragments shorter than this many characters are merged into the next line.
    #[serde(default = "default_split_merge_threshold")]
    pub split_merge_threshold: usize,

    /// Separator placed between buffered messages in the stimulus.
    #[serde(default = "default_stimulus_delimiter")]
    pub stimulus_delimiter: String,

    /// Instruction placed before the stimulus in the generation prompt.
    #[serde(default = "default_stimulus_preamble")]
    pub stimulus_preamble: String,

    /// Directory for per-account activity logs. `None` disables them.
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Seconds to wait for a session's tasks to finish on shutdown.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            decision_interval_secs: default_decision_interval_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            buffer_size: default_buffer_size(),
            reply_interval_secs: default_reply_interval_secs(),
            multi_message_interval_secs: default_multi_message_interval_secs(),
            history_fetch_limit: default_history_fetch_limit(),
            history_turns: default_history_turns(),
            split_merge_threshold: default_split_merge_threshold(),
            stimulus_delimiter: default_stimulus_delimiter(),
            stimulus_preamble: default_stimulus_preamble(),
            log_dir: None,
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

fn default_decision_interval_secs() -> u64 {
    5
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_buffer_size() -> usize {
    10
}

fn default_reply_interval_secs() -> u64 {
    60
}

fn default_multi_message_interval_secs() -> u64 {
    5
}

fn default_history_fetch_limit() -> usize {
    5
}

fn default_history_turns() -> usize {
    5
}

fn default_split_merge_threshold() -> usize {
    20
}

fn default_stimulus_delimiter() -> String {
    "\n---\n".to_string()
}

fn default_stimulus_preamble() -> String {
    "Here are the latest messages from the group chat. Join the discussion with your own \
     view. Reply with only what you would say, without quoting the messages.\n\n"
        .to_string()
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

/// Exponential backoff configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failure, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Factor applied to the delay after each failure.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    2.0
}

/// Interactive login configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HandshakeConfig {
    /// How long a login waits for operator input at each step.
    #[serde(default = "default_input_timeout_secs")]
    pub input_timeout_secs: u64,

    /// How long a submission waits for a suspended login to accept it.
    #[serde(default = "default_submit_timeout_secs")]
    pub submit_timeout_secs: u64,
}

impl HandshakeConfig {
    pub fn input_timeout(&self) -> Duration {
        Duration::from_secs(self.input_timeout_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            input_timeout_secs: default_input_timeout_secs(),
            submit_timeout_secs: default_submit_timeout_secs(),
        }
    }
}

fn default_input_timeout_secs() -> u64 {
    300
}

fn default_submit_timeout_secs() -> u64 {
    5
}

/// OpenAI-compatible generation endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Base URL for chat completions.
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,

    /// Base URL used for models whose name starts with `deepseek`.
    #[serde(default = "default_deepseek_base_url")]
    pub deepseek_base_url: String,

    /// Model used when an account does not name one.
    #[serde(default = "default_generation_model")]
    pub default_model: String,

    /// System prompt used when an account does not set one.
    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,

    /// Maximum tokens to generate per reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_generation_base_url(),
            deepseek_base_url: default_deepseek_base_url(),
            default_model: default_generation_model(),
            default_system_prompt: default_system_prompt(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_deepseek_base_url() -> String {
    "https://api.deepseek.com/v1".to_string()
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_system_prompt() -> String {
    "You are a friendly member of a group chat. Keep replies short and natural.".to_string()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.7
}

fn default_generation_timeout_secs() -> u64 {
    60
}

/// Transport sidecar configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Sidecar executable, spawned once per account.
    #[serde(default = "default_bridge_command")]
    pub command: String,

    /// Extra arguments passed to the sidecar.
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables for the sidecar.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Directory holding per-account durable session credentials.
    #[serde(default = "default_session_dir")]
    pub session_dir: String,

    /// Seconds to wait for a sidecar response.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command: default_bridge_command(),
            args: Vec::new(),
            env: HashMap::new(),
            session_dir: default_session_dir(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_bridge_command() -> String {
    "chorus-sidecar".to_string()
}

fn default_session_dir() -> String {
    "data/sessions".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Administrative HTTP surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AdminConfig {
    /// Set to false to run without the HTTP surface.
    #[serde(default = "default_admin_enabled")]
    pub enabled: bool,

    /// Address to bind the server to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port to listen on.
    #[serde(default = "default_admin_port")]
    pub port: u16,

    /// Bearer token required on every request. `None` disables authentication.
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: default_admin_enabled(),
            bind_address: default_bind_address(),
            port: default_admin_port(),
            api_token: None,
        }
    }
}

fn default_admin_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_admin_port() -> u16 {
    8080
}
