// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Chorus session engine.

use std::time::Duration;

use thiserror::Error;

use crate::types::{AccountId, ChatId};

/// The primary error type used across all Chorus collaborator traits and core operations.
#[derive(Debug, Error)]
pub enum ChorusError {
    /// Configuration errors (invalid values, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A transport call failed in a way that may succeed when retried
    /// (network blip, flood wait, sidecar restart).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A retried operation failed on every attempt.
    #[error("operation failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        source: Box<ChorusError>,
    },

    /// Login was rejected, timed out, or requires an unsupported step.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A handshake input was submitted while no handshake was waiting for it.
    #[error("no handshake is waiting for {step} input")]
    SubmissionTimeout { step: &'static str },

    /// No live session is registered for the account.
    #[error("no active session for account {0}")]
    SessionNotFound(AccountId),

    /// Reply text generation failed.
    #[error("generation error: {message}")]
    Generation {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The access credential for a conversation could not be resolved.
    #[error("cannot resolve address for chat {chat_id}: {message}")]
    AddressResolution { chat_id: ChatId, message: String },

    /// A referenced record does not exist in the administrative store.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The governing cancellation signal fired before the operation finished.
    #[error("operation cancelled")]
    Cancelled,

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChorusError {
    /// Shorthand for a transport failure without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a generation failure without an underlying source.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
            source: None,
        }
    }

    /// Whether retrying the failed operation could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_timeout_are_transient() {
        assert!(ChorusError::transport("reset").is_transient());
        assert!(
            ChorusError::Timeout {
                duration: Duration::from_secs(1)
            }
            .is_transient()
        );
        assert!(!ChorusError::Cancelled.is_transient());
        assert!(!ChorusError::generation("empty").is_transient());
    }

    #[test]
    fn retries_exhausted_reports_last_failure() {
        let err = ChorusError::RetriesExhausted {
            attempts: 3,
            source: Box::new(ChorusError::transport("connection reset")),
        };
        assert_eq!(
            err.to_string(),
            "operation failed after 3 attempts: transport error: connection reset"
        );
    }

    #[test]
    fn submission_timeout_names_the_step() {
        let err = ChorusError::SubmissionTimeout { step: "code" };
        assert_eq!(err.to_string(), "no handshake is waiting for code input");
    }
}
