// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interactive login handshake.
//!
//! The transport drives the login and suspends in [`AuthCallbacks`] whenever it
//! needs operator input. Each suspension persists a handshake record, then waits
//! on a [`Rendezvous`] until the administrative surface submits the value, the
//! session is cancelled, or the input timeout elapses.
//!
//! ```text
//! Unauthenticated -> AwaitingCode -> [AwaitingPassword] -> Completed
//!        \________________\_______________\______________-> Failed
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chorus_config::HandshakeConfig;
use chorus_core::{
    AccountId, AdminStore, AuthCallbacks, ChorusError, CodeChallenge, HandshakeState,
};
use chrono::Utc;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::rendezvous::{Rendezvous, WaitError};

/// In-memory phase of the handshake, as seen by operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    Unauthenticated,
    AwaitingCode,
    AwaitingPassword,
    Completed,
    Failed,
}

impl std::fmt::Display for HandshakePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandshakePhase::Unauthenticated => write!(f, "unauthenticated"),
            HandshakePhase::AwaitingCode => write!(f, "awaiting_code"),
            HandshakePhase::AwaitingPassword => write!(f, "awaiting_password"),
            HandshakePhase::Completed => write!(f, "completed"),
            HandshakePhase::Failed => write!(f, "failed"),
        }
    }
}

/// Login state machine for one account.
pub struct AuthHandshake {
    account_id: AccountId,
    phone_number: String,
    store: Arc<dyn AdminStore>,
    input_timeout: Duration,
    submit_timeout: Duration,
    cancel: CancellationToken,
    phase: Mutex<HandshakePhase>,
    code: Rendezvous<String>,
    password: Rendezvous<SecretString>,
}

impl AuthHandshake {
    /// A handshake governed by `cancel`, normally the owning session's token.
    pub fn new(
        account_id: AccountId,
        phone_number: impl Into<String>,
        store: Arc<dyn AdminStore>,
        config: &HandshakeConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            account_id,
            phone_number: phone_number.into(),
            store,
            input_timeout: config.input_timeout(),
            submit_timeout: config.submit_timeout(),
            cancel,
            phase: Mutex::new(HandshakePhase::Unauthenticated),
            code: Rendezvous::new(),
            password: Rendezvous::new(),
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn phase(&self) -> HandshakePhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: HandshakePhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    /// Hand a login code to the suspended handshake.
    ///
    /// Fails with `SubmissionTimeout` if no handshake is waiting for a code.
    pub async fn submit_code(&self, code: impl Into<String>) -> Result<(), ChorusError> {
        self.code
            .offer(code.into(), self.submit_timeout)
            .await
            .map_err(|_| ChorusError::SubmissionTimeout { step: "code" })
    }

    /// Hand the second-factor password to the suspended handshake.
    pub async fn submit_password(&self, password: SecretString) -> Result<(), ChorusError> {
        self.password
            .offer(password, self.submit_timeout)
            .await
            .map_err(|_| ChorusError::SubmissionTimeout { step: "password" })
    }

    /// Record that the transport accepted the login.
    pub fn mark_completed(&self) {
        self.set_phase(HandshakePhase::Completed);
    }

    /// Record that the login failed or was abandoned.
    pub fn mark_failed(&self) {
        self.set_phase(HandshakePhase::Failed);
    }

    fn expiry(&self) -> Result<chrono::DateTime<Utc>, ChorusError> {
        let ttl = chrono::Duration::from_std(self.input_timeout)
            .map_err(|e| ChorusError::Config(format!("handshake timeout out of range: {e}")))?;
        Ok(Utc::now() + ttl)
    }

    fn wait_failed(&self, step: &str, err: WaitError) -> ChorusError {
        self.mark_failed();
        match err {
            WaitError::Cancelled => ChorusError::Cancelled,
            WaitError::TimedOut => {
                warn!(account_id = %self.account_id, step, "login input timed out");
                ChorusError::Authentication(format!(
                    "no {step} submitted within {}s",
                    self.input_timeout.as_secs()
                ))
            }
        }
    }
}

#[async_trait]
impl AuthCallbacks for AuthHandshake {
    async fn on_code_requested(&self, challenge: CodeChallenge) -> Result<String, ChorusError> {
        let expires_at = self.expiry()?;
        let record = self
            .store
            .replace_handshake(
                self.account_id,
                &self.phone_number,
                HandshakeState::WaitingCode,
                expires_at,
            )
            .await?;
        self.set_phase(HandshakePhase::AwaitingCode);
        info!(
            account_id = %self.account_id,
            delivery = challenge.delivery.as_deref().unwrap_or("unknown"),
            "waiting for login code"
        );

        let code = self
            .code
            .receive(self.input_timeout, &self.cancel)
            .await
            .map_err(|e| self.wait_failed("code", e))?;

        if let Err(e) = self
            .store
            .update_handshake(record.id, HandshakeState::Completed, expires_at)
            .await
        {
            warn!(account_id = %self.account_id, error = %e, "failed to persist handshake state");
        }
        Ok(code)
    }

    async fn on_password_requested(&self) -> Result<SecretString, ChorusError> {
        let expires_at = self.expiry()?;
        let record_id = match self.store.latest_handshake(self.account_id).await? {
            Some(record) => {
                self.store
                    .update_handshake(record.id, HandshakeState::WaitingPassword, expires_at)
                    .await?;
                record.id
            }
            None => {
                self.store
                    .replace_handshake(
                        self.account_id,
                        &self.phone_number,
                        HandshakeState::WaitingPassword,
                        expires_at,
                    )
                    .await?
                    .id
            }
        };
        self.set_phase(HandshakePhase::AwaitingPassword);
        info!(account_id = %self.account_id, "waiting for second-factor password");

        let password = self
            .password
            .receive(self.input_timeout, &self.cancel)
            .await
            .map_err(|e| self.wait_failed("password", e))?;

        if let Err(e) = self
            .store
            .update_handshake(record_id, HandshakeState::Completed, expires_at)
            .await
        {
            warn!(account_id = %self.account_id, error = %e, "failed to persist handshake state");
        }
        Ok(password)
    }

    async fn on_sign_up_requested(&self) -> Result<(), ChorusError> {
        self.mark_failed();
        Err(ChorusError::Authentication(format!(
            "phone number {} is not registered and sign-up is not supported",
            self.phone_number
        )))
    }
}
