// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat transport capability: connection bring-up, login, send and history.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::ChorusError;
use crate::types::{
    AccountConfig, ChatId, CodeChallenge, ConversationInfo, HistoryMessage, InboundEvent,
    MessageId, PeerAddress, SelfIdentity,
};

/// Receives inbound events pushed by a live connection.
///
/// Called from the transport's own tasks; implementations must not block.
pub trait InboundSink: Send + Sync + 'static {
    fn deliver(&self, event: InboundEvent);
}

/// Opens connections for accounts.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connects `account`, registering `sink` for pushed inbound events.
    async fn connect(
        &self,
        account: &AccountConfig,
        sink: Arc<dyn InboundSink>,
    ) -> Result<Arc<dyn Connection>, ChorusError>;
}

/// One account's live connection.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Whether a durable credential already authorizes this connection.
    async fn is_authorized(&self) -> Result<bool, ChorusError>;

    /// Runs the interactive login, suspending in `callbacks` for operator input.
    async fn authenticate(
        &self,
        phone_number: &str,
        callbacks: &dyn AuthCallbacks,
    ) -> Result<(), ChorusError>;

    async fn self_identity(&self) -> Result<SelfIdentity, ChorusError>;

    async fn send_text(
        &self,
        address: PeerAddress,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, ChorusError>;

    /// Most recent messages of a conversation, newest first.
    async fn fetch_recent_history(
        &self,
        address: PeerAddress,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>, ChorusError>;

    /// Looks up the access credential of a supergroup or channel.
    async fn resolve_access_hash(&self, chat_id: ChatId) -> Result<i64, ChorusError>;

    /// Conversations the account participates in.
    async fn list_conversations(&self) -> Result<Vec<ConversationInfo>, ChorusError>;

    async fn disconnect(&self) -> Result<(), ChorusError>;
}

/// Callback interface the transport drives during login.
///
/// Each method suspends the login until operator input arrives or the wait fails.
#[async_trait]
pub trait AuthCallbacks: Send + Sync {
    async fn on_code_requested(&self, challenge: CodeChallenge) -> Result<String, ChorusError>;

    async fn on_password_requested(&self) -> Result<SecretString, ChorusError>;

    /// Registering new accounts is not supported.
    async fn on_sign_up_requested(&self) -> Result<(), ChorusError> {
        Err(ChorusError::Authentication("sign-up is not supported".into()))
    }

    /// Terms-of-service prompts are accepted.
    async fn on_terms_of_service(&self, _text: &str) -> Result<(), ChorusError> {
        Ok(())
    }
}
