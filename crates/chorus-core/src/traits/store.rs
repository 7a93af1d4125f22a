// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Administrative store capability: the records sessions read and write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ChorusError;
use crate::types::{
    AccountConfig, AccountId, AccountStatus, ChatId, Conversation, ConversationAssignment,
    ConversationInfo, HandshakeSession, HandshakeState, SentMessageRecord,
};

/// Persistence operations required by the session engine.
#[async_trait]
pub trait AdminStore: Send + Sync + 'static {
    // --- Accounts ---

    async fn get_account(&self, id: AccountId) -> Result<Option<AccountConfig>, ChorusError>;

    async fn list_enabled_accounts(&self) -> Result<Vec<AccountConfig>, ChorusError>;

    async fn set_account_status(
        &self,
        id: AccountId,
        status: AccountStatus,
    ) -> Result<(), ChorusError>;

    async fn set_account_nickname(&self, id: AccountId, nickname: &str)
    -> Result<(), ChorusError>;

    // --- Conversations ---

    async fn get_conversation(&self, id: i64) -> Result<Option<Conversation>, ChorusError>;

    async fn find_conversation_by_chat(
        &self,
        chat_id: ChatId,
    ) -> Result<Option<Conversation>, ChorusError>;

    /// Inserts or updates the conversation keyed by its chat id, returning the row.
    async fn upsert_conversation(
        &self,
        info: &ConversationInfo,
    ) -> Result<Conversation, ChorusError>;

    async fn set_access_hash(&self, conversation_id: i64, access_hash: i64)
    -> Result<(), ChorusError>;

    // --- Assignments ---

    async fn get_assignment(
        &self,
        account_id: AccountId,
        conversation_id: i64,
    ) -> Result<Option<ConversationAssignment>, ChorusError>;

    /// Enabled assignments of the account joined with their conversations.
    async fn list_assigned_conversations(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<(ConversationAssignment, Conversation)>, ChorusError>;

    // --- Sent messages ---

    async fn append_sent_message(&self, record: &SentMessageRecord) -> Result<(), ChorusError>;

    // --- Handshakes ---

    /// Deletes every handshake of the account and creates a new one.
    async fn replace_handshake(
        &self,
        account_id: AccountId,
        phone_number: &str,
        state: HandshakeState,
        expires_at: DateTime<Utc>,
    ) -> Result<HandshakeSession, ChorusError>;

    async fn update_handshake(
        &self,
        id: i64,
        state: HandshakeState,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ChorusError>;

    async fn latest_handshake(
        &self,
        account_id: AccountId,
    ) -> Result<Option<HandshakeSession>, ChorusError>;
}
