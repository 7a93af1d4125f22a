// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory administrative store.

use std::collections::HashMap;

use async_trait::async_trait;
use chorus_core::{
    AccountConfig, AccountId, AccountStatus, AdminStore, ChatId, ChorusError, Conversation,
    ConversationAssignment, ConversationInfo, HandshakeSession, HandshakeState,
    SentMessageRecord,
};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

#[derive(Default)]
struct State {
    accounts: HashMap<AccountId, AccountConfig>,
    conversations: Vec<Conversation>,
    assignments: Vec<ConversationAssignment>,
    sent: Vec<SentMessageRecord>,
    handshakes: Vec<HandshakeSession>,
    next_id: i64,
}

impl State {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// `AdminStore` over plain collections, with seeding and inspection helpers.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `account`, allocating an id when it is zero.
    pub async fn add_account(&self, mut account: AccountConfig) -> AccountConfig {
        let mut state = self.state.lock().await;
        if account.id.0 == 0 {
            account.id = AccountId(state.allocate());
        }
        state.accounts.insert(account.id, account.clone());
        account
    }

    /// Replace a stored account, as an operator edit would.
    pub async fn update_account(&self, account: AccountConfig) {
        self.state
            .lock()
            .await
            .accounts
            .insert(account.id, account);
    }

    pub async fn account(&self, id: AccountId) -> Option<AccountConfig> {
        self.state.lock().await.accounts.get(&id).cloned()
    }

    /// Link `account_id` to a conversation with the given assignment probability (0..=1).
    pub async fn assign(&self, account_id: AccountId, conversation_id: i64, reply_probability: f64) {
        let mut state = self.state.lock().await;
        state
            .assignments
            .retain(|a| !(a.account_id == account_id && a.conversation_id == conversation_id));
        state.assignments.push(ConversationAssignment {
            account_id,
            conversation_id,
            enabled: true,
            reply_probability,
            priority: 5,
        });
    }

    pub async fn set_assignment_enabled(
        &self,
        account_id: AccountId,
        conversation_id: i64,
        enabled: bool,
    ) {
        let mut state = self.state.lock().await;
        for assignment in state
            .assignments
            .iter_mut()
            .filter(|a| a.account_id == account_id && a.conversation_id == conversation_id)
        {
            assignment.enabled = enabled;
        }
    }

    pub async fn sent_messages(&self) -> Vec<SentMessageRecord> {
        self.state.lock().await.sent.clone()
    }

    pub async fn conversations(&self) -> Vec<Conversation> {
        self.state.lock().await.conversations.clone()
    }

    pub async fn handshakes(&self, account_id: AccountId) -> Vec<HandshakeSession> {
        self.state
            .lock()
            .await
            .handshakes
            .iter()
            .filter(|h| h.account_id == account_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AdminStore for MemoryStore {
    async fn get_account(&self, id: AccountId) -> Result<Option<AccountConfig>, ChorusError> {
        Ok(self.account(id).await)
    }

    async fn list_enabled_accounts(&self) -> Result<Vec<AccountConfig>, ChorusError> {
        let state = self.state.lock().await;
        let mut accounts: Vec<AccountConfig> =
            state.accounts.values().filter(|a| a.enabled).cloned().collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn set_account_status(
        &self,
        id: AccountId,
        status: AccountStatus,
    ) -> Result<(), ChorusError> {
        let mut state = self.state.lock().await;
        let account = state.accounts.get_mut(&id).ok_or(ChorusError::NotFound {
            entity: "account",
            id: id.0,
        })?;
        account.status = status;
        Ok(())
    }

    async fn set_account_nickname(
        &self,
        id: AccountId,
        nickname: &str,
    ) -> Result<(), ChorusError> {
        let mut state = self.state.lock().await;
        let account = state.accounts.get_mut(&id).ok_or(ChorusError::NotFound {
            entity: "account",
            id: id.0,
        })?;
        account.nickname = nickname.to_string();
        Ok(())
    }

    async fn get_conversation(&self, id: i64) -> Result<Option<Conversation>, ChorusError> {
        let state = self.state.lock().await;
        Ok(state.conversations.iter().find(|c| c.id == id).cloned())
    }

    async fn find_conversation_by_chat(
        &self,
        chat_id: ChatId,
    ) -> Result<Option<Conversation>, ChorusError> {
        let state = self.state.lock().await;
        Ok(state
            .conversations
            .iter()
            .find(|c| c.chat_id == chat_id)
            .cloned())
    }

    async fn upsert_conversation(
        &self,
        info: &ConversationInfo,
    ) -> Result<Conversation, ChorusError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .conversations
            .iter_mut()
            .find(|c| c.chat_id == info.chat_id)
        {
            existing.kind = info.kind;
            existing.title = info.title.clone();
            existing.username = info.username.clone();
            existing.member_count = info.member_count;
            if info.access_hash.is_some() {
                existing.access_hash = info.access_hash;
            }
            return Ok(existing.clone());
        }

        let conversation = Conversation {
            id: state.allocate(),
            chat_id: info.chat_id,
            kind: info.kind,
            access_hash: info.access_hash,
            title: info.title.clone(),
            username: info.username.clone(),
            member_count: info.member_count,
        };
        state.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn set_access_hash(
        &self,
        conversation_id: i64,
        access_hash: i64,
    ) -> Result<(), ChorusError> {
        let mut state = self.state.lock().await;
        let conversation = state
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
            .ok_or(ChorusError::NotFound {
                entity: "conversation",
                id: conversation_id,
            })?;
        conversation.access_hash = Some(access_hash);
        Ok(())
    }

    async fn get_assignment(
        &self,
        account_id: AccountId,
        conversation_id: i64,
    ) -> Result<Option<ConversationAssignment>, ChorusError> {
        let state = self.state.lock().await;
        Ok(state
            .assignments
            .iter()
            .find(|a| a.account_id == account_id && a.conversation_id == conversation_id)
            .cloned())
    }

    async fn list_assigned_conversations(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<(ConversationAssignment, Conversation)>, ChorusError> {
        let state = self.state.lock().await;
        Ok(state
            .assignments
            .iter()
            .filter(|a| a.account_id == account_id && a.enabled)
            .filter_map(|a| {
                state
                    .conversations
                    .iter()
                    .find(|c| c.id == a.conversation_id)
                    .map(|c| (a.clone(), c.clone()))
            })
            .collect())
    }

    async fn append_sent_message(&self, record: &SentMessageRecord) -> Result<(), ChorusError> {
        self.state.lock().await.sent.push(record.clone());
        Ok(())
    }

    async fn replace_handshake(
        &self,
        account_id: AccountId,
        phone_number: &str,
        state: HandshakeState,
        expires_at: DateTime<Utc>,
    ) -> Result<HandshakeSession, ChorusError> {
        let mut guard = self.state.lock().await;
        guard.handshakes.retain(|h| h.account_id != account_id);
        let session = HandshakeSession {
            id: guard.allocate(),
            account_id,
            phone_number: phone_number.to_string(),
            state,
            expires_at,
            created_at: Utc::now(),
        };
        guard.handshakes.push(session.clone());
        Ok(session)
    }

    async fn update_handshake(
        &self,
        id: i64,
        state: HandshakeState,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ChorusError> {
        let mut guard = self.state.lock().await;
        let session = guard
            .handshakes
            .iter_mut()
            .find(|h| h.id == id)
            .ok_or(ChorusError::NotFound {
                entity: "handshake session",
                id,
            })?;
        session.state = state;
        session.expires_at = expires_at;
        Ok(())
    }

    async fn latest_handshake(
        &self,
        account_id: AccountId,
    ) -> Result<Option<HandshakeSession>, ChorusError> {
        let state = self.state.lock().await;
        Ok(state
            .handshakes
            .iter()
            .filter(|h| h.account_id == account_id)
            .max_by_key(|h| h.id)
            .cloned())
    }
}
