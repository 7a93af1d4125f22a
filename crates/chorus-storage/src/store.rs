// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the `AdminStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use chorus_config::StorageConfig;
use chorus_core::{
    AccountConfig, AccountId, AccountStatus, AdminStore, ChatId, ChorusError, Conversation,
    ConversationAssignment, ConversationInfo, HandshakeSession, HandshakeState,
    SentMessageRecord,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed administrative store.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules. The
/// database is opened by [`SqliteStore::initialize`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a store for `config`; nothing is opened until [`initialize`](Self::initialize).
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Open the database and apply migrations. Idempotent.
    pub async fn initialize(&self) -> Result<(), ChorusError> {
        self.db
            .get_or_try_init(|| Database::open(&self.config.database_path, self.config.wal_mode))
            .await?;
        Ok(())
    }

    /// Checkpoint the WAL before process exit.
    pub async fn close(&self) -> Result<(), ChorusError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("storage closed");
        }
        Ok(())
    }

    fn db(&self) -> Result<&Database, ChorusError> {
        self.db.get().ok_or_else(|| ChorusError::Storage {
            source: "storage not initialized, call initialize() first".into(),
        })
    }

    /// Insert an account and return its id.
    pub async fn insert_account(&self, account: &AccountConfig) -> Result<AccountId, ChorusError> {
        queries::accounts::insert_account(self.db()?, account).await
    }

    /// Create or replace an account-to-conversation assignment.
    pub async fn assign(&self, assignment: &ConversationAssignment) -> Result<(), ChorusError> {
        queries::assignments::assign(self.db()?, assignment).await
    }

    /// Recent sent messages of an account, newest first.
    pub async fn sent_messages(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<SentMessageRecord>, ChorusError> {
        queries::sent_messages::list_for_account(self.db()?, account_id, limit).await
    }

    /// Every stored handshake of an account, oldest first.
    pub async fn handshakes(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<HandshakeSession>, ChorusError> {
        queries::handshakes::list_for_account(self.db()?, account_id).await
    }
}

#[async_trait]
impl AdminStore for SqliteStore {
    async fn get_account(&self, id: AccountId) -> Result<Option<AccountConfig>, ChorusError> {
        queries::accounts::get_account(self.db()?, id).await
    }

    async fn list_enabled_accounts(&self) -> Result<Vec<AccountConfig>, ChorusError> {
        queries::accounts::list_enabled_accounts(self.db()?).await
    }

    async fn set_account_status(
        &self,
        id: AccountId,
        status: AccountStatus,
    ) -> Result<(), ChorusError> {
        queries::accounts::set_status(self.db()?, id, status).await
    }

    async fn set_account_nickname(
        &self,
        id: AccountId,
        nickname: &str,
    ) -> Result<(), ChorusError> {
        queries::accounts::set_nickname(self.db()?, id, nickname).await
    }

    async fn get_conversation(&self, id: i64) -> Result<Option<Conversation>, ChorusError> {
        queries::conversations::get_conversation(self.db()?, id).await
    }

    async fn find_conversation_by_chat(
        &self,
        chat_id: ChatId,
    ) -> Result<Option<Conversation>, ChorusError> {
        queries::conversations::find_by_chat(self.db()?, chat_id).await
    }

    async fn upsert_conversation(
        &self,
        info: &ConversationInfo,
    ) -> Result<Conversation, ChorusError> {
        queries::conversations::upsert_conversation(self.db()?, info).await
    }

    async fn set_access_hash(
        &self,
        conversation_id: i64,
        access_hash: i64,
    ) -> Result<(), ChorusError> {
        queries::conversations::set_access_hash(self.db()?, conversation_id, access_hash).await
    }

    async fn get_assignment(
        &self,
        account_id: AccountId,
        conversation_id: i64,
    ) -> Result<Option<ConversationAssignment>, ChorusError> {
        queries::assignments::get_assignment(self.db()?, account_id, conversation_id).await
    }

    async fn list_assigned_conversations(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<(ConversationAssignment, Conversation)>, ChorusError> {
        queries::assignments::list_assigned_conversations(self.db()?, account_id).await
    }

    async fn append_sent_message(&self, record: &SentMessageRecord) -> Result<(), ChorusError> {
        queries::sent_messages::append(self.db()?, record).await
    }

    async fn replace_handshake(
        &self,
        account_id: AccountId,
        phone_number: &str,
        state: HandshakeState,
        expires_at: DateTime<Utc>,
    ) -> Result<HandshakeSession, ChorusError> {
        queries::handshakes::replace(self.db()?, account_id, phone_number, state, expires_at).await
    }

    async fn update_handshake(
        &self,
        id: i64,
        state: HandshakeState,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ChorusError> {
        queries::handshakes::update(self.db()?, id, state, expires_at).await
    }

    async fn latest_handshake(
        &self,
        account_id: AccountId,
    ) -> Result<Option<HandshakeSession>, ChorusError> {
        queries::handshakes::latest(self.db()?, account_id).await
    }
}
