// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of live account sessions.
//!
//! [`SessionRegistry`] is the capability handed to the administrative
//! surface. [`SessionManager`] implements it over a reader/writer-locked map;
//! the lock is only held to swap entries, never while a session starts or
//! stops.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chorus_core::{AccountConfig, AccountId, AccountStatus, ChorusError, MessageId};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::handshake::{AuthHandshake, HandshakePhase};
use crate::session::{AccountSession, SessionDeps};

/// Point-in-time view of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub account_id: AccountId,
    pub status: AccountStatus,
    pub connected: bool,
    pub handshake: String,
}

/// Operations the administrative surface may perform on sessions.
#[async_trait]
pub trait SessionRegistry: Send + Sync + 'static {
    /// Start a session for `account`, replacing any existing one.
    async fn add_client(&self, account: AccountConfig) -> Result<(), ChorusError>;

    /// Stop and discard the session of `account_id`. Idempotent.
    async fn remove_client(&self, account_id: AccountId);

    /// Send `text` to a stored conversation right away.
    async fn send_message_to_group(
        &self,
        account_id: AccountId,
        conversation_id: i64,
        text: &str,
    ) -> Result<MessageId, ChorusError>;

    /// The login handshake of the account's live session.
    async fn auth_handshake(&self, account_id: AccountId) -> Option<Arc<AuthHandshake>>;

    async fn session_snapshot(&self, account_id: AccountId) -> Option<SessionSnapshot>;
}

pub struct SessionManager {
    deps: SessionDeps,
    sessions: RwLock<HashMap<AccountId, Arc<AccountSession>>>,
}

impl SessionManager {
    pub fn new(deps: SessionDeps) -> Self {
        Self {
            deps,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn session(&self, account_id: AccountId) -> Option<Arc<AccountSession>> {
        self.sessions.read().await.get(&account_id).cloned()
    }

    pub async fn active_accounts(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self.sessions.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Add a session for every enabled account in the store.
    ///
    /// Returns how many were added.
    pub async fn start_enabled(&self) -> Result<usize, ChorusError> {
        let accounts = self.deps.store.list_enabled_accounts().await?;
        let mut started = 0;
        for account in accounts {
            let account_id = account.id;
            match self.add_client(account).await {
                Ok(()) => started += 1,
                Err(e) => warn!(%account_id, error = %e, "failed to add session"),
            }
        }
        info!(started, "enabled accounts started");
        Ok(started)
    }

    /// Stop every session.
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<AccountSession>> = self
            .sessions
            .write()
            .await
            .drain()
            .map(|(_, session)| session)
            .collect();
        info!(count = sessions.len(), "stopping all sessions");
        futures::future::join_all(sessions.iter().map(|session| session.stop())).await;
    }
}

#[async_trait]
impl SessionRegistry for SessionManager {
    async fn add_client(&self, account: AccountConfig) -> Result<(), ChorusError> {
        let account_id = account.id;
        let session = AccountSession::new(account, self.deps.clone());
        let previous = self
            .sessions
            .write()
            .await
            .insert(account_id, Arc::clone(&session));

        if let Some(previous) = previous {
            info!(%account_id, "replacing existing session");
            previous.stop().await;
        }

        session.spawn_start();
        info!(%account_id, "session added");
        Ok(())
    }

    async fn remove_client(&self, account_id: AccountId) {
        let removed = self.sessions.write().await.remove(&account_id);
        if let Some(session) = removed {
            session.stop().await;
            info!(%account_id, "session removed");
        }
    }

    async fn send_message_to_group(
        &self,
        account_id: AccountId,
        conversation_id: i64,
        text: &str,
    ) -> Result<MessageId, ChorusError> {
        let session = self
            .session(account_id)
            .await
            .ok_or(ChorusError::SessionNotFound(account_id))?;
        let conversation = self
            .deps
            .store
            .get_conversation(conversation_id)
            .await?
            .ok_or(ChorusError::NotFound {
                entity: "conversation",
                id: conversation_id,
            })?;
        session.send_text(&conversation, text).await
    }

    async fn auth_handshake(&self, account_id: AccountId) -> Option<Arc<AuthHandshake>> {
        self.session(account_id).await.map(|s| s.handshake())
    }

    async fn session_snapshot(&self, account_id: AccountId) -> Option<SessionSnapshot> {
        let session = self.session(account_id).await?;
        let phase: HandshakePhase = session.handshake().phase();
        Some(SessionSnapshot {
            account_id,
            status: session.status(),
            connected: session.is_connected(),
            handshake: phase.to_string(),
        })
    }
}
