// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the session engine and its collaborators.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Administrative store identifier of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Transport-level identifier of a conversation (group, supergroup or channel).
///
/// Always stored as the positive bare id the transport reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Transport-assigned identifier of a sent or received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

/// Runtime connection status of an account, owned by its session.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Offline,
    Online,
    Error,
}

/// Kind of a conversation as reported by the transport.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    /// Basic group, addressed by bare chat id.
    #[default]
    Group,
    /// Megagroup; addressed like a channel.
    Supergroup,
    /// Broadcast channel.
    Channel,
}

impl ConversationKind {
    /// Supergroups and channels need an access credential to be addressed.
    pub fn needs_access_credential(self) -> bool {
        matches!(self, Self::Supergroup | Self::Channel)
    }
}

/// Persisted configuration of one managed account.
///
/// Behaviour knobs left as `None` fall back to the configured session defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub id: AccountId,
    pub phone_number: String,
    pub api_id: i32,
    pub api_hash: String,
    pub nickname: String,
    pub status: AccountStatus,
    pub priority: i32,
    pub enabled: bool,

    pub generation_api_key: String,
    pub generation_model: String,
    pub system_prompt: String,

    pub auto_reply: bool,
    /// Account-level reply probability in percent (0..=100).
    pub reply_probability: Option<u8>,
    pub reply_interval_secs: Option<u64>,
    pub decision_interval_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub buffer_size: Option<usize>,
    pub split_by_newline: bool,
    pub multi_message_interval_secs: Option<u64>,
}

impl AccountConfig {
    /// A new, enabled account with default behaviour knobs.
    pub fn new(id: AccountId, phone_number: impl Into<String>) -> Self {
        Self {
            id,
            phone_number: phone_number.into(),
            api_id: 0,
            api_hash: String::new(),
            nickname: String::new(),
            status: AccountStatus::Offline,
            priority: 5,
            enabled: true,
            generation_api_key: String::new(),
            generation_model: String::new(),
            system_prompt: String::new(),
            auto_reply: true,
            reply_probability: None,
            reply_interval_secs: None,
            decision_interval_secs: None,
            poll_interval_secs: None,
            buffer_size: None,
            split_by_newline: true,
            multi_message_interval_secs: None,
        }
    }

    /// Copies every operator-editable field from `fresh`, keeping the runtime status.
    pub fn refresh_from(&mut self, fresh: AccountConfig) {
        let status = self.status;
        *self = fresh;
        self.status = status;
    }
}

/// A conversation known to the administrative store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Store row id.
    pub id: i64,
    pub chat_id: ChatId,
    pub kind: ConversationKind,
    /// Access credential for supergroups and channels; `None` until resolved.
    pub access_hash: Option<i64>,
    pub title: String,
    pub username: Option<String>,
    pub member_count: i64,
}

/// Conversation metadata as listed by the transport, used for synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationInfo {
    pub chat_id: ChatId,
    pub kind: ConversationKind,
    pub access_hash: Option<i64>,
    pub title: String,
    pub username: Option<String>,
    pub member_count: i64,
}

/// Per-(account, conversation) overrides. Absence means the conversation is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationAssignment {
    pub account_id: AccountId,
    /// Store row id of the conversation.
    pub conversation_id: i64,
    pub enabled: bool,
    /// Reply probability as a fraction (0.0..=1.0); non-positive defers to the account.
    pub reply_probability: f64,
    pub priority: i32,
}

/// One inbound text observed for a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedMessage {
    pub text: String,
    pub observed_at: DateTime<Utc>,
}

/// Speaker of a generation history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One role/content pair of conversation history passed to generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Persisted state of an interactive login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HandshakeState {
    WaitingCode,
    WaitingPassword,
    Completed,
}

/// Persisted record of one account's in-progress login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeSession {
    pub id: i64,
    pub account_id: AccountId,
    pub phone_number: String,
    pub state: HandshakeState,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl HandshakeSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Append-only log entry written after every successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessageRecord {
    pub account_id: AccountId,
    /// Store row id of the conversation.
    pub conversation_id: i64,
    pub content: String,
    pub transport_message_id: Option<MessageId>,
    pub reply_to_message_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
}

/// Source conversation of an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Peer {
    /// One-to-one conversation with a user.
    User(i64),
    /// Basic group.
    Chat(i64),
    /// Supergroup or broadcast channel.
    Channel(i64),
}

impl Peer {
    /// The conversation id for group-like peers; `None` for private chats.
    pub fn group_chat_id(self) -> Option<ChatId> {
        match self {
            Self::User(_) => None,
            Self::Chat(id) | Self::Channel(id) => Some(ChatId(id.abs())),
        }
    }
}

/// A new message pushed by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub message_id: MessageId,
    pub peer: Peer,
    /// Authored by the account itself.
    pub outgoing: bool,
    pub text: String,
}

/// A message returned by a history fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub id: MessageId,
    pub outgoing: bool,
    pub text: String,
}

/// How the transport addresses an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PeerAddress {
    /// Plain-group addressing by bare chat id.
    Group { chat_id: i64 },
    /// Supergroup/channel addressing with its access credential.
    Channel { channel_id: i64, access_hash: i64 },
}

/// The account's own identity as reported after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfIdentity {
    pub user_id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl SelfIdentity {
    /// Display name used as the account nickname.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if !full.is_empty() {
            return full.to_string();
        }
        self.username.clone().unwrap_or_default()
    }
}

/// Details of a login code challenge issued by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChallenge {
    pub phone_number: String,
    /// How the code was delivered (app, sms, call), when known.
    #[serde(default)]
    pub delivery: Option<String>,
}
