// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire protocol between Chorus and a transport sidecar.
//!
//! JSON Lines over the sidecar's stdio. Every command that expects an answer
//! carries a `request_id`; the sidecar answers with exactly one `response`
//! event bearing the same id. Inbound messages and login prompts arrive as
//! unsolicited events.
//!
//! ```text
//! -> {"type":"send_text","request_id":"…","address":{"kind":"group","chat_id":42},"text":"hi"}
//! <- {"type":"response","request_id":"…","result":{"message_id":1001}}
//! <- {"type":"message","message_id":7,"peer":{"kind":"channel","id":42},"outgoing":false,"text":"yo"}
//! ```

use chorus_core::{ChatId, ChorusError, Peer, PeerAddress};
use serde::{Deserialize, Serialize};

/// Commands sent from Chorus to the sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarCommand {
    /// Open the protocol client with the account's stored session.
    Start {
        request_id: String,
        phone_number: String,
        api_id: i32,
        api_hash: String,
        session_path: String,
    },
    IsAuthorized {
        request_id: String,
    },
    /// Begin an interactive login; prompts arrive as events.
    Authenticate {
        request_id: String,
        phone_number: String,
    },
    ProvideCode {
        request_id: String,
        code: String,
    },
    ProvidePassword {
        request_id: String,
        password: String,
    },
    /// Give up an ongoing login.
    AbortLogin {
        request_id: String,
        reason: String,
    },
    SelfIdentity {
        request_id: String,
    },
    SendText {
        request_id: String,
        address: PeerAddress,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_to: Option<i64>,
    },
    FetchHistory {
        request_id: String,
        address: PeerAddress,
        limit: usize,
    },
    ResolveAccessHash {
        request_id: String,
        chat_id: ChatId,
    },
    ListConversations {
        request_id: String,
    },
    Disconnect {
        request_id: String,
    },
    /// Exit the process.
    Shutdown,
}

/// Events sent from the sidecar to Chorus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarEvent {
    /// The process is up and reading commands.
    Ready {
        #[serde(default)]
        version: String,
    },
    /// Answer to the command with the same `request_id`.
    Response {
        request_id: String,
        #[serde(default)]
        result: serde_json::Value,
        #[serde(default)]
        error: Option<SidecarError>,
    },
    /// A new message in a conversation the account participates in.
    Message {
        message_id: i64,
        peer: Peer,
        #[serde(default)]
        outgoing: bool,
        #[serde(default)]
        text: String,
    },
    CodeRequested {
        request_id: String,
        #[serde(default)]
        delivery: Option<String>,
    },
    PasswordRequested {
        request_id: String,
    },
    SignUpRequested {
        request_id: String,
    },
    TermsOfService {
        request_id: String,
        text: String,
    },
    /// Diagnostic output forwarded into our logs.
    Log {
        level: String,
        message: String,
    },
}

/// Failure reported in a `response` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidecarError {
    pub message: String,
    /// `authentication`, `not_found`, or anything else for transport failures.
    #[serde(default)]
    pub kind: String,
}

impl From<SidecarError> for ChorusError {
    fn from(err: SidecarError) -> Self {
        match err.kind.as_str() {
            "authentication" => ChorusError::Authentication(err.message),
            _ => ChorusError::transport(err.message),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageIdResult {
    pub message_id: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthorizedResult {
    pub authorized: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccessHashResult {
    pub access_hash: i64,
}
