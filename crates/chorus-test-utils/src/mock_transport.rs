// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted transport for session tests.
//!
//! `MockConnector` hands out one shared [`MockConnection`]. The connection
//! records every send with the (tokio) instant it happened, replays scripted
//! history, and keeps the registered push sink so tests can inject inbound
//! events with [`MockConnection::push`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chorus_core::{
    AccountConfig, AuthCallbacks, ChatId, ChorusError, CodeChallenge, Connection, Connector,
    ConversationInfo, HistoryMessage, InboundEvent, InboundSink, MessageId, Peer, PeerAddress,
    SelfIdentity,
};
use secrecy::ExposeSecret;
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One captured outbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct SentText {
    pub address: PeerAddress,
    pub text: String,
    pub message_id: MessageId,
    pub at: Instant,
}

pub struct MockConnection {
    authorized: AtomicBool,
    expected_code: Mutex<Option<String>>,
    expected_password: Mutex<Option<String>>,
    identity: Mutex<SelfIdentity>,
    conversations: Mutex<Vec<ConversationInfo>>,
    history: Mutex<HashMap<i64, Vec<HistoryMessage>>>,
    access_hash: Mutex<Option<i64>>,
    send_failures: AtomicU32,
    next_message_id: AtomicI64,
    sent: Mutex<Vec<SentText>>,
    send_attempts: AtomicUsize,
    resolve_calls: AtomicUsize,
    sink: Mutex<Option<Arc<dyn InboundSink>>>,
    disconnected: AtomicBool,
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnection {
    /// An already-authorized connection with an empty conversation list.
    pub fn new() -> Self {
        Self {
            authorized: AtomicBool::new(true),
            expected_code: Mutex::new(None),
            expected_password: Mutex::new(None),
            identity: Mutex::new(SelfIdentity {
                user_id: 1000,
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                username: Some("ada".into()),
            }),
            conversations: Mutex::new(Vec::new()),
            history: Mutex::new(HashMap::new()),
            access_hash: Mutex::new(Some(0x5eed)),
            send_failures: AtomicU32::new(0),
            next_message_id: AtomicI64::new(1),
            sent: Mutex::new(Vec::new()),
            send_attempts: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
            sink: Mutex::new(None),
            disconnected: AtomicBool::new(false),
        }
    }

    /// Require a login with `code` and, optionally, a second-factor password.
    pub fn require_login(&self, code: &str, password: Option<&str>) {
        self.authorized.store(false, Ordering::SeqCst);
        *lock(&self.expected_code) = Some(code.to_string());
        *lock(&self.expected_password) = password.map(str::to_string);
    }

    pub fn set_identity(&self, identity: SelfIdentity) {
        *lock(&self.identity) = identity;
    }

    pub fn set_conversations(&self, conversations: Vec<ConversationInfo>) {
        *lock(&self.conversations) = conversations;
    }

    /// Script the history of `chat_id`; any order, returned newest first.
    pub fn set_history(&self, chat_id: i64, messages: Vec<HistoryMessage>) {
        lock(&self.history).insert(chat_id.abs(), messages);
    }

    /// The credential returned by `resolve_access_hash`; `None` makes it fail.
    pub fn set_access_hash(&self, access_hash: Option<i64>) {
        *lock(&self.access_hash) = access_hash;
    }

    /// Fail the next `count` sends with a transport error.
    pub fn fail_next_sends(&self, count: u32) {
        self.send_failures.store(count, Ordering::SeqCst);
    }

    /// Deliver an inbound event to the registered sink, as the transport would.
    pub fn push(&self, event: InboundEvent) {
        let sink = lock(&self.sink).clone();
        if let Some(sink) = sink {
            sink.deliver(event);
        }
    }

    /// Push a foreign text message into a supergroup.
    pub fn push_text(&self, chat_id: i64, message_id: i64, text: &str) {
        self.push(InboundEvent {
            message_id: MessageId(message_id),
            peer: Peer::Channel(chat_id),
            outgoing: false,
            text: text.to_string(),
        });
    }

    pub fn sent(&self) -> Vec<SentText> {
        lock(&self.sent).clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        lock(&self.sent).iter().map(|s| s.text.clone()).collect()
    }

    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    fn register_sink(&self, sink: Arc<dyn InboundSink>) {
        *lock(&self.sink) = Some(sink);
    }
}

fn address_chat(address: PeerAddress) -> i64 {
    match address {
        PeerAddress::Group { chat_id } => chat_id,
        PeerAddress::Channel { channel_id, .. } => channel_id,
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn is_authorized(&self) -> Result<bool, ChorusError> {
        Ok(self.authorized.load(Ordering::SeqCst))
    }

    async fn authenticate(
        &self,
        phone_number: &str,
        callbacks: &dyn AuthCallbacks,
    ) -> Result<(), ChorusError> {
        let code = callbacks
            .on_code_requested(CodeChallenge {
                phone_number: phone_number.to_string(),
                delivery: Some("app".into()),
            })
            .await?;
        let expected = lock(&self.expected_code).clone();
        if expected.is_some_and(|expected| expected != code) {
            return Err(ChorusError::Authentication("invalid login code".into()));
        }

        let expected_password = lock(&self.expected_password).clone();
        if let Some(expected_password) = expected_password {
            let password = callbacks.on_password_requested().await?;
            if password.expose_secret() != expected_password {
                return Err(ChorusError::Authentication("invalid password".into()));
            }
        }

        self.authorized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn self_identity(&self) -> Result<SelfIdentity, ChorusError> {
        Ok(lock(&self.identity).clone())
    }

    async fn send_text(
        &self,
        address: PeerAddress,
        text: &str,
        _reply_to: Option<MessageId>,
    ) -> Result<MessageId, ChorusError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .send_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ChorusError::transport("scripted send failure"));
        }

        let message_id = MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.sent).push(SentText {
            address,
            text: text.to_string(),
            message_id,
            at: Instant::now(),
        });
        Ok(message_id)
    }

    async fn fetch_recent_history(
        &self,
        address: PeerAddress,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>, ChorusError> {
        let mut page = lock(&self.history)
            .get(&address_chat(address))
            .cloned()
            .unwrap_or_default();
        page.sort_by_key(|m| std::cmp::Reverse(m.id));
        page.truncate(limit);
        Ok(page)
    }

    async fn resolve_access_hash(&self, chat_id: ChatId) -> Result<i64, ChorusError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.access_hash).ok_or_else(|| {
            ChorusError::transport(format!("channel {chat_id} is not accessible"))
        })
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationInfo>, ChorusError> {
        Ok(lock(&self.conversations).clone())
    }

    async fn disconnect(&self) -> Result<(), ChorusError> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector returning the same shared [`MockConnection`] on every connect.
pub struct MockConnector {
    connection: Arc<MockConnection>,
    connects: AtomicUsize,
    fail_connect: AtomicBool,
}

impl MockConnector {
    pub fn new(connection: Arc<MockConnection>) -> Self {
        Self {
            connection,
            connects: AtomicUsize::new(0),
            fail_connect: AtomicBool::new(false),
        }
    }

    pub fn connection(&self) -> Arc<MockConnection> {
        Arc::clone(&self.connection)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        _account: &AccountConfig,
        sink: Arc<dyn InboundSink>,
    ) -> Result<Arc<dyn Connection>, ChorusError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(ChorusError::transport("scripted connect failure"));
        }
        self.connection.register_sink(sink);
        Ok(Arc::clone(&self.connection) as Arc<dyn Connection>)
    }
}
