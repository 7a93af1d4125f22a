// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime of one managed account.
//!
//! An [`AccountSession`] owns the transport connection, the inbound buffer, the
//! login handshake and two background loops: the history poller and the
//! decision-and-reply loop. Every wait observes the session's cancellation
//! token, so [`AccountSession::stop`] returns promptly.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chorus_config::{ChorusConfig, HandshakeConfig, SessionConfig};
use chorus_core::{
    AccountConfig, AccountId, AccountStatus, AdminStore, AuthCallbacks, BufferedMessage, ChatId,
    ChorusError, Connection, Connector, Conversation, GenerationRequest, Generator, InboundSink,
    MessageId, PeerAddress, SentMessageRecord,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::{Mutex, OnceCell};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::activity_log::ActivityLog;
use crate::buffer::MessageBuffer;
use crate::decision::{ConversationHistory, SkipReason, check_gates, compose_stimulus};
use crate::dispatch::{resolve_peer, split_reply};
use crate::handshake::AuthHandshake;
use crate::ingest::{SeenMessages, SessionSink, select_unseen};
use crate::knobs::SessionKnobs;
use crate::retry::RetryPolicy;
use crate::sync::sync_conversations;

/// Process-wide settings shared by every session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub session: SessionConfig,
    pub retry: RetryPolicy,
    pub handshake: HandshakeConfig,
}

impl SessionSettings {
    pub fn from_config(config: &ChorusConfig) -> Self {
        Self {
            session: config.session.clone(),
            retry: RetryPolicy::from_config(&config.retry),
            handshake: config.handshake.clone(),
        }
    }
}

/// Collaborators injected into every session.
#[derive(Clone)]
pub struct SessionDeps {
    pub store: Arc<dyn AdminStore>,
    pub connector: Arc<dyn Connector>,
    pub generator: Arc<dyn Generator>,
    pub settings: Arc<SessionSettings>,
}

impl SessionDeps {
    pub fn new(
        store: Arc<dyn AdminStore>,
        connector: Arc<dyn Connector>,
        generator: Arc<dyn Generator>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            store,
            connector,
            generator,
            settings: Arc::new(settings),
        }
    }
}

/// Outcome counts of one decision tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub replied: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum Disposition {
    Replied,
    Skipped(SkipReason),
}

/// Reply pacing and generation context of one conversation.
struct ReplyState {
    last_reply: Option<DateTime<Utc>>,
    history: ConversationHistory,
}

pub struct AccountSession {
    account_id: AccountId,
    deps: SessionDeps,
    account: RwLock<AccountConfig>,
    buffer: Arc<MessageBuffer>,
    seen: Arc<SeenMessages>,
    handshake: Arc<AuthHandshake>,
    connection: OnceCell<Arc<dyn Connection>>,
    replies: Mutex<HashMap<ChatId, ReplyState>>,
    cancel: CancellationToken,
    tasks: TaskTracker,
    activity: ActivityLog,
}

impl AccountSession {
    pub fn new(account: AccountConfig, deps: SessionDeps) -> Arc<Self> {
        let cancel = CancellationToken::new();
        let knobs = SessionKnobs::resolve(&account, &deps.settings.session);
        let handshake = AuthHandshake::new(
            account.id,
            account.phone_number.clone(),
            Arc::clone(&deps.store),
            &deps.settings.handshake,
            cancel.clone(),
        );
        let log_dir = deps.settings.session.log_dir.as_deref().map(std::path::Path::new);

        Arc::new(Self {
            account_id: account.id,
            activity: ActivityLog::new(account.id, log_dir),
            buffer: Arc::new(MessageBuffer::new(knobs.buffer_size)),
            seen: Arc::new(SeenMessages::default()),
            handshake: Arc::new(handshake),
            connection: OnceCell::new(),
            replies: Mutex::new(HashMap::new()),
            account: RwLock::new(account),
            cancel,
            tasks: TaskTracker::new(),
            deps,
        })
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Snapshot of the working account configuration.
    pub fn account(&self) -> AccountConfig {
        self.account
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn status(&self) -> AccountStatus {
        self.account
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .status
    }

    pub fn handshake(&self) -> Arc<AuthHandshake> {
        Arc::clone(&self.handshake)
    }

    pub fn buffer(&self) -> &MessageBuffer {
        &self.buffer
    }

    pub fn is_connected(&self) -> bool {
        self.connection.initialized()
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// When the session last replied in `chat_id`.
    pub async fn last_reply(&self, chat_id: ChatId) -> Option<DateTime<Utc>> {
        self.replies
            .lock()
            .await
            .get(&chat_id)
            .and_then(|state| state.last_reply)
    }

    /// Number of generation history turns kept for `chat_id`.
    pub async fn history_len(&self, chat_id: ChatId) -> usize {
        self.replies
            .lock()
            .await
            .get(&chat_id)
            .map_or(0, |state| state.history.len())
    }

    fn knobs(&self) -> SessionKnobs {
        SessionKnobs::resolve(&self.account(), &self.deps.settings.session)
    }

    fn set_status(&self, status: AccountStatus) {
        self.account
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .status = status;
    }

    async fn persist_status(&self, status: AccountStatus) -> Result<(), ChorusError> {
        self.deps
            .store
            .set_account_status(self.account_id, status)
            .await?;
        self.set_status(status);
        Ok(())
    }

    /// Run startup on the session's task tracker, logging a failure.
    pub fn spawn_start(self: &Arc<Self>) {
        let session = Arc::clone(self);
        self.tasks.spawn(async move {
            if let Err(e) = session.start().await {
                match e {
                    ChorusError::Cancelled => {
                        debug!(account_id = %session.account_id, "startup cancelled");
                    }
                    e => error!(account_id = %session.account_id, error = %e, "session startup failed"),
                }
            }
        });
    }

    /// Bring the session online and start the poll and decision loops.
    ///
    /// A failure other than cancellation persists status `error`.
    pub async fn start(self: &Arc<Self>) -> Result<(), ChorusError> {
        if let Err(e) = self.activity.open().await {
            warn!(account_id = %self.account_id, error = %e, "activity log unavailable");
        }
        self.activity.record("session starting").await;

        if let Err(e) = self.establish().await {
            if !self.cancel.is_cancelled() {
                if let Err(status_err) = self.persist_status(AccountStatus::Error).await {
                    warn!(account_id = %self.account_id, error = %status_err, "failed to persist error status");
                }
                self.activity.record(&format!("startup failed: {e}")).await;
            }
            return Err(e);
        }

        let poller = Arc::clone(self);
        self.tasks.spawn(async move { poller.poll_loop().await });
        let decider = Arc::clone(self);
        self.tasks.spawn(async move { decider.decision_loop().await });
        Ok(())
    }

    /// Connect, log in if needed, refresh identity, and mark the account online.
    ///
    /// Conversation sync runs in the background. No loops are started.
    pub async fn establish(&self) -> Result<(), ChorusError> {
        let account = self.account();
        let sink: Arc<dyn InboundSink> = Arc::new(SessionSink::new(
            self.account_id,
            Arc::clone(&self.buffer),
            Arc::clone(&self.seen),
            self.cancel.clone(),
        ));

        let conn = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ChorusError::Cancelled),
            conn = self.deps.connector.connect(&account, sink) => conn?,
        };
        self.connection
            .set(Arc::clone(&conn))
            .map_err(|_| ChorusError::Internal("session is already connected".into()))?;
        info!(account_id = %self.account_id, "connected");

        if !conn.is_authorized().await? {
            self.authenticate(conn.as_ref(), &account.phone_number)
                .await?;
        }

        let identity = conn.self_identity().await?;
        let nickname = identity.display_name();
        if !nickname.is_empty() {
            self.deps
                .store
                .set_account_nickname(self.account_id, &nickname)
                .await?;
            self.account
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .nickname = nickname.clone();
        }

        {
            let store = Arc::clone(&self.deps.store);
            let conn = Arc::clone(&conn);
            let account_id = self.account_id;
            let cancel = self.cancel.clone();
            self.tasks.spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    result = sync_conversations(account_id, conn.as_ref(), store.as_ref()) => {
                        if let Err(e) = result {
                            warn!(%account_id, error = %e, "conversation sync failed");
                        }
                    }
                }
            });
        }

        self.persist_status(AccountStatus::Online).await?;
        info!(account_id = %self.account_id, %nickname, "session online");
        self.activity
            .record(&format!("online as {nickname}"))
            .await;
        Ok(())
    }

    async fn authenticate(&self, conn: &dyn Connection, phone: &str) -> Result<(), ChorusError> {
        info!(account_id = %self.account_id, "no stored credential, starting login");
        let callbacks: &dyn AuthCallbacks = self.handshake.as_ref();

        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => Err(ChorusError::Cancelled),
            result = conn.authenticate(phone, callbacks) => result,
        };

        match outcome {
            Ok(()) => {
                self.handshake.mark_completed();
                info!(account_id = %self.account_id, "login completed");
                self.activity.record("login completed").await;
                Ok(())
            }
            Err(e) => {
                self.handshake.mark_failed();
                match e {
                    ChorusError::Cancelled | ChorusError::Authentication(_) => Err(e),
                    other => Err(ChorusError::Authentication(other.to_string())),
                }
            }
        }
    }

    async fn sleep_or_cancel(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    async fn decision_loop(self: Arc<Self>) {
        debug!(account_id = %self.account_id, "decision loop started");
        while self.sleep_or_cancel(self.knobs().decision_interval).await {
            let report = self.run_decision_tick().await;
            if report.replied + report.failed > 0 {
                debug!(
                    account_id = %self.account_id,
                    replied = report.replied,
                    skipped = report.skipped,
                    failed = report.failed,
                    "decision tick finished"
                );
            }
        }
        debug!(account_id = %self.account_id, "decision loop stopped");
    }

    async fn poll_loop(self: Arc<Self>) {
        debug!(account_id = %self.account_id, "poll loop started");
        while self.sleep_or_cancel(self.knobs().poll_interval).await {
            match self.poll_once().await {
                Ok(_) => {}
                Err(ChorusError::Cancelled) => break,
                Err(e) => warn!(account_id = %self.account_id, error = %e, "history poll failed"),
            }
        }
        debug!(account_id = %self.account_id, "poll loop stopped");
    }

    /// Reload the working configuration from the store, keeping the runtime status.
    async fn reload_account(&self) {
        match self.deps.store.get_account(self.account_id).await {
            Ok(Some(fresh)) => {
                self.account
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .refresh_from(fresh);
                self.buffer.set_capacity(self.knobs().buffer_size);
            }
            Ok(None) => warn!(account_id = %self.account_id, "account no longer exists in store"),
            Err(e) => warn!(account_id = %self.account_id, error = %e, "failed to reload account"),
        }
    }

    /// One pass of the decision-and-reply loop over everything buffered.
    pub async fn run_decision_tick(&self) -> TickReport {
        let mut report = TickReport::default();
        self.reload_account().await;

        let Some(conn) = self.connection.get().cloned() else {
            return report;
        };
        let drained = self.buffer.drain_all();
        if drained.is_empty() {
            return report;
        }

        let account = self.account();
        let knobs = SessionKnobs::resolve(&account, &self.deps.settings.session);

        for (chat_id, messages) in drained {
            if self.cancel.is_cancelled() {
                break;
            }
            match self
                .process_conversation(conn.as_ref(), &account, &knobs, chat_id, &messages)
                .await
            {
                Ok(Disposition::Replied) => report.replied += 1,
                Ok(Disposition::Skipped(reason)) => {
                    debug!(account_id = %self.account_id, %chat_id, %reason, "conversation skipped");
                    report.skipped += 1;
                }
                Err(ChorusError::Cancelled) => break,
                Err(e) => {
                    warn!(account_id = %self.account_id, %chat_id, error = %e, "reply failed");
                    report.failed += 1;
                }
            }
        }
        report
    }

    async fn process_conversation(
        &self,
        conn: &dyn Connection,
        account: &AccountConfig,
        knobs: &SessionKnobs,
        chat_id: ChatId,
        messages: &[BufferedMessage],
    ) -> Result<Disposition, ChorusError> {
        let store = self.deps.store.as_ref();
        let Some(conversation) = store.find_conversation_by_chat(chat_id).await? else {
            return Ok(Disposition::Skipped(SkipReason::NotAssigned));
        };
        let assignment = store
            .get_assignment(self.account_id, conversation.id)
            .await?;
        let last_reply = self.last_reply(chat_id).await;
        let roll: u32 = rand::thread_rng().gen_range(0..100);

        if let Err(reason) = check_gates(
            assignment.as_ref(),
            account,
            last_reply,
            knobs.reply_interval,
            Utc::now(),
            roll,
        ) {
            return Ok(Disposition::Skipped(reason));
        }

        let settings = &self.deps.settings.session;
        let stimulus = compose_stimulus(messages, &settings.stimulus_delimiter);
        let prompt = if settings.stimulus_preamble.is_empty() {
            stimulus.clone()
        } else {
            format!("{}\n\n{stimulus}", settings.stimulus_preamble)
        };
        let history = self
            .replies
            .lock()
            .await
            .get(&chat_id)
            .map(|state| state.history.snapshot())
            .unwrap_or_default();

        let request = GenerationRequest {
            api_key: account.generation_api_key.clone(),
            model: account.generation_model.clone(),
            system_prompt: account.system_prompt.clone(),
            history,
            prompt,
        };
        let reply = self.deps.generator.generate(request).await.inspect_err(|_| {
            metrics::counter!("chorus_generation_failures_total").increment(1);
        })?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Ok(Disposition::Skipped(SkipReason::EmptyReply));
        }

        let sent = self
            .dispatch(conn, chat_id, reply, knobs)
            .await
            .inspect_err(|_| {
                metrics::counter!("chorus_dispatch_failures_total").increment(1);
            })?;

        let now = Utc::now();
        {
            let mut replies = self.replies.lock().await;
            let state = replies.entry(chat_id).or_insert_with(|| ReplyState {
                last_reply: None,
                history: ConversationHistory::new(settings.history_turns),
            });
            state.last_reply = Some(now);
            state.history.push_exchange(&stimulus, reply);
        }

        self.record_sent(&conversation, reply, sent.last().copied(), now)
            .await;
        metrics::counter!("chorus_replies_sent_total").increment(1);
        info!(
            account_id = %self.account_id,
            %chat_id,
            parts = sent.len(),
            buffered = messages.len(),
            "replied"
        );
        self.activity
            .record(&format!("replied in {chat_id} with {} part(s)", sent.len()))
            .await;
        Ok(Disposition::Replied)
    }

    /// Send `reply`, split into paced parts when the account asks for it.
    ///
    /// A part's final failure aborts the remaining parts.
    async fn dispatch(
        &self,
        conn: &dyn Connection,
        chat_id: ChatId,
        reply: &str,
        knobs: &SessionKnobs,
    ) -> Result<Vec<MessageId>, ChorusError> {
        let address = resolve_peer(self.deps.store.as_ref(), conn, chat_id).await?;
        let parts = if knobs.split_by_newline {
            split_reply(reply, self.deps.settings.session.split_merge_threshold)
        } else {
            Vec::new()
        };

        if parts.len() <= 1 {
            return Ok(vec![self.send_with_retry(conn, address, reply).await?]);
        }

        let mut sent = Vec::with_capacity(parts.len());
        for (index, part) in parts.iter().enumerate() {
            if index > 0 && !self.sleep_or_cancel(knobs.multi_message_interval).await {
                return Err(ChorusError::Cancelled);
            }
            sent.push(self.send_with_retry(conn, address, part).await?);
            metrics::counter!("chorus_reply_parts_sent_total").increment(1);
        }
        Ok(sent)
    }

    async fn send_with_retry(
        &self,
        conn: &dyn Connection,
        address: PeerAddress,
        text: &str,
    ) -> Result<MessageId, ChorusError> {
        self.deps
            .settings
            .retry
            .execute(&self.cancel, || conn.send_text(address, text, None))
            .await
    }

    async fn record_sent(
        &self,
        conversation: &Conversation,
        content: &str,
        transport_message_id: Option<MessageId>,
        created_at: DateTime<Utc>,
    ) {
        let record = SentMessageRecord {
            account_id: self.account_id,
            conversation_id: conversation.id,
            content: content.to_string(),
            transport_message_id,
            reply_to_message_id: None,
            created_at,
        };
        if let Err(e) = self.deps.store.append_sent_message(&record).await {
            warn!(account_id = %self.account_id, error = %e, "failed to record sent message");
        }
    }

    /// Fetch recent history of every assigned supergroup or channel and buffer
    /// the messages not seen before. Returns the number buffered.
    pub async fn poll_once(&self) -> Result<usize, ChorusError> {
        let Some(conn) = self.connection.get().cloned() else {
            return Ok(0);
        };
        let store = self.deps.store.as_ref();
        let limit = self.deps.settings.session.history_fetch_limit;
        let mut buffered = 0;

        for (_, conversation) in store.list_assigned_conversations(self.account_id).await? {
            if self.cancel.is_cancelled() {
                return Err(ChorusError::Cancelled);
            }
            if !conversation.kind.needs_access_credential() {
                continue;
            }
            let chat_id = conversation.chat_id;
            let address = match resolve_peer(store, conn.as_ref(), chat_id).await {
                Ok(address) => address,
                Err(e) => {
                    warn!(account_id = %self.account_id, %chat_id, error = %e, "cannot address conversation for polling");
                    continue;
                }
            };

            let page = match self
                .deps
                .settings
                .retry
                .execute(&self.cancel, || conn.fetch_recent_history(address, limit))
                .await
            {
                Ok(page) => page,
                Err(ChorusError::Cancelled) => return Err(ChorusError::Cancelled),
                Err(e) => {
                    warn!(account_id = %self.account_id, %chat_id, error = %e, "history fetch failed");
                    continue;
                }
            };

            for message in select_unseen(&self.seen, chat_id, page) {
                self.buffer.append(chat_id, message.text);
                metrics::counter!("chorus_messages_buffered_total", "source" => "poll")
                    .increment(1);
                buffered += 1;
            }
        }
        Ok(buffered)
    }

    /// Send `text` to `conversation` immediately, bypassing buffering and gates.
    pub async fn send_text(
        &self,
        conversation: &Conversation,
        text: &str,
    ) -> Result<MessageId, ChorusError> {
        let conn = self
            .connection
            .get()
            .cloned()
            .ok_or_else(|| ChorusError::transport("session is not connected"))?;
        let address = resolve_peer(self.deps.store.as_ref(), conn.as_ref(), conversation.chat_id)
            .await?;
        let message_id = self.send_with_retry(conn.as_ref(), address, text).await?;

        self.record_sent(conversation, text, Some(message_id), Utc::now())
            .await;
        info!(
            account_id = %self.account_id,
            chat_id = %conversation.chat_id,
            "manual message sent"
        );
        Ok(message_id)
    }

    /// Cancel all work, mark the account offline, and release the connection.
    ///
    /// Failures are logged; calling twice is harmless.
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.tasks.close();

        let grace = Duration::from_secs(self.deps.settings.session.shutdown_timeout_secs);
        if tokio::time::timeout(grace, self.tasks.wait()).await.is_err() {
            warn!(account_id = %self.account_id, "session tasks did not finish within the shutdown timeout");
        }

        if let Err(e) = self.persist_status(AccountStatus::Offline).await {
            warn!(account_id = %self.account_id, error = %e, "failed to persist offline status");
        }
        if let Some(conn) = self.connection.get() {
            if let Err(e) = conn.disconnect().await {
                warn!(account_id = %self.account_id, error = %e, "disconnect failed");
            }
        }

        info!(account_id = %self.account_id, "session stopped");
        self.activity.record("session stopped").await;
        self.activity.close().await;
    }
}
