// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A [`Connection`] backed by a sidecar speaking the JSON Lines protocol.
//!
//! A writer task serializes commands onto the sidecar's stdin; a reader task
//! parses its stdout, resolving pending requests by id, forwarding inbound
//! messages to the session sink and login prompts to [`Connection::authenticate`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chorus_core::{
    AccountId, AuthCallbacks, ChatId, ChorusError, CodeChallenge, Connection, ConversationInfo,
    HistoryMessage, InboundEvent, InboundSink, MessageId, PeerAddress, SelfIdentity,
};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::protocol::{
    AccessHashResult, AuthorizedResult, MessageIdResult, SidecarCommand, SidecarEvent,
};

type Pending = HashMap<String, oneshot::Sender<Result<serde_json::Value, ChorusError>>>;

/// A login prompt raised by the sidecar during `authenticate`.
#[derive(Debug)]
enum AuthPrompt {
    Code { delivery: Option<String> },
    Password,
    SignUp,
    TermsOfService { text: String },
}

pub struct SidecarConnection {
    account_id: AccountId,
    commands: mpsc::Sender<SidecarCommand>,
    pending: Arc<Mutex<Pending>>,
    prompts: tokio::sync::Mutex<mpsc::Receiver<AuthPrompt>>,
    request_timeout: Duration,
    child: tokio::sync::Mutex<Option<Child>>,
    cancel: CancellationToken,
}

fn lock(pending: &Mutex<Pending>) -> MutexGuard<'_, Pending> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl SidecarConnection {
    /// Bridge `reader`/`writer` (the sidecar's stdout/stdin) and start the I/O tasks.
    pub fn spawn<R, W>(
        account_id: AccountId,
        reader: R,
        writer: W,
        sink: Arc<dyn InboundSink>,
        request_timeout: Duration,
    ) -> Arc<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (prompt_tx, prompt_rx) = mpsc::channel(8);
        let pending = Arc::new(Mutex::new(Pending::new()));
        let cancel = CancellationToken::new();

        tokio::spawn(write_commands(
            account_id,
            writer,
            command_rx,
            cancel.clone(),
        ));
        tokio::spawn(read_events(
            account_id,
            reader,
            Arc::clone(&pending),
            prompt_tx,
            sink,
            cancel.clone(),
        ));

        Arc::new(Self {
            account_id,
            commands: command_tx,
            pending,
            prompts: tokio::sync::Mutex::new(prompt_rx),
            request_timeout,
            child: tokio::sync::Mutex::new(None),
            cancel,
        })
    }

    /// Keep the sidecar process so it is killed on disconnect.
    pub async fn attach_child(&self, child: Child) {
        *self.child.lock().await = Some(child);
    }

    async fn send(&self, command: SidecarCommand) -> Result<(), ChorusError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ChorusError::transport("sidecar is not running"))
    }

    /// Register a pending request and send the command built for its id.
    async fn begin(
        &self,
        build: impl FnOnce(String) -> SidecarCommand,
    ) -> Result<
        (
            String,
            oneshot::Receiver<Result<serde_json::Value, ChorusError>>,
        ),
        ChorusError,
    > {
        let request_id = new_request_id();
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(request_id.clone(), tx);

        if let Err(e) = self.send(build(request_id.clone())).await {
            lock(&self.pending).remove(&request_id);
            return Err(e);
        }
        Ok((request_id, rx))
    }

    /// Send a command and wait for its response within the request timeout.
    pub(crate) async fn request<T: DeserializeOwned>(
        &self,
        build: impl FnOnce(String) -> SidecarCommand,
    ) -> Result<T, ChorusError> {
        let (request_id, rx) = self.begin(build).await?;

        let value = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(ChorusError::transport("sidecar dropped the request")),
            Err(_) => {
                lock(&self.pending).remove(&request_id);
                return Err(ChorusError::Timeout {
                    duration: self.request_timeout,
                });
            }
        };
        decode(value)
    }

    async fn abort_login(&self, request_id: &str, reason: &ChorusError) {
        lock(&self.pending).remove(request_id);
        let command = SidecarCommand::AbortLogin {
            request_id: request_id.to_string(),
            reason: reason.to_string(),
        };
        if let Err(e) = self.send(command).await {
            debug!(account_id = %self.account_id, error = %e, "could not abort login");
        }
    }
}

fn decode<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, ChorusError> {
    serde_json::from_value(value).map_err(|e| ChorusError::Transport {
        message: format!("malformed sidecar result: {e}"),
        source: Some(Box::new(e)),
    })
}

async fn write_commands<W>(
    account_id: AccountId,
    mut writer: W,
    mut commands: mpsc::Receiver<SidecarCommand>,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin + Send + 'static,
{
    loop {
        let command = tokio::select! {
            _ = cancel.cancelled() => break,
            command = commands.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        let mut line = match serde_json::to_string(&command) {
            Ok(json) => json,
            Err(e) => {
                error!(%account_id, error = %e, "failed to serialize sidecar command");
                continue;
            }
        };
        line.push('\n');

        if let Err(e) = writer.write_all(line.as_bytes()).await {
            error!(%account_id, error = %e, "failed to write to sidecar");
            break;
        }
        if let Err(e) = writer.flush().await {
            error!(%account_id, error = %e, "failed to flush sidecar stdin");
            break;
        }
    }
    debug!(%account_id, "sidecar writer stopped");
}

async fn read_events<R>(
    account_id: AccountId,
    reader: R,
    pending: Arc<Mutex<Pending>>,
    prompts: mpsc::Sender<AuthPrompt>,
    sink: Arc<dyn InboundSink>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!(%account_id, "sidecar stdout closed");
                break;
            }
            Err(e) => {
                error!(%account_id, error = %e, "error reading sidecar stdout");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let event = match serde_json::from_str::<SidecarEvent>(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!(%account_id, %line, error = %e, "unparseable sidecar event");
                continue;
            }
        };

        match event {
            SidecarEvent::Ready { version } => {
                info!(%account_id, %version, "sidecar ready");
            }
            SidecarEvent::Response {
                request_id,
                result,
                error,
            } => {
                let waiter = lock(&pending).remove(&request_id);
                match waiter {
                    Some(tx) => {
                        let outcome = match error {
                            Some(err) => Err(err.into()),
                            None => Ok(result),
                        };
                        let _ = tx.send(outcome);
                    }
                    None => debug!(%account_id, %request_id, "response for unknown request"),
                }
            }
            SidecarEvent::Message {
                message_id,
                peer,
                outgoing,
                text,
            } => {
                trace!(%account_id, message_id, "inbound message");
                sink.deliver(InboundEvent {
                    message_id: MessageId(message_id),
                    peer,
                    outgoing,
                    text,
                });
            }
            SidecarEvent::CodeRequested { delivery, .. } => {
                forward_prompt(account_id, &prompts, AuthPrompt::Code { delivery });
            }
            SidecarEvent::PasswordRequested { .. } => {
                forward_prompt(account_id, &prompts, AuthPrompt::Password);
            }
            SidecarEvent::SignUpRequested { .. } => {
                forward_prompt(account_id, &prompts, AuthPrompt::SignUp);
            }
            SidecarEvent::TermsOfService { text, .. } => {
                forward_prompt(account_id, &prompts, AuthPrompt::TermsOfService { text });
            }
            SidecarEvent::Log { level, message } => match level.as_str() {
                "error" => error!(%account_id, sidecar = %message),
                "warn" | "warning" => warn!(%account_id, sidecar = %message),
                _ => debug!(%account_id, sidecar = %message),
            },
        }
    }

    // Nobody will answer the outstanding requests now.
    let orphaned: Vec<_> = lock(&pending).drain().collect();
    for (_, tx) in orphaned {
        let _ = tx.send(Err(ChorusError::transport("sidecar exited")));
    }
}

/// Prompts are only consumed during a login; the reader must never block on them.
fn forward_prompt(account_id: AccountId, prompts: &mpsc::Sender<AuthPrompt>, prompt: AuthPrompt) {
    if let Err(e) = prompts.try_send(prompt) {
        warn!(%account_id, error = %e, "dropping login prompt");
    }
}

#[async_trait]
impl Connection for SidecarConnection {
    async fn is_authorized(&self) -> Result<bool, ChorusError> {
        let result: AuthorizedResult = self
            .request(|request_id| SidecarCommand::IsAuthorized { request_id })
            .await?;
        Ok(result.authorized)
    }

    async fn authenticate(
        &self,
        phone_number: &str,
        callbacks: &dyn AuthCallbacks,
    ) -> Result<(), ChorusError> {
        let mut prompts = self.prompts.lock().await;
        let (request_id, mut done) = self
            .begin(|request_id| SidecarCommand::Authenticate {
                request_id,
                phone_number: phone_number.to_string(),
            })
            .await?;

        loop {
            let prompt = tokio::select! {
                outcome = &mut done => {
                    return match outcome {
                        Ok(result) => result.map(|_| ()),
                        Err(_) => Err(ChorusError::transport("sidecar dropped the login")),
                    };
                }
                prompt = prompts.recv() => prompt,
            };

            let reply = match prompt {
                None => return Err(ChorusError::transport("sidecar exited during login")),
                Some(AuthPrompt::Code { delivery }) => callbacks
                    .on_code_requested(CodeChallenge {
                        phone_number: phone_number.to_string(),
                        delivery,
                    })
                    .await
                    .map(|code| {
                        Some(SidecarCommand::ProvideCode {
                            request_id: request_id.clone(),
                            code,
                        })
                    }),
                Some(AuthPrompt::Password) => {
                    callbacks.on_password_requested().await.map(|password| {
                        Some(SidecarCommand::ProvidePassword {
                            request_id: request_id.clone(),
                            password: password.expose_secret().to_string(),
                        })
                    })
                }
                Some(AuthPrompt::SignUp) => callbacks.on_sign_up_requested().await.map(|()| None),
                Some(AuthPrompt::TermsOfService { text }) => {
                    callbacks.on_terms_of_service(&text).await.map(|()| None)
                }
            };

            match reply {
                Ok(Some(command)) => self.send(command).await?,
                Ok(None) => {}
                Err(e) => {
                    self.abort_login(&request_id, &e).await;
                    return Err(e);
                }
            }
        }
    }

    async fn self_identity(&self) -> Result<SelfIdentity, ChorusError> {
        self.request(|request_id| SidecarCommand::SelfIdentity { request_id })
            .await
    }

    async fn send_text(
        &self,
        address: PeerAddress,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, ChorusError> {
        let result: MessageIdResult = self
            .request(|request_id| SidecarCommand::SendText {
                request_id,
                address,
                text: text.to_string(),
                reply_to: reply_to.map(|id| id.0),
            })
            .await?;
        Ok(MessageId(result.message_id))
    }

    async fn fetch_recent_history(
        &self,
        address: PeerAddress,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>, ChorusError> {
        self.request(|request_id| SidecarCommand::FetchHistory {
            request_id,
            address,
            limit,
        })
        .await
    }

    async fn resolve_access_hash(&self, chat_id: ChatId) -> Result<i64, ChorusError> {
        let result: AccessHashResult = self
            .request(|request_id| SidecarCommand::ResolveAccessHash {
                request_id,
                chat_id,
            })
            .await?;
        Ok(result.access_hash)
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationInfo>, ChorusError> {
        self.request(|request_id| SidecarCommand::ListConversations { request_id })
            .await
    }

    async fn disconnect(&self) -> Result<(), ChorusError> {
        let disconnected: Result<serde_json::Value, ChorusError> = self
            .request(|request_id| SidecarCommand::Disconnect { request_id })
            .await;
        if let Err(e) = &disconnected {
            warn!(account_id = %self.account_id, error = %e, "sidecar disconnect failed");
        }
        let _ = self.send(SidecarCommand::Shutdown).await;
        self.cancel.cancel();

        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                debug!(account_id = %self.account_id, error = %e, "sidecar already exited");
            }
        }
        info!(account_id = %self.account_id, "sidecar disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use tokio::io::{DuplexStream, Lines, ReadHalf, WriteHalf};

    use super::*;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<InboundEvent>>);

    impl InboundSink for RecordingSink {
        fn deliver(&self, event: InboundEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    /// The sidecar's end of the pipe.
    struct FakeSidecar {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl FakeSidecar {
        async fn next_command(&mut self) -> serde_json::Value {
            let line = self.lines.next_line().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }

        async fn emit(&mut self, event: serde_json::Value) {
            let mut line = event.to_string();
            line.push('\n');
            self.writer.write_all(line.as_bytes()).await.unwrap();
        }

        async fn respond(&mut self, request_id: &serde_json::Value, result: serde_json::Value) {
            self.emit(serde_json::json!({
                "type": "response",
                "request_id": request_id,
                "result": result,
            }))
            .await;
        }
    }

    fn connect(timeout: Duration) -> (Arc<SidecarConnection>, FakeSidecar, Arc<RecordingSink>) {
        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        let (our_read, our_write) = tokio::io::split(ours);
        let (their_read, their_write) = tokio::io::split(theirs);
        let sink = Arc::new(RecordingSink::default());
        let conn = SidecarConnection::spawn(
            AccountId(1),
            our_read,
            our_write,
            Arc::clone(&sink) as Arc<dyn InboundSink>,
            timeout,
        );
        let fake = FakeSidecar {
            lines: BufReader::new(their_read).lines(),
            writer: their_write,
        };
        (conn, fake, sink)
    }

    #[tokio::test]
    async fn send_text_round_trip() {
        let (conn, mut fake, _) = connect(Duration::from_secs(5));

        let sending = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move {
                conn.send_text(PeerAddress::Group { chat_id: 42 }, "hello", None)
                    .await
            })
        };

        let command = fake.next_command().await;
        assert_eq!(command["type"], "send_text");
        assert_eq!(command["text"], "hello");
        assert_eq!(command["address"]["chat_id"], 42);
        fake.respond(&command["request_id"], serde_json::json!({"message_id": 1001}))
            .await;

        assert_eq!(sending.await.unwrap().unwrap(), MessageId(1001));
    }

    #[tokio::test]
    async fn inbound_messages_reach_the_sink() {
        let (conn, mut fake, sink) = connect(Duration::from_secs(5));
        fake.emit(serde_json::json!({
            "type": "message",
            "message_id": 7,
            "peer": {"kind": "channel", "id": 42},
            "text": "yo"
        }))
        .await;

        // A round trip guarantees the reader has processed the earlier line.
        let checking = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.is_authorized().await })
        };
        let command = fake.next_command().await;
        fake.respond(&command["request_id"], serde_json::json!({"authorized": true}))
            .await;
        assert!(checking.await.unwrap().unwrap());

        let events = sink.0.lock().unwrap().clone();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message_id, MessageId(7));
        assert_eq!(events[0].text, "yo");
    }

    #[tokio::test]
    async fn error_responses_become_transport_errors() {
        let (conn, mut fake, _) = connect(Duration::from_secs(5));
        let resolving = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.resolve_access_hash(ChatId(5)).await })
        };

        let command = fake.next_command().await;
        fake.emit(serde_json::json!({
            "type": "response",
            "request_id": command["request_id"],
            "error": {"message": "CHANNEL_PRIVATE", "kind": "forbidden"}
        }))
        .await;

        let err = resolving.await.unwrap().unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("CHANNEL_PRIVATE"));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_requests_time_out() {
        let (conn, _fake, _) = connect(Duration::from_secs(30));
        let err = conn.list_conversations().await.unwrap_err();
        assert!(matches!(err, ChorusError::Timeout { .. }));
        assert!(lock(&conn.pending).is_empty());
    }

    #[tokio::test]
    async fn sidecar_exit_fails_outstanding_requests() {
        let (conn, mut fake, _) = connect(Duration::from_secs(30));
        let pending = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.self_identity().await })
        };
        fake.next_command().await;
        drop(fake);

        let err = pending.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("sidecar exited"));
    }

    struct FixedCallbacks;

    #[async_trait]
    impl AuthCallbacks for FixedCallbacks {
        async fn on_code_requested(&self, challenge: CodeChallenge) -> Result<String, ChorusError> {
            assert_eq!(challenge.delivery.as_deref(), Some("sms"));
            Ok("12345".into())
        }

        async fn on_password_requested(&self) -> Result<SecretString, ChorusError> {
            Ok(SecretString::from("hunter2"))
        }
    }

    #[tokio::test]
    async fn login_prompts_are_answered_through_callbacks() {
        let (conn, mut fake, _) = connect(Duration::from_secs(5));
        let login = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.authenticate("+1555", &FixedCallbacks).await })
        };

        let start = fake.next_command().await;
        assert_eq!(start["type"], "authenticate");
        let request_id = start["request_id"].clone();

        fake.emit(serde_json::json!({
            "type": "code_requested", "request_id": request_id, "delivery": "sms"
        }))
        .await;
        let code = fake.next_command().await;
        assert_eq!(code["type"], "provide_code");
        assert_eq!(code["code"], "12345");

        fake.emit(serde_json::json!({"type": "password_requested", "request_id": request_id}))
            .await;
        let password = fake.next_command().await;
        assert_eq!(password["password"], "hunter2");

        fake.respond(&request_id, serde_json::Value::Null).await;
        login.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn rejected_sign_up_aborts_the_login() {
        let (conn, mut fake, _) = connect(Duration::from_secs(5));
        let login = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.authenticate("+1555", &FixedCallbacks).await })
        };

        let start = fake.next_command().await;
        fake.emit(serde_json::json!({
            "type": "sign_up_requested", "request_id": start["request_id"]
        }))
        .await;

        let abort = fake.next_command().await;
        assert_eq!(abort["type"], "abort_login");
        let err = login.await.unwrap().unwrap_err();
        assert!(matches!(err, ChorusError::Authentication(_)));
    }
}
