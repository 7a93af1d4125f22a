// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound ingestion: the push sink and history-poll filtering.
//!
//! The poller keeps its own per-conversation mark, so a pushed message never
//! hides older ones that push skipped. Ids delivered by push are remembered in
//! a bounded window and are not buffered again by the poller.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use chorus_core::{AccountId, ChatId, HistoryMessage, InboundEvent, InboundSink, MessageId};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::buffer::MessageBuffer;

/// Pushed ids remembered per conversation.
const PUSHED_WINDOW: usize = 256;

#[derive(Debug, Default)]
struct ChatSeen {
    /// Highest id the poller has scanned.
    poll_mark: i64,
    /// Push-delivered ids above `poll_mark`, oldest first.
    pushed: VecDeque<i64>,
}

/// Message ids already observed per conversation, by either ingestion path.
#[derive(Debug, Default)]
pub struct SeenMessages {
    chats: Mutex<HashMap<ChatId, ChatSeen>>,
}

impl SeenMessages {
    /// Record a pushed `id`, returning false if push or the poller already saw it.
    pub fn mark_pushed(&self, chat_id: ChatId, id: MessageId) -> bool {
        let mut chats = self.chats.lock().unwrap_or_else(PoisonError::into_inner);
        let seen = chats.entry(chat_id).or_default();
        if id.0 <= seen.poll_mark || seen.pushed.contains(&id.0) {
            return false;
        }
        if seen.pushed.len() == PUSHED_WINDOW {
            seen.pushed.pop_front();
        }
        seen.pushed.push_back(id.0);
        true
    }

    /// Highest id the poller has scanned for `chat_id`.
    pub fn poll_mark(&self, chat_id: ChatId) -> i64 {
        self.chats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&chat_id)
            .map_or(0, |seen| seen.poll_mark)
    }
}

/// Keep the unseen, foreign, non-empty messages of a history page in
/// ascending id order, advancing the poll mark past the whole page.
///
/// Ids at or below the poll mark and ids already delivered by push are skipped.
pub fn select_unseen(
    seen: &SeenMessages,
    chat_id: ChatId,
    mut page: Vec<HistoryMessage>,
) -> Vec<HistoryMessage> {
    page.sort_by_key(|m| m.id);

    let mut chats = seen.chats.lock().unwrap_or_else(PoisonError::into_inner);
    let entry = chats.entry(chat_id).or_default();
    let mut fresh = Vec::new();
    for message in page {
        if message.id.0 <= entry.poll_mark {
            continue;
        }
        entry.poll_mark = message.id.0;
        if entry.pushed.contains(&message.id.0) {
            continue;
        }
        if !message.outgoing && !message.text.trim().is_empty() {
            fresh.push(message);
        }
    }

    let poll_mark = entry.poll_mark;
    entry.pushed.retain(|&id| id > poll_mark);
    fresh
}

/// Push sink registered with an account's connection.
pub struct SessionSink {
    account_id: AccountId,
    buffer: Arc<MessageBuffer>,
    seen: Arc<SeenMessages>,
    cancel: CancellationToken,
}

impl SessionSink {
    pub fn new(
        account_id: AccountId,
        buffer: Arc<MessageBuffer>,
        seen: Arc<SeenMessages>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            account_id,
            buffer,
            seen,
            cancel,
        }
    }
}

impl InboundSink for SessionSink {
    fn deliver(&self, event: InboundEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        // Private one-to-one chats are not handled.
        let Some(chat_id) = event.peer.group_chat_id() else {
            return;
        };
        if !self.seen.mark_pushed(chat_id, event.message_id) {
            return;
        }
        if event.outgoing || event.text.trim().is_empty() {
            return;
        }

        trace!(account_id = %self.account_id, %chat_id, "buffered pushed message");
        metrics::counter!("chorus_messages_buffered_total", "source" => "push").increment(1);
        self.buffer.append(chat_id, event.text);
    }
}
