// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation bounded FIFO of recently observed inbound text.
//!
//! Shared by the push sink and the poller. Appends never block on I/O, so a
//! plain mutex is enough.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chorus_core::{BufferedMessage, ChatId};
use chrono::Utc;

/// Bounded message buffer keyed by conversation.
#[derive(Debug)]
pub struct MessageBuffer {
    capacity: AtomicUsize,
    entries: Mutex<HashMap<ChatId, VecDeque<BufferedMessage>>>,
}

impl MessageBuffer {
    /// A buffer keeping at most `capacity` messages per conversation (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: AtomicUsize::new(capacity.max(1)),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Change the per-conversation bound; takes effect on the next append.
    pub fn set_capacity(&self, capacity: usize) {
        self.capacity.store(capacity.max(1), Ordering::Relaxed);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ChatId, VecDeque<BufferedMessage>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `text`, evicting the oldest entries beyond capacity.
    pub fn append(&self, chat_id: ChatId, text: impl Into<String>) {
        let capacity = self.capacity();
        let mut entries = self.lock();
        let queue = entries.entry(chat_id).or_default();
        queue.push_back(BufferedMessage {
            text: text.into(),
            observed_at: Utc::now(),
        });
        while queue.len() > capacity {
            queue.pop_front();
        }
    }

    /// Atomically take every buffered message, leaving the buffer empty.
    ///
    /// Conversations without messages are omitted.
    pub fn drain_all(&self) -> HashMap<ChatId, Vec<BufferedMessage>> {
        let taken = std::mem::take(&mut *self.lock());
        taken
            .into_iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(chat_id, queue)| (chat_id, Vec::from(queue)))
            .collect()
    }

    /// Number of messages buffered for `chat_id`.
    pub fn len(&self, chat_id: ChatId) -> usize {
        self.lock().get(&chat_id).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().values().all(VecDeque::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;

    fn texts(messages: &[BufferedMessage]) -> Vec<&str> {
        messages.iter().map(|m| m.text.as_str()).collect()
    }

    #[test]
    fn drain_is_idempotent() {
        let buffer = MessageBuffer::new(10);
        buffer.append(ChatId(1), "hello");

        assert_eq!(buffer.drain_all().len(), 1);
        assert!(buffer.drain_all().is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn appends_after_drain_start_fresh() {
        let buffer = MessageBuffer::new(10);
        buffer.append(ChatId(1), "old");
        buffer.drain_all();
        buffer.append(ChatId(1), "new");

        let drained = buffer.drain_all();
        assert_eq!(texts(&drained[&ChatId(1)]), vec!["new"]);
    }

    #[test]
    fn conversations_are_independent() {
        let buffer = MessageBuffer::new(2);
        buffer.append(ChatId(1), "a");
        buffer.append(ChatId(2), "b");
        buffer.append(ChatId(1), "c");
        buffer.append(ChatId(1), "d");

        let drained = buffer.drain_all();
        assert_eq!(texts(&drained[&ChatId(1)]), vec!["c", "d"]);
        assert_eq!(texts(&drained[&ChatId(2)]), vec!["b"]);
    }

    #[test]
    fn shrinking_capacity_applies_on_next_append() {
        let buffer = MessageBuffer::new(5);
        for text in ["1", "2", "3", "4"] {
            buffer.append(ChatId(1), text);
        }
        buffer.set_capacity(2);
        buffer.append(ChatId(1), "5");

        assert_eq!(texts(&buffer.drain_all()[&ChatId(1)]), vec!["4", "5"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_respect_capacity() {
        let buffer = Arc::new(MessageBuffer::new(10));
        let mut handles = Vec::new();
        for task in 0..8 {
            let buffer = Arc::clone(&buffer);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    buffer.append(ChatId(7), format!("{task}-{i}"));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(buffer.len(ChatId(7)), 10);
    }

    proptest! {
        #[test]
        fn overflow_keeps_newest_in_order(
            capacity in 1usize..16,
            items in proptest::collection::vec("[a-z]{1,6}", 0..64),
        ) {
            let buffer = MessageBuffer::new(capacity);
            for item in &items {
                buffer.append(ChatId(1), item.clone());
            }

            let drained = buffer.drain_all();
            let expected: Vec<&str> = items
                .iter()
                .skip(items.len().saturating_sub(capacity))
                .map(String::as_str)
                .collect();

            if expected.is_empty() {
                prop_assert!(drained.is_empty());
            } else {
                prop_assert_eq!(texts(&drained[&ChatId(1)]), expected);
            }
        }
    }
}
