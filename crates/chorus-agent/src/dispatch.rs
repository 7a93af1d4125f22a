// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound path: reply splitting and peer address resolution.

use chorus_core::{AdminStore, ChatId, ChorusError, Connection, PeerAddress};
use tracing::{debug, warn};

/// Split a reply into chat-sized parts.
///
/// Lines are trimmed and blank lines dropped. A line is merged into the
/// preceding part (joined by a space) while that part is shorter than
/// `merge_threshold` characters.
pub fn split_reply(reply: &str, merge_threshold: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for line in reply.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if current.is_empty() {
            current = line.to_string();
        } else if current.chars().count() < merge_threshold {
            current.push(' ');
            current.push_str(line);
        } else {
            parts.push(std::mem::replace(&mut current, line.to_string()));
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Resolve how the transport should address `chat_id`.
///
/// Unknown conversations and basic groups use plain-group addressing.
/// Supergroups and channels need an access credential; a missing one is
/// fetched from the transport and persisted.
pub async fn resolve_peer(
    store: &dyn AdminStore,
    conn: &dyn Connection,
    chat_id: ChatId,
) -> Result<PeerAddress, ChorusError> {
    let bare = chat_id.0.abs();
    let Some(conversation) = store.find_conversation_by_chat(chat_id).await? else {
        debug!(%chat_id, "conversation unknown, using plain group addressing");
        return Ok(PeerAddress::Group { chat_id: bare });
    };

    if !conversation.kind.needs_access_credential() {
        return Ok(PeerAddress::Group { chat_id: bare });
    }

    let access_hash = match conversation.access_hash {
        Some(hash) if hash != 0 => hash,
        _ => {
            let hash = conn.resolve_access_hash(chat_id).await.map_err(|e| {
                ChorusError::AddressResolution {
                    chat_id,
                    message: e.to_string(),
                }
            })?;
            if let Err(e) = store.set_access_hash(conversation.id, hash).await {
                warn!(%chat_id, error = %e, "failed to persist resolved access hash");
            }
            hash
        }
    };

    Ok(PeerAddress::Channel {
        channel_id: bare,
        access_hash,
    })
}
