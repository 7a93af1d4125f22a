// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation list synchronization after login.

use chorus_core::{AccountId, AdminStore, ChorusError, Connection};
use tracing::{debug, info, warn};

/// Upsert every conversation the account participates in.
///
/// Individual upsert failures are logged and skipped. Returns the number of
/// conversations stored.
pub async fn sync_conversations(
    account_id: AccountId,
    conn: &dyn Connection,
    store: &dyn AdminStore,
) -> Result<usize, ChorusError> {
    let listed = conn.list_conversations().await?;
    let mut stored = 0;

    for info in &listed {
        match store.upsert_conversation(info).await {
            Ok(conversation) => {
                debug!(
                    %account_id,
                    chat_id = %conversation.chat_id,
                    kind = %conversation.kind,
                    "conversation synced"
                );
                stored += 1;
            }
            Err(e) => {
                warn!(%account_id, chat_id = %info.chat_id, error = %e, "failed to store conversation");
            }
        }
    }

    info!(%account_id, listed = listed.len(), stored, "conversation sync complete");
    Ok(stored)
}
