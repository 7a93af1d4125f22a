// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sent message log queries.

use chorus_core::{AccountId, ChorusError, MessageId, SentMessageRecord};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Append a record to the sent message log.
pub async fn append(db: &Database, record: &SentMessageRecord) -> Result<(), ChorusError> {
    let r = record.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO sent_messages
                     (account_id, conversation_id, content, transport_message_id,
                      reply_to_message_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    r.account_id.0,
                    r.conversation_id,
                    r.content,
                    r.transport_message_id.map(|m| m.0),
                    r.reply_to_message_id.map(|m| m.0),
                    r.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Sent messages of an account, newest first.
pub async fn list_for_account(
    db: &Database,
    account_id: AccountId,
    limit: usize,
) -> Result<Vec<SentMessageRecord>, ChorusError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| -> Result<Vec<SentMessageRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT account_id, conversation_id, content, transport_message_id,
                        reply_to_message_id, created_at
                 FROM sent_messages WHERE account_id = ?1
                 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![account_id.0, limit], |row| {
                Ok(SentMessageRecord {
                    account_id: AccountId(row.get(0)?),
                    conversation_id: row.get(1)?,
                    content: row.get(2)?,
                    transport_message_id: row.get::<_, Option<i64>>(3)?.map(MessageId),
                    reply_to_message_id: row.get::<_, Option<i64>>(4)?.map(MessageId),
                    created_at: row.get(5)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
