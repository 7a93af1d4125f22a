// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation queries.

use chorus_core::{ChatId, ChorusError, Conversation, ConversationInfo};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};

use super::parse_text;
use crate::database::{Database, map_tr_err};

pub(crate) const CONVERSATION_COLUMNS: &str =
    "id, chat_id, kind, access_hash, title, username, member_count";

/// Map a row selected with [`CONVERSATION_COLUMNS`] starting at `offset`.
pub(crate) fn conversation_from_row(
    row: &Row<'_>,
    offset: usize,
) -> Result<Conversation, rusqlite::Error> {
    Ok(Conversation {
        id: row.get(offset)?,
        chat_id: ChatId(row.get(offset + 1)?),
        kind: parse_text(row, offset + 2)?,
        access_hash: row.get(offset + 3)?,
        title: row.get(offset + 4)?,
        username: row.get(offset + 5)?,
        member_count: row.get(offset + 6)?,
    })
}

/// Get a conversation by row id.
pub async fn get_conversation(db: &Database, id: i64) -> Result<Option<Conversation>, ChorusError> {
    db.connection()
        .call(move |conn| -> Result<Option<Conversation>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
                params![id],
                |row| conversation_from_row(row, 0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Get a conversation by transport chat id.
pub async fn find_by_chat(
    db: &Database,
    chat_id: ChatId,
) -> Result<Option<Conversation>, ChorusError> {
    db.connection()
        .call(move |conn| -> Result<Option<Conversation>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE chat_id = ?1"),
                params![chat_id.0],
                |row| conversation_from_row(row, 0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or update a conversation keyed by chat id.
///
/// A known access credential is kept when the update carries none.
pub async fn upsert_conversation(
    db: &Database,
    info: &ConversationInfo,
) -> Result<Conversation, ChorusError> {
    let info = info.clone();
    db.connection()
        .call(move |conn| -> Result<Conversation, rusqlite::Error> {
            let now = Utc::now();
            conn.query_row(
                &format!(
                    "INSERT INTO conversations
                         (chat_id, kind, access_hash, title, username, member_count, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                     ON CONFLICT(chat_id) DO UPDATE SET
                         kind = excluded.kind,
                         access_hash = COALESCE(excluded.access_hash, conversations.access_hash),
                         title = excluded.title,
                         username = excluded.username,
                         member_count = excluded.member_count,
                         updated_at = excluded.updated_at
                     RETURNING {CONVERSATION_COLUMNS}"
                ),
                params![
                    info.chat_id.0,
                    info.kind.to_string(),
                    info.access_hash,
                    info.title,
                    info.username,
                    info.member_count,
                    now,
                ],
                |row| conversation_from_row(row, 0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Persist a resolved access credential.
pub async fn set_access_hash(
    db: &Database,
    conversation_id: i64,
    access_hash: i64,
) -> Result<(), ChorusError> {
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE conversations SET access_hash = ?1, updated_at = ?2 WHERE id = ?3",
                params![access_hash, Utc::now(), conversation_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
