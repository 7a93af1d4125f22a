// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account-to-conversation assignment queries.

use chorus_core::{AccountId, ChorusError, Conversation, ConversationAssignment};
use rusqlite::{OptionalExtension, Row, params};

use super::conversations::conversation_from_row;
use crate::database::{Database, map_tr_err};

fn assignment_from_row(row: &Row<'_>) -> Result<ConversationAssignment, rusqlite::Error> {
    Ok(ConversationAssignment {
        account_id: AccountId(row.get(0)?),
        conversation_id: row.get(1)?,
        enabled: row.get(2)?,
        reply_probability: row.get(3)?,
        priority: row.get(4)?,
    })
}

/// Create or replace an assignment.
pub async fn assign(db: &Database, assignment: &ConversationAssignment) -> Result<(), ChorusError> {
    let a = assignment.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO account_conversations
                     (account_id, conversation_id, enabled, reply_probability, priority)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(account_id, conversation_id) DO UPDATE SET
                     enabled = excluded.enabled,
                     reply_probability = excluded.reply_probability,
                     priority = excluded.priority",
                params![
                    a.account_id.0,
                    a.conversation_id,
                    a.enabled,
                    a.reply_probability,
                    a.priority
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get the assignment of one conversation to one account.
pub async fn get_assignment(
    db: &Database,
    account_id: AccountId,
    conversation_id: i64,
) -> Result<Option<ConversationAssignment>, ChorusError> {
    db.connection()
        .call(
            move |conn| -> Result<Option<ConversationAssignment>, rusqlite::Error> {
                conn.query_row(
                    "SELECT account_id, conversation_id, enabled, reply_probability, priority
                     FROM account_conversations
                     WHERE account_id = ?1 AND conversation_id = ?2",
                    params![account_id.0, conversation_id],
                    assignment_from_row,
                )
                .optional()
            },
        )
        .await
        .map_err(map_tr_err)
}

/// Enabled assignments of an account joined with their conversations.
pub async fn list_assigned_conversations(
    db: &Database,
    account_id: AccountId,
) -> Result<Vec<(ConversationAssignment, Conversation)>, ChorusError> {
    db.connection()
        .call(
            move |conn| -> Result<Vec<(ConversationAssignment, Conversation)>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT ac.account_id, ac.conversation_id, ac.enabled, ac.reply_probability,
                            ac.priority, c.id, c.chat_id, c.kind, c.access_hash, c.title,
                            c.username, c.member_count
                     FROM account_conversations ac
                     JOIN conversations c ON c.id = ac.conversation_id
                     WHERE ac.account_id = ?1 AND ac.enabled = 1
                     ORDER BY ac.priority DESC, c.id ASC",
                )?;
                let rows = stmt.query_map(params![account_id.0], |row| {
                    Ok((assignment_from_row(row)?, conversation_from_row(row, 5)?))
                })?;
                rows.collect()
            },
        )
        .await
        .map_err(map_tr_err)
}
