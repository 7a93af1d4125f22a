// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account queries.

use chorus_core::{AccountConfig, AccountId, AccountStatus, ChorusError};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};

use super::{opt_signed, opt_unsigned, parse_text};
use crate::database::{Database, map_tr_err};

const ACCOUNT_COLUMNS: &str = "id, phone_number, api_id, api_hash, nickname, status, priority, \
     enabled, generation_api_key, generation_model, system_prompt, auto_reply, \
     reply_probability, reply_interval_secs, decision_interval_secs, poll_interval_secs, \
     buffer_size, split_by_newline, multi_message_interval_secs";

fn account_from_row(row: &Row<'_>) -> Result<AccountConfig, rusqlite::Error> {
    Ok(AccountConfig {
        id: AccountId(row.get(0)?),
        phone_number: row.get(1)?,
        api_id: row.get(2)?,
        api_hash: row.get(3)?,
        nickname: row.get(4)?,
        status: parse_text(row, 5)?,
        priority: row.get(6)?,
        enabled: row.get(7)?,
        generation_api_key: row.get(8)?,
        generation_model: row.get(9)?,
        system_prompt: row.get(10)?,
        auto_reply: row.get(11)?,
        reply_probability: opt_unsigned(row, 12)?,
        reply_interval_secs: opt_unsigned(row, 13)?,
        decision_interval_secs: opt_unsigned(row, 14)?,
        poll_interval_secs: opt_unsigned(row, 15)?,
        buffer_size: opt_unsigned(row, 16)?,
        split_by_newline: row.get(17)?,
        multi_message_interval_secs: opt_unsigned(row, 18)?,
    })
}

/// Insert a new account, ignoring `account.id`, and return the assigned id.
pub async fn insert_account(
    db: &Database,
    account: &AccountConfig,
) -> Result<AccountId, ChorusError> {
    let a = account.clone();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO accounts (phone_number, api_id, api_hash, nickname, status, priority,
                     enabled, generation_api_key, generation_model, system_prompt, auto_reply,
                     reply_probability, reply_interval_secs, decision_interval_secs,
                     poll_interval_secs, buffer_size, split_by_newline, multi_message_interval_secs)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                params![
                    a.phone_number,
                    a.api_id,
                    a.api_hash,
                    a.nickname,
                    a.status.to_string(),
                    a.priority,
                    a.enabled,
                    a.generation_api_key,
                    a.generation_model,
                    a.system_prompt,
                    a.auto_reply,
                    a.reply_probability,
                    opt_signed(a.reply_interval_secs),
                    opt_signed(a.decision_interval_secs),
                    opt_signed(a.poll_interval_secs),
                    opt_signed(a.buffer_size),
                    a.split_by_newline,
                    opt_signed(a.multi_message_interval_secs),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map(AccountId)
        .map_err(map_tr_err)
}

/// Get an account by id.
pub async fn get_account(
    db: &Database,
    id: AccountId,
) -> Result<Option<AccountConfig>, ChorusError> {
    db.connection()
        .call(move |conn| -> Result<Option<AccountConfig>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
                params![id.0],
                account_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// List enabled accounts in priority order (highest first).
pub async fn list_enabled_accounts(db: &Database) -> Result<Vec<AccountConfig>, ChorusError> {
    db.connection()
        .call(|conn| -> Result<Vec<AccountConfig>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE enabled = 1
                 ORDER BY priority DESC, id ASC"
            ))?;
            let rows = stmt.query_map([], account_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Persist the runtime status of an account.
pub async fn set_status(
    db: &Database,
    id: AccountId,
    status: AccountStatus,
) -> Result<(), ChorusError> {
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE accounts SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.to_string(), Utc::now(), id.0],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Persist the display name reported by the transport.
pub async fn set_nickname(db: &Database, id: AccountId, nickname: &str) -> Result<(), ChorusError> {
    let nickname = nickname.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE accounts SET nickname = ?1, updated_at = ?2 WHERE id = ?3",
                params![nickname, Utc::now(), id.0],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
