// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handshake session queries.

use chorus_core::{AccountId, ChorusError, HandshakeSession, HandshakeState};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use super::parse_text;
use crate::database::{Database, map_tr_err};

fn handshake_from_row(row: &Row<'_>) -> Result<HandshakeSession, rusqlite::Error> {
    Ok(HandshakeSession {
        id: row.get(0)?,
        account_id: AccountId(row.get(1)?),
        phone_number: row.get(2)?,
        state: parse_text(row, 3)?,
        expires_at: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Delete every handshake of the account and insert a fresh one, atomically.
pub async fn replace(
    db: &Database,
    account_id: AccountId,
    phone_number: &str,
    state: HandshakeState,
    expires_at: DateTime<Utc>,
) -> Result<HandshakeSession, ChorusError> {
    let phone_number = phone_number.to_string();
    db.connection()
        .call(move |conn| -> Result<HandshakeSession, rusqlite::Error> {
            let now = Utc::now();
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM handshake_sessions WHERE account_id = ?1",
                params![account_id.0],
            )?;
            tx.execute(
                "INSERT INTO handshake_sessions
                     (account_id, phone_number, state, expires_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![account_id.0, phone_number, state.to_string(), expires_at, now],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(HandshakeSession {
                id,
                account_id,
                phone_number,
                state,
                expires_at,
                created_at: now,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Move a handshake to a new state with a new expiry.
pub async fn update(
    db: &Database,
    id: i64,
    state: HandshakeState,
    expires_at: DateTime<Utc>,
) -> Result<(), ChorusError> {
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE handshake_sessions SET state = ?1, expires_at = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![state.to_string(), expires_at, Utc::now(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The most recent handshake of an account.
pub async fn latest(
    db: &Database,
    account_id: AccountId,
) -> Result<Option<HandshakeSession>, ChorusError> {
    db.connection()
        .call(move |conn| -> Result<Option<HandshakeSession>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, account_id, phone_number, state, expires_at, created_at
                 FROM handshake_sessions WHERE account_id = ?1
                 ORDER BY id DESC LIMIT 1",
                params![account_id.0],
                handshake_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_for_account(
    db: &Database,
    account_id: AccountId,
) -> Result<Vec<HandshakeSession>, ChorusError> {
    db.connection()
        .call(move |conn| -> Result<Vec<HandshakeSession>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, account_id, phone_number, state, expires_at, created_at
                 FROM handshake_sessions WHERE account_id = ?1
                 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![account_id.0], handshake_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
