// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table.

pub mod accounts;
pub mod assignments;
pub mod conversations;
pub mod handshakes;
pub mod sent_messages;

use std::str::FromStr;

use rusqlite::Row;
use rusqlite::types::Type;

/// Read a TEXT column and parse it with `FromStr`.
pub(crate) fn parse_text<T>(row: &Row<'_>, idx: usize) -> Result<T, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a nullable INTEGER column holding a non-negative count.
pub(crate) fn opt_unsigned<T: TryFrom<i64>>(
    row: &Row<'_>,
    idx: usize,
) -> Result<Option<T>, rusqlite::Error> {
    let raw: Option<i64> = row.get(idx)?;
    Ok(raw.and_then(|v| T::try_from(v).ok()))
}

/// Widen an optional unsigned knob for storage.
pub(crate) fn opt_signed<T: TryInto<i64>>(value: Option<T>) -> Option<i64> {
    value.and_then(|v| v.try_into().ok())
}
