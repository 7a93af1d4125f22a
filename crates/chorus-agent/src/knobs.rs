// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Effective per-account behaviour: account overrides over configured defaults.

use std::time::Duration;

use chorus_config::SessionConfig;
use chorus_core::AccountConfig;

/// Behaviour knobs resolved for one account at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionKnobs {
    pub decision_interval: Duration,
    pub poll_interval: Duration,
    pub buffer_size: usize,
    pub reply_interval: Duration,
    pub multi_message_interval: Duration,
    pub split_by_newline: bool,
}

impl SessionKnobs {
    /// Unset or zero intervals and sizes fall back to `defaults`; an explicit
    /// reply interval of zero disables pacing.
    pub fn resolve(account: &AccountConfig, defaults: &SessionConfig) -> Self {
        let positive = |value: Option<u64>, default: u64| match value {
            Some(v) if v > 0 => v,
            _ => default,
        };

        Self {
            decision_interval: Duration::from_secs(positive(
                account.decision_interval_secs,
                defaults.decision_interval_secs,
            )),
            poll_interval: Duration::from_secs(positive(
                account.poll_interval_secs,
                defaults.poll_interval_secs,
            )),
            buffer_size: match account.buffer_size {
                Some(size) if size > 0 => size,
                _ => defaults.buffer_size,
            },
            reply_interval: Duration::from_secs(
                account
                    .reply_interval_secs
                    .unwrap_or(defaults.reply_interval_secs),
            ),
            multi_message_interval: Duration::from_secs(positive(
                account.multi_message_interval_secs,
                defaults.multi_message_interval_secs,
            )),
            split_by_newline: account.split_by_newline,
        }
    }
}
