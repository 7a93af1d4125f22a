// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ready-made test data.

use chorus_config::ChorusConfig;
use chorus_core::{AccountConfig, AccountId, ChatId, ConversationInfo, ConversationKind};

/// An enabled, auto-replying account that always passes the probability gate.
pub fn account(phone_number: &str) -> AccountConfig {
    let mut account = AccountConfig::new(AccountId(0), phone_number);
    account.generation_api_key = "sk-test".into();
    account.generation_model = "gpt-4o-mini".into();
    account.system_prompt = "You are a friendly group member.".into();
    account.reply_probability = Some(100);
    account.split_by_newline = false;
    account
}

pub fn supergroup(chat_id: i64, access_hash: Option<i64>) -> ConversationInfo {
    ConversationInfo {
        chat_id: ChatId(chat_id),
        kind: ConversationKind::Supergroup,
        access_hash,
        title: format!("supergroup {chat_id}"),
        username: None,
        member_count: 42,
    }
}

pub fn group(chat_id: i64) -> ConversationInfo {
    ConversationInfo {
        chat_id: ChatId(chat_id),
        kind: ConversationKind::Group,
        access_hash: None,
        title: format!("group {chat_id}"),
        username: None,
        member_count: 7,
    }
}

/// Defaults with millisecond retry delays and short handshake timeouts.
pub fn config() -> ChorusConfig {
    let mut config = ChorusConfig::default();
    config.retry.initial_delay_ms = 10;
    config.retry.max_delay_ms = 40;
    config.handshake.input_timeout_secs = 300;
    config.handshake.submit_timeout_secs = 5;
    config.session.stimulus_preamble = String::new();
    config.session.shutdown_timeout_secs = 2;
    config
}
