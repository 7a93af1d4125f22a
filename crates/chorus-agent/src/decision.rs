// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply eligibility gates, stimulus composition, and generation history.
//!
//! Everything here is pure so the gates can be checked against a fixed clock
//! and a fixed probability draw.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use chorus_core::{AccountConfig, BufferedMessage, ChatTurn, ConversationAssignment};
use chrono::{DateTime, Utc};

/// Why a conversation was not answered this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No assignment links the account to the conversation.
    NotAssigned,
    AssignmentDisabled,
    AutoReplyDisabled,
    /// The previous reply is more recent than the reply interval.
    TooSoon { remaining: Duration },
    /// The probability draw was not below the threshold.
    ProbabilityMiss { roll: u32, threshold: u32 },
    /// Generation returned nothing to send.
    EmptyReply,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotAssigned => write!(f, "not assigned"),
            SkipReason::AssignmentDisabled => write!(f, "assignment disabled"),
            SkipReason::AutoReplyDisabled => write!(f, "auto-reply disabled"),
            SkipReason::TooSoon { remaining } => {
                write!(f, "reply interval not reached ({}s left)", remaining.as_secs())
            }
            SkipReason::ProbabilityMiss { roll, threshold } => {
                write!(f, "probability miss (rolled {roll}, needed < {threshold})")
            }
            SkipReason::EmptyReply => write!(f, "empty reply"),
        }
    }
}

/// Reply probability in percent: the assignment's when positive, else the account's.
pub fn effective_probability(
    assignment: &ConversationAssignment,
    account: &AccountConfig,
) -> u32 {
    if assignment.reply_probability > 0.0 {
        return (assignment.reply_probability * 100.0).round().clamp(0.0, 100.0) as u32;
    }
    account.reply_probability.map_or(100, |p| u32::from(p.min(100)))
}

/// Apply the eligibility gates in order, stopping at the first failure.
///
/// `roll` is a uniform draw in `0..100`.
pub fn check_gates(
    assignment: Option<&ConversationAssignment>,
    account: &AccountConfig,
    last_reply: Option<DateTime<Utc>>,
    reply_interval: Duration,
    now: DateTime<Utc>,
    roll: u32,
) -> Result<(), SkipReason> {
    let assignment = assignment.ok_or(SkipReason::NotAssigned)?;
    if !assignment.enabled {
        return Err(SkipReason::AssignmentDisabled);
    }

    if !account.auto_reply {
        return Err(SkipReason::AutoReplyDisabled);
    }

    if let Some(last) = last_reply {
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        if elapsed < reply_interval {
            return Err(SkipReason::TooSoon {
                remaining: reply_interval - elapsed,
            });
        }
    }

    let threshold = effective_probability(assignment, account);
    if roll >= threshold {
        return Err(SkipReason::ProbabilityMiss { roll, threshold });
    }

    Ok(())
}

/// Join buffered texts, in arrival order, with `delimiter`.
pub fn compose_stimulus(messages: &[BufferedMessage], delimiter: &str) -> String {
    messages
        .iter()
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join(delimiter)
}

/// Bounded generation history of one conversation.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<ChatTurn>,
    max_turns: usize,
}

impl ConversationHistory {
    /// History keeping `pairs` user/assistant exchanges.
    pub fn new(pairs: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_turns: pairs * 2,
        }
    }

    /// Record one answered stimulus, dropping the oldest turns beyond the bound.
    pub fn push_exchange(&mut self, stimulus: &str, reply: &str) {
        self.turns.push_back(ChatTurn::user(stimulus));
        self.turns.push_back(ChatTurn::assistant(reply));
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    pub fn snapshot(&self) -> Vec<ChatTurn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chorus_core::{AccountId, ChatRole};

    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    fn assignment(probability: f64) -> ConversationAssignment {
        ConversationAssignment {
            account_id: AccountId(1),
            conversation_id: 10,
            enabled: true,
            reply_probability: probability,
            priority: 5,
        }
    }

    fn account() -> AccountConfig {
        AccountConfig::new(AccountId(1), "+1")
    }

    #[test]
    fn missing_assignment_is_never_selected() {
        let now = Utc::now();
        for roll in 0..100 {
            assert_eq!(
                check_gates(None, &account(), None, MINUTE, now, roll),
                Err(SkipReason::NotAssigned)
            );
        }
    }

    #[test]
    fn disabled_assignment_and_auto_reply_are_gated() {
        let now = Utc::now();
        let mut muted = assignment(1.0);
        muted.enabled = false;
        assert_eq!(
            check_gates(Some(&muted), &account(), None, MINUTE, now, 0),
            Err(SkipReason::AssignmentDisabled)
        );

        let mut quiet = account();
        quiet.auto_reply = false;
        assert_eq!(
            check_gates(Some(&assignment(1.0)), &quiet, None, MINUTE, now, 0),
            Err(SkipReason::AutoReplyDisabled)
        );
    }

    #[test]
    fn reply_interval_boundary() {
        let now = Utc::now();
        let a = assignment(1.0);

        let just_short = now - chrono::Duration::seconds(59);
        assert!(matches!(
            check_gates(Some(&a), &account(), Some(just_short), MINUTE, now, 0),
            Err(SkipReason::TooSoon { .. })
        ));

        let exactly = now - chrono::Duration::seconds(60);
        assert_eq!(
            check_gates(Some(&a), &account(), Some(exactly), MINUTE, now, 0),
            Ok(())
        );
    }

    #[test]
    fn assignment_probability_takes_precedence() {
        let mut acct = account();
        acct.reply_probability = Some(100);
        assert_eq!(effective_probability(&assignment(0.3), &acct), 30);
        assert_eq!(effective_probability(&assignment(0.29), &acct), 29);
        assert_eq!(effective_probability(&assignment(0.57), &acct), 57);

        let now = Utc::now();
        assert_eq!(
            check_gates(Some(&assignment(0.3)), &acct, None, MINUTE, now, 29),
            Ok(())
        );
        assert_eq!(
            check_gates(Some(&assignment(0.3)), &acct, None, MINUTE, now, 30),
            Err(SkipReason::ProbabilityMiss {
                roll: 30,
                threshold: 30
            })
        );
    }

    #[test]
    fn account_probability_applies_when_assignment_defers() {
        let mut acct = account();
        assert_eq!(effective_probability(&assignment(0.0), &acct), 100);

        acct.reply_probability = Some(0);
        assert_eq!(effective_probability(&assignment(0.0), &acct), 0);
        assert!(check_gates(Some(&assignment(0.0)), &acct, None, MINUTE, Utc::now(), 0).is_err());
    }

    #[test]
    fn stimulus_joins_in_arrival_order() {
        let now = Utc::now();
        let messages: Vec<BufferedMessage> = ["one", "two", "three"]
            .iter()
            .map(|t| BufferedMessage {
                text: t.to_string(),
                observed_at: now,
            })
            .collect();

        assert_eq!(
            compose_stimulus(&messages, "\n---\n"),
            "one\n---\ntwo\n---\nthree"
        );
    }

    #[test]
    fn history_keeps_last_pairs() {
        let mut history = ConversationHistory::new(5);
        for i in 0..7 {
            history.push_exchange(&format!("q{i}"), &format!("a{i}"));
        }

        let turns = history.snapshot();
        assert_eq!(turns.len(), 10);
        assert_eq!(turns[0].content, "q2");
        assert_eq!(turns[0].role, ChatRole::User);
        assert_eq!(turns[9].content, "a6");
        assert_eq!(turns[9].role, ChatRole::Assistant);
    }
}
