// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Chorus session engine.
//!
//! This crate provides the error type, the domain types, and the collaborator
//! traits (transport, generation, administrative store) that the rest of the
//! workspace is written against.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ChorusError;
pub use types::{
    AccountConfig, AccountId, AccountStatus, BufferedMessage, ChatId, ChatRole, ChatTurn,
    CodeChallenge, Conversation, ConversationAssignment, ConversationInfo, ConversationKind,
    HandshakeSession, HandshakeState, HistoryMessage, InboundEvent, MessageId, Peer, PeerAddress,
    SelfIdentity, SentMessageRecord,
};

pub use traits::{
    AdminStore, AuthCallbacks, Connection, Connector, GenerationRequest, Generator, InboundSink,
};
