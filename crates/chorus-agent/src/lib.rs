// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session orchestration for the Chorus engine.
//!
//! Each managed account runs an [`AccountSession`]: inbound messages are
//! buffered per conversation by a push sink and a history poller, a decision
//! loop drains the buffer, applies the reply gates, generates a reply and
//! dispatches it. [`SessionManager`] keeps at most one session per account and
//! exposes them through the [`SessionRegistry`] capability.

pub mod activity_log;
pub mod buffer;
pub mod decision;
pub mod dispatch;
pub mod handshake;
pub mod ingest;
pub mod knobs;
pub mod manager;
pub mod rendezvous;
pub mod retry;
pub mod session;
pub mod shutdown;
pub mod sync;

pub use buffer::MessageBuffer;
pub use handshake::{AuthHandshake, HandshakePhase};
pub use manager::{SessionManager, SessionRegistry, SessionSnapshot};
pub use retry::RetryPolicy;
pub use session::{AccountSession, SessionDeps, SessionSettings, TickReport};
pub use shutdown::install_signal_handler;
