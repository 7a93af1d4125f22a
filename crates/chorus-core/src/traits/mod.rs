// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions for the session engine.
//!
//! All collaborators use `#[async_trait]` for dynamic dispatch and are held
//! as `Arc<dyn Trait>` by the sessions that use them.

pub mod generator;
pub mod store;
pub mod transport;

pub use generator::{GenerationRequest, Generator};
pub use store::AdminStore;
pub use transport::{AuthCallbacks, Connection, Connector, InboundSink};
