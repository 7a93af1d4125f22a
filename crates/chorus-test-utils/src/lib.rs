// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Chorus integration tests.
//!
//! Provides in-memory collaborators for fast, deterministic tests without a
//! database, a transport sidecar, or a generation API.
//!
//! # Components
//!
//! - [`MemoryStore`] - `AdminStore` backed by plain collections
//! - [`MockConnector`] / [`MockConnection`] - scripted transport with captured sends
//! - [`MockGenerator`] - generation collaborator with queued replies
//! - [`fixtures`] - accounts, conversations and a fast-retry configuration

pub mod fixtures;
pub mod memory_store;
pub mod mock_generator;
pub mod mock_transport;

pub use memory_store::MemoryStore;
pub use mock_generator::MockGenerator;
pub use mock_transport::{MockConnection, MockConnector, SentText};
