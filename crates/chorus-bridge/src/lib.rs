// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sidecar transport bridge for Chorus.
//!
//! The messaging protocol itself runs in an external per-account process.
//! This crate spawns it, speaks JSON Lines over its stdio, and exposes it as
//! a [`chorus_core::Connection`].

pub mod connection;
pub mod connector;
pub mod protocol;

pub use connection::SidecarConnection;
pub use connector::BridgeConnector;
pub use protocol::{SidecarCommand, SidecarError, SidecarEvent};
