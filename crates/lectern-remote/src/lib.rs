// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote backend integration for Lectern.
//!
//! [`RestClient`] implements [`lectern_core::RemoteBackend`] over the HTTPS
//! row API; [`RealtimeFeed`] implements [`lectern_core::ChangeFeed`] over the
//! realtime websocket. Wire rows are explicit DTOs with field-by-field
//! mapping to the domain types.

pub mod client;
pub mod mapping;
pub mod protocol;
pub mod realtime;
pub mod types;

pub use client::RestClient;
pub use realtime::{FeedSettings, RealtimeFeed};
