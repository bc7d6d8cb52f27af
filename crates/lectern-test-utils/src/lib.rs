// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Lectern integration tests.
//!
//! Provides mock collaborators for fast, deterministic, CI-runnable tests
//! without a filesystem, a network, or a wall clock.
//!
//! # Components
//!
//! - [`MockDriver`] - In-memory storage driver with scriptable failures
//! - [`MockRemote`] - In-memory remote backend with a call log and offline switch
//! - [`MockFeed`] - Change feed whose events are injected by the test
//! - [`ManualClock`] - Clock that only moves when told to
//! - [`fixtures`] - Builders for students and attendance entries

pub mod clock;
pub mod fixtures;
pub mod mock_driver;
pub mod mock_feed;
pub mod mock_remote;

pub use clock::ManualClock;
pub use mock_driver::MockDriver;
pub use mock_feed::MockFeed;
pub use mock_remote::{MockRemote, RemoteCall};
