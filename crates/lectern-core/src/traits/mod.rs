// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the sync engine and its collaborators.
//!
//! Every trait uses `#[async_trait]` so implementations can be held as
//! `Arc<dyn Trait>` and swapped for mocks in tests.

pub mod clock;
pub mod driver;
pub mod feed;
pub mod remote;

pub use clock::{Clock, SystemClock};
pub use driver::StorageDriver;
pub use feed::ChangeFeed;
pub use remote::{AttendanceProbe, RemoteBackend};
