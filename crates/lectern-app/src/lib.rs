// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Application layer for the Lectern attendance tracker.
//!
//! [`Tracker`] is the composition root: it owns the storage manager, the
//! sync orchestrator, the realtime ingestor and the scheduler, and exposes
//! the operations a UI needs (lists, scans with cooldown, registration,
//! status). Host capabilities arrive through [`Facilities`].

pub mod cooldown;
pub mod facilities;
pub mod requests;
pub mod shutdown;
pub mod status;
pub mod tracker;

pub use cooldown::CooldownPolicy;
pub use facilities::Facilities;
pub use requests::{NewAttendance, NewStudent};
pub use shutdown::{drain_scheduler, install_signal_handler};
pub use status::TrackerStatus;
pub use tracker::Tracker;
