// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence driver implementations, in default preference order.

pub mod embedded;
pub mod flat;
pub mod sqlite;
