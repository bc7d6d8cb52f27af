// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push-based change feed contract.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::change::ChangeEvent;
use crate::error::LecternError;

/// A subscription to row changes on the remote tables.
#[async_trait]
pub trait ChangeFeed: Send + Sync + 'static {
    /// Start receiving changes. The receiver closes when the feed shuts down.
    async fn subscribe(&self) -> Result<mpsc::Receiver<ChangeEvent>, LecternError>;

    /// Stop the feed and release the connection.
    async fn unsubscribe(&self) -> Result<(), LecternError>;
}
