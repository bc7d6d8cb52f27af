// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change feed whose events are injected by the test.

use std::sync::Mutex;

use async_trait::async_trait;
use lectern_core::{ChangeEvent, ChangeFeed, LecternError};
use tokio::sync::mpsc;

#[derive(Default)]
pub struct MockFeed {
    sender: Mutex<Option<mpsc::Sender<ChangeEvent>>>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to the current subscriber. Returns false if nobody
    /// is subscribed.
    pub async fn emit(&self, event: ChangeEvent) -> bool {
        let sender = self.sender.lock().unwrap().clone();
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.sender.lock().unwrap().is_some()
    }
}

#[async_trait]
impl ChangeFeed for MockFeed {
    async fn subscribe(&self) -> Result<mpsc::Receiver<ChangeEvent>, LecternError> {
        let (tx, rx) = mpsc::channel(64);
        *self.sender.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn unsubscribe(&self) -> Result<(), LecternError> {
        self.sender.lock().unwrap().take();
        Ok(())
    }
}
