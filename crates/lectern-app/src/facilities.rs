// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host-provided collaborators.
//!
//! Everything the tracker needs from its environment is injected here: the
//! remote backend and change feed, the clock, and the storage facilities the
//! embedded and flat drivers sit on. Desktop and headless hosts build these
//! from configuration; browser hosts and tests inject their own.

use std::sync::Arc;

use lectern_config::model::LecternConfig;
use lectern_core::{ChangeFeed, Clock, LecternError, RemoteBackend, StorageDriver, SystemClock};
use lectern_remote::{FeedSettings, RealtimeFeed, RestClient};
use lectern_storage::{BlobStore, ObjectStore};
use lectern_sync::RefreshCallback;
use tracing::info;

pub struct Facilities {
    pub remote: Option<Arc<dyn RemoteBackend>>,
    pub feed: Option<Arc<dyn ChangeFeed>>,
    pub clock: Arc<dyn Clock>,
    /// Backing store for the embedded driver. Absent means the host has none
    /// unless `storage.embedded_enabled` asks for the in-process store.
    pub object_store: Option<Arc<dyn ObjectStore>>,
    /// Backing store for the flat driver. Absent means the blob directory
    /// from `storage.flat_path`.
    pub blob_store: Option<Arc<dyn BlobStore>>,
    /// Replaces the configured driver list entirely.
    pub drivers: Option<Vec<Arc<dyn StorageDriver>>>,
    pub on_refresh: Option<RefreshCallback>,
}

impl Default for Facilities {
    fn default() -> Self {
        Self {
            remote: None,
            feed: None,
            clock: Arc::new(SystemClock),
            object_store: None,
            blob_store: None,
            drivers: None,
            on_refresh: None,
        }
    }
}

impl Facilities {
    /// Remote client and realtime feed from `[remote]` and `[realtime]`.
    pub fn from_config(config: &LecternConfig) -> Result<Self, LecternError> {
        let mut facilities = Self::default();
        match RestClient::from_config(&config.remote)? {
            Some(client) => facilities.remote = Some(Arc::new(client)),
            None => info!("no remote url configured, running offline"),
        }
        if config.realtime.enabled
            && let Some(settings) = FeedSettings::from_config(&config.remote, &config.realtime)?
        {
            facilities.feed = Some(Arc::new(RealtimeFeed::new(settings)));
        }
        Ok(facilities)
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteBackend>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_feed(mut self, feed: Arc<dyn ChangeFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(store);
        self
    }

    pub fn with_blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    pub fn with_drivers(mut self, drivers: Vec<Arc<dyn StorageDriver>>) -> Self {
        self.drivers = Some(drivers);
        self
    }

    pub fn with_refresh(mut self, callback: RefreshCallback) -> Self {
        self.on_refresh = Some(callback);
        self
    }
}
