// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Online/offline tracking.
//!
//! Some hosts deliver a platform event when the network returns and some
//! never do, so both paths feed the same state: [`ConnectivityMonitor::report`]
//! for platform events and [`ConnectivityMonitor::probe`] for polling. Either
//! way the new state is published on a `watch` channel, which the scheduler
//! observes to start a reconnect cycle.

use std::sync::Arc;

use lectern_core::RemoteBackend;
use tokio::sync::watch;
use tracing::{debug, info};

/// A change (or not) in the observed connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentOnline,
    WentOffline,
    Unchanged,
}

pub struct ConnectivityMonitor {
    remote: Option<Arc<dyn RemoteBackend>>,
    state: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Starts offline. Without a remote backend it stays offline.
    pub fn new(remote: Option<Arc<dyn RemoteBackend>>) -> Self {
        let (state, _) = watch::channel(false);
        Self { remote, state }
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Record an observation from the host platform or a failed request.
    pub fn report(&self, online: bool) -> Transition {
        let online = online && self.remote.is_some();
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        match (changed, online) {
            (false, _) => Transition::Unchanged,
            (true, true) => {
                info!("connectivity restored");
                Transition::WentOnline
            }
            (true, false) => {
                info!("connectivity lost");
                Transition::WentOffline
            }
        }
    }

    /// Ping the backend and record the result. Returns whether it answered.
    pub async fn probe(&self) -> bool {
        let Some(remote) = &self.remote else {
            return false;
        };
        let online = match remote.ping().await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "connectivity probe failed");
                false
            }
        };
        self.report(online);
        online
    }
}

#[cfg(test)]
mod tests {
    use lectern_test_utils::MockRemote;
    use tracing_test::traced_test;

    use super::*;

    #[tokio::test]
    async fn probe_publishes_transitions() {
        let remote = Arc::new(MockRemote::new());
        let monitor = ConnectivityMonitor::new(Some(remote.clone() as Arc<dyn RemoteBackend>));
        let mut rx = monitor.subscribe();
        assert!(!monitor.is_online());

        assert!(monitor.probe().await);
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());

        remote.set_offline(true);
        assert!(!monitor.probe().await);
        assert!(!*rx.borrow_and_update());
    }

    #[test]
    fn report_only_signals_real_changes() {
        let remote: Arc<dyn RemoteBackend> = Arc::new(MockRemote::new());
        let monitor = ConnectivityMonitor::new(Some(remote));
        assert_eq!(monitor.report(false), Transition::Unchanged);
        assert_eq!(monitor.report(true), Transition::WentOnline);
        assert_eq!(monitor.report(true), Transition::Unchanged);
        assert_eq!(monitor.report(false), Transition::WentOffline);
    }

    #[tokio::test]
    async fn without_remote_stays_offline() {
        let monitor = ConnectivityMonitor::new(None);
        assert_eq!(monitor.report(true), Transition::Unchanged);
        assert!(!monitor.probe().await);
        assert!(!monitor.is_online());
    }

    #[traced_test]
    #[test]
    fn transitions_are_logged() {
        let remote: Arc<dyn RemoteBackend> = Arc::new(MockRemote::new());
        let monitor = ConnectivityMonitor::new(Some(remote));
        monitor.report(true);
        assert!(logs_contain("connectivity restored"));
        monitor.report(false);
        assert!(logs_contain("connectivity lost"));
    }
}
