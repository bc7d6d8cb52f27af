// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One cooperative loop that owns every timer.
//!
//! Named timers (`sync-interval`, `connectivity-poll`, `realtime-flush`),
//! forced sync requests, connectivity changes and change-feed receipt are all
//! branches of a single `tokio::select!`, so at most one of them is being
//! handled at any moment and their ordering is visible in one place.

use std::sync::Arc;
use std::time::Duration;

use lectern_core::{ChangeEvent, ChangeFeed, LecternError};
use strum::Display;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connectivity::ConnectivityMonitor;
use crate::orchestrator::SyncOrchestrator;
use crate::realtime::RealtimeIngestor;
use crate::report::{SyncOutcome, SyncTrigger};

/// Timers driven by the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum TimerName {
    SyncInterval,
    ConnectivityPoll,
    RealtimeFlush,
}

type ForceRequest = oneshot::Sender<SyncOutcome>;

/// Cloneable handle for asking a running scheduler to sync now.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    force: mpsc::Sender<ForceRequest>,
}

impl SchedulerHandle {
    /// Queue a forced sync and wait for its outcome.
    pub async fn force_sync(&self) -> Result<SyncOutcome, LecternError> {
        let (reply, outcome) = oneshot::channel();
        self.force
            .send(reply)
            .await
            .map_err(|_| LecternError::Internal("scheduler is not running".into()))?;
        outcome
            .await
            .map_err(|_| LecternError::Internal("scheduler stopped before syncing".into()))
    }
}

pub struct Scheduler {
    jobs: Jobs,
    connectivity_poll: Duration,
    force: mpsc::Receiver<ForceRequest>,
}

/// What the loop branches act on.
struct Jobs {
    orchestrator: Arc<SyncOrchestrator>,
    connectivity: Arc<ConnectivityMonitor>,
    ingestor: Option<Arc<RealtimeIngestor>>,
    feed: Option<Arc<dyn ChangeFeed>>,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        connectivity: Arc<ConnectivityMonitor>,
        connectivity_poll: Duration,
    ) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::channel(8);
        let scheduler = Self {
            jobs: Jobs {
                orchestrator,
                connectivity,
                ingestor: None,
                feed: None,
            },
            connectivity_poll,
            force: rx,
        };
        (scheduler, SchedulerHandle { force: tx })
    }

    /// Fold realtime changes from `feed` through `ingestor`.
    pub fn with_realtime(
        mut self,
        feed: Arc<dyn ChangeFeed>,
        ingestor: Arc<RealtimeIngestor>,
    ) -> Self {
        self.jobs.feed = Some(feed);
        self.jobs.ingestor = Some(ingestor);
        self
    }

    /// Run until `cancel` fires, then flush pending realtime changes and
    /// unsubscribe from the feed.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), LecternError> {
        let Self {
            jobs,
            connectivity_poll,
            mut force,
        } = self;
        let interval = jobs.orchestrator.settings().interval;
        let mut sync_timer = tokio::time::interval_at(Instant::now() + interval, interval);
        sync_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut poll_timer = tokio::time::interval_at(
            Instant::now() + connectivity_poll,
            connectivity_poll,
        );
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut changes = match &jobs.feed {
            Some(feed) => match feed.subscribe().await {
                Ok(rx) => Some(rx),
                Err(e) => {
                    warn!(error = %e, "change feed unavailable, relying on polling");
                    None
                }
            },
            None => None,
        };

        jobs.connectivity.probe().await;
        let mut online = jobs.connectivity.subscribe();
        online.borrow_and_update();
        jobs.trigger(SyncTrigger::Startup).await;
        info!("scheduler running");

        loop {
            let flush_at = match &jobs.ingestor {
                Some(ingestor) => ingestor.next_deadline().await,
                None => None,
            };

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping scheduler");
                    break;
                }
                Some(reply) = force.recv() => {
                    let outcome = jobs.orchestrator.force_sync().await;
                    let _ = reply.send(outcome);
                }
                Ok(()) = online.changed() => {
                    if *online.borrow_and_update() {
                        jobs.trigger(SyncTrigger::Reconnect).await;
                    }
                }
                event = next_change(&mut changes), if changes.is_some() => {
                    match event {
                        Some(event) => jobs.ingest(event).await,
                        None => {
                            warn!("change feed closed");
                            changes = None;
                        }
                    }
                }
                _ = sleep_until(flush_at), if flush_at.is_some() => {
                    jobs.fire(TimerName::RealtimeFlush).await;
                }
                _ = sync_timer.tick() => {
                    jobs.fire(TimerName::SyncInterval).await;
                }
                _ = poll_timer.tick() => {
                    jobs.fire(TimerName::ConnectivityPoll).await;
                }
            }
        }

        if let Some(ingestor) = &jobs.ingestor
            && let Err(e) = ingestor.flush().await
        {
            warn!(error = %e, "final realtime flush failed");
        }
        if let Some(feed) = &jobs.feed
            && let Err(e) = feed.unsubscribe().await
        {
            warn!(error = %e, "change feed unsubscribe failed");
        }
        info!("scheduler stopped");
        Ok(())
    }
}

impl Jobs {
    async fn fire(&self, timer: TimerName) {
        debug!(timer = %timer, "timer fired");
        match timer {
            TimerName::SyncInterval => self.trigger(SyncTrigger::Interval).await,
            TimerName::ConnectivityPoll => {
                // A restored connection is picked up by the `online` branch.
                self.connectivity.probe().await;
            }
            TimerName::RealtimeFlush => {
                if let Some(ingestor) = &self.ingestor
                    && let Err(e) = ingestor.flush().await
                {
                    warn!(error = %e, "realtime flush failed");
                }
            }
        }
    }

    async fn trigger(&self, trigger: SyncTrigger) {
        if let SyncOutcome::Skipped { reason } = self.orchestrator.run_cycle(trigger).await {
            debug!(trigger = %trigger, reason = %reason, "sync skipped");
        }
    }

    async fn ingest(&self, event: ChangeEvent) {
        if let Some(ingestor) = &self.ingestor {
            ingestor.enqueue(event).await;
        }
    }
}

async fn next_change(rx: &mut Option<mpsc::Receiver<ChangeEvent>>) -> Option<ChangeEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
