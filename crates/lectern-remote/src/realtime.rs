// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Websocket change feed for the `students` and `attendance` tables.
//!
//! A background task owns the socket: it joins both table channels, sends
//! heartbeats, forwards decoded changes to the subscriber, and reconnects
//! after a fixed delay whenever the socket drops. The task stops when the
//! feed is unsubscribed or the subscriber's receiver is dropped.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use lectern_config::model::{RealtimeConfig, RemoteConfig};
use lectern_core::{ChangeEvent, ChangeFeed, LecternError, Table};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::protocol::{Frame, decode_change, heartbeat_frame, join_frame};

const CHANNEL_CAPACITY: usize = 256;

/// Why a connected session ended.
enum SessionEnd {
    Cancelled,
    SubscriberGone,
    Disconnected,
}

/// Connection settings for [`RealtimeFeed`].
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub socket_url: String,
    pub heartbeat: Duration,
    pub reconnect_delay: Duration,
}

impl FeedSettings {
    /// Derive the socket URL from the row API base URL.
    pub fn from_config(
        remote: &RemoteConfig,
        realtime: &RealtimeConfig,
    ) -> Result<Option<Self>, LecternError> {
        let Some(url) = remote.url.as_deref() else {
            return Ok(None);
        };
        let key = SecretString::from(remote.api_key.clone().unwrap_or_default());
        Ok(Some(Self {
            socket_url: socket_url(url, &key)?,
            heartbeat: Duration::from_secs(realtime.heartbeat_secs),
            reconnect_delay: Duration::from_secs(realtime.reconnect_delay_secs),
        }))
    }
}

/// `https://host` becomes `wss://host/realtime/v1/websocket?apikey=..&vsn=1.0.0`.
pub fn socket_url(base_url: &str, api_key: &SecretString) -> Result<String, LecternError> {
    let base = base_url.trim_end_matches('/');
    let ws = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(LecternError::Config(format!(
            "remote url `{base_url}` must start with http:// or https://"
        )));
    };
    Ok(format!(
        "{ws}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
        api_key.expose_secret()
    ))
}

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Push-based change feed over a Phoenix websocket.
pub struct RealtimeFeed {
    settings: FeedSettings,
    running: Mutex<Option<Running>>,
}

impl RealtimeFeed {
    pub fn new(settings: FeedSettings) -> Self {
        Self {
            settings,
            running: Mutex::new(None),
        }
    }

    fn take_running(&self) -> Result<Option<Running>, LecternError> {
        self.running
            .lock()
            .map(|mut guard| guard.take())
            .map_err(|_| LecternError::Internal("realtime feed lock poisoned".into()))
    }
}

#[async_trait]
impl ChangeFeed for RealtimeFeed {
    async fn subscribe(&self) -> Result<mpsc::Receiver<ChangeEvent>, LecternError> {
        if let Some(previous) = self.take_running()? {
            previous.cancel.cancel();
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(self.settings.clone(), tx, cancel.clone()));

        let mut guard = self
            .running
            .lock()
            .map_err(|_| LecternError::Internal("realtime feed lock poisoned".into()))?;
        *guard = Some(Running { cancel, task });
        Ok(rx)
    }

    async fn unsubscribe(&self) -> Result<(), LecternError> {
        if let Some(running) = self.take_running()? {
            running.cancel.cancel();
            if let Err(e) = running.task.await {
                warn!(error = %e, "realtime task ended abnormally");
            }
            info!("realtime feed stopped");
        }
        Ok(())
    }
}

async fn run(settings: FeedSettings, tx: mpsc::Sender<ChangeEvent>, cancel: CancellationToken) {
    loop {
        match session(&settings, &tx, &cancel).await {
            Ok(SessionEnd::Cancelled) | Ok(SessionEnd::SubscriberGone) => return,
            Ok(SessionEnd::Disconnected) => {
                info!(delay = ?settings.reconnect_delay, "realtime socket closed, reconnecting");
            }
            Err(e) => {
                warn!(error = %e, delay = ?settings.reconnect_delay, "realtime connection failed");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(settings.reconnect_delay) => {}
        }
    }
}

async fn session(
    settings: &FeedSettings,
    tx: &mpsc::Sender<ChangeEvent>,
    cancel: &CancellationToken,
) -> Result<SessionEnd, LecternError> {
    let (socket, _) = tokio::select! {
        _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
        connected = tokio_tungstenite::connect_async(settings.socket_url.as_str()) => {
            connected.map_err(|e| LecternError::remote("realtime connect failed", e))?
        }
    };
    let (mut sink, mut stream) = socket.split();

    let mut reference: u64 = 0;
    for table in [Table::Students, Table::Attendance] {
        reference += 1;
        send_frame(&mut sink, &join_frame(table, reference)).await?;
    }
    info!("realtime feed joined");

    let mut heartbeat = tokio::time::interval(settings.heartbeat);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return Ok(SessionEnd::Cancelled);
            }
            _ = heartbeat.tick() => {
                reference += 1;
                send_frame(&mut sink, &heartbeat_frame(reference)).await?;
            }
            message = stream.next() => {
                let text = match message {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Ping(data))) => {
                        sink.send(Message::Pong(data))
                            .await
                            .map_err(|e| LecternError::remote("realtime pong failed", e))?;
                        continue;
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Disconnected),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(LecternError::remote("realtime read failed", e)),
                };
                match decode_change(text.as_str()) {
                    Ok(Some(event)) => {
                        debug!(
                            table = %event.table(),
                            kind = event.kind(),
                            id = event.entity_id(),
                            "change received"
                        );
                        if tx.send(event).await.is_err() {
                            return Ok(SessionEnd::SubscriberGone);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "ignoring undecodable realtime frame"),
                }
            }
        }
    }
}

async fn send_frame<S>(sink: &mut S, frame: &Frame) -> Result<(), LecternError>
where
    S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text =
        serde_json::to_string(frame).map_err(|e| LecternError::remote("encode frame", e))?;
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|e| LecternError::remote("realtime send failed", e))
}
