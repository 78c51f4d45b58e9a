//! Push channel
//!
//! A persistent duplex channel delivering task status frames plus a
//! heartbeat. Heartbeat and non-JSON frames are skipped, never errors.
//! Reconnection is bounded: linear backoff per attempt, and the channel
//! reports exhaustion by ending the frame stream.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::observability::metrics;
use crate::task::{KillChainPhase, LogLevel, TaskId, TaskStatus};

/// Heartbeat cadence while connected.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default reconnect budget.
pub const DEFAULT_MAX_RECONNECTS: u32 = 5;

/// Default base reconnect delay; the n-th attempt waits n times this.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Progress of the technique a frame reports on.
///
/// Distinct from the task lifecycle status: one task goes through many
/// technique steps, each of which starts, runs, and completes or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Starting,
    InProgress,
    Completed,
    Failed,
}

/// Log line embedded in a status frame.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameLog {
    /// Severity
    pub level: LogLevel,
    /// Origin label
    #[serde(default = "default_log_source")]
    pub source: String,
    /// Free text
    pub message: String,
}

fn default_log_source() -> String {
    "attack-agent".to_string()
}

/// One push-channel status frame.
///
/// Every field except the task id is optional; the orchestrator applies
/// whatever is present. Unknown JSON fields are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFrame {
    /// Task this frame belongs to
    pub task_id: TaskId,
    /// New lifecycle status, if the backend signals one
    #[serde(default)]
    pub status: Option<TaskStatus>,
    /// New kill-chain phase
    #[serde(default)]
    pub phase: Option<KillChainPhase>,
    /// New progress in [0, 100]
    #[serde(default)]
    pub progress: Option<u8>,
    /// Structured technique code (`port_scan`, `phishing_email`, ...)
    #[serde(default)]
    pub technique: Option<String>,
    /// Progress of the technique step this frame reports on
    #[serde(default)]
    pub step: Option<StepStatus>,
    /// Explicit source device reference
    #[serde(default)]
    pub source_device: Option<String>,
    /// Explicit target device reference
    #[serde(default)]
    pub target_device: Option<String>,
    /// Log line to append to the task stream
    #[serde(default)]
    pub log: Option<FrameLog>,
}

/// Source of push frames, as consumed by the orchestrator drive loop.
///
/// `next_frame` returning `None` means the channel is finished — closed
/// cleanly or out of reconnect budget — and the caller should fall back
/// to polling.
#[async_trait::async_trait]
pub trait PushFrames: Send {
    /// Waits for the next status frame.
    async fn next_frame(&mut self) -> Option<StatusFrame>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Websocket-backed push channel with heartbeat and bounded reconnect.
pub struct WsPushChannel {
    url: String,
    stream: Option<WsStream>,
    max_reconnects: u32,
    reconnect_delay: Duration,
    attempts: u32,
}

impl WsPushChannel {
    /// Creates a channel for `url` with the default reconnect budget.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_retry(url, DEFAULT_MAX_RECONNECTS, DEFAULT_RECONNECT_DELAY)
    }

    /// Creates a channel with an explicit reconnect budget and base delay.
    #[must_use]
    pub fn with_retry(url: impl Into<String>, max_reconnects: u32, reconnect_delay: Duration) -> Self {
        Self {
            url: url.into(),
            stream: None,
            max_reconnects,
            reconnect_delay,
            attempts: 0,
        }
    }

    /// Connects, retrying up to the budget with linear backoff.
    ///
    /// Returns `false` when the budget is exhausted.
    async fn ensure_connected(&mut self) -> bool {
        while self.stream.is_none() {
            if self.attempts >= self.max_reconnects {
                warn!(
                    url = %self.url,
                    attempts = self.attempts,
                    "push channel reconnect budget exhausted"
                );
                return false;
            }
            if self.attempts > 0 {
                let delay = self.reconnect_delay * self.attempts;
                debug!(url = %self.url, attempt = self.attempts, ?delay, "push channel backoff");
                tokio::time::sleep(delay).await;
            }
            self.attempts += 1;

            match connect_async(self.url.as_str()).await {
                Ok((stream, _response)) => {
                    info!(url = %self.url, "push channel connected");
                    metrics::record_push_reconnect();
                    self.stream = Some(stream);
                    self.attempts = 0;
                }
                Err(err) => {
                    warn!(url = %self.url, error = %err, "push channel connect failed");
                }
            }
        }
        true
    }

    fn parse_frame(text: &str) -> Option<StatusFrame> {
        // Heartbeat replies and anything that is not a status frame are
        // skipped without raising an error.
        if text == "pong" || text == "ping" {
            return None;
        }
        match serde_json::from_str::<StatusFrame>(text) {
            Ok(frame) => Some(frame),
            Err(err) => {
                debug!(error = %err, "ignoring non-status push frame");
                None
            }
        }
    }
}

/// One iteration of the channel loop, computed while the stream is
/// borrowed; the mutation it implies happens afterwards.
enum ChannelStep {
    HeartbeatSent(Result<(), tokio_tungstenite::tungstenite::Error>),
    Received(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
}

#[async_trait::async_trait]
impl PushFrames for WsPushChannel {
    async fn next_frame(&mut self) -> Option<StatusFrame> {
        let mut heartbeat = tokio::time::interval_at(
            tokio::time::Instant::now() + HEARTBEAT_INTERVAL,
            HEARTBEAT_INTERVAL,
        );
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if !self.ensure_connected().await {
                return None;
            }
            let step = {
                let Some(stream) = self.stream.as_mut() else {
                    continue;
                };
                tokio::select! {
                    _ = heartbeat.tick() => {
                        ChannelStep::HeartbeatSent(
                            stream.send(Message::Text("ping".into())).await,
                        )
                    }
                    message = stream.next() => ChannelStep::Received(message),
                }
            };

            match step {
                ChannelStep::HeartbeatSent(Ok(())) => {}
                ChannelStep::HeartbeatSent(Err(err)) => {
                    warn!(error = %err, "push channel heartbeat failed, reconnecting");
                    self.stream = None;
                }
                ChannelStep::Received(Some(Ok(Message::Text(text)))) => {
                    if let Some(frame) = Self::parse_frame(text.as_str()) {
                        metrics::record_push_frame();
                        return Some(frame);
                    }
                }
                ChannelStep::Received(Some(Ok(Message::Ping(payload)))) => {
                    if let Some(stream) = self.stream.as_mut() {
                        let _ = stream.send(Message::Pong(payload)).await;
                    }
                }
                ChannelStep::Received(Some(Ok(Message::Close(_))) | None) => {
                    info!(url = %self.url, "push channel closed, reconnecting");
                    self.stream = None;
                }
                ChannelStep::Received(Some(Ok(_))) => {
                    // Binary and pong frames carry nothing for us.
                }
                ChannelStep::Received(Some(Err(err))) => {
                    warn!(error = %err, "push channel read failed, reconnecting");
                    self.stream = None;
                }
            }
        }
    }
}

impl std::fmt::Debug for WsPushChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsPushChannel")
            .field("url", &self.url)
            .field("connected", &self.stream.is_some())
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}
