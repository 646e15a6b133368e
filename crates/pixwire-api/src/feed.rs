//! Controller feed (server-sent events) with auto-reconnect.
//!
//! Connects to the diagram server's `/api/xlights/stream` endpoint and
//! forwards parsed messages through an [`mpsc`] channel, in arrival
//! order and without coalescing. Handles reconnection with exponential
//! backoff + jitter automatically.
//!
//! # Example
//!
//! ```rust,ignore
//! use pixwire_api::feed::{FeedHandle, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let url = client.feed_url()?;
//! let mut handle = FeedHandle::spawn(http, url, ReconnectConfig::default(), cancel.clone());
//!
//! while let Some(msg) = handle.recv().await {
//!     if msg.is_update() {
//!         println!("{} controllers", msg.controllers.len());
//!     }
//! }
//! ```

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::client::check_status;
use crate::error::Error;
use crate::sse::SseDecoder;

// ── Channel capacity ─────────────────────────────────────────────────

const FEED_CHANNEL_CAPACITY: usize = 256;

/// Message type that carries a controller snapshot.
pub const UPDATE_MESSAGE: &str = "update";

// ── FeedMessage ──────────────────────────────────────────────────────

/// A parsed message from the controller feed.
///
/// Controllers are kept as raw JSON; `pixwire-core` owns their schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedMessage {
    /// Message type. Only [`UPDATE_MESSAGE`] carries controllers.
    #[serde(rename = "type")]
    pub kind: String,

    /// Full controller snapshot (present on updates).
    #[serde(default)]
    pub controllers: Vec<Value>,

    /// All remaining fields the server sends.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeedMessage {
    pub fn is_update(&self) -> bool {
        self.kind == UPDATE_MESSAGE
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for feed reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── FeedHandle ───────────────────────────────────────────────────────

/// Handle to a running controller feed.
///
/// Dropping the handle closes the channel, which stops the background
/// task at its next message; [`shutdown`](Self::shutdown) stops it
/// immediately.
pub struct FeedHandle {
    rx: mpsc::Receiver<FeedMessage>,
    cancel: CancellationToken,
}

impl FeedHandle {
    /// Spawn the reconnecting feed loop. Must be called inside a Tokio runtime.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background.
    pub fn spawn(
        http: reqwest::Client,
        url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            feed_loop(http, url, tx, reconnect, task_cancel).await;
        });

        Self { rx, cancel }
    }

    /// Receive the next message. `None` once the feed loop has stopped.
    pub async fn recv(&mut self) -> Option<FeedMessage> {
        self.rx.recv().await
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Single connection stream ─────────────────────────────────────────

/// Open one feed connection and yield its messages until it ends.
///
/// Malformed payloads are logged and skipped; they never end the stream.
pub fn feed_stream(
    http: reqwest::Client,
    url: Url,
) -> impl Stream<Item = Result<FeedMessage, Error>> {
    async_stream::try_stream! {
        tracing::info!(url = %url, "Connecting to controller feed");

        let resp = http
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| Error::FeedConnect(e.to_string()))?;
        let resp = check_status(resp).await?;

        tracing::info!("Controller feed connected");

        let mut bytes = resp.bytes_stream();
        let mut decoder = SseDecoder::default();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| Error::FeedClosed { reason: e.to_string() })?;
            for payload in decoder.push(&chunk) {
                if let Some(message) = parse_message(&payload) {
                    yield message;
                }
            }
        }
    }
}

// ── Background reconnection loop ─────────────────────────────────────

enum ReadOutcome {
    /// Server ended the stream.
    Ended,
    /// Nobody is listening any more.
    ConsumerGone,
}

/// Main loop: connect → read → on error, backoff → reconnect.
async fn feed_loop(
    http: reqwest::Client,
    url: Url,
    tx: mpsc::Sender<FeedMessage>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let mut delivered = 0;
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = read_feed(&http, &url, &tx, &mut delivered) => {
                attempt = attempt_after(attempt, delivered);
                match result {
                    Ok(ReadOutcome::ConsumerGone) => break,
                    // Clean end of stream. Reset attempt counter and reconnect.
                    Ok(ReadOutcome::Ended) => {
                        tracing::info!("Controller feed ended cleanly, reconnecting");
                        attempt = 0;
                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(reconnect.initial_delay) => {}
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "Controller feed error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "Controller feed reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::info!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt,
                            "Waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt += 1;
                    }
                }
            }
        }
    }

    tracing::debug!("Controller feed loop exiting");
}

/// Forward one connection's messages, counting them into `delivered`.
async fn read_feed(
    http: &reqwest::Client,
    url: &Url,
    tx: &mpsc::Sender<FeedMessage>,
    delivered: &mut usize,
) -> Result<ReadOutcome, Error> {
    let stream = feed_stream(http.clone(), url.clone());
    tokio::pin!(stream);

    while let Some(item) = stream.next().await {
        let message = item?;
        if tx.send(message).await.is_err() {
            return Ok(ReadOutcome::ConsumerGone);
        }
        *delivered += 1;
    }
    Ok(ReadOutcome::Ended)
}

/// Failures only count as consecutive while connections deliver nothing.
fn attempt_after(attempt: u32, delivered: usize) -> u32 {
    if delivered > 0 { 0 } else { attempt }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Parse one event payload. Malformed JSON is not fatal.
fn parse_message(payload: &str) -> Option<FeedMessage> {
    match serde_json::from_str::<FeedMessage>(payload) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed feed message");
            None
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig::default();
        let d = calculate_backoff(20, &config);
        // max_delay plus at most 25% jitter
        assert!(d <= Duration::from_secs_f64(30.0 * 1.25));
    }

    #[test]
    fn delivering_connection_resets_backoff() {
        let config = ReconnectConfig::default();
        let attempt = attempt_after(6, 3);
        assert_eq!(attempt, 0);
        assert_eq!(calculate_backoff(attempt, &config), calculate_backoff(0, &config));

        // nothing delivered: still climbing
        assert_eq!(attempt_after(6, 0), 6);
    }

    #[test]
    fn parse_update_message() {
        let msg = parse_message(r#"{"type":"update","controllers":[{"id":"c1"}]}"#).unwrap();
        assert!(msg.is_update());
        assert_eq!(msg.controllers.len(), 1);
    }

    #[test]
    fn parse_other_message_keeps_extra_fields() {
        let msg = parse_message(r#"{"type":"heartbeat","ts":12}"#).unwrap();
        assert!(!msg.is_update());
        assert!(msg.controllers.is_empty());
        assert_eq!(msg.extra["ts"], 12);
    }

    #[test]
    fn malformed_message_is_skipped() {
        assert!(parse_message("not json").is_none());
        assert!(parse_message(r#"{"controllers":[]}"#).is_none());
    }
}
