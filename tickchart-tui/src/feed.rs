//! Live feed adapter and historical fetch.
//!
//! Normalises transport-specific messages into price + timestamp pairs fed to
//! the chart engine. Reconnect/backoff lives here; the aggregation core only
//! ever sees clean ticks and tolerates silent gaps.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;
use tickchart_core::{ChartError, HistoryBar, Interval};
use tokio::sync::{Mutex, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::engine::ChartEngine;

/// Connection status for the live feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Connected,
    Disconnected,
    Reconnecting,
}

/// Feed configuration, read from the environment with sensible defaults.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket URL for live ticks; `None` selects the simulated feed.
    pub ws_url: Option<String>,
    /// Base URL for the historical REST endpoint.
    pub api_url: String,
    /// Delay between reconnection attempts.
    pub reconnect_delay: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: None,
            api_url: "http://127.0.0.1:8000".to_string(),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

impl FeedConfig {
    /// Build a config from `TICKCHART_WS_URL` / `TICKCHART_API_URL`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ws_url: std::env::var("TICKCHART_WS_URL").ok(),
            api_url: std::env::var("TICKCHART_API_URL").unwrap_or(defaults.api_url),
            reconnect_delay: defaults.reconnect_delay,
        }
    }
}

/// One tick message from the feed server.
///
/// Fields are optional on the wire; messages missing either one are dropped
/// rather than crashing the stream.
#[derive(Debug, Deserialize)]
struct TickMessage {
    #[serde(alias = "last")]
    price: Option<f64>,
    #[serde(alias = "timestamp")]
    timestamp_millis: Option<i64>,
    #[serde(default)]
    symbol: Option<String>,
}

impl TickMessage {
    /// Validate into a (price, timestamp) pair, or `None` for malformed input.
    fn normalise(&self, subscribed_symbol: &str) -> Option<(f64, i64)> {
        if let Some(symbol) = &self.symbol
            && symbol != subscribed_symbol
        {
            return None;
        }
        match (self.price, self.timestamp_millis) {
            (Some(price), Some(ts)) if price.is_finite() && ts > 0 => Some((price, ts)),
            _ => None,
        }
    }
}

/// Spawn the WebSocket live feed handler.
///
/// Connects, pushes normalised ticks into the shared engine, and reconnects
/// forever on failure. Connection state is published on a watch channel for
/// the status bar.
pub fn spawn_live_feed(
    config: FeedConfig,
    url: String,
    engine: Arc<Mutex<ChartEngine>>,
    status_tx: watch::Sender<FeedStatus>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("starting live feed handler for {url}");

        loop {
            let _ = status_tx.send(FeedStatus::Reconnecting);

            match connect_async(&url).await {
                Ok((ws_stream, _)) => {
                    info!("connected to feed at {url}");
                    let _ = status_tx.send(FeedStatus::Connected);

                    let (_, mut read) = ws_stream.split();

                    while let Some(msg) = read.next().await {
                        match msg {
                            Ok(Message::Text(text)) => {
                                handle_text_message(&text, &engine).await;
                            }
                            Ok(Message::Close(_)) => {
                                warn!("feed connection closed");
                                break;
                            }
                            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                            Err(e) => {
                                error!("feed error: {e}");
                                break;
                            }
                            _ => {}
                        }
                    }

                    let _ = status_tx.send(FeedStatus::Disconnected);
                }
                Err(e) => {
                    error!("failed to connect to feed at {url}: {e}");
                    let _ = status_tx.send(FeedStatus::Disconnected);
                }
            }

            tokio::time::sleep(config.reconnect_delay).await;
        }
    })
}

async fn handle_text_message(text: &str, engine: &Arc<Mutex<ChartEngine>>) {
    match serde_json::from_str::<TickMessage>(text) {
        Ok(msg) => {
            let mut engine = engine.lock().await;
            let symbol = engine.symbol().to_string();
            if let Some((price, ts)) = msg.normalise(&symbol) {
                engine.on_tick(price, ts);
            } else {
                debug!("malformed tick message dropped");
            }
        }
        Err(e) => {
            // Don't spam logs for every unparseable message
            let preview: String = text.chars().take(100).collect();
            debug!("failed to parse feed message: {e} - {preview}");
        }
    }
}

/// Spawn a random-walk tick source for offline use.
///
/// Selected when no WebSocket URL is configured; produces a plausible stream
/// so the chart is exercisable without a feed server.
pub fn spawn_simulated_feed(
    engine: Arc<Mutex<ChartEngine>>,
    status_tx: watch::Sender<FeedStatus>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("starting simulated feed");
        let _ = status_tx.send(FeedStatus::Connected);

        let mut price = 100.0f64;
        let mut ticker = tokio::time::interval(Duration::from_millis(200));
        loop {
            ticker.tick().await;
            price *= 1.0 + rand::random_range(-0.0015..0.0015);
            let ts = chrono::Utc::now().timestamp_millis();
            engine.lock().await.on_tick(price, ts);
        }
    })
}

/// Generate a synthetic historical snapshot for the simulated feed.
pub fn simulated_history(interval: Interval, limit: usize) -> Vec<HistoryBar> {
    let now_secs = chrono::Utc::now().timestamp();
    let newest_bucket = interval.bucket_start(now_secs);
    let mut close = 100.0f64;
    let mut bars = Vec::with_capacity(limit);
    for i in (0..limit as i64).rev() {
        let open = close;
        close = open * (1.0 + rand::random_range(-0.01..0.01));
        let high = open.max(close) * (1.0 + rand::random_range(0.0..0.004));
        let low = open.min(close) * (1.0 - rand::random_range(0.0..0.004));
        bars.push(HistoryBar {
            time: (newest_bucket - i * interval.secs()) * 1_000,
            open,
            high,
            low,
            close,
            volume: rand::random_range(1.0..500.0),
        });
    }
    bars
}

/// Fetch a historical OHLCV snapshot over REST.
///
/// The engine tolerates duplicate and out-of-order entries in the response;
/// transport and decode failures are folded into [`ChartError::Transport`].
pub async fn fetch_history(
    client: &reqwest::Client,
    config: &FeedConfig,
    symbol: &str,
    interval: Interval,
    limit: usize,
) -> Result<Vec<HistoryBar>, ChartError> {
    let url = format!(
        "{}/api/market/history?symbol={symbol}&timeframe={interval}&limit={limit}",
        config.api_url
    );

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| ChartError::Transport(format!("history request failed: {e}")))?;

    if let Err(status_err) = response.error_for_status_ref() {
        return Err(ChartError::Transport(format!(
            "history request failed ({symbol}): {status_err}"
        )));
    }

    response
        .json::<Vec<HistoryBar>>()
        .await
        .map_err(|e| ChartError::Transport(format!("history decode failed ({symbol}): {e}")))
}
