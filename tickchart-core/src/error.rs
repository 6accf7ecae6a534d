use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `tickchart-core`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum ChartError {
    #[error("invalid interval token: {0}")]
    InvalidInterval(String),

    #[error("malformed tick dropped: price {price}, timestamp_millis {timestamp_millis}")]
    MalformedTick { price: f64, timestamp_millis: i64 },

    #[error(
        "stale history response discarded: generation {received} superseded by {expected}"
    )]
    StaleRequest { expected: u64, received: u64 },

    #[error("operation requires at least one candle in the series")]
    EmptySeries,

    #[error("transport error: {0}")]
    Transport(String),
}

impl ChartError {
    /// Determine if an error is benign: dropped and logged, never surfaced to
    /// the surrounding application. Everything else indicates a caller bug.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_benign(&self) -> bool {
        match self {
            ChartError::MalformedTick { .. } => true,
            ChartError::StaleRequest { .. } => true,
            ChartError::EmptySeries => true,
            _ => false,
        }
    }
}
