//! Tickchart Core
//!
//! In-memory real-time charting engine: ingests a live price-tick stream,
//! incrementally aggregates ticks into timeframe-aligned OHLCV candles, and
//! computes rolling technical indicators over the candle sequence.
//!
//! The library provides:
//! - Timeframe token resolution and bucket alignment ([`Interval`])
//! - Candle aggregation from historical snapshots and live ticks
//!   ([`CandleSeries`])
//! - Simple moving average and RSI indicator series ([`IndicatorSet`])
//! - The error taxonomy shared with front-end crates ([`ChartError`])
//!
//! All state is exclusively owned by one (symbol, interval) chart instance;
//! on symbol or interval change the series is discarded and rebuilt from a
//! fresh historical fetch.

pub mod candle;
pub mod error;
pub mod indicator;
pub mod interval;
pub mod series;

// Re-export commonly used types for convenience
pub use candle::{Candle, HistoryBar};
pub use error::ChartError;
pub use indicator::{IndicatorKind, IndicatorSeries, IndicatorSet, rsi, sma};
pub use interval::{Interval, IntervalUnit};
pub use series::{CandleSeries, TickOutcome};
