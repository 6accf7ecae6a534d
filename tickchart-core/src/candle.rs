//! OHLCV candle data structures.

use crate::interval::Interval;
use serde::{Deserialize, Serialize};

/// One aggregated OHLCV candle.
///
/// `time` is the unix-second start of the candle's bucket, always a multiple
/// of the owning series' interval.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Whether this candle closed at or above its open.
    ///
    /// Drives up/down colouring for both the price series and the volume
    /// histogram.
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    /// Check the OHLC ordering invariants.
    pub fn is_well_formed(&self) -> bool {
        self.high >= self.open.max(self.close) && self.low <= self.open.min(self.close)
    }
}

/// Raw historical bar as delivered by the history endpoint.
///
/// Timestamps arrive in epoch milliseconds and may be unsorted or duplicated;
/// [`crate::series::CandleSeries::load_history`] normalises them.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct HistoryBar {
    /// Bar timestamp in epoch milliseconds.
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl HistoryBar {
    /// Normalise into a bucket-aligned [`Candle`] for the given interval.
    pub fn into_candle(self, interval: Interval) -> Candle {
        Candle {
            time: interval.bucket_start(self.time / 1_000),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bullish_colouring() {
        let up = Candle::new(0, 100.0, 105.0, 99.0, 102.0, 10.0);
        let flat = Candle::new(0, 100.0, 100.0, 100.0, 100.0, 0.0);
        let down = Candle::new(0, 100.0, 101.0, 95.0, 96.0, 10.0);

        assert!(up.is_bullish());
        assert!(flat.is_bullish());
        assert!(!down.is_bullish());
    }

    #[test]
    fn test_well_formed() {
        assert!(Candle::new(0, 100.0, 105.0, 98.0, 102.0, 1.0).is_well_formed());
        // High below close violates ordering.
        assert!(!Candle::new(0, 100.0, 101.0, 98.0, 102.0, 1.0).is_well_formed());
    }

    #[test]
    fn test_history_bar_alignment() {
        let bar = HistoryBar {
            time: 3_725_000, // 01:02:05 in millis
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 3.0,
        };
        let candle = bar.into_candle(Interval::h1());
        assert_eq!(candle.time, 3_600);
        assert_eq!(candle.close, 1.5);
    }

    #[test]
    fn test_history_bar_deserialize_missing_volume() {
        let bar: HistoryBar = serde_json::from_str(
            r#"{"time": 60000, "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5}"#,
        )
        .unwrap();
        assert_eq!(bar.volume, 0.0);
    }
}
