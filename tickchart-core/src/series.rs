//! Candle series aggregation from historical snapshots and live ticks.
//!
//! Bucket boundaries come from tick timestamps, not wall clock, so backfilled
//! tick bursts aggregate the same way live streams do. A series is exclusively
//! owned by one (symbol, interval) chart instance and is rebuilt from a fresh
//! historical fetch on every symbol or interval change.

use crate::candle::{Candle, HistoryBar};
use crate::error::ChartError;
use crate::interval::Interval;
use itertools::Itertools;
use tracing::debug;

/// Outcome of feeding a live tick into a [`CandleSeries`].
///
/// The caller fans these out to whoever needs to react: `Opened`/`Amended`
/// carry the affected candle for indicator recomputation and O(1) renderer
/// amends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// The tick crossed a bucket boundary and a new trailing candle was
    /// appended.
    Opened(Candle),
    /// The tick landed inside the current bucket and the last candle was
    /// amended in place.
    Amended(Candle),
    /// The tick's bucket precedes the last candle. Live ticks never rewrite
    /// history; the series is unchanged.
    Stale,
    /// The series has no baseline yet. Ticks arriving before any history are
    /// dropped rather than seeding a single-candle series.
    NoHistory,
}

/// Ordered, deduplicated sequence of OHLCV candles for one (symbol, interval).
#[derive(Debug, Clone)]
pub struct CandleSeries {
    interval: Interval,
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(interval: Interval) -> Self {
        Self {
            interval,
            candles: Vec::new(),
        }
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Closing prices in time order, the input to every indicator.
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// Drop all candles, e.g. ahead of a symbol or interval change.
    pub fn clear(&mut self) {
        self.candles.clear();
    }

    /// Replace the series with a normalised snapshot.
    ///
    /// Input bars may be unsorted and may contain duplicate buckets; the last
    /// seen value per bucket wins, then buckets are sorted ascending. Feeding
    /// the same snapshot twice yields an identical series.
    pub fn load_history(&mut self, bars: Vec<HistoryBar>) {
        let interval = self.interval;
        self.candles = bars
            .into_iter()
            .map(|bar| bar.into_candle(interval))
            .into_group_map_by(|candle| candle.time)
            .into_iter()
            .filter_map(|(_, dupes)| dupes.into_iter().last())
            .sorted_by_key(|candle| candle.time)
            .collect();

        debug!(
            interval = %self.interval,
            candles = self.candles.len(),
            "loaded historical snapshot"
        );
    }

    /// Absorb one live tick.
    ///
    /// Non-finite input is rejected with [`ChartError::MalformedTick`]. Valid
    /// ticks never fail: far-future or far-past timestamps simply open new,
    /// possibly distant, buckets or report [`TickOutcome::Stale`]. Candle
    /// times are monotonically increasing and the candle count never shrinks.
    pub fn apply_tick(
        &mut self,
        price: f64,
        timestamp_millis: i64,
    ) -> Result<TickOutcome, ChartError> {
        if !price.is_finite() {
            return Err(ChartError::MalformedTick {
                price,
                timestamp_millis,
            });
        }

        let Some(last) = self.candles.last() else {
            return Ok(TickOutcome::NoHistory);
        };

        let bucket_start = self.interval.bucket_start(timestamp_millis / 1_000);

        if bucket_start > last.time {
            // New bucket: seed open from the prior close so consecutive
            // candles stay visually continuous. Tick data carries no trade
            // size, so a fresh bucket starts with zero volume.
            let open = last.close;
            let candle = Candle::new(
                bucket_start,
                open,
                open.max(price),
                open.min(price),
                price,
                0.0,
            );
            self.candles.push(candle);
            Ok(TickOutcome::Opened(candle))
        } else if bucket_start == last.time {
            let last = self
                .candles
                .last_mut()
                .ok_or(ChartError::EmptySeries)?;
            last.high = last.high.max(price);
            last.low = last.low.min(price);
            last.close = price;
            Ok(TickOutcome::Amended(*last))
        } else {
            debug!(
                bucket_start,
                last_bucket = last.time,
                "out-of-order tick rejected"
            );
            Ok(TickOutcome::Stale)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(time_millis: i64, open: f64, high: f64, low: f64, close: f64) -> HistoryBar {
        HistoryBar {
            time: time_millis,
            open,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    fn minute_series_with(bars: Vec<HistoryBar>) -> CandleSeries {
        let mut series = CandleSeries::new(Interval::m1());
        series.load_history(bars);
        series
    }

    #[test]
    fn test_load_history_sorts_and_dedupes() {
        let series = minute_series_with(vec![
            bar(120_000, 3.0, 4.0, 2.0, 3.5),
            bar(0, 1.0, 2.0, 0.5, 1.5),
            bar(60_000, 9.0, 9.0, 9.0, 9.0), // superseded by the later duplicate
            bar(60_000, 2.0, 3.0, 1.0, 2.5),
        ]);

        let times: Vec<i64> = series.candles().iter().map(|c| c.time).collect();
        assert_eq!(times, vec![0, 60, 120]);
        assert_eq!(series.candles()[1].close, 2.5);
    }

    #[test]
    fn test_load_history_idempotent_under_duplicates() {
        let bars = vec![
            bar(60_000, 2.0, 3.0, 1.0, 2.5),
            bar(0, 1.0, 2.0, 0.5, 1.5),
        ];
        let mut doubled = bars.clone();
        doubled.extend(bars.clone());

        let once = minute_series_with(bars.clone());
        let twice = {
            let mut series = minute_series_with(bars);
            series.load_history(
                once.candles()
                    .iter()
                    .map(|c| bar(c.time * 1_000, c.open, c.high, c.low, c.close))
                    .collect(),
            );
            series
        };
        let from_doubled = minute_series_with(doubled);

        assert_eq!(once.candles(), twice.candles());
        assert_eq!(once.candles(), from_doubled.candles());
    }

    #[test]
    fn test_tick_without_history_is_dropped() {
        let mut series = CandleSeries::new(Interval::m1());
        assert_eq!(
            series.apply_tick(100.0, 30_000).unwrap(),
            TickOutcome::NoHistory
        );
        assert!(series.is_empty());
    }

    #[test]
    fn test_tick_in_same_bucket_amends_last_candle() {
        let mut series = minute_series_with(vec![bar(0, 100.0, 105.0, 98.0, 102.0)]);

        let outcome = series.apply_tick(103.0, 30_000).unwrap();
        let last = *series.last().unwrap();

        assert_eq!(outcome, TickOutcome::Amended(last));
        assert_eq!(
            last,
            Candle::new(0, 100.0, 105.0, 98.0, 103.0, 1.0)
        );
    }

    #[test]
    fn test_tick_in_new_bucket_opens_from_prior_close() {
        let mut series = minute_series_with(vec![bar(0, 100.0, 105.0, 98.0, 102.0)]);

        let outcome = series.apply_tick(110.0, 65_000).unwrap();
        let last = *series.last().unwrap();

        assert_eq!(outcome, TickOutcome::Opened(last));
        assert_eq!(last, Candle::new(60, 102.0, 110.0, 102.0, 110.0, 0.0));
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_new_bucket_below_prior_close_keeps_ordering() {
        let mut series = minute_series_with(vec![bar(0, 100.0, 105.0, 98.0, 102.0)]);

        series.apply_tick(95.0, 61_000).unwrap();
        let last = series.last().unwrap();

        assert_eq!(last.open, 102.0);
        assert_eq!(last.high, 102.0);
        assert_eq!(last.low, 95.0);
        assert!(last.is_well_formed());
    }

    #[test]
    fn test_out_of_order_tick_rejected() {
        let mut series = minute_series_with(vec![
            bar(0, 100.0, 105.0, 98.0, 102.0),
            bar(60_000, 102.0, 104.0, 101.0, 103.0),
        ]);
        let before = series.candles().to_vec();

        assert_eq!(series.apply_tick(50.0, 30_000).unwrap(), TickOutcome::Stale);
        assert_eq!(series.candles(), &before[..]);
    }

    #[test]
    fn test_malformed_tick_rejected() {
        let mut series = minute_series_with(vec![bar(0, 100.0, 105.0, 98.0, 102.0)]);

        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = series.apply_tick(bad, 30_000).unwrap_err();
            assert!(err.is_benign());
        }
        assert_eq!(series.last().unwrap().close, 102.0);
    }

    #[test]
    fn test_far_future_tick_opens_distant_bucket() {
        let mut series = minute_series_with(vec![bar(0, 100.0, 105.0, 98.0, 102.0)]);

        // A silent multi-hour feed gap: the next tick simply resumes
        // aggregation in its own bucket.
        series.apply_tick(120.0, 10_000_000).unwrap();
        assert_eq!(series.last().unwrap().time, 9_960);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_invariants_under_random_tick_run() {
        let mut series = minute_series_with(vec![bar(0, 100.0, 100.0, 100.0, 100.0)]);

        // Deterministic pseudo-random walk inside and across buckets.
        let mut seed = 0x2545f491_4f6c_dd1du64;
        let mut price = 100.0;
        for step in 0..2_000i64 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            price += ((seed % 200) as f64 - 100.0) / 50.0;
            let ts_millis = step * 1_700; // drifts across minute boundaries
            series.apply_tick(price, ts_millis).unwrap();

            let candles = series.candles();
            for pair in candles.windows(2) {
                assert!(pair[0].time < pair[1].time);
            }
            for candle in candles {
                assert!(candle.is_well_formed());
                assert_eq!(candle.time % 60, 0);
            }
        }
    }
}
