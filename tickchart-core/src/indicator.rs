//! Rolling technical indicators over a candle series.
//!
//! Indicators are pure functions of the full close-price sequence and are
//! recomputed wholesale on every candle append/update. Candle counts are
//! bounded (hundreds to low thousands), so wholesale recomputation stays well
//! under a render frame; an incremental recurrence would change nothing about
//! the output contract.

use crate::series::CandleSeries;
use serde::{Deserialize, Serialize};

/// Simple moving average of the last `period` closes.
///
/// Output holds one value per index `i >= period - 1`; series shorter than
/// `period` produce no output.
pub fn sma(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let mut window_sum: f64 = closes[..period].iter().sum();
    let mut out = Vec::with_capacity(closes.len() - period + 1);
    out.push(window_sum / period as f64);

    for i in period..closes.len() {
        window_sum += closes[i] - closes[i - period];
        out.push(window_sum / period as f64);
    }
    out
}

/// Relative Strength Index with Wilder smoothing.
///
/// Average gain/loss are seeded from the first `period` close deltas, then
/// smoothed as `avg = (avg * (period - 1) + delta) / period`. When the
/// average loss is zero the textbook quotient is undefined; this
/// implementation clamps to 100 while any gain exists and reports a neutral
/// 50 on a fully flat run, so non-finite values never escape.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() <= period {
        return Vec::new();
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for pair in closes[..=period].windows(2) {
        let delta = pair[1] - pair[0];
        if delta >= 0.0 {
            avg_gain += delta;
        } else {
            avg_loss += -delta;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    let mut out = Vec::with_capacity(closes.len() - period);
    out.push(rsi_value(avg_gain, avg_loss));

    for pair in closes[period..].windows(2) {
        let delta = pair[1] - pair[0];
        let (gain, loss) = if delta >= 0.0 { (delta, 0.0) } else { (0.0, -delta) };
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        out.push(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // Zero-loss clamp policy: all-gain runs read 100, flat runs neutral.
        if avg_gain == 0.0 { 50.0 } else { 100.0 }
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

/// The indicator kinds the chart can overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum IndicatorKind {
    Sma20,
    Sma50,
    Sma200,
    Rsi14,
}

impl IndicatorKind {
    /// Lookback period for this indicator.
    pub fn period(&self) -> usize {
        match self {
            IndicatorKind::Sma20 => 20,
            IndicatorKind::Sma50 => 50,
            IndicatorKind::Sma200 => 200,
            IndicatorKind::Rsi14 => 14,
        }
    }

    /// Short display label.
    pub fn label(&self) -> &'static str {
        match self {
            IndicatorKind::Sma20 => "SMA 20",
            IndicatorKind::Sma50 => "SMA 50",
            IndicatorKind::Sma200 => "SMA 200",
            IndicatorKind::Rsi14 => "RSI 14",
        }
    }

    /// Whether this indicator overlays the price panel (as opposed to
    /// rendering in its own sub-panel).
    pub fn is_overlay(&self) -> bool {
        !matches!(self, IndicatorKind::Rsi14)
    }

    pub fn all() -> [IndicatorKind; 4] {
        [
            IndicatorKind::Sma20,
            IndicatorKind::Sma50,
            IndicatorKind::Sma200,
            IndicatorKind::Rsi14,
        ]
    }
}

/// One computed indicator series, aligned to candle indices.
///
/// `values[i]` belongs to the candle at index `start_index + i`; indicators
/// with a lookback produce nothing for the warm-up prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub kind: IndicatorKind,
    pub start_index: usize,
    pub values: Vec<f64>,
}

impl IndicatorSeries {
    /// Value aligned with the candle at `index`, if the warm-up has passed.
    pub fn at(&self, index: usize) -> Option<f64> {
        index
            .checked_sub(self.start_index)
            .and_then(|i| self.values.get(i))
            .copied()
    }

    /// Value aligned with the most recent candle.
    pub fn latest(&self) -> Option<f64> {
        self.values.last().copied()
    }
}

/// Derived series for every indicator kind, plus per-kind visibility.
///
/// Visibility toggles are independent of the cached values: hiding an
/// overlay never discards its computed series.
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    computed: Vec<IndicatorSeries>,
    visible: Vec<(IndicatorKind, bool)>,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self {
            computed: Vec::new(),
            visible: IndicatorKind::all()
                .into_iter()
                .map(|kind| (kind, matches!(kind, IndicatorKind::Sma20)))
                .collect(),
        }
    }

    /// Recompute every indicator from the candle series.
    pub fn recompute(&mut self, series: &CandleSeries) {
        let closes = series.closes();
        self.computed = IndicatorKind::all()
            .into_iter()
            .map(|kind| {
                let period = kind.period();
                let (start_index, values) = match kind {
                    IndicatorKind::Rsi14 => (period, rsi(&closes, period)),
                    _ => (period.saturating_sub(1), sma(&closes, period)),
                };
                IndicatorSeries {
                    kind,
                    start_index,
                    values,
                }
            })
            .collect();
    }

    pub fn set_visible(&mut self, kind: IndicatorKind, visible: bool) {
        if let Some(entry) = self.visible.iter_mut().find(|(k, _)| *k == kind) {
            entry.1 = visible;
        }
    }

    pub fn toggle(&mut self, kind: IndicatorKind) {
        if let Some(entry) = self.visible.iter_mut().find(|(k, _)| *k == kind) {
            entry.1 = !entry.1;
        }
    }

    pub fn is_visible(&self, kind: IndicatorKind) -> bool {
        self.visible
            .iter()
            .find(|(k, _)| *k == kind)
            .is_some_and(|(_, v)| *v)
    }

    /// Computed series for one kind, regardless of visibility.
    pub fn series(&self, kind: IndicatorKind) -> Option<&IndicatorSeries> {
        self.computed.iter().find(|s| s.kind == kind)
    }

    /// Visible overlay series for the price panel.
    pub fn visible_overlays(&self) -> impl Iterator<Item = &IndicatorSeries> {
        self.computed
            .iter()
            .filter(|s| s.kind.is_overlay() && self.is_visible(s.kind))
    }
}

impl Default for IndicatorSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle::HistoryBar;
    use crate::interval::Interval;

    fn series_from_closes(closes: &[f64]) -> CandleSeries {
        let mut series = CandleSeries::new(Interval::m1());
        series.load_history(
            closes
                .iter()
                .enumerate()
                .map(|(i, &close)| HistoryBar {
                    time: i as i64 * 60_000,
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1.0,
                })
                .collect(),
        );
        series
    }

    #[test]
    fn test_sma_short_series_produces_nothing() {
        assert!(sma(&[1.0, 2.0], 3).is_empty());
        assert!(sma(&[], 1).is_empty());
    }

    #[test]
    fn test_sma_constant_series_returns_constant() {
        let closes = vec![42.5; 30];
        let out = sma(&closes, 20);
        assert_eq!(out.len(), 11); // len - period + 1
        for value in out {
            assert!((value - 42.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sma_windowed_mean() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(out.len(), 3);
        assert!((out[0] - 2.0).abs() < 1e-9);
        assert!((out[1] - 3.0).abs() < 1e-9);
        assert!((out[2] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_increasing_series_converges_to_100() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&closes, 14);
        assert!(!out.is_empty());
        // All gains, no losses: the clamp policy reads 100 throughout.
        assert!(out.iter().all(|v| (*v - 100.0).abs() < 1e-9));
    }

    #[test]
    fn test_rsi_decreasing_series_converges_to_0() {
        let closes: Vec<f64> = (0..60).map(|i| 1_000.0 - i as f64).collect();
        let out = rsi(&closes, 14);
        let last = *out.last().unwrap();
        assert!(last < 1.0, "expected RSI near 0, got {last}");
    }

    #[test]
    fn test_rsi_flat_series_is_neutral() {
        let closes = vec![50.0; 40];
        let out = rsi(&closes, 14);
        assert!(out.iter().all(|v| (*v - 50.0).abs() < 1e-9));
    }

    #[test]
    fn test_rsi_stays_bounded_and_finite() {
        let closes: Vec<f64> = (0..100)
            .map(|i| 100.0 + ((i * 7919) % 23) as f64 - 11.0)
            .collect();
        for value in rsi(&closes, 14) {
            assert!(value.is_finite());
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_indicator_series_alignment() {
        let series = IndicatorSeries {
            kind: IndicatorKind::Sma20,
            start_index: 19,
            values: vec![1.0, 2.0, 3.0],
        };
        assert_eq!(series.at(18), None);
        assert_eq!(series.at(19), Some(1.0));
        assert_eq!(series.at(21), Some(3.0));
        assert_eq!(series.at(22), None);
        assert_eq!(series.latest(), Some(3.0));
    }

    #[test]
    fn test_indicator_set_recompute_and_visibility() {
        let candles = series_from_closes(&(0..250).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        let mut set = IndicatorSet::new();
        set.recompute(&candles);

        let sma200 = set.series(IndicatorKind::Sma200).unwrap();
        assert_eq!(sma200.start_index, 199);
        assert_eq!(sma200.values.len(), 51);

        // Visibility is independent of the cache.
        assert!(set.is_visible(IndicatorKind::Sma20));
        assert!(!set.is_visible(IndicatorKind::Sma200));
        set.set_visible(IndicatorKind::Sma200, true);
        assert!(set.is_visible(IndicatorKind::Sma200));
        assert_eq!(set.visible_overlays().count(), 2);

        set.toggle(IndicatorKind::Sma200);
        assert!(set.series(IndicatorKind::Sma200).is_some());
        assert_eq!(set.visible_overlays().count(), 1);
    }
}
