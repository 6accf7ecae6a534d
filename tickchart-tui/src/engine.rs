//! Chart engine: the command surface tying aggregator, indicators, renderer
//! and drawing layer together for one (symbol, interval) chart instance.
//!
//! Everything here is synchronous and single-owner: the UI loop and the feed
//! task share the engine behind one `Arc<Mutex<_>>` and mutations happen in
//! event-arrival order. The only asynchronous boundary is the historical
//! fetch, guarded by a request generation so a slow response for an old
//! symbol can never overwrite a newer series.

use tickchart_core::{
    CandleSeries, ChartError, HistoryBar, IndicatorKind, IndicatorSet, Interval, TickOutcome,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::drawing::{Annotation, DrawingLayer, Tool};
use crate::render::{ChartType, ChartView};

/// One live chart instance: series, indicators, view, drawings.
pub struct ChartEngine {
    symbol: String,
    series: CandleSeries,
    indicators: IndicatorSet,
    view: ChartView,
    drawings: DrawingLayer,
    /// Bumped on every symbol/interval change; stale fetches carry an older
    /// value and are discarded.
    generation: u64,
    price_tx: watch::Sender<Option<f64>>,
}

impl ChartEngine {
    pub fn new(symbol: impl Into<String>, interval: Interval) -> Self {
        let (price_tx, _) = watch::channel(None);
        Self {
            symbol: symbol.into(),
            series: CandleSeries::new(interval),
            indicators: IndicatorSet::new(),
            view: ChartView::new(ChartType::default()),
            drawings: DrawingLayer::new(),
            generation: 0,
            price_tx,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.series.interval()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn series(&self) -> &CandleSeries {
        &self.series
    }

    pub fn indicators(&self) -> &IndicatorSet {
        &self.indicators
    }

    pub fn view(&self) -> &ChartView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ChartView {
        &mut self.view
    }

    pub fn annotations(&self) -> &[Annotation] {
        self.drawings.annotations()
    }

    pub fn active_tool(&self) -> Tool {
        self.drawings.active_tool()
    }

    /// Latest traded price, for consumers that only need a header ticker.
    pub fn subscribe_price(&self) -> watch::Receiver<Option<f64>> {
        self.price_tx.subscribe()
    }

    /// Switch to a new symbol, discarding the current series.
    ///
    /// Returns the new request generation; the caller passes it back via
    /// [`ChartEngine::apply_history`] once the fetch lands.
    pub fn set_symbol(&mut self, symbol: impl Into<String>) -> u64 {
        self.symbol = symbol.into();
        self.reset_series(self.interval())
    }

    /// Switch timeframe for the current symbol, discarding the series.
    pub fn set_interval(&mut self, interval: Interval) -> u64 {
        self.reset_series(interval)
    }

    fn reset_series(&mut self, interval: Interval) -> u64 {
        self.generation += 1;
        self.series = CandleSeries::new(interval);
        self.indicators.recompute(&self.series);
        self.view.set_data(&[]);
        let _ = self.price_tx.send(None);
        info!(
            symbol = %self.symbol,
            interval = %interval,
            generation = self.generation,
            "series reset, awaiting history"
        );
        self.generation
    }

    /// Absorb a historical snapshot fetched for `generation`.
    ///
    /// A response superseded by a newer symbol/interval change is discarded
    /// with [`ChartError::StaleRequest`] - the stale-data race guard.
    pub fn apply_history(
        &mut self,
        generation: u64,
        bars: Vec<HistoryBar>,
    ) -> Result<(), ChartError> {
        if generation != self.generation {
            warn!(
                received = generation,
                expected = self.generation,
                "discarding stale history response"
            );
            return Err(ChartError::StaleRequest {
                expected: self.generation,
                received: generation,
            });
        }

        self.series.load_history(bars);
        self.indicators.recompute(&self.series);
        self.view.set_data(self.series.candles());
        let _ = self.price_tx.send(self.series.last().map(|c| c.close));
        Ok(())
    }

    /// Absorb one live tick.
    ///
    /// Malformed ticks are logged and dropped - a single bad message must
    /// never interrupt a live stream. Valid ticks fan out to the indicator
    /// set and the renderer, and publish the latest price.
    pub fn on_tick(&mut self, price: f64, timestamp_millis: i64) {
        let outcome = match self.series.apply_tick(price, timestamp_millis) {
            Ok(outcome) => outcome,
            Err(error) => {
                debug!(%error, "tick dropped");
                return;
            }
        };

        match outcome {
            TickOutcome::Opened(candle) | TickOutcome::Amended(candle) => {
                self.indicators.recompute(&self.series);
                self.view.update(candle);
                let _ = self.price_tx.send(Some(price));
            }
            TickOutcome::Stale => {}
            TickOutcome::NoHistory => {
                debug!("tick before history baseline dropped");
            }
        }
    }

    pub fn set_chart_type(&mut self, chart_type: ChartType) {
        self.view.set_chart_type(chart_type);
    }

    pub fn set_indicator_visibility(&mut self, kind: IndicatorKind, visible: bool) {
        self.indicators.set_visible(kind, visible);
    }

    pub fn toggle_indicator(&mut self, kind: IndicatorKind) {
        self.indicators.toggle(kind);
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.drawings.set_tool(tool);
    }

    /// Committing pointer action, routed through the drawing layer with the
    /// renderer's coordinate mapping.
    pub fn commit_click(&mut self, pixel_y: u16) {
        self.drawings.commit_click(pixel_y, &self.view);
    }

    pub fn clear_annotations(&mut self) {
        self.drawings.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(time_millis: i64, close: f64) -> HistoryBar {
        HistoryBar {
            time: time_millis,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 2.0,
        }
    }

    fn loaded_engine() -> ChartEngine {
        let mut engine = ChartEngine::new("BTC/USDT", Interval::m1());
        let generation = engine.generation();
        engine
            .apply_history(generation, vec![bar(0, 100.0), bar(60_000, 101.0)])
            .unwrap();
        engine
    }

    #[test]
    fn test_history_flows_into_view_and_indicators() {
        let engine = loaded_engine();
        assert_eq!(engine.series().len(), 2);
        assert_eq!(engine.view().data().len(), 2);
        assert_eq!(*engine.subscribe_price().borrow(), Some(101.0));
    }

    #[test]
    fn test_stale_history_discarded() {
        let mut engine = loaded_engine();
        let old_generation = engine.generation();

        let new_generation = engine.set_symbol("ETH/USDT");
        assert!(new_generation > old_generation);
        assert!(engine.series().is_empty());

        // The old symbol's fetch lands late: it must not overwrite the reset
        // series.
        let err = engine
            .apply_history(old_generation, vec![bar(0, 9_999.0)])
            .unwrap_err();
        assert!(matches!(err, ChartError::StaleRequest { .. }));
        assert!(engine.series().is_empty());

        engine
            .apply_history(new_generation, vec![bar(0, 2_000.0)])
            .unwrap();
        assert_eq!(engine.series().last().unwrap().close, 2_000.0);
    }

    #[test]
    fn test_interval_change_resets_series() {
        let mut engine = loaded_engine();
        let generation = engine.set_interval(Interval::h1());
        assert_eq!(engine.interval(), Interval::h1());
        assert!(engine.series().is_empty());
        assert_eq!(*engine.subscribe_price().borrow(), None);
        assert_eq!(generation, engine.generation());
    }

    #[test]
    fn test_tick_fans_out_to_view_and_price_channel() {
        let mut engine = loaded_engine();
        let price_rx = engine.subscribe_price();

        // Amend inside the current bucket.
        engine.on_tick(101.5, 90_000);
        assert_eq!(engine.series().len(), 2);
        assert_eq!(engine.view().data().last().unwrap().close, 101.5);
        assert_eq!(*price_rx.borrow(), Some(101.5));

        // Open a new bucket.
        engine.on_tick(102.0, 125_000);
        assert_eq!(engine.series().len(), 3);
        assert_eq!(engine.view().data().len(), 3);
        assert_eq!(*price_rx.borrow(), Some(102.0));
    }

    #[test]
    fn test_malformed_and_stale_ticks_do_not_disturb_state() {
        let mut engine = loaded_engine();
        let before = engine.series().candles().to_vec();

        engine.on_tick(f64::NAN, 90_000);
        engine.on_tick(50.0, 1_000); // bucket before the last candle
        assert_eq!(engine.series().candles(), &before[..]);
        assert_eq!(*engine.subscribe_price().borrow(), Some(101.0));
    }

    #[test]
    fn test_tick_before_history_is_noop() {
        let mut engine = ChartEngine::new("BTC/USDT", Interval::m1());
        engine.on_tick(100.0, 30_000);
        assert!(engine.series().is_empty());
        assert_eq!(*engine.subscribe_price().borrow(), None);
    }

    #[test]
    fn test_command_surface_round_trip() {
        let mut engine = loaded_engine();

        engine.set_chart_type(ChartType::Line);
        assert_eq!(engine.view().chart_type(), ChartType::Line);

        engine.set_indicator_visibility(IndicatorKind::Rsi14, true);
        assert!(engine.indicators().is_visible(IndicatorKind::Rsi14));
        engine.toggle_indicator(IndicatorKind::Rsi14);
        assert!(!engine.indicators().is_visible(IndicatorKind::Rsi14));

        engine.set_tool(Tool::HorizontalLine);
        assert_eq!(engine.active_tool(), Tool::HorizontalLine);

        // No layout recorded yet: the click is a no-op, nothing committed.
        engine.commit_click(5);
        assert!(engine.annotations().is_empty());

        engine.clear_annotations();
        assert_eq!(engine.active_tool(), Tool::Cursor);
    }
}
