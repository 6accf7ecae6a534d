//! Series renderer: maps candle + indicator data onto the terminal chart
//! surface and exposes the pixel<->price mapping the drawing layer anchors to.
//!
//! The main price series is exactly one of candlestick / area / line at a
//! time; switching type destroys and recreates the series state rather than
//! mutating it in place. The volume histogram is a separate sub-panel whose
//! colouring follows the owning candle's close-vs-open comparison.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Sparkline},
};
use tickchart_core::{Candle, IndicatorKind, IndicatorSet};

use crate::drawing::Annotation;

// Palette shared with the rest of the UI
const C_BUY: Color = Color::Rgb(100, 220, 100);
const C_SELL: Color = Color::Rgb(220, 100, 100);
const C_DIM: Color = Color::Rgb(120, 120, 120);
const C_BRIGHT: Color = Color::Rgb(220, 220, 220);
const C_ACCENT: Color = Color::Rgb(100, 180, 220);
const C_ANNOTATION: Color = Color::Rgb(0, 200, 200);

const GLYPH_BODY: char = '┃';
const GLYPH_WICK: char = '│';
const GLYPH_LINE: char = '─';
const GLYPH_AREA_EDGE: char = '█';
const GLYPH_AREA_FILL: char = '░';
const GLYPH_OVERLAY: char = '·';

/// Chart presentation types for the main price series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartType {
    #[default]
    Candlestick,
    Area,
    Line,
}

impl ChartType {
    pub fn label(&self) -> &'static str {
        match self {
            ChartType::Candlestick => "Candles",
            ChartType::Area => "Area",
            ChartType::Line => "Line",
        }
    }
}

/// The owned main-series resource. Recreated whole on every type switch so a
/// presentation change can never leak state between chart types.
#[derive(Debug, Clone)]
enum MainSeries {
    Candlestick(Vec<Candle>),
    Area(Vec<Candle>),
    Line(Vec<Candle>),
}

impl MainSeries {
    fn create(chart_type: ChartType, data: Vec<Candle>) -> Self {
        match chart_type {
            ChartType::Candlestick => MainSeries::Candlestick(data),
            ChartType::Area => MainSeries::Area(data),
            ChartType::Line => MainSeries::Line(data),
        }
    }

    fn chart_type(&self) -> ChartType {
        match self {
            MainSeries::Candlestick(_) => ChartType::Candlestick,
            MainSeries::Area(_) => ChartType::Area,
            MainSeries::Line(_) => ChartType::Line,
        }
    }

    fn data(&self) -> &[Candle] {
        match self {
            MainSeries::Candlestick(data) | MainSeries::Area(data) | MainSeries::Line(data) => {
                data
            }
        }
    }

    fn data_mut(&mut self) -> &mut Vec<Candle> {
        match self {
            MainSeries::Candlestick(data) | MainSeries::Area(data) | MainSeries::Line(data) => {
                data
            }
        }
    }

    fn destroy(self) -> Vec<Candle> {
        match self {
            MainSeries::Candlestick(data) | MainSeries::Area(data) | MainSeries::Line(data) => {
                data
            }
        }
    }
}

/// Price-axis layout recorded by the last render pass. Coordinate queries are
/// answered from this; before the first pass they fail gracefully with `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PriceLayout {
    /// Price panel region, in terminal cells.
    panel: Rect,
    min_price: f64,
    max_price: f64,
}

/// The visual chart surface for one chart instance.
pub struct ChartView {
    main: MainSeries,
    layout: Option<PriceLayout>,
}

impl ChartView {
    pub fn new(chart_type: ChartType) -> Self {
        Self {
            main: MainSeries::create(chart_type, Vec::new()),
            layout: None,
        }
    }

    pub fn chart_type(&self) -> ChartType {
        self.main.chart_type()
    }

    /// Switch the main series presentation.
    ///
    /// The old series resource is destroyed and a new one created around the
    /// same candle dataset, so the visible data survives the switch.
    pub fn set_chart_type(&mut self, chart_type: ChartType) {
        if chart_type == self.main.chart_type() {
            return;
        }
        let old = std::mem::replace(&mut self.main, MainSeries::create(chart_type, Vec::new()));
        *self.main.data_mut() = old.destroy();
    }

    /// Replace the full visible dataset.
    pub fn set_data(&mut self, candles: &[Candle]) {
        let data = self.main.data_mut();
        data.clear();
        data.extend_from_slice(candles);
    }

    /// O(1) amend of the most recent point, appending when the candle opens a
    /// new bucket. Used for live ticks to avoid full redraw cost.
    pub fn update(&mut self, candle: Candle) {
        let data = self.main.data_mut();
        if let Some(last) = data.last_mut() {
            if last.time == candle.time {
                *last = candle;
                return;
            }
            // Out-of-order updates never reach the surface; the aggregator
            // rejects them upstream.
            if last.time > candle.time {
                return;
            }
        }
        data.push(candle);
    }

    pub fn data(&self) -> &[Candle] {
        self.main.data()
    }

    /// Resolve a terminal row to a price using the last rendered layout.
    pub fn price_at(&self, pixel_y: u16) -> Option<f64> {
        let layout = self.layout?;
        let panel = layout.panel;
        if pixel_y < panel.y || pixel_y >= panel.y + panel.height || panel.height == 0 {
            return None;
        }
        let span = layout.max_price - layout.min_price;
        let row = (pixel_y - panel.y) as f64 + 0.5;
        Some(layout.max_price - row / panel.height as f64 * span)
    }

    /// Inverse of [`ChartView::price_at`]: the terminal row a price maps to.
    pub fn y_at(&self, price: f64) -> Option<u16> {
        let layout = self.layout?;
        let panel = layout.panel;
        let span = layout.max_price - layout.min_price;
        if panel.height == 0 || span <= 0.0 || !price.is_finite() {
            return None;
        }
        let row = (layout.max_price - price) / span * panel.height as f64;
        if row < 0.0 || row >= panel.height as f64 {
            return None;
        }
        Some(panel.y + row as u16)
    }

    /// Render the chart surface and record the coordinate layout.
    pub fn render(
        &mut self,
        f: &mut Frame,
        area: Rect,
        title: &str,
        indicators: &IndicatorSet,
        annotations: &[Annotation],
    ) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(C_DIM))
            .title(Span::styled(
                format!(" {title} "),
                Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD),
            ));
        let inner = block.inner(area);
        f.render_widget(block, area);

        if self.main.data().is_empty() || inner.height < 4 {
            self.layout = None;
            let waiting = Paragraph::new(Line::from(Span::styled(
                "Waiting for historical data...",
                Style::default().fg(C_DIM),
            )));
            f.render_widget(waiting, inner);
            return;
        }

        // Panel split: price on top, volume strip below, RSI sub-panel when
        // visible.
        let rsi_visible = indicators.is_visible(IndicatorKind::Rsi14);
        let rsi_height = if rsi_visible && inner.height >= 10 { 4 } else { 0 };
        let volume_height = (inner.height / 5).clamp(1, 6);
        let price_height = inner.height - volume_height - rsi_height;

        let price_panel = Rect { height: price_height, ..inner };
        let volume_panel = Rect {
            y: inner.y + price_height,
            height: volume_height,
            ..inner
        };
        let rsi_panel = Rect {
            y: inner.y + price_height + volume_height,
            height: rsi_height,
            ..inner
        };

        let visible_offset = self.main.data().len().saturating_sub(inner.width as usize);
        let visible: &[Candle] = &self.main.data()[visible_offset..];

        let (min_price, max_price) = price_bounds(visible);
        self.layout = Some(PriceLayout {
            panel: price_panel,
            min_price,
            max_price,
        });

        self.render_price_panel(
            f,
            price_panel,
            visible,
            visible_offset,
            indicators,
            annotations,
        );
        render_volume_panel(f, volume_panel, visible);
        if rsi_height > 0 {
            render_rsi_panel(f, rsi_panel, indicators, visible_offset, visible.len());
        }
    }

    fn render_price_panel(
        &self,
        f: &mut Frame,
        panel: Rect,
        visible: &[Candle],
        visible_offset: usize,
        indicators: &IndicatorSet,
        annotations: &[Annotation],
    ) {
        let Some(layout) = self.layout else { return };
        let rows = panel.height as usize;
        let cols = panel.width as usize;
        let span = layout.max_price - layout.min_price;
        let step = span / rows as f64;

        // Cell grid, one (glyph, style) per terminal cell.
        let blank = (' ', Style::default());
        let mut grid = vec![vec![blank; cols]; rows];

        for (col, candle) in visible.iter().enumerate().take(cols) {
            let colour = if candle.is_bullish() { C_BUY } else { C_SELL };
            match self.main.chart_type() {
                ChartType::Candlestick => {
                    let body_hi = candle.open.max(candle.close);
                    let body_lo = candle.open.min(candle.close);
                    for (row, cells) in grid.iter_mut().enumerate() {
                        let band_hi = layout.max_price - row as f64 * step;
                        let band_lo = band_hi - step;
                        let glyph = if body_hi >= band_lo && body_lo <= band_hi {
                            Some(GLYPH_BODY)
                        } else if candle.high >= band_lo && candle.low <= band_hi {
                            Some(GLYPH_WICK)
                        } else {
                            None
                        };
                        if let Some(glyph) = glyph {
                            cells[col] = (glyph, Style::default().fg(colour));
                        }
                    }
                }
                ChartType::Line => {
                    if let Some(row) = row_of(candle.close, &layout, rows) {
                        grid[row][col] = (GLYPH_LINE, Style::default().fg(C_ACCENT));
                    }
                }
                ChartType::Area => {
                    if let Some(close_row) = row_of(candle.close, &layout, rows) {
                        grid[close_row][col] = (GLYPH_AREA_EDGE, Style::default().fg(C_ACCENT));
                        for row in grid.iter_mut().take(rows).skip(close_row + 1) {
                            row[col] = (GLYPH_AREA_FILL, Style::default().fg(C_DIM));
                        }
                    }
                }
            }
        }

        // SMA overlays draw over the main series.
        for series in indicators.visible_overlays() {
            let colour = overlay_colour(series.kind);
            for col in 0..visible.len().min(cols) {
                let Some(value) = series.at(visible_offset + col) else {
                    continue;
                };
                if let Some(row) = row_of(value, &layout, rows) {
                    grid[row][col] = (GLYPH_OVERLAY, Style::default().fg(colour));
                }
            }
        }

        // Horizontal price-line annotations fill the gaps in their row.
        for annotation in annotations {
            let Some(y) = self.y_at(annotation.price) else {
                continue;
            };
            let row = (y - panel.y) as usize;
            for cell in grid[row].iter_mut() {
                if cell.0 == ' ' {
                    *cell = (GLYPH_LINE, Style::default().fg(C_ANNOTATION));
                }
            }
        }

        let lines: Vec<Line> = grid
            .into_iter()
            .map(|cells| {
                Line::from(
                    cells
                        .into_iter()
                        .map(|(glyph, style)| Span::styled(glyph.to_string(), style))
                        .collect::<Vec<_>>(),
                )
            })
            .collect();
        f.render_widget(Paragraph::new(lines), panel);
    }
}

fn price_bounds(visible: &[Candle]) -> (f64, f64) {
    let mut min = f64::MAX;
    let mut max = f64::MIN;
    for candle in visible {
        min = min.min(candle.low);
        max = max.max(candle.high);
    }
    if min > max {
        return (0.0, 1.0);
    }
    // Flat windows still need a non-zero span to map onto rows.
    if max - min < f64::EPSILON {
        return (min - 1.0, max + 1.0);
    }
    let pad = (max - min) * 0.02;
    (min - pad, max + pad)
}

fn row_of(price: f64, layout: &PriceLayout, rows: usize) -> Option<usize> {
    let span = layout.max_price - layout.min_price;
    if span <= 0.0 || rows == 0 {
        return None;
    }
    let row = ((layout.max_price - price) / span * rows as f64) as isize;
    if (0..rows as isize).contains(&row) {
        Some(row as usize)
    } else {
        None
    }
}

fn overlay_colour(kind: IndicatorKind) -> Color {
    match kind {
        IndicatorKind::Sma20 => Color::Rgb(100, 180, 220),
        IndicatorKind::Sma50 => Color::Rgb(220, 200, 100),
        IndicatorKind::Sma200 => Color::Rgb(200, 120, 220),
        IndicatorKind::Rsi14 => C_DIM,
    }
}

fn render_volume_panel(f: &mut Frame, panel: Rect, visible: &[Candle]) {
    let rows = panel.height as usize;
    let cols = panel.width as usize;
    if rows == 0 || cols == 0 {
        return;
    }

    let max_volume = visible
        .iter()
        .map(|c| c.volume)
        .fold(0.0f64, f64::max);

    let mut lines = Vec::with_capacity(rows);
    for row in 0..rows {
        let mut spans = Vec::with_capacity(cols);
        for col in 0..cols {
            let span = match visible.get(col) {
                Some(candle) if max_volume > 0.0 => {
                    let bar_rows =
                        ((candle.volume / max_volume) * rows as f64).ceil() as usize;
                    if rows - row <= bar_rows {
                        let colour = if candle.is_bullish() { C_BUY } else { C_SELL };
                        Span::styled("█", Style::default().fg(colour))
                    } else {
                        Span::raw(" ")
                    }
                }
                _ => Span::raw(" "),
            };
            spans.push(span);
        }
        lines.push(Line::from(spans));
    }
    f.render_widget(Paragraph::new(lines), panel);
}

fn render_rsi_panel(
    f: &mut Frame,
    panel: Rect,
    indicators: &IndicatorSet,
    visible_offset: usize,
    visible_len: usize,
) {
    let Some(series) = indicators.series(IndicatorKind::Rsi14) else {
        return;
    };
    let data: Vec<u64> = (0..visible_len)
        .filter_map(|col| series.at(visible_offset + col))
        .map(|v| v.round().clamp(0.0, 100.0) as u64)
        .collect();

    let latest = series.latest();
    let title = match latest {
        Some(value) => format!(" RSI 14: {value:.1} "),
        None => " RSI 14 ".to_string(),
    };
    let colour = match latest {
        Some(v) if v >= 70.0 => C_SELL,
        Some(v) if v <= 30.0 => C_BUY,
        _ => C_DIM,
    };

    let sparkline = Sparkline::default()
        .block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(C_DIM))
                .title(Span::styled(title, Style::default().fg(colour))),
        )
        .data(&data)
        .max(100)
        .style(Style::default().fg(C_ACCENT));
    f.render_widget(sparkline, panel);
}
