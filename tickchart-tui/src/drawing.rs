//! Drawing tools and price-anchored annotations.
//!
//! A small interaction state machine: exactly one tool is active at a time,
//! and a committing pointer action while a drawing tool is selected resolves
//! the pointer's row to a price through the renderer's coordinate mapping.
//! Drawing tools are one-shot - completing an action resets to the cursor.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::render::ChartView;

/// Available interaction tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Cursor,
    Trendline,
    HorizontalLine,
    Brush,
    Text,
}

impl Tool {
    /// Display name for the toolbar.
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Cursor => "Cursor",
            Tool::Trendline => "Trend",
            Tool::HorizontalLine => "H-Line",
            Tool::Brush => "Brush",
            Tool::Text => "Text",
        }
    }

    pub fn all() -> &'static [Tool] {
        &[
            Tool::Cursor,
            Tool::Trendline,
            Tool::HorizontalLine,
            Tool::Brush,
            Tool::Text,
        ]
    }
}

/// Unique identifier for an annotation, scoped to its owning layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnnotationId(u64);

/// Annotation kinds the drawing layer can commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    HorizontalPriceLine,
}

/// A user-drawn marker anchored by price coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub id: AnnotationId,
    pub kind: AnnotationKind,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

/// Interaction state machine turning pointer input plus the active tool
/// selection into persisted annotations.
#[derive(Debug, Default)]
pub struct DrawingLayer {
    active_tool: Tool,
    annotations: Vec<Annotation>,
    next_id: u64,
}

impl DrawingLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_tool(&self) -> Tool {
        self.active_tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.active_tool = tool;
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Handle a committing pointer action at terminal row `pixel_y`.
    ///
    /// With the horizontal-line tool active, the row is resolved to a price
    /// via the renderer's mapping; success creates an annotation and resets
    /// the tool to the cursor. Unresolvable coordinates (no chart rendered
    /// yet, click outside the price panel) are a no-op. The remaining tools
    /// are selectable placeholder surface and commit nothing yet.
    pub fn commit_click(&mut self, pixel_y: u16, view: &ChartView) -> Option<&Annotation> {
        match self.active_tool {
            Tool::HorizontalLine => {
                let price = view.price_at(pixel_y)?;
                let annotation = Annotation {
                    id: self.allocate_id(),
                    kind: AnnotationKind::HorizontalPriceLine,
                    price,
                    created_at: Utc::now(),
                };
                debug!(price, "horizontal price line committed");
                self.annotations.push(annotation);
                self.active_tool = Tool::Cursor;
                self.annotations.last()
            }
            Tool::Trendline | Tool::Brush | Tool::Text => {
                self.active_tool = Tool::Cursor;
                None
            }
            Tool::Cursor => None,
        }
    }

    /// Remove a single annotation by id.
    pub fn remove(&mut self, id: AnnotationId) -> bool {
        let before = self.annotations.len();
        self.annotations.retain(|a| a.id != id);
        self.annotations.len() != before
    }

    /// Remove every annotation and reset the tool state. The only bulk
    /// destructive operation on the layer.
    pub fn clear_all(&mut self) {
        self.annotations.clear();
        self.active_tool = Tool::Cursor;
    }

    fn allocate_id(&mut self) -> AnnotationId {
        self.next_id += 1;
        AnnotationId(self.next_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ChartType;
    use tickchart_core::Candle;

    // A view with no recorded layout: every coordinate query fails.
    fn unrendered_view() -> ChartView {
        let mut view = ChartView::new(ChartType::Candlestick);
        view.set_data(&[Candle::new(0, 100.0, 101.0, 99.0, 100.5, 1.0)]);
        view
    }

    #[test]
    fn test_default_tool_is_cursor() {
        let layer = DrawingLayer::new();
        assert_eq!(layer.active_tool(), Tool::Cursor);
        assert!(layer.annotations().is_empty());
    }

    #[test]
    fn test_cursor_click_commits_nothing() {
        let mut layer = DrawingLayer::new();
        assert!(layer.commit_click(5, &unrendered_view()).is_none());
        assert!(layer.annotations().is_empty());
    }

    #[test]
    fn test_unresolvable_coordinate_is_noop_and_keeps_tool() {
        let mut layer = DrawingLayer::new();
        layer.set_tool(Tool::HorizontalLine);

        // No layout recorded yet: resolution fails, nothing committed, the
        // tool stays armed for the next click.
        assert!(layer.commit_click(5, &unrendered_view()).is_none());
        assert!(layer.annotations().is_empty());
        assert_eq!(layer.active_tool(), Tool::HorizontalLine);
    }

    #[test]
    fn test_placeholder_tools_reset_without_committing() {
        for tool in [Tool::Trendline, Tool::Brush, Tool::Text] {
            let mut layer = DrawingLayer::new();
            layer.set_tool(tool);
            assert!(layer.commit_click(5, &unrendered_view()).is_none());
            assert_eq!(layer.active_tool(), Tool::Cursor);
        }
    }

    #[test]
    fn test_horizontal_line_commit_creates_annotation_and_resets_tool() {
        use ratatui::{Terminal, backend::TestBackend};
        use tickchart_core::IndicatorSet;

        let mut view = unrendered_view();
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal
            .draw(|f| {
                let area = f.area();
                view.render(f, area, "BTC/USDT 1m", &IndicatorSet::new(), &[]);
            })
            .unwrap();

        let mut layer = DrawingLayer::new();
        layer.set_tool(Tool::HorizontalLine);

        let committed = layer.commit_click(5, &view).cloned().unwrap();
        assert_eq!(committed.kind, AnnotationKind::HorizontalPriceLine);
        assert_eq!(Some(committed.price), view.price_at(5));

        // One-shot tool: the commit hands control back to the cursor.
        assert_eq!(layer.active_tool(), Tool::Cursor);
        assert_eq!(layer.annotations(), &[committed]);
    }

    #[test]
    fn test_remove_and_clear_all() {
        let mut layer = DrawingLayer::new();
        let first = Annotation {
            id: layer.allocate_id(),
            kind: AnnotationKind::HorizontalPriceLine,
            price: 100.0,
            created_at: Utc::now(),
        };
        let second = Annotation {
            id: layer.allocate_id(),
            kind: AnnotationKind::HorizontalPriceLine,
            price: 105.0,
            created_at: Utc::now(),
        };
        assert_ne!(first.id, second.id);
        layer.annotations.push(first.clone());
        layer.annotations.push(second.clone());

        assert!(layer.remove(first.id));
        assert!(!layer.remove(first.id));
        assert_eq!(layer.annotations(), &[second]);

        layer.set_tool(Tool::HorizontalLine);
        layer.clear_all();
        assert!(layer.annotations().is_empty());
        assert_eq!(layer.active_tool(), Tool::Cursor);
    }
}
