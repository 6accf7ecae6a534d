//! Tickchart TUI - Shared Library
//!
//! Terminal front-end for the tickchart engine:
//! - Series renderer mapping candles + indicators to chart presentation
//!   types, with the pixel<->price mapping used by the drawing layer
//! - Drawing tools and price-anchored annotations
//! - The chart engine command surface shared by the UI loop and feed tasks
//! - WebSocket live feed adapter and REST historical fetch

pub mod drawing;
pub mod engine;
pub mod feed;
pub mod render;

// Re-export commonly used types for convenience
pub use drawing::{Annotation, AnnotationId, AnnotationKind, DrawingLayer, Tool};
pub use engine::ChartEngine;
pub use feed::{FeedConfig, FeedStatus, fetch_history, spawn_live_feed, spawn_simulated_feed};
pub use render::{ChartType, ChartView};
