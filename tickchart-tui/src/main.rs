use std::{io, sync::Arc, time::Duration};

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, MouseButton,
        MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use rustls::crypto::ring::default_provider;
use tickchart_core::{IndicatorKind, Interval};
use tokio::sync::{Mutex, watch};
use tracing::warn;

use tickchart_tui::{
    ChartEngine, ChartType, FeedConfig, FeedStatus, Tool, feed, spawn_live_feed,
    spawn_simulated_feed,
};

const HISTORY_LIMIT: usize = 500;
const SYMBOLS: [&str; 3] = ["BTC/USDT", "ETH/USDT", "SOL/USDT"];

const C_DIM: Color = Color::Rgb(120, 120, 120);
const C_BRIGHT: Color = Color::Rgb(220, 220, 220);
const C_ACCENT: Color = Color::Rgb(100, 180, 220);
const C_BUY: Color = Color::Rgb(100, 220, 100);
const C_SELL: Color = Color::Rgb(220, 100, 100);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = default_provider().install_default();
    init_logging();

    // Restore the terminal before any panic output.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(info);
    }));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let config = FeedConfig::from_env();
    let symbol =
        std::env::var("TICKCHART_SYMBOL").unwrap_or_else(|_| SYMBOLS[0].to_string());
    let engine = Arc::new(Mutex::new(ChartEngine::new(symbol.clone(), Interval::m1())));

    let (status_tx, status_rx) = watch::channel(FeedStatus::Disconnected);

    // Live feed when a URL is configured, otherwise the simulated one.
    match config.ws_url.clone() {
        Some(url) => {
            spawn_live_feed(config.clone(), url, Arc::clone(&engine), status_tx);
        }
        None => {
            spawn_simulated_feed(Arc::clone(&engine), status_tx);
        }
    }

    // Initial historical snapshot.
    {
        let generation = engine.lock().await.generation();
        spawn_history_fetch(
            Arc::clone(&engine),
            config.clone(),
            generation,
            symbol,
            Interval::m1(),
        );
    }

    let res = run_app(&mut terminal, engine, config, status_rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

/// The alternate screen owns stdout, so logs only go to a file target.
fn init_logging() {
    let Ok(path) = std::env::var("TICKCHART_LOG") else {
        return;
    };
    let Ok(file) = std::fs::File::create(path) else {
        return;
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
}

/// Reload history for a new symbol/interval generation. The engine discards
/// the result if another change supersedes it first.
fn spawn_history_fetch(
    engine: Arc<Mutex<ChartEngine>>,
    config: FeedConfig,
    generation: u64,
    symbol: String,
    interval: Interval,
) {
    tokio::spawn(async move {
        let bars = if config.ws_url.is_none() {
            feed::simulated_history(interval, HISTORY_LIMIT)
        } else {
            let client = reqwest::Client::new();
            match feed::fetch_history(&client, &config, &symbol, interval, HISTORY_LIMIT).await {
                Ok(bars) => bars,
                Err(error) => {
                    warn!(%error, %symbol, "history fetch failed");
                    return;
                }
            }
        };

        if let Err(error) = engine.lock().await.apply_history(generation, bars) {
            warn!(%error, "history response discarded");
        }
    });
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    engine: Arc<Mutex<ChartEngine>>,
    config: FeedConfig,
    status_rx: watch::Receiver<FeedStatus>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = std::time::Instant::now();
    let price_rx = engine.lock().await.subscribe_price();

    loop {
        {
            let mut engine = engine.lock().await;
            let status = *status_rx.borrow();
            let price = *price_rx.borrow();
            terminal.draw(|f| ui(f, &mut engine, status, price))?;
        }

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if crossterm::event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) => {
                    if handle_key(key.code, &engine, &config).await {
                        return Ok(());
                    }
                }
                Event::Mouse(mouse) => {
                    if let MouseEventKind::Down(MouseButton::Left) = mouse.kind {
                        engine.lock().await.commit_click(mouse.row);
                    }
                }
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = std::time::Instant::now();
        }
    }
}

/// Handle one key press; returns true when the app should exit.
async fn handle_key(
    code: KeyCode,
    engine: &Arc<Mutex<ChartEngine>>,
    config: &FeedConfig,
) -> bool {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => return true,

        KeyCode::Char('1') => engine.lock().await.set_chart_type(ChartType::Candlestick),
        KeyCode::Char('2') => engine.lock().await.set_chart_type(ChartType::Area),
        KeyCode::Char('3') => engine.lock().await.set_chart_type(ChartType::Line),

        KeyCode::Char('[') => change_interval(engine, config, -1).await,
        KeyCode::Char(']') => change_interval(engine, config, 1).await,
        KeyCode::Tab => change_symbol(engine, config).await,

        KeyCode::Char('v') => engine.lock().await.set_tool(Tool::Cursor),
        KeyCode::Char('h') => engine.lock().await.set_tool(Tool::HorizontalLine),
        KeyCode::Char('t') => engine.lock().await.set_tool(Tool::Trendline),
        KeyCode::Char('b') => engine.lock().await.set_tool(Tool::Brush),
        KeyCode::Char('n') => engine.lock().await.set_tool(Tool::Text),
        KeyCode::Char('c') => engine.lock().await.clear_annotations(),

        KeyCode::Char('s') => engine.lock().await.toggle_indicator(IndicatorKind::Sma20),
        KeyCode::Char('f') => engine.lock().await.toggle_indicator(IndicatorKind::Sma50),
        KeyCode::Char('g') => engine.lock().await.toggle_indicator(IndicatorKind::Sma200),
        KeyCode::Char('r') => engine.lock().await.toggle_indicator(IndicatorKind::Rsi14),

        _ => {}
    }
    false
}

async fn change_interval(engine: &Arc<Mutex<ChartEngine>>, config: &FeedConfig, step: i32) {
    let (generation, symbol, interval) = {
        let mut engine = engine.lock().await;
        let all = Interval::all();
        let position = all
            .iter()
            .position(|i| *i == engine.interval())
            .unwrap_or(0);
        let next = position as i32 + step;
        if !(0..all.len() as i32).contains(&next) {
            return;
        }
        let interval = all[next as usize];
        let generation = engine.set_interval(interval);
        (generation, engine.symbol().to_string(), interval)
    };
    spawn_history_fetch(
        Arc::clone(engine),
        config.clone(),
        generation,
        symbol,
        interval,
    );
}

async fn change_symbol(engine: &Arc<Mutex<ChartEngine>>, config: &FeedConfig) {
    let (generation, symbol, interval) = {
        let mut engine = engine.lock().await;
        let position = SYMBOLS
            .iter()
            .position(|s| *s == engine.symbol())
            .unwrap_or(0);
        let symbol = SYMBOLS[(position + 1) % SYMBOLS.len()].to_string();
        let generation = engine.set_symbol(symbol.clone());
        (generation, symbol, engine.interval())
    };
    spawn_history_fetch(
        Arc::clone(engine),
        config.clone(),
        generation,
        symbol,
        interval,
    );
}

fn ui(f: &mut Frame, engine: &mut ChartEngine, status: FeedStatus, price: Option<f64>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_header(f, chunks[0], engine, status, price);

    let title = format!(
        "{} {} [{}]",
        engine.symbol(),
        engine.interval(),
        engine.view().chart_type().label()
    );
    let indicators = engine.indicators().clone();
    let annotations = engine.annotations().to_vec();
    engine
        .view_mut()
        .render(f, chunks[1], &title, &indicators, &annotations);

    render_help(f, chunks[2]);
}

fn render_header(
    f: &mut Frame,
    area: Rect,
    engine: &ChartEngine,
    status: FeedStatus,
    price: Option<f64>,
) {
    let (status_label, status_colour) = match status {
        FeedStatus::Connected => ("LIVE", C_BUY),
        FeedStatus::Reconnecting => ("RECONNECTING", Color::Rgb(220, 200, 100)),
        FeedStatus::Disconnected => ("OFFLINE", C_SELL),
    };

    let price_span = match price {
        Some(price) => {
            let colour = match engine.series().last() {
                Some(last) if last.is_bullish() => C_BUY,
                Some(_) => C_SELL,
                None => C_BRIGHT,
            };
            Span::styled(
                format!("{price:.2}"),
                Style::default().fg(colour).add_modifier(Modifier::BOLD),
            )
        }
        None => Span::styled("--", Style::default().fg(C_DIM)),
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", engine.symbol()),
            Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("{} ", engine.interval()), Style::default().fg(C_ACCENT)),
        price_span,
        Span::styled("  tool: ", Style::default().fg(C_DIM)),
        Span::styled(engine.active_tool().name(), Style::default().fg(C_ACCENT)),
        Span::styled(
            format!("  annotations: {}", engine.annotations().len()),
            Style::default().fg(C_DIM),
        ),
        Span::styled("  ", Style::default()),
        Span::styled(
            status_label,
            Style::default()
                .fg(status_colour)
                .add_modifier(Modifier::BOLD),
        ),
    ]);

    let header = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(C_DIM)),
    );
    f.render_widget(header, area);
}

fn render_help(f: &mut Frame, area: Rect) {
    let help = Paragraph::new(Line::from(Span::styled(
        " q quit | 1/2/3 chart type | [ ] timeframe | Tab symbol | h/t/b/n tools | v cursor | c clear | s/f/g SMA | r RSI | click to draw",
        Style::default().fg(C_DIM),
    )));
    f.render_widget(help, area);
}
