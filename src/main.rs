//! coindeck - cryptocurrency market dashboard for the terminal
//!
//! A terminal UI application that displays market data, historical price
//! charts, coin search, a multi-coin comparison view, and a persisted
//! watchlist, sourced from the CoinGecko API.

mod app;
mod cli;
mod data;
mod format;
mod refresh;
mod store;
mod ui;
mod watchlist;

use std::io;
use std::panic;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use app::{App, AppState};
use cli::{Cli, StartupConfig};
use data::CoinGeckoClient;
use refresh::{RefreshConfig, RefreshHandle};
use store::{CryptoStore, SnapshotStore, StoreConfig, SystemClock};
use watchlist::Watchlist;

/// Sets up a panic hook that restores the terminal before printing the panic message.
/// This ensures the terminal is usable even if the application panics.
fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Attempt to restore the terminal
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        // Call the original panic hook
        original_hook(panic_info);
    }));
}

/// Routes tracing output to a log file when RUST_LOG is set
///
/// Stdout belongs to the TUI, so events go to `coindeck.log` in the cache
/// directory; without RUST_LOG no subscriber is installed at all.
fn init_tracing() {
    if std::env::var("RUST_LOG").is_err() {
        return;
    }
    let Some(dirs) = directories::ProjectDirs::from("", "", "coindeck") else {
        return;
    };
    let dir = dirs.cache_dir().to_path_buf();
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = std::fs::File::create(dir.join("coindeck.log")) else {
        return;
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

/// Renders the UI based on the current application state
fn render_ui(frame: &mut ratatui::Frame, app: &App) {
    match &app.state {
        AppState::Loading => {
            render_loading(frame);
        }
        AppState::MarketTable => {
            ui::render_market_table(frame, app);
        }
        AppState::CoinDetail(coin_id) => {
            ui::render_coin_detail(frame, app, coin_id);
        }
        AppState::Compare => {
            ui::render_compare(frame, app);
        }
        AppState::Watchlist => {
            ui::render_watchlist(frame, app);
        }
    }

    if app.show_help {
        ui::render_help_overlay(frame);
    }
}

/// Renders a loading message while data is being fetched
fn render_loading(frame: &mut ratatui::Frame) {
    use ratatui::{
        layout::{Alignment, Constraint, Direction, Layout},
        style::{Color, Style},
        widgets::Paragraph,
    };

    let area = frame.area();

    // Center the loading message vertically
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Length(3),
            Constraint::Percentage(45),
        ])
        .split(area);

    let loading_text = Paragraph::new("Loading market data...")
        .style(Style::default().fg(Color::Cyan))
        .alignment(Alignment::Center);

    frame.render_widget(loading_text, chunks[1]);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let startup = match StartupConfig::from_cli(&cli) {
        Ok(startup) => startup,
        Err(err) => {
            eprintln!("Error: {}", err);
            std::process::exit(1);
        }
    };

    init_tracing();

    // Wire the store from its parts; the chart window comes from the CLI
    let config = StoreConfig {
        days_window: startup.days,
        ..Default::default()
    };
    let api = Arc::new(CoinGeckoClient::new());
    let store = CryptoStore::with_parts(api, Arc::new(SystemClock), SnapshotStore::new(), config);
    let watchlist = Watchlist::load();

    let refresh_config = RefreshConfig {
        enabled: startup.auto_refresh,
        ..Default::default()
    };
    let mut refresh_handle = RefreshHandle::spawn(refresh_config);

    let mut app = App::with_startup_config(store, watchlist, startup);

    // Set up panic hook to restore terminal on crash
    setup_panic_hook();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Initial render to show loading state
    terminal.draw(|f| render_ui(f, &app))?;

    // Trigger initial data load
    app.load_initial().await;

    // Main event loop
    loop {
        // Render UI
        terminal.draw(|f| render_ui(f, &app))?;

        // Poll for keyboard events with 100ms timeout
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key);
            }
        }

        // Background refresh ticks feed the same path as pressing 'r'
        if refresh::try_recv(&mut refresh_handle).is_some() {
            app.refresh_requested = true;
        }

        // Drive any deferred store work recorded by key handling
        app.process_pending().await;

        // Check if we should quit
        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    Ok(())
}
