//! Watchlist screen rendering
//!
//! The watchlist is the market table filtered to watched coin ids; an empty
//! watchlist shows a hint on how to add coins.

use ratatui::Frame;

use crate::app::App;
use crate::ui::market_table::render_table_view;

/// Renders the watchlist view
pub fn render(frame: &mut Frame, app: &App) {
    let title = format!(" Watchlist ({}) ", app.watchlist.len());
    render_table_view(
        frame,
        app,
        &title,
        "Watchlist is empty - press b on a coin in the market view to add it",
    );
}
