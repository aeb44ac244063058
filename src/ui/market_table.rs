//! Market overview table rendering
//!
//! Renders the main market view: a table of coins with price, 24h change,
//! market cap, volume, circulating supply, and distance from ATH, plus the
//! search bar and a footer carrying status and key hints.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::app::App;
use crate::data::MarketEntry;
use crate::format::{format_change, format_dollar, format_number, format_price};

/// Color for a percent change value
pub(crate) fn change_color(change: f64) -> Color {
    if change >= 0.0 {
        Color::Green
    } else {
        Color::Red
    }
}

/// Builds the table cells for one market row
pub(crate) fn row_cells(entry: &MarketEntry) -> Vec<Cell<'static>> {
    vec![
        Cell::from(Line::from(vec![
            Span::styled(
                entry.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" {}", entry.symbol.to_uppercase()),
                Style::default().fg(Color::DarkGray),
            ),
        ])),
        Cell::from(format_price(entry.current_price)),
        Cell::from(Span::styled(
            format_change(entry.price_change_percentage_24h),
            Style::default().fg(change_color(entry.price_change_percentage_24h)),
        )),
        Cell::from(format_dollar(entry.market_cap)),
        Cell::from(format_dollar(entry.total_volume)),
        Cell::from(format_number(entry.circulating_supply)),
        Cell::from(Span::styled(
            format_change(entry.ath_change_percentage),
            Style::default().fg(Color::DarkGray),
        )),
    ]
}

/// Renders the market overview view
pub fn render(frame: &mut Frame, app: &App) {
    render_table_view(frame, app, " Market Overview ", "No market data yet");
}

/// Renders a market-style table view with the given title
///
/// Shared between the market overview and the watchlist view; the rows come
/// from the app's current visible set.
pub(crate) fn render_table_view(frame: &mut Frame, app: &App, title: &str, empty_hint: &str) {
    let area = frame.area();

    let search_height = if app.search_input.is_some() { 3 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(search_height),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    if let Some(ref input) = app.search_input {
        render_search_bar(frame, chunks[0], input);
    }

    let rows = app.visible_rows();
    if rows.is_empty() {
        let hint = Paragraph::new(empty_hint.to_string())
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().title(title.to_string()).borders(Borders::ALL));
        frame.render_widget(hint, chunks[1]);
    } else {
        render_rows(frame, chunks[1], app, &rows, title);
    }

    render_footer(frame, chunks[2], app);
}

/// Renders the search input line
fn render_search_bar(frame: &mut Frame, area: Rect, input: &str) {
    let text = Line::from(vec![
        Span::styled("Search: ", Style::default().fg(Color::Cyan)),
        Span::raw(input.to_string()),
        Span::styled("█", Style::default().fg(Color::Cyan)),
    ]);
    let bar = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(bar, area);
}

/// Renders the coin table with the selected row highlighted
fn render_rows(frame: &mut Frame, area: Rect, app: &App, rows: &[&MarketEntry], title: &str) {
    let header = Row::new(vec![
        Cell::from("Name"),
        Cell::from("Price"),
        Cell::from("24h%"),
        Cell::from("Market Cap"),
        Cell::from("Volume (24h)"),
        Cell::from("Supply"),
        Cell::from("From ATH"),
    ])
    .style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );

    let table_rows: Vec<Row> = rows
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let mut row = Row::new(row_cells(entry));
            if i == app.selected_index {
                row = row.style(Style::default().add_modifier(Modifier::REVERSED));
            }
            // Watched coins carry a subtle marker on the row
            if app.watchlist.contains(&entry.id) && i != app.selected_index {
                row = row.style(Style::default().fg(Color::Yellow));
            }
            row
        })
        .collect();

    let table = Table::new(
        table_rows,
        [
            Constraint::Min(18),
            Constraint::Length(14),
            Constraint::Length(9),
            Constraint::Length(12),
            Constraint::Length(13),
            Constraint::Length(10),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .block(Block::default().title(title.to_string()).borders(Borders::ALL));

    frame.render_widget(table, area);
}

/// Renders the footer line with status, refresh state, and key hints
fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = Vec::new();

    if app.store().is_refreshing() {
        spans.push(Span::styled("↻ refreshing  ", Style::default().fg(Color::Cyan)));
    } else if app.store().is_loading() {
        spans.push(Span::styled("… loading  ", Style::default().fg(Color::Cyan)));
    } else if let Some(err) = app.store().market_error() {
        spans.push(Span::styled(
            format!("⚠ {}  ", err),
            Style::default().fg(Color::Red),
        ));
    } else if let Some(fetched_at) = app.store().market_fetched_at() {
        let local = fetched_at.with_timezone(&chrono::Local);
        spans.push(Span::styled(
            format!("updated {}  ", local.format("%H:%M:%S")),
            Style::default().fg(Color::DarkGray),
        ));
    }

    if let Some(ref message) = app.status_message {
        spans.push(Span::styled(
            message.clone(),
            Style::default().fg(Color::Yellow),
        ));
    } else {
        spans.push(Span::styled(
            "↑↓ move  Enter open  / search  Space select  c compare  w watchlist  b watch  r refresh  ? help  q quit",
            Style::default().fg(Color::DarkGray),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
