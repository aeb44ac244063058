//! Coin detail screen rendering
//!
//! Shows headline stats derived from one coin's historical series (latest
//! price, approximate 24h change, market cap, volume) and a price sparkline
//! over the configured window. Stale data stays on screen with the error in
//! the footer when a refresh fails.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::App;
use crate::data::CoinSeries;
use crate::format::{format_change, format_dollar, format_price};
use crate::ui::widgets::PriceSparkline;

/// Headline numbers derived from a series
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DetailStats {
    pub latest_price: f64,
    pub change_percent: Option<f64>,
    pub market_cap: f64,
    pub volume: f64,
}

/// Derives the headline stats from a series
pub(crate) fn detail_stats(series: &CoinSeries) -> DetailStats {
    DetailStats {
        latest_price: series.latest_price().unwrap_or_default(),
        change_percent: series.day_change_percent(),
        market_cap: series.latest_market_cap().unwrap_or_default(),
        volume: series.latest_volume().unwrap_or_default(),
    }
}

/// Renders the coin detail view
pub fn render(frame: &mut Frame, app: &App, coin_id: &str) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(4),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .split(area);

    let Some(ref series) = app.detail_series else {
        render_title(frame, chunks[0], coin_id, None, app);
        let placeholder = Paragraph::new("No chart data available.")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(placeholder, chunks[2]);
        render_footer(frame, chunks[3], app);
        return;
    };

    let stats = detail_stats(series);
    render_title(frame, chunks[0], coin_id, stats.change_percent, app);
    render_stats(frame, chunks[1], &stats);
    render_chart(frame, chunks[2], series);
    render_footer(frame, chunks[3], app);
}

/// Renders the title line with the coin id and change badge
fn render_title(
    frame: &mut Frame,
    area: Rect,
    coin_id: &str,
    change: Option<f64>,
    app: &App,
) {
    let mut spans = vec![Span::styled(
        coin_id.to_string(),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )];

    if let Some(change) = change {
        let color = if change >= 0.0 { Color::Green } else { Color::Red };
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format_change(change),
            Style::default().fg(color),
        ));
    }

    if app.watchlist.contains(coin_id) {
        spans.push(Span::styled("  ★", Style::default().fg(Color::Yellow)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Renders the three stat panels
fn render_stats(frame: &mut Frame, area: Rect, stats: &DetailStats) {
    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(34),
            Constraint::Percentage(33),
            Constraint::Percentage(33),
        ])
        .split(area);

    render_stat_panel(frame, panels[0], "Price", format_price(stats.latest_price));
    render_stat_panel(
        frame,
        panels[1],
        "Market Cap",
        format_dollar(stats.market_cap),
    );
    render_stat_panel(frame, panels[2], "Volume (24h)", format_dollar(stats.volume));
}

fn render_stat_panel(frame: &mut Frame, area: Rect, label: &str, value: String) {
    let panel = Paragraph::new(vec![Line::from(Span::styled(
        value,
        Style::default().add_modifier(Modifier::BOLD),
    ))])
    .block(
        Block::default()
            .title(format!(" {} ", label))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    frame.render_widget(panel, area);
}

/// Renders the price chart block: range labels around a sparkline
fn render_chart(frame: &mut Frame, area: Rect, series: &CoinSeries) {
    let block = Block::default()
        .title(" Price history ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height < 2 || series.prices.is_empty() {
        return;
    }

    let values: Vec<f64> = series.prices.iter().map(|p| p.value).collect();
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(0)])
        .split(inner);

    frame.render_widget(PriceSparkline::new(&values).mark_latest(), rows[0]);

    let range = Line::from(vec![
        Span::styled(
            format!("low {}", format_price(min)),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw("  "),
        Span::styled(
            format!("high {}", format_price(max)),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    frame.render_widget(Paragraph::new(range), rows[1]);
}

/// Renders the footer line with status and key hints
fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let line = match app.status_message {
        Some(ref message) => Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Yellow),
        )),
        None => Line::from(Span::styled(
            "b watch  r reload  Esc back  ? help  q quit",
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SeriesPoint;
    use chrono::{TimeZone, Utc};

    fn point(hour: u32, value: f64) -> SeriesPoint {
        SeriesPoint {
            time: Utc.with_ymd_and_hms(2026, 8, 1, hour % 24, 0, 0).unwrap(),
            value,
        }
    }

    #[test]
    fn test_detail_stats_from_full_series() {
        let series = CoinSeries {
            id: "bitcoin".to_string(),
            prices: vec![point(0, 64000.0), point(1, 64231.0)],
            market_caps: vec![point(1, 1.26e12)],
            total_volumes: vec![point(1, 2.88e10)],
        };

        let stats = detail_stats(&series);
        assert!((stats.latest_price - 64231.0).abs() < 0.01);
        assert!((stats.market_cap - 1.26e12).abs() < 1.0);
        assert!((stats.volume - 2.88e10).abs() < 1.0);
        assert!(stats.change_percent.is_none(), "Too few points for 24h change");
    }

    #[test]
    fn test_detail_stats_from_empty_series() {
        let series = CoinSeries {
            id: "bitcoin".to_string(),
            prices: Vec::new(),
            market_caps: Vec::new(),
            total_volumes: Vec::new(),
        };

        let stats = detail_stats(&series);
        assert_eq!(stats.latest_price, 0.0);
        assert_eq!(stats.market_cap, 0.0);
        assert_eq!(stats.volume, 0.0);
        assert!(stats.change_percent.is_none());
    }
}
