//! Compare screen rendering
//!
//! Left pane: the market table with selection markers for the comparison
//! set. Right pane: one panel per compared coin with its headline numbers
//! and a price sparkline. Coins whose series failed to load show an error
//! line instead of a chart, without affecting the others.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use crate::app::App;
use crate::format::{format_change, format_price};
use crate::ui::market_table::change_color;
use crate::ui::widgets::PriceSparkline;

/// Marker shown in front of a coin row in the selection list
pub(crate) fn selection_marker(selected: bool) -> &'static str {
    if selected {
        "[x]"
    } else {
        "[ ]"
    }
}

/// Renders the compare view
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[0]);

    render_selection_list(frame, panes[0], app);
    render_charts(frame, panes[1], app);
    render_footer(frame, chunks[1], app);
}

/// Renders the coin list with selection markers
fn render_selection_list(frame: &mut Frame, area: Rect, app: &App) {
    let rows = app.visible_rows();

    let items: Vec<ListItem> = rows
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let selected = app.compare_selection.contains(&entry.id);
            let marker_style = if selected {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::DarkGray)
            };

            let mut line = vec![
                Span::styled(selection_marker(selected), marker_style),
                Span::raw(" "),
                Span::styled(entry.name.clone(), Style::default()),
                Span::styled(
                    format!(" {}", entry.symbol.to_uppercase()),
                    Style::default().fg(Color::DarkGray),
                ),
            ];
            if i == app.selected_index {
                line = line
                    .into_iter()
                    .map(|span| {
                        let style = span.style.add_modifier(Modifier::REVERSED);
                        Span::styled(span.content, style)
                    })
                    .collect();
            }
            ListItem::new(Line::from(line))
        })
        .collect();

    let title = format!(" Compare ({}/5) ", app.compare_selection.len());
    let list = List::new(items).block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(list, area);
}

/// Renders one chart panel per compared coin
fn render_charts(frame: &mut Frame, area: Rect, app: &App) {
    if app.compare_selection.is_empty() {
        let hint = Paragraph::new("Select up to 5 coins with Space, then press Enter.")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().title(" Price Comparison ").borders(Borders::ALL));
        frame.render_widget(hint, area);
        return;
    }

    let constraints: Vec<Constraint> = app
        .compare_selection
        .iter()
        .map(|_| Constraint::Ratio(1, app.compare_selection.len() as u32))
        .collect();
    let panels = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let errors = app.store().compare_errors();
    for (i, id) in app.compare_selection.iter().enumerate() {
        render_chart_panel(frame, panels[i], app, id, errors.get(id));
    }
}

/// Renders a single compared coin's panel
fn render_chart_panel(
    frame: &mut Frame,
    area: Rect,
    app: &App,
    id: &str,
    error: Option<&String>,
) {
    let block = Block::default()
        .title(format!(" {} ", id))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 {
        return;
    }

    let Some(series) = app.compare_series.get(id) else {
        let text = match error {
            Some(err) => format!("No data: {}", err),
            None => "Not loaded yet - press Enter".to_string(),
        };
        frame.render_widget(
            Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
            inner,
        );
        return;
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(inner);

    let latest = series.latest_price().unwrap_or_default();
    let change = series.day_change_percent();
    let mut header = vec![Span::styled(
        format_price(latest),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if let Some(change) = change {
        header.push(Span::raw("  "));
        header.push(Span::styled(
            format_change(change),
            Style::default().fg(change_color(change)),
        ));
    }
    if error.is_some() {
        // Data is a stale fallback; flag it without hiding the chart
        header.push(Span::styled("  (stale)", Style::default().fg(Color::Yellow)));
    }
    frame.render_widget(Paragraph::new(Line::from(header)), rows[0]);

    if rows[1].height > 0 {
        let values: Vec<f64> = series.prices.iter().map(|p| p.value).collect();
        let spark_color = change_color(change.unwrap_or(0.0));
        frame.render_widget(
            PriceSparkline::new(&values)
                .style(Style::default().fg(spark_color))
                .mark_latest(),
            rows[1],
        );
    }
}

/// Renders the footer line with status and key hints
fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let line = match app.status_message {
        Some(ref message) => Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Yellow),
        )),
        None => Line::from(Span::styled(
            "↑↓ move  Space select  Enter load charts  Esc back  q quit",
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}
