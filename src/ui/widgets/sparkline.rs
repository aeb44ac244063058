//! Price sparkline widget for inline chart rendering

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// Block characters for different price levels (8 levels)
const BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// A sparkline widget showing a price series over time
///
/// The series is normalized between its own minimum and maximum so that
/// small relative moves remain visible; a flat series renders mid-height.
pub struct PriceSparkline<'a> {
    /// Price values for each time slot
    values: &'a [f64],
    /// Style for the sparkline
    style: Style,
    /// Style for the latest value marker
    marker_style: Style,
    /// Whether to highlight the latest value
    mark_latest: bool,
}

impl<'a> PriceSparkline<'a> {
    pub fn new(values: &'a [f64]) -> Self {
        Self {
            values,
            style: Style::default().fg(Color::Cyan),
            marker_style: Style::default().fg(Color::Yellow),
            mark_latest: false,
        }
    }

    pub fn mark_latest(mut self) -> Self {
        self.mark_latest = true;
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    fn value_to_block(value: f64, min: f64, max: f64) -> char {
        let range = max - min;
        let normalized = if range > 0.0 {
            ((value - min) / range).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let index = ((normalized * 7.0).round() as usize).min(7);
        BLOCKS[index]
    }

    /// Resamples the series down to `width` points by taking the tail
    ///
    /// A terminal cell can only show one value, so when the series is longer
    /// than the area the most recent points win.
    fn visible_values(&self, width: usize) -> &[f64] {
        if self.values.len() > width {
            &self.values[self.values.len() - width..]
        } else {
            self.values
        }
    }
}

impl<'a> Widget for PriceSparkline<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 || self.values.is_empty() {
            return;
        }

        let visible = self.visible_values(area.width as usize);
        let min = visible.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = visible.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        for (i, value) in visible.iter().enumerate() {
            let block = Self::value_to_block(*value, min, max);
            let x = area.x + i as u16;
            let y = area.y;

            let style = if self.mark_latest && i == visible.len() - 1 {
                self.marker_style
            } else {
                self.style
            };

            if let Some(cell) = buf.cell_mut((x, y)) {
                cell.set_char(block).set_style(style);
            }
        }
    }
}
