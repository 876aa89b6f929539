//! Full-screen CPU graphs: realtime samples and the 3-day hourly history.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::Span,
    widgets::{Block, Borders, Sparkline, Widget},
};

use crate::core::state::{AppState, ViewMode};
use crate::ui::theme::Theme;

pub struct GraphView<'a> {
    state: &'a AppState,
    theme: &'a Theme,
}

impl<'a> GraphView<'a> {
    pub fn new(state: &'a AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }
}

impl Widget for GraphView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = match self.state.view {
            ViewMode::GraphHistory => " CPU — 3-DAY HISTORY (hourly avg) ",
            _ => " CPU — REALTIME ",
        };
        let block = Block::default()
            .title(Span::styled(title, self.theme.styles.panel_title))
            .borders(Borders::ALL)
            .border_style(self.theme.styles.panel_border_focused)
            .style(Style::default().bg(self.theme.colors.bg_primary));
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height < 2 || inner.width == 0 {
            return;
        }

        if self.state.graph_data.is_empty() {
            let msg = if self.state.status_line.is_empty() {
                "no samples recorded yet"
            } else {
                self.state.status_line.as_str()
            };
            buf.set_span(
                inner.x + 1,
                inner.y + inner.height / 2,
                &Span::styled(msg, Style::default().fg(self.theme.colors.fg_muted)),
                inner.width.saturating_sub(2),
            );
            return;
        }

        let data: Vec<u64> = self
            .state
            .graph_data
            .iter()
            .map(|v| v.max(0.0).round() as u64)
            .collect();
        let latest = *self.state.graph_data.last().unwrap_or(&0.0);
        let peak = self.state.graph_data.iter().cloned().fold(0.0f64, f64::max);

        let chart_area = Rect {
            x: inner.x,
            y: inner.y,
            width: inner.width,
            height: inner.height - 1,
        };
        Sparkline::default()
            .data(&data)
            .style(self.theme.styles.sparkline)
            .render(chart_area, buf);

        let legend = format!(
            "samples: {}  latest: {:.1}%  peak: {:.1}%  (esc: back, g: realtime, h: history)",
            data.len(),
            latest,
            peak
        );
        buf.set_span(
            inner.x,
            inner.y + inner.height - 1,
            &Span::styled(legend, Style::default().fg(self.theme.colors.fg_muted)),
            inner.width,
        );
    }
}
