//! Top bar: program title, resource summary, assistant availability.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::core::state::AppState;
use crate::probes::inject::DemoPhase;
use crate::probes::system;
use crate::ui::theme::Theme;

pub struct Header<'a> {
    state: &'a AppState,
    theme: &'a Theme,
}

impl<'a> Header<'a> {
    pub fn new(state: &'a AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }
}

impl Widget for Header<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.styles.panel_border)
            .style(Style::default().bg(self.theme.colors.bg_primary));
        let inner = block.inner(area);
        block.render(area, buf);

        let resources = self
            .state
            .resources
            .as_ref()
            .map(system::format_resources)
            .unwrap_or_else(|| "sampling...".to_string());

        let ai = if self.state.ai.available {
            Span::styled(" AI:ready ", self.theme.styles.status_running)
        } else {
            Span::styled(" AI:unavailable ", self.theme.styles.status_stopped)
        };

        let mut spans = vec![
            Span::styled(" devmon ", self.theme.styles.header),
            Span::raw("  "),
            Span::styled(resources, Style::default().fg(self.theme.colors.fg_secondary)),
            Span::raw("  "),
            ai,
        ];
        if self.state.demo != DemoPhase::Normal {
            spans.push(Span::styled(
                format!(" demo:{:?} ", self.state.demo),
                Style::default().fg(self.theme.colors.warning),
            ));
        }
        if !self.state.status_line.is_empty() {
            spans.push(Span::styled(
                format!("  {}", self.state.status_line),
                Style::default().fg(self.theme.colors.warning),
            ));
        }

        Paragraph::new(Line::from(spans)).render(inner, buf);
    }
}
