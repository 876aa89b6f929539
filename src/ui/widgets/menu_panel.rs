//! Left menu: services and info views with liveness icons.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::core::state::{AppState, MenuKind, PanelFocus};
use crate::ui::theme::Theme;

pub struct MenuPanel<'a> {
    state: &'a AppState,
    theme: &'a Theme,
}

impl<'a> MenuPanel<'a> {
    pub fn new(state: &'a AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }
}

impl Widget for MenuPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let focused = self.state.focus == PanelFocus::Left;
        let block = Block::default()
            .title(Span::styled(" SERVICES ", self.theme.styles.panel_title))
            .borders(Borders::ALL)
            .border_style(if focused {
                self.theme.styles.panel_border_focused
            } else {
                self.theme.styles.panel_border
            })
            .style(Style::default().bg(self.theme.colors.bg_primary));
        let inner = block.inner(area);
        block.render(area, buf);

        for (i, item) in self.state.menu.iter().enumerate() {
            if i as u16 >= inner.height {
                break;
            }
            let y = inner.y + i as u16;

            if item.kind == MenuKind::Separator {
                let sep = Span::styled(
                    "─".repeat(inner.width as usize),
                    Style::default().fg(self.theme.colors.border),
                );
                buf.set_span(inner.x, y, &sep, inner.width);
                continue;
            }

            let icon = match item.kind {
                MenuKind::Service => match item.up {
                    Some(true) => Span::styled("✓ ", self.theme.styles.status_running),
                    Some(false) => Span::styled("✗ ", self.theme.styles.status_stopped),
                    None => Span::styled("· ", Style::default().fg(self.theme.colors.fg_muted)),
                },
                MenuKind::Ai => Span::styled("◆ ", Style::default().fg(self.theme.colors.accent)),
                _ => Span::raw("  "),
            };

            let style = if i == self.state.selected {
                self.theme.styles.list_item_selected
            } else {
                self.theme.styles.list_item
            };

            let line = Line::from(vec![icon, Span::styled(item.name, style)]);
            buf.set_line(inner.x, y, &line, inner.width);
        }
    }
}
