//! Full-screen log viewer. While open it owns the keyboard.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::Span,
    widgets::{Block, Borders, Clear, Widget},
};

use crate::core::state::LogOverlay;
use crate::ui::theme::Theme;

pub struct LogOverlayView<'a> {
    overlay: &'a LogOverlay,
    theme: &'a Theme,
}

impl<'a> LogOverlayView<'a> {
    pub fn new(overlay: &'a LogOverlay, theme: &'a Theme) -> Self {
        Self { overlay, theme }
    }
}

impl Widget for LogOverlayView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let margin = Rect {
            x: area.x + 2,
            y: area.y + 1,
            width: area.width.saturating_sub(4),
            height: area.height.saturating_sub(2),
        };
        Clear.render(margin, buf);

        let block = Block::default()
            .title(Span::styled(
                format!(" LOGS — {} ", self.overlay.target),
                self.theme.styles.panel_title,
            ))
            .borders(Borders::ALL)
            .border_style(self.theme.styles.panel_border_focused)
            .style(Style::default().bg(self.theme.colors.bg_secondary));
        let inner = block.inner(margin);
        block.render(margin, buf);

        if inner.height < 2 {
            return;
        }

        let lines: Vec<&str> = self.overlay.content.lines().collect();
        let page = inner.height.saturating_sub(1) as usize;
        let max_offset = lines.len().saturating_sub(page);
        // usize::MAX from a fresh fetch clamps to the bottom.
        let offset = self.overlay.scroll.min(max_offset);

        for (i, line) in lines.iter().skip(offset).take(page).enumerate() {
            buf.set_span(
                inner.x,
                inner.y + i as u16,
                &Span::styled(*line, Style::default().fg(self.theme.colors.fg_primary)),
                inner.width,
            );
        }

        let hint = format!(
            " ctrl-d/ctrl-u: scroll   esc: close   ({}/{} lines)",
            offset.saturating_add(page).min(lines.len()),
            lines.len()
        );
        buf.set_span(
            inner.x,
            inner.y + inner.height - 1,
            &Span::styled(hint, self.theme.styles.keybind),
            inner.width,
        );
    }
}
