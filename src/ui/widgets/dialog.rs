//! Centered confirmation dialog.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};

use crate::core::state::ConfirmState;
use crate::ui::theme::Theme;

pub struct ConfirmDialog<'a> {
    confirm: &'a ConfirmState,
    theme: &'a Theme,
}

impl<'a> ConfirmDialog<'a> {
    pub fn new(confirm: &'a ConfirmState, theme: &'a Theme) -> Self {
        Self { confirm, theme }
    }
}

impl Widget for ConfirmDialog<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let dialog = centered_rect(50, 30, area);
        Clear.render(dialog, buf);

        let title = if self.confirm.ai_proactive {
            " Automatic Recovery "
        } else {
            " Confirm "
        };
        let block = Block::default()
            .title(Span::styled(title, self.theme.styles.panel_title))
            .borders(Borders::ALL)
            .border_style(self.theme.styles.panel_border_focused)
            .style(Style::default().bg(self.theme.colors.bg_secondary));
        let inner = block.inner(dialog);
        block.render(dialog, buf);

        if inner.height < 3 {
            return;
        }

        Paragraph::new(self.confirm.message.as_str())
            .style(Style::default().fg(self.theme.colors.fg_primary))
            .wrap(Wrap { trim: false })
            .render(
                Rect {
                    height: inner.height - 2,
                    ..inner
                },
                buf,
            );

        let buttons = Line::from(vec![
            Span::styled("[Y]es", self.theme.styles.keybind_key),
            Span::styled("   ", self.theme.styles.keybind),
            Span::styled("[N]o", self.theme.styles.keybind_key),
        ]);
        Paragraph::new(buttons)
            .alignment(ratatui::layout::Alignment::Center)
            .render(
                Rect {
                    y: inner.y + inner.height - 1,
                    height: 1,
                    ..inner
                },
                buf,
            );
    }
}

pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    use ratatui::layout::{Constraint, Direction, Layout};

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
