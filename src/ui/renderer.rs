//! Main UI renderer: a pure function from controller state to a frame.
//!
//! No I/O, no timers, no blocking calls. Everything it shows comes from the
//! cached state the controller maintains.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::Span,
    widgets::{Paragraph, Widget},
    Frame,
};

use crate::core::state::{AppState, ViewMode, MENU_AI};
use crate::ui::theme::Theme;
use crate::ui::widgets::*;

pub struct Renderer;

impl Renderer {
    pub fn render(frame: &mut Frame, state: &AppState, theme: &Theme) {
        let area = frame.area();

        // A zero-sized terminal has nothing to lay out.
        if area.width < 4 || area.height < 4 {
            frame.render_widget(Paragraph::new("initializing"), area);
            return;
        }

        frame.render_widget(
            ratatui::widgets::Block::default()
                .style(Style::default().bg(theme.colors.bg_primary)),
            area,
        );

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(4),
                Constraint::Length(1),
            ])
            .split(area);

        frame.render_widget(Header::new(state, theme), rows[0]);
        frame.render_widget(Footer::new(state, theme), rows[2]);

        match state.view {
            ViewMode::Monitor => Self::render_monitor(frame, state, theme, rows[1]),
            ViewMode::GraphRealtime | ViewMode::GraphHistory => {
                frame.render_widget(GraphView::new(state, theme), rows[1]);
            }
        }

        // Overlays, outermost last.
        if let Some(overlay) = &state.log_overlay {
            frame.render_widget(LogOverlayView::new(overlay, theme), area);
        }
        if let Some(confirm) = &state.confirm {
            frame.render_widget(ConfirmDialog::new(confirm, theme), area);
        }
        if let Some(banner) = &state.banner {
            Self::render_banner(frame, state, theme, banner);
        }
    }

    fn render_monitor(frame: &mut Frame, state: &AppState, theme: &Theme, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(28), Constraint::Percentage(72)])
            .split(area);

        frame.render_widget(MenuPanel::new(state, theme), columns[0]);

        if state.selected_menu().name == MENU_AI {
            frame.render_widget(AiPanel::new(state, theme), columns[1]);
        } else {
            frame.render_widget(DetailPanel::new(state, theme), columns[1]);
        }
    }

    fn render_banner(
        frame: &mut Frame,
        state: &AppState,
        theme: &Theme,
        banner: &crate::core::state::Banner,
    ) {
        let area = frame.area();
        let first_line = banner.message.lines().next().unwrap_or_default();
        let msg = format!(
            " {} {} ",
            if banner.success { "✓" } else { "✗" },
            first_line
        );
        let width = (msg.chars().count() as u16).min(area.width.saturating_sub(2));
        if width == 0 {
            return;
        }
        let rect = Rect {
            x: area.width.saturating_sub(width + 1),
            y: 1,
            width,
            height: 1,
        };
        let style = if banner.success {
            theme.styles.banner_success
        } else {
            theme.styles.banner_error
        };
        // Suppress the banner while a dialog sits on top of it.
        if state.confirm.is_none() {
            Paragraph::new(Span::styled(msg, style)).render(rect, frame.buffer_mut());
        }
    }
}
