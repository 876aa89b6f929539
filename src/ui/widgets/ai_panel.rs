//! Assistant panel: model line, streamed response, pending-command prompt.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use crate::core::state::{AiPhase, AppState, PanelFocus};
use crate::ui::theme::Theme;

pub struct AiPanel<'a> {
    state: &'a AppState,
    theme: &'a Theme,
}

impl<'a> AiPanel<'a> {
    pub fn new(state: &'a AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }
}

impl Widget for AiPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let focused = self.state.focus == PanelFocus::Right;
        let block = Block::default()
            .title(Span::styled(" AI ASSIST ", self.theme.styles.panel_title))
            .borders(Borders::ALL)
            .border_style(if focused {
                self.theme.styles.panel_border_focused
            } else {
                self.theme.styles.panel_border
            })
            .style(Style::default().bg(self.theme.colors.bg_primary));
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height < 2 {
            return;
        }

        let ai = &self.state.ai;

        // Status and model line.
        let status = match ai.phase {
            AiPhase::Idle => {
                if ai.available {
                    Span::styled("ready — press a to analyze", self.theme.styles.list_item)
                } else {
                    Span::styled(
                        "unavailable — is Ollama running?",
                        self.theme.styles.status_stopped,
                    )
                }
            }
            AiPhase::Loading => Span::styled(
                "collecting context…",
                Style::default().fg(self.theme.colors.warning),
            ),
            AiPhase::Streaming => Span::styled(
                "analyzing…",
                Style::default().fg(self.theme.colors.warning),
            ),
            AiPhase::Success => Span::styled("analysis complete", self.theme.styles.status_running),
            AiPhase::Error => Span::styled("analysis failed", self.theme.styles.status_stopped),
        };
        let model = ai
            .current_model()
            .map(|m| format!("  model: {} (tab cycles)", m))
            .unwrap_or_default();
        buf.set_line(
            inner.x,
            inner.y,
            &Line::from(vec![
                status,
                Span::styled(model, Style::default().fg(self.theme.colors.fg_muted)),
            ]),
            inner.width,
        );

        // Reserve the bottom rows for the pending command / result bars.
        let mut reserved = 0u16;
        if ai.pending_command.is_some() {
            reserved += 2;
        }
        if ai.last_exec_result.is_some() {
            reserved += 1;
        }
        if inner.height < reserved + 3 {
            reserved = 0;
        }

        let body = Rect {
            x: inner.x,
            y: inner.y + 2,
            width: inner.width,
            height: inner.height.saturating_sub(2 + reserved),
        };
        if body.height > 0 && !ai.response.is_empty() {
            // Keep the tail of the stream in view.
            let wrapped_estimate: u32 = ai
                .response
                .lines()
                .map(|l| 1 + l.len() as u32 / inner.width.max(1) as u32)
                .sum();
            let scroll = wrapped_estimate.saturating_sub(body.height as u32).min(u16::MAX as u32) as u16;
            Paragraph::new(ai.response.as_str())
                .style(Style::default().fg(self.theme.colors.fg_primary))
                .wrap(Wrap { trim: false })
                .scroll((scroll, 0))
                .render(body, buf);
        }

        if reserved == 0 {
            return;
        }
        let mut y = (inner.y + inner.height).saturating_sub(reserved);
        if let Some(cmd) = &ai.pending_command {
            buf.set_line(
                inner.x,
                y,
                &Line::from(vec![
                    Span::styled(" suggested: ", self.theme.styles.keybind),
                    Span::styled(cmd.clone(), self.theme.styles.keybind_key),
                ]),
                inner.width,
            );
            buf.set_line(
                inner.x,
                y + 1,
                &Line::from(Span::styled(
                    " enter: run   esc: cancel",
                    self.theme.styles.keybind,
                )),
                inner.width,
            );
            y += 2;
        }
        if let Some(result) = &ai.last_exec_result {
            let first = result.lines().next().unwrap_or_default();
            buf.set_line(
                inner.x,
                y,
                &Line::from(Span::styled(
                    format!(" {}", first),
                    Style::default().fg(self.theme.colors.fg_secondary),
                )),
                inner.width,
            );
        }
    }
}
