//! Right panel: selectable rows for the current service plus the cached
//! detail text. Reads cached values only; an empty cache entry renders a
//! loading placeholder.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::core::state::{AppState, PanelFocus, RightItemKind};
use crate::ui::theme::Theme;

pub struct DetailPanel<'a> {
    state: &'a AppState,
    theme: &'a Theme,
}

impl<'a> DetailPanel<'a> {
    pub fn new(state: &'a AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    fn row_label(&self, index: usize) -> Option<String> {
        let item = self.state.right_items.get(index)?;
        let label = match item.kind {
            RightItemKind::Project => {
                let arrow = if item.expanded { "▾" } else { "▸" };
                format!("{} {} (project)", arrow, item.name)
            }
            RightItemKind::Container => {
                let status = self
                    .state
                    .containers
                    .iter()
                    .find(|c| Some(&c.id) == item.container_id.as_ref())
                    .map(|c| c.status_text.clone())
                    .unwrap_or_default();
                let stats = item
                    .container_id
                    .as_ref()
                    .and_then(|id| self.state.container_stats.get(id))
                    .map(|s| format!(" | CPU {} | MEM {}", s.cpu_display, s.mem_display))
                    .unwrap_or_default();
                format!("  {} [{}]{}", item.name, status, stats)
            }
            RightItemKind::Database => format!("  {}", item.name),
            RightItemKind::Process => format!("  PID {}", item.name),
            RightItemKind::Port => {
                let info = self
                    .state
                    .ports
                    .iter()
                    .find(|p| p.port.to_string() == item.name)
                    .map(|p| format!(" | {} (PID {})", p.process, p.pid))
                    .unwrap_or_default();
                format!("  :{}{}", item.name, info)
            }
            RightItemKind::ProcessItem => {
                let pid = item.pid.as_deref().unwrap_or("?");
                format!("  {} (PID {})", item.name, pid)
            }
        };
        Some(label)
    }
}

impl Widget for DetailPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let focused = self.state.focus == PanelFocus::Right;
        let selected = self.state.selected_menu();

        let mut title = format!(" {} ", selected.name.to_uppercase());
        if self.state.cache.is_updating(selected.name) {
            title.push_str("(updating…) ");
        }

        let block = Block::default()
            .title(Span::styled(title, self.theme.styles.panel_title))
            .borders(Borders::ALL)
            .border_style(if focused {
                self.theme.styles.panel_border_focused
            } else {
                self.theme.styles.panel_border
            })
            .style(Style::default().bg(self.theme.colors.bg_primary));
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height == 0 || inner.width == 0 {
            return;
        }

        let mut y = inner.y;
        let bottom = inner.y + inner.height;

        // Selectable rows first, honoring project collapse.
        for index in 0..self.state.right_items.len() {
            if y >= bottom {
                return;
            }
            if !self.state.is_item_visible(index) {
                continue;
            }
            let Some(label) = self.row_label(index) else {
                continue;
            };
            let style = if focused && index == self.state.right_cursor {
                self.theme.styles.list_item_selected
            } else {
                self.theme.styles.list_item
            };
            buf.set_span(inner.x, y, &Span::styled(label, style), inner.width);
            y += 1;
        }

        if !self.state.right_items.is_empty() && y < bottom {
            y += 1; // gap between rows and the detail text
        }

        // Cached detail text below, scrolled.
        let entry = self.state.cache.get(selected.name);
        let text = match entry {
            Some(entry) if !entry.is_empty() => entry.data.clone(),
            _ => "loading…".to_string(),
        };

        let lines: Vec<&str> = text.lines().collect();
        let offset = self.state.detail_scroll.min(lines.len().saturating_sub(1));
        for line in lines.iter().skip(offset) {
            if y >= bottom {
                break;
            }
            buf.set_line(
                inner.x,
                y,
                &Line::from(Span::styled(
                    *line,
                    Style::default().fg(self.theme.colors.fg_primary),
                )),
                inner.width,
            );
            y += 1;
        }
    }
}
