//! Bottom bar: context-sensitive keybinding hints.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::Widget,
};

use crate::core::state::{AppState, ViewMode, MENU_AI, MENU_DOCKER, MENU_MYSQL, MENU_NODE,
    MENU_PORTS, MENU_POSTGRES, MENU_PYTHON, MENU_REDIS, MENU_TOP};
use crate::ui::theme::Theme;

pub struct Footer<'a> {
    state: &'a AppState,
    theme: &'a Theme,
}

impl<'a> Footer<'a> {
    pub fn new(state: &'a AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    fn hints(&self) -> Vec<(&'static str, &'static str)> {
        if self.state.ai.pending_command.is_some() {
            return vec![("enter", "run command"), ("esc", "cancel")];
        }
        if self.state.confirm.is_some() {
            return vec![("y", "confirm"), ("n/esc", "cancel")];
        }
        if self.state.log_overlay.is_some() {
            return vec![("ctrl-d/u", "scroll"), ("esc", "close")];
        }
        if self.state.view != ViewMode::Monitor {
            return vec![("g", "realtime"), ("h", "history"), ("esc", "back")];
        }

        let mut hints = vec![("↑↓", "navigate"), ("←→", "panel")];
        match self.state.selected_menu().name {
            MENU_DOCKER => hints.extend([
                ("space", "expand"),
                ("s", "start/stop"),
                ("r", "restart"),
                ("b", "rebuild"),
                ("d", "remove"),
                ("L", "logs"),
                ("c", "prune"),
            ]),
            MENU_POSTGRES => hints.extend([("d", "drop"), ("v", "vacuum")]),
            MENU_MYSQL => hints.extend([("d", "drop"), ("o", "optimize")]),
            MENU_REDIS => hints.push(("f", "flush")),
            MENU_NODE | MENU_PYTHON => {
                hints.extend([("x", "kill"), ("X", "force"), ("o", "editor"), ("L", "logs")])
            }
            MENU_PORTS | MENU_TOP => hints.extend([("x", "kill"), ("X", "force")]),
            MENU_AI => hints.extend([("a", "analyze"), ("tab", "model")]),
            _ => {}
        }
        hints.extend([("g", "graph"), ("q", "quit")]);
        hints
    }
}

impl Widget for Footer<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut spans = Vec::new();
        for (key, label) in self.hints() {
            spans.push(Span::styled(format!(" {} ", key), self.theme.styles.keybind_key));
            spans.push(Span::styled(format!("{}  ", label), self.theme.styles.keybind));
        }
        let line = Line::from(spans);
        buf.set_style(area, self.theme.styles.footer);
        buf.set_line(area.x, area.y, &line, area.width);
    }
}
