//! Color palettes and text styles.

use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,
    pub colors: ThemeColors,
    pub styles: ThemeStyles,
}

#[derive(Debug, Clone)]
pub struct ThemeColors {
    pub bg_primary: Color,
    pub bg_secondary: Color,

    pub fg_primary: Color,
    pub fg_secondary: Color,
    pub fg_muted: Color,

    pub accent: Color,

    pub success: Color,
    pub warning: Color,
    pub error: Color,

    pub border: Color,
    pub border_focused: Color,
    pub selection: Color,
}

#[derive(Debug, Clone)]
pub struct ThemeStyles {
    pub header: Style,
    pub footer: Style,
    pub panel_title: Style,
    pub panel_border: Style,
    pub panel_border_focused: Style,
    pub list_item: Style,
    pub list_item_selected: Style,
    pub status_running: Style,
    pub status_stopped: Style,
    pub sparkline: Style,
    pub keybind_key: Style,
    pub keybind: Style,
    pub banner_success: Style,
    pub banner_error: Style,
}

impl Theme {
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "dracula" => Self::dracula(),
            _ => Self::tokyo_night(),
        }
    }

    pub fn tokyo_night() -> Self {
        Self::build(
            "tokyo-night",
            ThemeColors {
                bg_primary: Color::Rgb(26, 27, 38),
                bg_secondary: Color::Rgb(36, 40, 59),
                fg_primary: Color::Rgb(192, 202, 245),
                fg_secondary: Color::Rgb(169, 177, 214),
                fg_muted: Color::Rgb(86, 95, 137),
                accent: Color::Rgb(122, 162, 247),
                success: Color::Rgb(158, 206, 106),
                warning: Color::Rgb(224, 175, 104),
                error: Color::Rgb(247, 118, 142),
                border: Color::Rgb(59, 66, 97),
                border_focused: Color::Rgb(122, 162, 247),
                selection: Color::Rgb(40, 52, 87),
            },
        )
    }

    pub fn dracula() -> Self {
        Self::build(
            "dracula",
            ThemeColors {
                bg_primary: Color::Rgb(40, 42, 54),
                bg_secondary: Color::Rgb(68, 71, 90),
                fg_primary: Color::Rgb(248, 248, 242),
                fg_secondary: Color::Rgb(189, 147, 249),
                fg_muted: Color::Rgb(98, 114, 164),
                accent: Color::Rgb(139, 233, 253),
                success: Color::Rgb(80, 250, 123),
                warning: Color::Rgb(241, 250, 140),
                error: Color::Rgb(255, 85, 85),
                border: Color::Rgb(68, 71, 90),
                border_focused: Color::Rgb(139, 233, 253),
                selection: Color::Rgb(68, 71, 90),
            },
        )
    }

    fn build(name: &str, colors: ThemeColors) -> Self {
        let styles = ThemeStyles {
            header: Style::default()
                .fg(colors.fg_primary)
                .bg(colors.bg_secondary)
                .add_modifier(Modifier::BOLD),
            footer: Style::default().fg(colors.fg_muted).bg(colors.bg_secondary),
            panel_title: Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
            panel_border: Style::default().fg(colors.border),
            panel_border_focused: Style::default().fg(colors.border_focused),
            list_item: Style::default().fg(colors.fg_secondary),
            list_item_selected: Style::default()
                .fg(colors.fg_primary)
                .bg(colors.selection)
                .add_modifier(Modifier::BOLD),
            status_running: Style::default().fg(colors.success),
            status_stopped: Style::default().fg(colors.error),
            sparkline: Style::default().fg(colors.accent),
            keybind_key: Style::default()
                .fg(colors.warning)
                .add_modifier(Modifier::BOLD),
            keybind: Style::default().fg(colors.fg_muted),
            banner_success: Style::default()
                .fg(colors.bg_primary)
                .bg(colors.success)
                .add_modifier(Modifier::BOLD),
            banner_error: Style::default()
                .fg(colors.fg_primary)
                .bg(colors.error)
                .add_modifier(Modifier::BOLD),
        };
        Self {
            name: name.to_string(),
            colors,
            styles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_fall_back_to_default() {
        assert_eq!(Theme::from_name("nope").name, "tokyo-night");
        assert_eq!(Theme::from_name("DRACULA").name, "dracula");
    }
}
