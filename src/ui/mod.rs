//! UI module: rendering, theme and widgets for the TUI.

pub mod renderer;
pub mod theme;
pub mod widgets;
