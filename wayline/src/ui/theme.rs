//! Color theme and styling for the presentation TUI

use ratatui::style::{Color, Modifier, Style};

/// UI color theme
#[derive(Debug, Clone)]
pub struct Theme {
    pub foreground: Color,
    pub border: Color,
    pub accent: Color,

    // Media readiness
    pub ready: Color,
    pub loading: Color,
    pub failed: Color,

    pub locked: Color,
    pub muted_text: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            foreground: Color::White,
            border: Color::DarkGray,
            accent: Color::Cyan,

            ready: Color::Green,
            loading: Color::Yellow,
            failed: Color::Red,

            locked: Color::DarkGray,
            muted_text: Color::DarkGray,
        }
    }
}

impl Theme {
    pub fn text_style(&self) -> Style {
        Style::default().fg(self.foreground)
    }

    pub fn accent_style(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub fn dim_style(&self) -> Style {
        Style::default().fg(self.muted_text)
    }

    pub fn border_style(&self) -> Style {
        Style::default().fg(self.border)
    }
}
