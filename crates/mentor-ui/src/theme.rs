use mentor_core::Theme;
use ratatui::style::{Color, Modifier, Style};

/// Colors for one [`Theme`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuiTheme {
    pub background: Color,
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub success: Color,
    pub error: Color,
    pub surface: Color,
}

impl TuiTheme {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                background: Color::Rgb(2, 6, 23),
                text: Color::Rgb(226, 232, 240),
                muted: Color::Rgb(100, 116, 139),
                accent: Color::Rgb(129, 140, 248),
                success: Color::Rgb(52, 211, 153),
                error: Color::Rgb(248, 113, 113),
                surface: Color::Rgb(15, 23, 42),
            },
            Theme::Light => Self {
                background: Color::Rgb(248, 250, 252),
                text: Color::Rgb(15, 23, 42),
                muted: Color::Rgb(100, 116, 139),
                accent: Color::Rgb(79, 70, 229),
                success: Color::Rgb(5, 150, 105),
                error: Color::Rgb(220, 38, 38),
                surface: Color::Rgb(226, 232, 240),
            },
        }
    }

    pub fn base(&self) -> Style {
        Style::default().fg(self.text).bg(self.background)
    }

    pub fn dim(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn heading(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn highlight(&self) -> Style {
        Style::default()
            .fg(self.background)
            .bg(self.accent)
            .add_modifier(Modifier::BOLD)
    }
}
