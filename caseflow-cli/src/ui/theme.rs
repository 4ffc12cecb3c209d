//! Color palette and style helpers for the console TUI.

use ratatui::style::{Color, Modifier, Style};

use caseflow_core::activity_log::LogLevel;
use caseflow_core::notices::NoticeLevel;
use caseflow_core::status::CanonicalStatus;

#[derive(Clone, Debug)]
pub struct Palette {
    pub panel_border: Color,
    pub text: Color,
    pub text_dim: Color,
    pub text_muted: Color,
    pub accent: Color,
    pub success: Color,
    pub warn: Color,
    pub error: Color,
    pub info: Color,
    pub selection_bg: Color,
    pub selection_fg: Color,
    pub key_hint: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self::dark()
    }
}

impl Palette {
    pub fn dark() -> Self {
        Self {
            panel_border: Color::Rgb(60, 60, 60),
            text: Color::Rgb(212, 212, 212),
            text_dim: Color::Rgb(150, 150, 150),
            text_muted: Color::Rgb(100, 100, 100),
            accent: Color::Rgb(79, 193, 255),
            success: Color::Rgb(78, 201, 176),
            warn: Color::Rgb(220, 180, 100),
            error: Color::Rgb(244, 135, 113),
            info: Color::Rgb(156, 220, 254),
            selection_bg: Color::Rgb(38, 79, 120),
            selection_fg: Color::White,
            key_hint: Color::Rgb(206, 145, 120),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Theme {
    pub palette: Palette,
}

impl Theme {
    pub fn status_style(&self, status: CanonicalStatus) -> Style {
        let color = match status {
            CanonicalStatus::Running => self.palette.info,
            CanonicalStatus::Finished => self.palette.success,
            CanonicalStatus::Halted => self.palette.warn,
            CanonicalStatus::Failed => self.palette.error,
            CanonicalStatus::Terminated => self.palette.text_dim,
            CanonicalStatus::Dormant | CanonicalStatus::Unknown => self.palette.text_muted,
        };
        Style::default().fg(color)
    }

    pub fn notice_style(&self, level: NoticeLevel) -> Style {
        let color = match level {
            NoticeLevel::Info => self.palette.info,
            NoticeLevel::Success => self.palette.success,
            NoticeLevel::Warn => self.palette.warn,
            NoticeLevel::Error => self.palette.error,
        };
        Style::default().fg(color)
    }

    pub fn log_level_style(&self, level: LogLevel) -> Style {
        match level {
            LogLevel::Debug => Style::default().fg(self.palette.text_muted),
            LogLevel::Info => Style::default().fg(self.palette.text),
            LogLevel::Warn => Style::default().fg(self.palette.warn),
            LogLevel::Error => Style::default()
                .fg(self.palette.error)
                .add_modifier(Modifier::BOLD),
        }
    }

    pub fn tab_style(&self, active: bool) -> Style {
        if active {
            Style::default()
                .fg(self.palette.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(self.palette.text_dim)
        }
    }

    pub fn border_style(&self, focused: bool) -> Style {
        if focused {
            Style::default().fg(self.palette.accent)
        } else {
            Style::default().fg(self.palette.panel_border)
        }
    }

    pub fn selection_style(&self) -> Style {
        Style::default()
            .bg(self.palette.selection_bg)
            .fg(self.palette.selection_fg)
            .add_modifier(Modifier::BOLD)
    }
}

static DEFAULT_THEME: std::sync::OnceLock<Theme> = std::sync::OnceLock::new();

pub fn theme() -> &'static Theme {
    DEFAULT_THEME.get_or_init(Theme::default)
}

pub mod styles {
    use super::*;

    pub fn status(status: CanonicalStatus) -> Style {
        theme().status_style(status)
    }

    pub fn notice(level: NoticeLevel) -> Style {
        theme().notice_style(level)
    }

    pub fn log_level(level: LogLevel) -> Style {
        theme().log_level_style(level)
    }

    pub fn tab(active: bool) -> Style {
        theme().tab_style(active)
    }

    pub fn border(focused: bool) -> Style {
        theme().border_style(focused)
    }

    pub fn selection() -> Style {
        theme().selection_style()
    }

    pub fn key_hint() -> Style {
        Style::default().fg(theme().palette.key_hint)
    }

    pub fn text() -> Style {
        Style::default().fg(theme().palette.text)
    }

    pub fn text_dim() -> Style {
        Style::default().fg(theme().palette.text_dim)
    }

    pub fn text_muted() -> Style {
        Style::default().fg(theme().palette.text_muted)
    }

    pub fn accent_bold() -> Style {
        Style::default()
            .fg(theme().palette.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn error() -> Style {
        Style::default().fg(theme().palette.error)
    }

    pub fn warn() -> Style {
        Style::default().fg(theme().palette.warn)
    }
}
