//! Theme configuration for the TUI.
//!
//! Supports light and dark themes with automatic terminal detection.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::data::SeriesKey;
use crate::gateway::ConnectionState;
use crate::session::SessionState;

/// Color and style theme for the TUI.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent color for highlights and active elements.
    pub highlight: Color,
    /// Color for degraded states (connecting, guard armed).
    pub warning: Color,
    /// Color for alerts and lost connections.
    pub critical: Color,
    /// Color for live, healthy states.
    pub healthy: Color,
    /// Color for borders and separators.
    pub border: Color,
    /// Style for header rows in tables.
    pub header: Style,
    /// Style for selected/highlighted rows.
    pub selected: Style,
    /// Style for the active tab.
    pub tab_active: Style,
    /// Style for inactive tabs.
    pub tab_inactive: Style,
    /// Border style (rounded, plain, etc.).
    pub border_type: BorderType,
    /// Line colors per vital sign, indexed like [`SeriesKey::ALL`].
    pub series: [Color; 6],
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            border: Color::Gray,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            selected: Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD),
            tab_active: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::Gray),
            border_type: BorderType::Rounded,
            series: [
                Color::LightRed,
                Color::LightCyan,
                Color::LightYellow,
                Color::LightMagenta,
                Color::LightBlue,
                Color::LightGreen,
            ],
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            border: Color::DarkGray,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            selected: Style::default().bg(Color::LightBlue).add_modifier(Modifier::BOLD),
            tab_active: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::DarkGray),
            border_type: BorderType::Rounded,
            series: [
                Color::Red,
                Color::Blue,
                Color::Magenta,
                Color::Rgb(160, 60, 0),
                Color::Rgb(0, 90, 160),
                Color::Green,
            ],
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Line color for a series.
    pub fn series_color(&self, key: SeriesKey) -> Color {
        let index = SeriesKey::ALL.iter().position(|k| *k == key).unwrap_or(0);
        self.series[index]
    }

    /// Style for a gateway connection state.
    pub fn connection_style(&self, state: ConnectionState) -> Style {
        match state {
            ConnectionState::Connected => Style::default().fg(self.healthy),
            ConnectionState::Connecting => Style::default().fg(self.warning),
            ConnectionState::Disconnected => {
                Style::default().fg(self.critical).add_modifier(Modifier::BOLD)
            }
        }
    }

    /// Style for a session state.
    pub fn session_style(&self, state: SessionState) -> Style {
        match state {
            SessionState::Monitoring => Style::default().fg(self.healthy).add_modifier(Modifier::BOLD),
            SessionState::Connected | SessionState::Stopped => Style::default().fg(self.highlight),
            SessionState::Connecting => Style::default().fg(self.warning),
            SessionState::Idle => Style::default().add_modifier(Modifier::DIM),
        }
    }
}
