//! Common UI components shared across views.
//!
//! This module contains the header bar, tab bar, status bar, and the help
//! and quit-confirmation overlays.

use std::time::Instant;

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::app::{App, View};
use crate::data::duration::format_countdown;
use crate::identity::MonitoringMode;

/// Render the header bar with session overview.
///
/// Displays: connection indicator, user, monitored subject, session state and
/// the commit countdown while the guard is armed.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let dashboard = app.dashboard();
    let status = dashboard.connection_status();
    let state = dashboard.state();
    let user = dashboard.user();

    let subject = match dashboard.mode() {
        MonitoringMode::SelfMonitoring { subject } => format!("self (#{subject})"),
        MonitoringMode::Supervising {
            selected: Some(subject),
            ..
        } => format!("patient #{subject}"),
        MonitoringMode::Supervising { selected: None, .. } => "no patient selected".to_string(),
    };

    let connection = if status.exhausted {
        "offline".to_string()
    } else if status.attempt > 0 && !status.is_connected() {
        format!("retry {}/{}", status.attempt, dashboard.max_retries())
    } else {
        status.state.label().to_string()
    };

    let mut spans = vec![
        Span::styled(" ● ", app.theme.connection_style(status.state)),
        Span::styled("VITALWATCH ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::raw(user.display_name()),
        Span::styled(
            format!(" ({})", user.role.wire_name()),
            Style::default().add_modifier(Modifier::DIM),
        ),
        Span::raw(" │ "),
        Span::styled(subject, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" │ "),
        Span::styled(connection, app.theme.connection_style(status.state)),
        Span::raw(" │ "),
        Span::styled(state.label().to_uppercase(), app.theme.session_style(state)),
    ];

    if let Some(remaining) = dashboard.guard_remaining(Instant::now()) {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled(
            format!("commit {}", format_countdown(remaining)),
            Style::default().fg(app.theme.warning),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the tab bar showing available views.
///
/// Highlights the currently active view.
pub fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let alerts = app.dashboard().alerts().len();
    let titles: Vec<Line> = vec![
        Line::from(" 1:Vitals "),
        if alerts > 0 {
            Line::from(Span::styled(
                format!(" 2:Alerts ({alerts}) "),
                Style::default().fg(app.theme.critical),
            ))
        } else {
            Line::from(" 2:Alerts ")
        },
        Line::from(format!(" 3:Records ({}) ", app.record_log.len())),
    ];

    let selected = match app.current_view {
        View::Vitals => 0,
        View::Alerts => 1,
        View::Records => 2,
    };

    let tabs = Tabs::new(titles)
        .select(selected)
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");

    frame.render_widget(tabs, area);
}

/// Render the status bar at the bottom.
///
/// Shows temporary status messages, otherwise the gateway URL and controls.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let supervising = app.dashboard().mode().is_supervising();
    let controls = match app.current_view {
        View::Vitals if supervising => "s:start x:stop n/N:patient c:connect Tab:switch ?:help q:quit",
        View::Vitals => "s:start x:stop c:connect Tab:switch ?:help q:quit",
        View::Alerts => "↑↓:select a:clear Tab:switch ?:help q:quit",
        View::Records => "↑↓:select e:export Tab:switch ?:help q:quit",
    };

    let status = format!(
        " {} | {} | {}",
        app.current_view.label(),
        app.dashboard().gateway_url(),
        controls
    );
    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));

    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Session",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  s         Start measurement"),
        Line::from("  x         Stop measurement"),
        Line::from("  c         Connect / reconnect"),
        Line::from("  n / N     Next / previous patient"),
        Line::from("  a         Clear alerts"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Navigation",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  ←/→ h/l     Switch views"),
        Line::from("  1/2/3       Jump to view"),
        Line::from("  ↑/↓ j/k     Navigate list"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " General",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  e         Export to JSON"),
        Line::from("  q         Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);
    let help_area = centered(area, 42, 24);

    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}

/// Render the quit confirmation while the commit guard is armed.
pub fn render_quit_prompt(frame: &mut Frame, app: &App, area: Rect, warning: &str) {
    let remaining = app
        .dashboard()
        .guard_remaining(Instant::now())
        .map(format_countdown)
        .unwrap_or_default();

    let text = vec![
        Line::from(warning.to_string()),
        Line::from(""),
        Line::from(Span::styled(
            format!("Commit window ends in {remaining}"),
            Style::default().fg(app.theme.warning),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "q/y: quit anyway   any other key: stay",
            Style::default().add_modifier(Modifier::DIM),
        )),
    ];

    let block = Block::default()
        .title(" Leave session? ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.warning));

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    let prompt_area = centered(area, 52, 9);

    frame.render_widget(Clear, prompt_area);
    frame.render_widget(paragraph, prompt_area);
}

/// Center a box of at most `width` x `height` inside `area`.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
