use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::App;

/// Render the alert list as a table, newest last.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let alerts = app.dashboard().alerts();

    if alerts.is_empty() {
        render_empty(frame, app, area);
        return;
    }

    let header = Row::new(vec![
        Cell::from("#"),
        Cell::from("Patient"),
        Cell::from("Doctor"),
        Cell::from("Alerts"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = alerts
        .iter()
        .enumerate()
        .map(|(i, alert)| {
            let id = |s: Option<crate::identity::SubjectId>| {
                s.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())
            };
            let codes = alert.codes.iter().cloned().collect::<Vec<_>>().join(", ");

            Row::new(vec![
                Cell::from(format!("{}", i + 1)).style(Style::default().add_modifier(Modifier::DIM)),
                Cell::from(id(alert.subject)).style(Style::default().add_modifier(Modifier::BOLD)),
                Cell::from(id(alert.supervisor)),
                Cell::from(codes).style(Style::default().fg(app.theme.critical)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(4),
        Constraint::Length(9),
        Constraint::Length(8),
        Constraint::Fill(1),
    ];

    let title = format!(
        " Alerts ({}) [a:clear] [{}/{}] ",
        alerts.len(),
        app.selected_row.min(alerts.len() - 1) + 1,
        alerts.len()
    );

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.critical)),
        )
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    state.select(Some(app.selected_row.min(alerts.len().saturating_sub(1))));

    frame.render_stateful_widget(table, area, &mut state);
}

fn render_empty(frame: &mut Frame, app: &App, area: Rect) {
    let message = if app.dashboard().is_monitoring() {
        "No alerts for this session"
    } else {
        "Alerts appear here while a measurement is running"
    };

    let paragraph = Paragraph::new(vec![
        Line::from(""),
        Line::styled(message, Style::default().fg(app.theme.healthy)),
    ])
    .alignment(ratatui::layout::Alignment::Center)
    .block(
        Block::default()
            .title(" Alerts ")
            .borders(Borders::ALL)
            .border_type(app.theme.border_type)
            .border_style(Style::default().fg(app.theme.border)),
    );

    frame.render_widget(paragraph, area);
}
