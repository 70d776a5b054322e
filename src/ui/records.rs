//! Records view: medical records created this session and sensor status.

use chrono::{Local, TimeZone};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};
use serde_json::Value;

use crate::app::App;
use crate::gateway::message::RecordCreated;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::horizontal([Constraint::Fill(3), Constraint::Fill(1)]).split(area);
    render_records(frame, app, chunks[0]);
    render_sensor_status(frame, app, chunks[1]);
}

fn render_records(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new(vec![
        Cell::from("Time"),
        Cell::from("Record"),
        Cell::from("Patient"),
        Cell::from("Vitals"),
        Cell::from("Message"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = app
        .record_log
        .iter()
        .map(|record| {
            Row::new(vec![
                Cell::from(record_time(record)).style(Style::default().add_modifier(Modifier::DIM)),
                Cell::from(record.record_id.map(|id| format!("#{id}")).unwrap_or_default()),
                Cell::from(record.patient_id.map(|p| p.to_string()).unwrap_or_default())
                    .style(Style::default().add_modifier(Modifier::BOLD)),
                Cell::from(vitals_summary(record)),
                Cell::from(record.message.clone()),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(9),
        Constraint::Length(8),
        Constraint::Length(8),
        Constraint::Fill(2),
        Constraint::Fill(1),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(format!(" Records ({}) ", app.record_log.len()))
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    if !app.record_log.is_empty() {
        state.select(Some(app.selected_row.min(app.record_log.len() - 1)));
    }

    frame.render_stateful_widget(table, area, &mut state);
}

fn render_sensor_status(frame: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = match app.dashboard().sensor_status() {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(sensor, state)| {
                let text = match state {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let style = if text.eq_ignore_ascii_case("ok") || text == "true" {
                    Style::default().fg(app.theme.healthy)
                } else {
                    Style::default().fg(app.theme.warning)
                };
                Line::from(vec![Span::raw(format!("{sensor}: ")), Span::styled(text, style)])
            })
            .collect(),
        Some(other) => vec![Line::from(other.to_string())],
        None => vec![Line::styled(
            "No status received",
            Style::default().add_modifier(Modifier::DIM),
        )],
    };

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title(" Sensors ")
            .borders(Borders::ALL)
            .border_type(app.theme.border_type)
            .border_style(Style::default().fg(app.theme.border)),
    );
    frame.render_widget(paragraph, area);
}

fn record_time(record: &RecordCreated) -> String {
    record
        .timestamp
        .and_then(|ts| Local.timestamp_opt(ts as i64, 0).single())
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default()
}

/// "T 37.2 · BP 118/76 · SpO2 98 · HR 80", skipping missing values.
fn vitals_summary(record: &RecordCreated) -> String {
    let v = &record.vitals;
    let mut parts = Vec::new();
    if let Some(t) = v.temperature {
        parts.push(format!("T {t}"));
    }
    if let Some(bp) = &v.blood_pressure {
        parts.push(format!("BP {bp}"));
    }
    if let Some(o) = v.oxygen_saturation {
        parts.push(format!("SpO2 {o}"));
    }
    if let Some(hr) = v.heart_rate {
        parts.push(format!("HR {hr}"));
    }
    parts.join(" · ")
}
