use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use crate::app::App;
use crate::data::{SeriesKey, SeriesSnapshot};
use crate::identity::MonitoringMode;

/// Render the live charts: heart rate, SpO2, temperature, blood pressure, ECG.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let dashboard = app.dashboard();

    if let MonitoringMode::Supervising { selected: None, .. } = dashboard.mode() {
        render_placeholder(frame, app, area, "Select a patient with n / N, then press s to start");
        return;
    }
    if dashboard.aggregator().is_empty() && !dashboard.is_monitoring() {
        render_placeholder(frame, app, area, "Press s to start a measurement");
        return;
    }

    let rows = Layout::vertical([
        Constraint::Ratio(1, 3),
        Constraint::Ratio(1, 3),
        Constraint::Ratio(1, 3),
    ])
    .split(area);
    let top = Layout::horizontal([Constraint::Fill(1), Constraint::Fill(1)]).split(rows[0]);
    let middle = Layout::horizontal([Constraint::Fill(1), Constraint::Fill(1)]).split(rows[1]);

    render_chart(frame, app, top[0], &[SeriesKey::HeartRate]);
    render_chart(frame, app, top[1], &[SeriesKey::OxygenSaturation]);
    render_chart(frame, app, middle[0], &[SeriesKey::Temperature]);
    render_chart(frame, app, middle[1], &[SeriesKey::Systolic, SeriesKey::Diastolic]);
    render_chart(frame, app, rows[2], &[SeriesKey::Ecg]);
}

fn render_placeholder(frame: &mut Frame, app: &App, area: Rect, hint: &str) {
    let block = Block::default()
        .title(" Vitals ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            hint.to_string(),
            Style::default().add_modifier(Modifier::DIM),
        )),
    ];
    let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(block);
    frame.render_widget(paragraph, area);
}

/// One chart with one or more series sharing the y axis.
fn render_chart(frame: &mut Frame, app: &App, area: Rect, keys: &[SeriesKey]) {
    let snapshots: Vec<(SeriesKey, SeriesSnapshot)> =
        keys.iter().map(|k| (*k, app.dashboard().snapshot(*k))).collect();

    let points: Vec<Vec<(f64, f64)>> = snapshots
        .iter()
        .map(|(_, s)| s.values().enumerate().map(|(i, v)| (i as f64, v)).collect())
        .collect();

    let datasets: Vec<Dataset> = snapshots
        .iter()
        .zip(points.iter())
        .map(|((key, _), data)| {
            Dataset::default()
                .name(key.label())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(app.theme.series_color(*key)))
                .data(data)
        })
        .collect();

    let title = chart_title(&snapshots);
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    let capacity = app.dashboard().aggregator().capacity();
    let (lo, hi) = y_bounds(&snapshots);

    // First and last time labels of the longest series.
    let x_labels = snapshots
        .iter()
        .max_by_key(|(_, s)| s.points.len())
        .and_then(|(_, s)| Some((s.points.first()?, s.points.last()?)))
        .map(|(first, last)| vec![first.time_label.clone(), last.time_label.clone()])
        .unwrap_or_default();

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(app.theme.border))
                .bounds([0.0, capacity.saturating_sub(1).max(1) as f64])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(app.theme.border))
                .bounds([lo, hi])
                .labels(vec![format!("{lo:.0}"), format!("{hi:.0}")]),
        );

    frame.render_widget(chart, area);
}

/// Title with the latest reading of each series.
fn chart_title(snapshots: &[(SeriesKey, SeriesSnapshot)]) -> String {
    let Some((first, _)) = snapshots.first() else {
        return String::new();
    };

    let latest: Vec<String> = snapshots
        .iter()
        .map(|(_, s)| {
            s.latest()
                .map(|p| format_value(p.value))
                .unwrap_or_else(|| "-".to_string())
        })
        .collect();

    let name = if snapshots.len() > 1 {
        "Blood pressure"
    } else {
        first.label()
    };
    format!(" {} {} {} ", name, latest.join("/"), first.unit())
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

/// Y range covering every point with a little headroom.
fn y_bounds(snapshots: &[(SeriesKey, SeriesSnapshot)]) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for value in snapshots.iter().flat_map(|(_, s)| s.values()) {
        lo = lo.min(value);
        hi = hi.max(value);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.1).max(1.0);
    (lo - pad, hi + pad)
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::data::MetricSeries;

    fn snapshot(values: &[f64]) -> SeriesSnapshot {
        let mut series = MetricSeries::new("Heart rate", NonZeroUsize::new(20).unwrap());
        for v in values {
            series.push(*v, None);
        }
        series.snapshot()
    }

    #[test]
    fn test_y_bounds_pads_range() {
        let (lo, hi) = y_bounds(&[(SeriesKey::HeartRate, snapshot(&[60.0, 80.0]))]);
        assert_eq!((lo, hi), (58.0, 82.0));
    }

    #[test]
    fn test_y_bounds_empty() {
        assert_eq!(y_bounds(&[(SeriesKey::HeartRate, snapshot(&[]))]), (0.0, 1.0));
    }

    #[test]
    fn test_pressure_title_shows_both_values() {
        let title = chart_title(&[
            (SeriesKey::Systolic, snapshot(&[120.0])),
            (SeriesKey::Diastolic, snapshot(&[80.0])),
        ]);
        assert_eq!(title, " Blood pressure 120/80 mmHg ");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(72.0), "72");
        assert_eq!(format_value(36.76), "36.8");
    }
}
