//! Application state and navigation logic.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::warn;

use crate::data::SeriesKey;
use crate::gateway::message::RecordCreated;
use crate::identity::SubjectId;
use crate::session::{Dashboard, ExitLock};
use crate::ui::Theme;

/// Record notices kept for the Records view.
const MAX_RECORD_LOG: usize = 50;

/// How long a status message stays visible.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// The current view/tab in the TUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Live charts for every vital sign.
    Vitals,
    /// Alerts raised for the monitored subject.
    Alerts,
    /// Medical records created during this session, plus sensor status.
    Records,
}

impl View {
    /// Cycle to the next view.
    pub fn next(self) -> Self {
        match self {
            View::Vitals => View::Alerts,
            View::Alerts => View::Records,
            View::Records => View::Vitals,
        }
    }

    /// Cycle to the previous view.
    pub fn prev(self) -> Self {
        match self {
            View::Vitals => View::Records,
            View::Alerts => View::Vitals,
            View::Records => View::Alerts,
        }
    }

    /// Returns the display label for this view.
    pub fn label(&self) -> &'static str {
        match self {
            View::Vitals => "Vitals",
            View::Alerts => "Alerts",
            View::Records => "Records",
        }
    }
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub current_view: View,
    pub show_help: bool,
    /// Quit was requested while the commit guard is armed.
    pub confirm_quit: bool,

    dashboard: Dashboard,
    exit_lock: ExitLock,
    records: broadcast::Receiver<RecordCreated>,
    pub record_log: VecDeque<RecordCreated>,

    /// Patients a supervising user can cycle through.
    pub patients: Vec<SubjectId>,
    pub selected_row: usize,

    // UI
    pub theme: Theme,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create a new App around a dashboard.
    pub fn new(dashboard: Dashboard, exit_lock: ExitLock, patients: Vec<SubjectId>) -> Self {
        Self::with_theme(dashboard, exit_lock, patients, Theme::auto_detect())
    }

    pub fn with_theme(
        dashboard: Dashboard,
        exit_lock: ExitLock,
        patients: Vec<SubjectId>,
        theme: Theme,
    ) -> Self {
        let records = dashboard.subscribe_records();
        Self {
            running: true,
            current_view: View::Vitals,
            show_help: false,
            confirm_quit: false,
            dashboard,
            exit_lock,
            records,
            record_log: VecDeque::new(),
            patients,
            selected_row: 0,
            theme,
            status_message: None,
        }
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    /// Get the current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < STATUS_MESSAGE_TTL {
                return Some(msg);
            }
        }
        None
    }

    /// Advance the session: drain traffic, surface notices and new records.
    pub fn tick(&mut self, now: Instant) {
        self.dashboard.pump(now);

        for notice in self.dashboard.take_notices() {
            self.set_status_message(notice.message());
        }

        loop {
            match self.records.try_recv() {
                Ok(record) => {
                    let patient = record
                        .patient_id
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "?".to_string());
                    self.set_status_message(format!("New medical record for patient {patient}"));
                    self.record_log.push_front(record);
                    self.record_log.truncate(MAX_RECORD_LOG);
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "record notices skipped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        // The window ran out while the prompt was open.
        if self.confirm_quit && self.exit_lock.warning().is_none() {
            self.confirm_quit = false;
        }
    }

    pub fn connect(&mut self) {
        self.dashboard.connect();
        self.set_status_message(format!("Connecting to {}", self.dashboard.gateway_url()));
    }

    pub fn start_measurement(&mut self) {
        // Failures already raised a notice.
        if let Ok(subject) = self.dashboard.start_measurement(Instant::now()) {
            self.set_status_message(format!("Measuring patient {subject}"));
        }
    }

    pub fn stop_measurement(&mut self) {
        if let Ok(subject) = self.dashboard.stop_measurement() {
            self.set_status_message(format!("Stopped measuring patient {subject}"));
        }
    }

    /// Select the next configured patient (supervising users only).
    pub fn select_next_patient(&mut self) {
        self.cycle_patient(1);
    }

    /// Select the previous configured patient (supervising users only).
    pub fn select_prev_patient(&mut self) {
        self.cycle_patient(self.patients.len().saturating_sub(1));
    }

    fn cycle_patient(&mut self, step: usize) {
        if !self.dashboard.mode().is_supervising() {
            self.set_status_message("Only supervising users select patients");
            return;
        }
        if self.patients.is_empty() {
            self.set_status_message("No patients configured (use --patient)");
            return;
        }

        let next = match self
            .dashboard
            .target()
            .and_then(|t| self.patients.iter().position(|p| *p == t))
        {
            Some(i) => (i + step) % self.patients.len(),
            None => 0,
        };
        let subject = self.patients[next];
        if self.dashboard.select_subject(Some(subject)) {
            self.selected_row = 0;
            self.set_status_message(format!("Selected patient {subject}"));
        }
    }

    pub fn clear_alerts(&mut self) {
        self.dashboard.clear_alerts();
        self.selected_row = 0;
        self.set_status_message("Alerts cleared");
    }

    /// Quit, asking for confirmation first while the commit guard is armed.
    pub fn request_quit(&mut self) {
        if self.exit_lock.warning().is_some() && !self.confirm_quit {
            self.confirm_quit = true;
            return;
        }
        self.quit();
    }

    pub fn cancel_quit(&mut self) {
        self.confirm_quit = false;
    }

    /// The confirmation prompt to show, if quitting is pending.
    pub fn quit_prompt(&self) -> Option<&'static str> {
        if self.confirm_quit {
            self.exit_lock.warning()
        } else {
            None
        }
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Switch to the next view.
    pub fn next_view(&mut self) {
        self.current_view = self.current_view.next();
        self.selected_row = 0;
    }

    /// Switch to the previous view.
    pub fn prev_view(&mut self) {
        self.current_view = self.current_view.prev();
        self.selected_row = 0;
    }

    /// Switch to a specific view.
    pub fn set_view(&mut self, view: View) {
        self.current_view = view;
        self.selected_row = 0;
    }

    fn row_count(&self) -> usize {
        match self.current_view {
            View::Vitals => 0,
            View::Alerts => self.dashboard.alerts().len(),
            View::Records => self.record_log.len(),
        }
    }

    /// Move selection down by one row.
    pub fn select_next(&mut self) {
        let max = self.row_count().saturating_sub(1);
        self.selected_row = (self.selected_row + 1).min(max);
    }

    /// Move selection up by one row.
    pub fn select_prev(&mut self) {
        self.selected_row = self.selected_row.saturating_sub(1);
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Export the current session state to a file.
    pub fn export_state(&self, path: &std::path::Path) -> anyhow::Result<()> {
        use std::io::Write;

        let dashboard = &self.dashboard;
        let user = dashboard.user();

        let series: Vec<serde_json::Value> = SeriesKey::ALL
            .iter()
            .map(|key| {
                let snapshot = dashboard.snapshot(*key);
                json!({
                    "series": key.label(),
                    "unit": key.unit(),
                    "points": &*snapshot.points,
                })
            })
            .collect();

        let export = json!({
            "user": {
                "id": user.id,
                "name": user.display_name(),
                "role": user.role,
            },
            "target": dashboard.target(),
            "state": dashboard.state().label(),
            "connection": dashboard.connection_status().state.label(),
            "series": series,
            "alerts": dashboard.alerts(),
            "sensor_status": dashboard.sensor_status(),
            "records": self.record_log,
        });

        let json = serde_json::to_string_pretty(&export)?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(json.as_bytes())?;

        Ok(())
    }

    /// Close the session: guard, link and channels.
    pub fn teardown(self) {
        self.dashboard.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::StaticAuth;
    use crate::gateway::testing::{settle, ScriptedConnector, Step};
    use crate::gateway::{ConnectionManager, ReconnectPolicy};
    use crate::identity::{Role, User};
    use crate::session::DashboardOptions;

    async fn app(role: Role, patients: Vec<SubjectId>) -> (App, crate::gateway::testing::Peer) {
        let user = User {
            id: Some(SubjectId(3)),
            name: "Dana".to_string(),
            lastname: "Ruiz".to_string(),
            email: String::new(),
            role,
            access_token: None,
        };
        let (connector, mut peers) = ScriptedConnector::new([Step::Accept]);
        let (manager, inbound) = ConnectionManager::new(
            "ws://gateway.test/ws/sensores",
            connector,
            Arc::new(StaticAuth::new(Some(user.clone()))),
            ReconnectPolicy::default(),
        );
        let lock = ExitLock::new();
        let dashboard = Dashboard::new(
            user,
            manager,
            inbound,
            DashboardOptions::default(),
            Box::new(lock.clone()),
        )
        .unwrap();

        let mut app = App::with_theme(dashboard, lock, patients, Theme::dark());
        app.connect();
        let peer = peers.recv().await.unwrap();
        settle().await;
        app.tick(Instant::now());
        (app, peer)
    }

    #[test]
    fn test_view_cycle() {
        assert_eq!(View::Vitals.next(), View::Alerts);
        assert_eq!(View::Records.next(), View::Vitals);
        assert_eq!(View::Vitals.prev(), View::Records);
        assert_eq!(View::Alerts.label(), "Alerts");
    }

    #[tokio::test(start_paused = true)]
    async fn quit_asks_for_confirmation_while_guarded() {
        let (mut app, _peer) = app(Role::Patient, vec![]).await;
        app.start_measurement();
        assert!(app.dashboard().guard_armed());

        app.request_quit();
        assert!(app.running);
        assert!(app.quit_prompt().is_some());

        app.cancel_quit();
        assert!(app.quit_prompt().is_none());

        app.request_quit();
        app.request_quit();
        assert!(!app.running);
    }

    #[tokio::test(start_paused = true)]
    async fn quit_is_immediate_when_unguarded() {
        let (mut app, _peer) = app(Role::Patient, vec![]).await;
        app.request_quit();
        assert!(!app.running);
    }

    #[tokio::test(start_paused = true)]
    async fn patient_cycling_wraps_around() {
        let patients = vec![SubjectId(7), SubjectId(8)];
        let (mut app, _peer) = app(Role::Doctor, patients).await;

        app.select_next_patient();
        assert_eq!(app.dashboard().target(), Some(SubjectId(7)));
        app.select_next_patient();
        assert_eq!(app.dashboard().target(), Some(SubjectId(8)));
        app.select_next_patient();
        assert_eq!(app.dashboard().target(), Some(SubjectId(7)));
        app.select_prev_patient();
        assert_eq!(app.dashboard().target(), Some(SubjectId(8)));
    }

    #[tokio::test(start_paused = true)]
    async fn record_notices_reach_the_log() {
        let (mut app, peer) = app(Role::Patient, vec![]).await;
        peer.send_json(serde_json::json!({
            "type": "medical_record_created",
            "patient_id": 3,
            "record_id": 5,
            "message": "ok"
        }));
        settle().await;
        app.tick(Instant::now());

        assert_eq!(app.record_log.len(), 1);
        assert_eq!(app.record_log[0].record_id, Some(5));
        assert!(app.get_status_message().unwrap().contains("patient 3"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_shows_notice() {
        let (mut app, _peer) = app(Role::Doctor, vec![]).await;
        app.start_measurement();
        app.tick(Instant::now());
        assert_eq!(app.get_status_message(), Some("Select a patient first"));
    }

    #[tokio::test(start_paused = true)]
    async fn export_writes_session_json() {
        let (mut app, peer) = app(Role::Patient, vec![]).await;
        app.start_measurement();
        peer.send_json(serde_json::json!({
            "topic": "ritmo_cardiaco",
            "data": {"patient_id": 3, "heart_rate": 70}
        }));
        settle().await;
        app.tick(Instant::now());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        app.export_state(&path).unwrap();

        let exported: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(exported["state"], "monitoring");
        assert_eq!(exported["target"], 3);
        assert_eq!(exported["series"][0]["points"][0]["value"], 70.0);
    }
}
