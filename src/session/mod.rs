//! Monitoring session.
//!
//! [`Dashboard`] is the one owner of a session: it holds the resolved
//! monitoring mode, the gateway connection, the aggregated series, the alert
//! list and the commit guard. The UI drives it from a single loop:
//!
//! ```text
//!             ┌──────────────── Dashboard ────────────────┐
//!  key ──────▶│ start/stop ─▶ CommandDispatcher ─▶ ConnectionManager ─▶ gateway
//!             │                                            │
//!  tick ─────▶│ pump(): inbound ─▶ router ─┬─▶ Aggregator  │
//!             │                            ├─▶ alerts      │
//!             │                            ├─▶ sensor status
//!             │                            └─▶ record broadcast
//!             │         status watch ─▶ end monitoring on link loss
//!             │         CommitGuard::poll_expired()        │
//!             └────────────────────────────────────────────┘
//! ```

mod dispatch;
pub mod guard;
pub mod router;

pub use dispatch::CommandDispatcher;
pub use guard::{CommitGuard, ExitInterceptor, ExitLock, SessionGuard, COMMIT_WINDOW, EXIT_WARNING};
pub use router::{route, AlertRecord, DropReason, Route};

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::data::{Aggregator, SeriesKey, SeriesSnapshot, DEFAULT_CAPACITY};
use crate::gateway::message::{InboundMessage, OutOfBandNotice, RecordCreated};
use crate::gateway::{ConnectionManager, ConnectionState, ConnectionStatus, GatewayError};
use crate::identity::{MonitoringMode, SubjectId, User};

/// Record notices buffered per subscriber.
const RECORD_CHANNEL_CAPACITY: usize = 16;

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no authenticated user")]
    Unauthenticated,

    #[error("not connected to the sensor gateway")]
    NotConnected,

    #[error("select a patient before starting a measurement")]
    SelectionRequired,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// User-facing notice raised by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    ConnectionUnavailable,
    SelectionRequired,
    ReconnectExhausted,
    Unauthenticated,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::ConnectionUnavailable => "Sensor gateway is not connected",
            Notice::SelectionRequired => "Select a patient first",
            Notice::ReconnectExhausted => "Lost the sensor gateway. Press 'c' to reconnect",
            Notice::Unauthenticated => "Not logged in",
        }
    }
}

impl From<&SessionError> for Notice {
    fn from(error: &SessionError) -> Self {
        match error {
            SessionError::Unauthenticated => Notice::Unauthenticated,
            SessionError::SelectionRequired => Notice::SelectionRequired,
            SessionError::NotConnected | SessionError::Gateway(_) => Notice::ConnectionUnavailable,
        }
    }
}

/// Coarse session state for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Monitoring,
    Stopped,
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Monitoring => "monitoring",
            SessionState::Stopped => "stopped",
        }
    }
}

/// Tunables for a dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardOptions {
    pub capacity: NonZeroUsize,
    pub commit_window: Duration,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            capacity: NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            commit_window: COMMIT_WINDOW,
        }
    }
}

/// One monitoring session and everything it owns.
#[derive(Debug)]
pub struct Dashboard {
    user: User,
    mode: MonitoringMode,
    connection: ConnectionManager,
    status: watch::Receiver<ConnectionStatus>,
    last_status: ConnectionStatus,
    inbound: mpsc::Receiver<InboundMessage>,
    aggregator: Aggregator,
    alerts: Vec<AlertRecord>,
    sensor_status: Option<Value>,
    records: broadcast::Sender<RecordCreated>,
    guard: CommitGuard,
    notices: VecDeque<Notice>,
    /// Link generation the running measurement was started on.
    monitoring: Option<u64>,
    stopped: bool,
    released: bool,
}

impl Dashboard {
    /// Build a session for `user` on top of an unopened connection.
    pub fn new(
        user: User,
        connection: ConnectionManager,
        inbound: mpsc::Receiver<InboundMessage>,
        options: DashboardOptions,
        interceptor: Box<dyn ExitInterceptor>,
    ) -> Result<Self, SessionError> {
        let mode = MonitoringMode::for_user(&user)?;
        let status = connection.subscribe();
        let last_status = *status.borrow();
        let (records, _) = broadcast::channel(RECORD_CHANNEL_CAPACITY);

        Ok(Self {
            user,
            mode,
            connection,
            status,
            last_status,
            inbound,
            aggregator: Aggregator::new(options.capacity),
            alerts: Vec::new(),
            sensor_status: None,
            records,
            guard: CommitGuard::new(options.commit_window, interceptor),
            notices: VecDeque::new(),
            monitoring: None,
            stopped: false,
            released: false,
        })
    }

    /// Open the gateway link (or retry after the budget ran out).
    pub fn connect(&mut self) {
        self.connection.connect();
    }

    pub fn disconnect(&mut self) {
        self.connection.disconnect();
        self.end_monitoring("gateway disconnected");
    }

    /// Change the monitored subject. Any change clears all collected data.
    ///
    /// A measurement running for the previous subject is stopped first.
    /// Returns `true` if the selection changed.
    pub fn select_subject(&mut self, subject: Option<SubjectId>) -> bool {
        let mut next = self.mode.clone();
        if !next.select(subject) {
            return false;
        }
        if self.monitoring.is_some() {
            if let Err(e) = CommandDispatcher::new(&self.connection).stop_measurement(&self.mode) {
                warn!(error = %e, "could not stop the previous subject's measurement");
            }
            self.end_monitoring("subject changed");
        }
        self.mode = next;
        self.aggregator.reset();
        self.alerts.clear();
        self.sensor_status = None;
        self.stopped = false;
        info!(subject = ?subject, "monitored subject changed");
        true
    }

    /// Start a measurement and arm the commit guard.
    pub fn start_measurement(&mut self, now: Instant) -> Result<SubjectId, SessionError> {
        let result = CommandDispatcher::new(&self.connection).start_measurement(&self.mode);
        match result {
            Ok(target) => {
                self.monitoring = Some(self.connection.status().link);
                self.stopped = false;
                self.guard.arm(now);
                Ok(target)
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Stop the measurement. The guard is disarmed immediately.
    pub fn stop_measurement(&mut self) -> Result<SubjectId, SessionError> {
        let result = CommandDispatcher::new(&self.connection).stop_measurement(&self.mode);
        match result {
            Ok(target) => {
                self.end_monitoring("measurement stopped");
                self.stopped = true;
                Ok(target)
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    pub fn clear_alerts(&mut self) {
        self.alerts.clear();
    }

    /// Receive every record-created notice from now on.
    pub fn subscribe_records(&self) -> broadcast::Receiver<RecordCreated> {
        self.records.subscribe()
    }

    /// Process everything that arrived since the last call.
    ///
    /// Drains inbound messages in arrival order, then reacts to connection
    /// changes, then expires the commit guard. Returns the number of messages
    /// handled.
    pub fn pump(&mut self, now: Instant) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.inbound.try_recv() {
            self.handle(message);
            handled += 1;
        }
        self.observe_connection();
        self.guard.poll_expired(now);
        handled
    }

    /// Notices raised since the last call, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn mode(&self) -> &MonitoringMode {
        &self.mode
    }

    pub fn target(&self) -> Option<SubjectId> {
        self.mode.resolve_target_subject()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.last_status
    }

    pub fn gateway_url(&self) -> &str {
        self.connection.url()
    }

    /// Reconnect attempts allowed after a loss.
    pub fn max_retries(&self) -> u32 {
        self.connection.policy().max_retries
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.is_some()
    }

    pub fn state(&self) -> SessionState {
        if self.monitoring.is_some() {
            return SessionState::Monitoring;
        }
        match self.last_status.state {
            ConnectionState::Connected if self.stopped => SessionState::Stopped,
            ConnectionState::Connected => SessionState::Connected,
            ConnectionState::Connecting => SessionState::Connecting,
            ConnectionState::Disconnected if self.last_status.attempt > 0 && !self.last_status.exhausted => {
                SessionState::Connecting
            }
            ConnectionState::Disconnected => SessionState::Idle,
        }
    }

    pub fn guard_armed(&self) -> bool {
        self.guard.is_armed()
    }

    /// Time left in the commit window.
    pub fn guard_remaining(&self, now: Instant) -> Option<Duration> {
        self.guard.remaining(now)
    }

    pub fn alerts(&self) -> &[AlertRecord] {
        &self.alerts
    }

    pub fn sensor_status(&self) -> Option<&Value> {
        self.sensor_status.as_ref()
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn snapshot(&self, key: SeriesKey) -> SeriesSnapshot {
        self.aggregator.snapshot(key)
    }

    /// Stop the session: disarm the guard, close the link, stop receiving.
    pub fn teardown(mut self) {
        self.release();
    }

    fn handle(&mut self, message: InboundMessage) {
        match route(message, self.monitoring.is_some(), &self.mode) {
            Route::Notice(OutOfBandNotice::RecordCreated(record)) => {
                info!(
                    record = ?record.record_id,
                    patient = ?record.patient_id,
                    "medical record created"
                );
                // No subscribers is fine.
                let _ = self.records.send(record);
            }
            Route::Status(status) => self.sensor_status = Some(status),
            Route::Alert(alert) => {
                warn!(subject = ?alert.subject, codes = ?alert.codes, "alert received");
                self.alerts.push(alert);
            }
            Route::Sample(sample) => {
                self.aggregator.apply(&sample);
            }
            Route::Dropped(DropReason::Misaddressed) => {
                debug!("dropping message addressed to another session")
            }
            Route::Dropped(DropReason::NotMonitoring) => {
                trace!("dropping message while not monitoring")
            }
        }
    }

    fn observe_connection(&mut self) {
        let status = *self.status.borrow_and_update();
        if status == self.last_status {
            return;
        }

        if let Some(link) = self.monitoring {
            if status.state != ConnectionState::Connected || status.link != link {
                self.end_monitoring("gateway connection lost");
            }
        }
        if status.exhausted && !self.last_status.exhausted {
            self.notices.push_back(Notice::ReconnectExhausted);
        }
        self.last_status = status;
    }

    fn end_monitoring(&mut self, reason: &str) {
        if self.monitoring.take().is_some() {
            info!(reason, "monitoring ended");
        }
        self.guard.disarm();
    }

    fn reject(&mut self, error: SessionError) -> SessionError {
        warn!(error = %error, "session request rejected");
        self.notices.push_back(Notice::from(&error));
        error
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.monitoring = None;
        self.guard.disarm();
        self.connection.disconnect();
        self.inbound.close();
        debug!("dashboard released");
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.release();
    }
}
