//! Inbound message routing.
//!
//! Decides what a decoded gateway message means for the current session.
//! Out-of-band notices always pass. Everything else is dropped unless a
//! measurement is running, and sensor samples and alerts must also be
//! addressed to this session.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::gateway::message::{AlertMessage, InboundMessage, OutOfBandNotice, SensorSample};
use crate::identity::{MonitoringMode, SubjectId};

/// An alert accepted for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertRecord {
    pub subject: Option<SubjectId>,
    pub supervisor: Option<SubjectId>,
    pub codes: BTreeSet<String>,
}

impl From<AlertMessage> for AlertRecord {
    fn from(alert: AlertMessage) -> Self {
        Self {
            subject: alert.addressing.subject,
            supervisor: alert.addressing.supervisor,
            codes: alert.codes.into_iter().collect(),
        }
    }
}

/// Why a message was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No measurement is running.
    NotMonitoring,
    /// Addressed to another subject or supervisor.
    Misaddressed,
}

/// Routing decision for one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Notice(OutOfBandNotice),
    Status(Value),
    Alert(AlertRecord),
    Sample(SensorSample),
    Dropped(DropReason),
}

/// Route `message` for a session in `mode`.
pub fn route(message: InboundMessage, monitoring: bool, mode: &MonitoringMode) -> Route {
    match message {
        InboundMessage::OutOfBand(notice) => Route::Notice(notice),
        _ if !monitoring => Route::Dropped(DropReason::NotMonitoring),
        // Sensor status concerns the hardware, not a subject.
        InboundMessage::StatusSnapshot(status) => Route::Status(status),
        InboundMessage::Alert(alert) => {
            if mode.accepts(alert.addressing.subject, alert.addressing.supervisor) {
                Route::Alert(alert.into())
            } else {
                Route::Dropped(DropReason::Misaddressed)
            }
        }
        InboundMessage::SensorSample(sample) => {
            if mode.accepts(sample.addressing.subject, sample.addressing.supervisor) {
                Route::Sample(sample)
            } else {
                Route::Dropped(DropReason::Misaddressed)
            }
        }
    }
}
