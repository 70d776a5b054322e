//! Start/stop command sequences.

use tracing::info;

use super::SessionError;
use crate::gateway::{Command, ConnectionManager};
use crate::identity::{MonitoringMode, Role, SubjectId};

/// Turns session intents into gateway commands.
///
/// Checks run in a fixed order: the link must be open, then the target must
/// be resolved. Nothing is sent when either check fails.
#[derive(Debug, Clone, Copy)]
pub struct CommandDispatcher<'a> {
    connection: &'a ConnectionManager,
}

impl<'a> CommandDispatcher<'a> {
    pub fn new(connection: &'a ConnectionManager) -> Self {
        Self { connection }
    }

    /// Send identify, doctor configuration (supervising only) and start.
    pub fn start_measurement(&self, mode: &MonitoringMode) -> Result<SubjectId, SessionError> {
        self.ensure_connected()?;
        let target = mode.required_before_start()?;
        let user = mode.acting_user();

        let role = match mode {
            MonitoringMode::Supervising { .. } => Role::Doctor,
            MonitoringMode::SelfMonitoring { .. } => Role::Patient,
        };
        self.connection.send(Command::Identify {
            user_id: user,
            role,
        })?;

        if mode.is_supervising() {
            self.connection.send(Command::DoctorConfig {
                doctor_id: user,
                patient_id: target,
            })?;
        }

        self.connection.send(Command::Start { patient_id: target })?;
        info!(subject = %target, user = %user, "measurement start requested");
        Ok(target)
    }

    /// Send stop for the current target.
    pub fn stop_measurement(&self, mode: &MonitoringMode) -> Result<SubjectId, SessionError> {
        self.ensure_connected()?;
        let target = mode.required_before_start()?;
        self.connection.send(Command::Stop { patient_id: target })?;
        info!(subject = %target, "measurement stop requested");
        Ok(target)
    }

    fn ensure_connected(&self) -> Result<(), SessionError> {
        if self.connection.is_connected() {
            Ok(())
        } else {
            Err(SessionError::NotConnected)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::auth::StaticAuth;
    use crate::gateway::testing::{settle, Peer, ScriptedConnector, Step};
    use crate::gateway::ReconnectPolicy;
    use crate::identity::User;

    fn user(id: u64, role: Role) -> User {
        User {
            id: Some(SubjectId(id)),
            name: String::new(),
            lastname: String::new(),
            email: String::new(),
            role,
            access_token: None,
        }
    }

    async fn connected(user: User) -> (ConnectionManager, Peer) {
        let (connector, mut peers) = ScriptedConnector::new([Step::Accept]);
        let (mut manager, _rx) = ConnectionManager::new(
            "ws://gateway.test/ws/sensores",
            connector,
            Arc::new(StaticAuth::new(Some(user))),
            ReconnectPolicy::default(),
        );
        manager.connect();
        let peer = peers.recv().await.unwrap();
        settle().await;
        (manager, peer)
    }

    #[tokio::test(start_paused = true)]
    async fn doctor_start_sends_three_commands_in_order() {
        let (manager, mut peer) = connected(user(3, Role::Doctor)).await;
        let mode = MonitoringMode::Supervising {
            supervisor: SubjectId(3),
            selected: Some(SubjectId(7)),
        };

        let target = CommandDispatcher::new(&manager).start_measurement(&mode).unwrap();
        settle().await;

        assert_eq!(target, SubjectId(7));
        assert_eq!(
            peer.received(),
            vec![
                json!({"user_id": 3, "rol": "doctor"}),
                json!({"action": "doctor_config", "doctor_id": 3, "patient_id": 7}),
                json!({"action": "start", "patient_id": 7}),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn patient_start_skips_doctor_config() {
        let (manager, mut peer) = connected(user(7, Role::Patient)).await;
        let mode = MonitoringMode::SelfMonitoring {
            subject: SubjectId(7),
        };

        CommandDispatcher::new(&manager).start_measurement(&mode).unwrap();
        settle().await;

        assert_eq!(
            peer.received(),
            vec![
                json!({"user_id": 7, "rol": "paciente"}),
                json!({"action": "start", "patient_id": 7}),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unselected_doctor_sends_nothing() {
        let (manager, mut peer) = connected(user(3, Role::Doctor)).await;
        let mode = MonitoringMode::Supervising {
            supervisor: SubjectId(3),
            selected: None,
        };

        let result = CommandDispatcher::new(&manager).start_measurement(&mode);
        settle().await;

        assert!(matches!(result, Err(SessionError::SelectionRequired)));
        assert!(peer.received().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn connection_is_checked_before_selection() {
        let (connector, _peers) = ScriptedConnector::new([]);
        let (manager, _rx) = ConnectionManager::new(
            "ws://gateway.test/ws/sensores",
            connector,
            Arc::new(StaticAuth::new(None)),
            ReconnectPolicy::default(),
        );
        let mode = MonitoringMode::Supervising {
            supervisor: SubjectId(3),
            selected: None,
        };

        let dispatcher = CommandDispatcher::new(&manager);
        assert!(matches!(
            dispatcher.start_measurement(&mode),
            Err(SessionError::NotConnected)
        ));
        assert!(matches!(
            dispatcher.stop_measurement(&mode),
            Err(SessionError::NotConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_targets_selected_subject() {
        let (manager, mut peer) = connected(user(3, Role::Doctor)).await;
        let mode = MonitoringMode::Supervising {
            supervisor: SubjectId(3),
            selected: Some(SubjectId(9)),
        };

        CommandDispatcher::new(&manager).stop_measurement(&mode).unwrap();
        settle().await;

        assert_eq!(peer.received(), vec![json!({"action": "stop", "patient_id": 9})]);
    }
}
