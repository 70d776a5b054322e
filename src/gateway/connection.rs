//! Gateway connection lifecycle.
//!
//! A [`ConnectionManager`] owns at most one driver task. The driver opens the
//! link, pumps frames in both directions and, when the link drops or cannot
//! be opened, retries with a fixed delay until the retry budget is spent.
//!
//! ```text
//!   connect() ──► Connecting ──open ok──► Connected ──lost──┐
//!                    ▲   │                                   │
//!                    │   └──refused──┐                       │
//!                    │               ▼                       ▼
//!                    └──delay── Disconnected(attempt n) ◄────┘
//!                                    │
//!                          n == max_retries
//!                                    ▼
//!                        Disconnected(exhausted)
//! ```
//!
//! Status is published on a watch channel so late subscribers see the latest
//! value immediately. Decoded inbound messages flow out through a bounded
//! mpsc channel returned from [`ConnectionManager::new`].

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::message::{Command, InboundMessage};
use super::transport::{Connector, Link};
use super::{ConnectionState, ConnectionStatus, GatewayError, ReconnectPolicy};
use crate::auth::AuthProvider;

/// Decoded messages buffered between the driver and the session.
const INBOUND_CAPACITY: usize = 256;

/// Commands buffered while a link is being written to.
const COMMAND_CAPACITY: usize = 32;

/// Owns the gateway link and its reconnect loop.
#[derive(Debug)]
pub struct ConnectionManager {
    url: String,
    connector: Arc<dyn Connector>,
    auth: Arc<dyn AuthProvider>,
    policy: ReconnectPolicy,
    status: watch::Sender<ConnectionStatus>,
    inbound: mpsc::Sender<InboundMessage>,
    commands: Option<mpsc::Sender<Command>>,
    shutdown: Option<watch::Sender<bool>>,
    driver: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Create a manager for `url`. Nothing is opened until [`connect`](Self::connect).
    ///
    /// Returns the manager and the receiving end of the inbound message queue.
    pub fn new(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        auth: Arc<dyn AuthProvider>,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::Receiver<InboundMessage>) {
        let (inbound, rx) = mpsc::channel(INBOUND_CAPACITY);
        let (status, _) = watch::channel(ConnectionStatus::default());
        let manager = Self {
            url: url.into(),
            connector,
            auth,
            policy,
            status,
            inbound,
            commands: None,
            shutdown: None,
            driver: None,
        };
        (manager, rx)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Subscribe to status changes. The current status is available at once.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Start the connection driver.
    ///
    /// A no-op while a driver is connected or retrying. After the retry budget
    /// is spent, or after [`disconnect`](Self::disconnect), this starts over
    /// with the attempt counter at zero. Without an authenticated user nothing
    /// happens beyond an error log entry.
    pub fn connect(&mut self) {
        if self.driver_running() {
            debug!(url = %self.url, "connect ignored: driver already running");
            return;
        }

        let Some(user) = self.auth.current_user().filter(|u| u.id.is_some()) else {
            error!(url = %self.url, "cannot connect to gateway: no authenticated user");
            return;
        };
        let token = self.auth.token();

        // Retire any finished driver before a new epoch starts.
        self.stop_driver();

        let mut epoch = 0;
        self.status.send_modify(|s| {
            s.epoch += 1;
            s.state = ConnectionState::Connecting;
            s.attempt = 0;
            s.exhausted = false;
            epoch = s.epoch;
        });

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let driver = Driver {
            url: self.url.clone(),
            token,
            connector: self.connector.clone(),
            policy: self.policy,
            status: self.status.clone(),
            epoch,
            inbound: self.inbound.clone(),
            commands: command_rx,
            shutdown: shutdown_rx,
        };

        info!(url = %self.url, user = ?user.id, "connecting to gateway");
        self.commands = Some(command_tx);
        self.shutdown = Some(shutdown_tx);
        self.driver = Some(tokio::spawn(driver.run()));
    }

    /// Close the link and cancel any pending reconnect.
    pub fn disconnect(&mut self) {
        let was_running = self.shutdown.is_some();
        self.stop_driver();
        self.status.send_modify(|s| {
            s.epoch += 1;
            s.state = ConnectionState::Disconnected;
            s.attempt = 0;
            s.exhausted = false;
        });
        if was_running {
            info!(url = %self.url, "gateway disconnected");
        }
    }

    /// Queue a command for the open link.
    pub fn send(&self, command: Command) -> Result<(), GatewayError> {
        if !self.is_connected() {
            return Err(GatewayError::NotConnected);
        }
        let commands = self.commands.as_ref().ok_or(GatewayError::NotConnected)?;
        commands.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => GatewayError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => GatewayError::NotConnected,
        })
    }

    fn driver_running(&self) -> bool {
        let alive = self.driver.as_ref().is_some_and(|d| !d.is_finished());
        alive && !self.status.borrow().exhausted
    }

    fn stop_driver(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        self.commands = None;
        // The driver exits on its own once it sees the shutdown signal.
        self.driver = None;
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.stop_driver();
    }
}

enum Exit {
    Shutdown,
    Lost,
}

struct Driver {
    url: String,
    token: Option<String>,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    status: watch::Sender<ConnectionStatus>,
    epoch: u64,
    inbound: mpsc::Sender<InboundMessage>,
    commands: mpsc::Receiver<Command>,
    shutdown: watch::Receiver<bool>,
}

impl Driver {
    /// Publish a status change unless a newer connect/disconnect took over.
    fn publish(&self, update: impl FnOnce(&mut ConnectionStatus)) {
        let epoch = self.epoch;
        self.status.send_if_modified(|s| {
            if s.epoch != epoch {
                return false;
            }
            let before = *s;
            update(s);
            *s != before
        });
    }

    async fn run(mut self) {
        let mut retries = 0u32;
        loop {
            self.publish(|s| {
                s.state = ConnectionState::Connecting;
                s.attempt = retries;
            });

            let opened = tokio::select! {
                biased;
                _ = self.shutdown.changed() => return,
                result = self.connector.open(&self.url, self.token.as_deref()) => result,
            };

            match opened {
                Ok(link) => {
                    retries = 0;
                    let mut stale = 0;
                    while self.commands.try_recv().is_ok() {
                        stale += 1;
                    }
                    if stale > 0 {
                        debug!(stale, "discarded commands queued for a previous link");
                    }
                    self.publish(|s| {
                        s.state = ConnectionState::Connected;
                        s.attempt = 0;
                        s.link += 1;
                    });
                    info!(url = %self.url, "gateway connected");

                    if let Exit::Shutdown = self.pump(link).await {
                        return;
                    }
                    warn!(url = %self.url, "gateway connection lost");
                }
                Err(e) => warn!(url = %self.url, error = %e, "gateway connection failed"),
            }

            if retries >= self.policy.max_retries {
                self.publish(|s| {
                    s.state = ConnectionState::Disconnected;
                    s.attempt = retries;
                    s.exhausted = true;
                });
                error!(
                    url = %self.url,
                    attempts = retries,
                    "giving up on gateway after exhausting reconnect attempts"
                );
                return;
            }

            retries += 1;
            self.publish(|s| {
                s.state = ConnectionState::Disconnected;
                s.attempt = retries;
            });
            info!(
                attempt = retries,
                max = self.policy.max_retries,
                delay = ?self.policy.delay,
                "scheduling gateway reconnect"
            );

            tokio::select! {
                biased;
                _ = self.shutdown.changed() => return,
                _ = tokio::time::sleep(self.policy.delay) => {}
            }
        }
    }

    /// Move frames until the link drops or shutdown is requested.
    async fn pump(&mut self, mut link: Box<dyn Link>) -> Exit {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => {
                    link.close().await;
                    return Exit::Shutdown;
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        link.close().await;
                        return Exit::Shutdown;
                    };
                    debug!(?command, "sending gateway command");
                    if let Err(e) = link.send(command.to_frame()).await {
                        warn!(error = %e, "failed to send gateway command");
                        return Exit::Lost;
                    }
                }
                frame = link.recv() => match frame {
                    Some(Ok(text)) => match InboundMessage::decode(&text) {
                        Ok(Some(message)) => {
                            if self.inbound.send(message).await.is_err() {
                                link.close().await;
                                return Exit::Shutdown;
                            }
                        }
                        Ok(None) => trace!("ignoring gateway frame with no known topic"),
                        Err(e) => warn!(error = %e, "dropping malformed gateway frame"),
                    },
                    Some(Err(e)) => {
                        warn!(error = %e, "gateway link error");
                        return Exit::Lost;
                    }
                    None => return Exit::Lost,
                },
            }
        }
    }
}
