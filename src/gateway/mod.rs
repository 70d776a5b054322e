//! Sensor gateway access.
//!
//! The gateway is a single long-lived WebSocket that carries every sensor
//! sample, alert and record notice for the logged-in user, and accepts the
//! identify/start/stop commands that steer the stream.
//!
//! - [`message`] decodes inbound frames and encodes commands.
//! - [`transport`] abstracts the duplex link ([`WsConnector`] in production).
//! - [`connection`] owns the link lifecycle and the reconnect policy.

mod connection;
pub mod message;
#[cfg(test)]
pub(crate) mod testing;
pub mod transport;

pub use connection::ConnectionManager;
pub use message::{Command, DecodeError, InboundMessage};
pub use transport::{Connector, Link, WsConnector};

use std::time::Duration;

use thiserror::Error;

/// Reconnect attempts after a link is lost or refused.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Delay between reconnect attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Errors from the gateway link.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid gateway URL: {0}")]
    InvalidUrl(String),

    #[error("bearer token is not a valid header value")]
    InvalidToken,

    #[error("connection refused: {0}")]
    Refused(String),

    #[error("not connected to the gateway")]
    NotConnected,

    #[error("command queue is full")]
    QueueFull,
}

/// Link lifecycle as observed by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

/// Latest connection status, replayed to every new subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Reconnect attempts made since the last successful open.
    pub attempt: u32,
    /// Set once the retry budget is spent; cleared by the next explicit connect.
    pub exhausted: bool,
    /// Bumped on every successful open, so observers can tell links apart.
    pub link: u64,
    /// Which driver may publish; bumped by connect and disconnect.
    epoch: u64,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// Bounded linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts after the initial one.
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Derive the gateway WebSocket URL from the REST API base.
///
/// `http` becomes `ws` and `https` becomes `wss`; `path` is appended after
/// trimming trailing slashes from the base.
pub fn gateway_url(api_base: &str, path: &str) -> Result<String, GatewayError> {
    let base = api_base.trim().trim_end_matches('/');
    let rest = base
        .strip_prefix("http")
        .filter(|rest| rest.starts_with("://") || rest.starts_with("s://"))
        .ok_or_else(|| GatewayError::InvalidUrl(api_base.to_string()))?;

    let path = path.trim();
    if path.starts_with('/') {
        Ok(format!("ws{rest}{path}"))
    } else {
        Ok(format!("ws{rest}/{path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_url_rewrites_scheme() {
        assert_eq!(
            gateway_url("http://127.0.0.1:8000", "/ws/sensores").unwrap(),
            "ws://127.0.0.1:8000/ws/sensores"
        );
        assert_eq!(
            gateway_url("https://api.example.com/", "ws/sensores").unwrap(),
            "wss://api.example.com/ws/sensores"
        );
    }

    #[test]
    fn test_gateway_url_rejects_other_schemes() {
        assert!(matches!(
            gateway_url("ftp://example.com", "/ws"),
            Err(GatewayError::InvalidUrl(_))
        ));
        assert!(gateway_url("httpx://example.com", "/ws").is_err());
        assert!(gateway_url("example.com", "/ws").is_err());
    }

    #[test]
    fn test_default_policy() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.delay, Duration::from_secs(2));
    }
}
