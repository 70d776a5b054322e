//! Duplex text transport underneath the connection manager.
//!
//! The manager only needs "open a link, exchange text frames, close it".
//! [`Connector`] and [`Link`] capture that so the reconnect logic can be
//! driven by the real WebSocket client or by an in-memory double.

use std::fmt::Debug;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use super::GatewayError;

/// An open, bidirectional text link.
#[async_trait]
pub trait Link: Send {
    /// Send one text frame.
    async fn send(&mut self, frame: String) -> Result<(), GatewayError>;

    /// Receive the next text frame.
    ///
    /// Returns `None` once the peer has closed the link.
    async fn recv(&mut self) -> Option<Result<String, GatewayError>>;

    /// Close the link. Errors are not reported; the link is unusable afterwards.
    async fn close(&mut self);
}

/// Opens links to the gateway.
#[async_trait]
pub trait Connector: Send + Sync + Debug {
    /// Open a link to `url`, presenting `token` as a bearer credential if given.
    async fn open(&self, url: &str, token: Option<&str>) -> Result<Box<dyn Link>, GatewayError>;
}

/// WebSocket connector backed by tokio-tungstenite.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str, token: Option<&str>) -> Result<Box<dyn Link>, GatewayError> {
        let mut request = url.into_client_request()?;
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| GatewayError::InvalidToken)?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, response) = connect_async(request).await.map_err(|e| match e {
            // The gateway answered, but not with a protocol switch (bad token, wrong path).
            WsError::Http(response) => {
                GatewayError::Refused(format!("handshake rejected with HTTP {}", response.status()))
            }
            other => GatewayError::WebSocket(other),
        })?;
        debug!(url, status = %response.status(), "websocket handshake complete");
        Ok(Box::new(WsLink { stream }))
    }
}

struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Link for WsLink {
    async fn send(&mut self, frame: String) -> Result<(), GatewayError> {
        self.stream.send(Message::Text(frame.into())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, GatewayError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => trace!("skipping non-UTF-8 binary frame"),
                },
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "gateway closed the websocket");
                    return None;
                }
                // Ping/pong are answered by tungstenite itself.
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            trace!(error = %e, "websocket close failed");
        }
    }
}
