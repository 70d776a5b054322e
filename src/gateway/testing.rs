//! In-memory connector for driving the connection manager in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::transport::{Connector, Link};
use super::GatewayError;

/// What the next `open` call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Accept,
    Refuse,
}

/// Connector that follows a script of accepts and refusals.
///
/// Once the script runs out every further attempt is refused. Each accepted
/// link is handed to the test as a [`Peer`].
#[derive(Debug)]
pub struct ScriptedConnector {
    plan: Mutex<VecDeque<Step>>,
    opens: AtomicUsize,
    tokens: Mutex<Vec<Option<String>>>,
    peers: mpsc::UnboundedSender<Peer>,
}

impl ScriptedConnector {
    pub fn new(plan: impl IntoIterator<Item = Step>) -> (Arc<Self>, mpsc::UnboundedReceiver<Peer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let connector = Self {
            plan: Mutex::new(plan.into_iter().collect()),
            opens: AtomicUsize::new(0),
            tokens: Mutex::new(Vec::new()),
            peers,
        };
        (Arc::new(connector), rx)
    }

    /// Number of `open` calls so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Bearer tokens presented on each `open` call.
    pub fn tokens(&self) -> Vec<Option<String>> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn push(&self, step: Step) {
        self.plan.lock().unwrap().push_back(step);
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, _url: &str, token: Option<&str>) -> Result<Box<dyn Link>, GatewayError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(token.map(str::to_string));
        let step = self.plan.lock().unwrap().pop_front().unwrap_or(Step::Refuse);
        match step {
            Step::Refuse => Err(GatewayError::Refused("scripted refusal".to_string())),
            Step::Accept => {
                let (to_client, incoming) = mpsc::unbounded_channel();
                let (outgoing, from_client) = mpsc::unbounded_channel();
                let closed = Arc::new(AtomicBool::new(false));
                let _ = self.peers.send(Peer {
                    to_client,
                    from_client,
                    closed: closed.clone(),
                });
                Ok(Box::new(ScriptedLink {
                    incoming,
                    outgoing,
                    closed,
                }))
            }
        }
    }
}

/// The gateway's end of an accepted link. Dropping it hangs up.
#[derive(Debug)]
pub struct Peer {
    to_client: mpsc::UnboundedSender<String>,
    from_client: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl Peer {
    pub fn send_json(&self, value: Value) {
        let _ = self.to_client.send(value.to_string());
    }

    pub fn send_text(&self, text: &str) {
        let _ = self.to_client.send(text.to_string());
    }

    /// Frames the client has sent so far, parsed as JSON.
    pub fn received(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.from_client.try_recv() {
            frames.push(serde_json::from_str(&frame).unwrap());
        }
        frames
    }

    /// Whether the client closed its end.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct ScriptedLink {
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Link for ScriptedLink {
    async fn send(&mut self, frame: String) -> Result<(), GatewayError> {
        self.outgoing
            .send(frame)
            .map_err(|_| GatewayError::Refused("peer hung up".to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, GatewayError>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
