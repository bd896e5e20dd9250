//! Handle used by the front-end to drive a running node.

use super::protocol::{Action, ActionKind};
use super::replica::{NodeSnapshot, ProposeError};
use super::NodeEvent;
use crate::game::{DrawSource, PlayerId};
use anyhow::{anyhow, Context, Result};
use std::net::SocketAddr;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Result of asking the node to act
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposeOutcome {
    /// Broadcast to peers; the commit or abort follows asynchronously
    Proposed(Action),
    NoToken,
    NoGame,
}

impl From<Result<Action, ProposeError>> for ProposeOutcome {
    fn from(result: Result<Action, ProposeError>) -> Self {
        match result {
            Ok(action) => ProposeOutcome::Proposed(action),
            Err(ProposeError::NoToken) => ProposeOutcome::NoToken,
            Err(ProposeError::NoGame) => ProposeOutcome::NoGame,
        }
    }
}

/// Requests served by the node actor
pub enum Request {
    Propose {
        kind: ActionKind,
        reply: oneshot::Sender<ProposeOutcome>,
    },
    Snapshot {
        reply: oneshot::Sender<NodeSnapshot>,
    },
    /// Broadcast PLAYER_QUIT, flush it, then stop the node
    Quit { reply: oneshot::Sender<()> },
}

#[derive(Clone)]
pub struct NodeHandle {
    player_id: PlayerId,
    local_addr: SocketAddr,
    events: mpsc::Sender<NodeEvent>,
    stop: broadcast::Sender<()>,
}

impl NodeHandle {
    pub(crate) fn new(
        player_id: PlayerId,
        local_addr: SocketAddr,
        events: mpsc::Sender<NodeEvent>,
        stop: broadcast::Sender<()>,
    ) -> Self {
        Self {
            player_id,
            local_addr,
            events,
            stop,
        }
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Request) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.events
            .send(NodeEvent::Request(build(tx)))
            .await
            .map_err(|_| anyhow!("Node {} is not running", self.player_id))?;
        rx.await
            .with_context(|| format!("Node {} dropped the request", self.player_id))
    }

    async fn propose(&self, kind: ActionKind) -> Result<ProposeOutcome> {
        self.request(|reply| Request::Propose { kind, reply }).await
    }

    pub async fn try_draw(&self, source: DrawSource) -> Result<ProposeOutcome> {
        self.propose(ActionKind::Draw { source }).await
    }

    /// The card text goes out as given; peers vote no on a card they cannot parse
    pub async fn try_discard(&self, card: &str) -> Result<ProposeOutcome> {
        self.propose(ActionKind::Discard {
            card: card.to_string(),
        })
        .await
    }

    pub async fn try_declare_win(&self, groups: Vec<Vec<String>>) -> Result<ProposeOutcome> {
        self.propose(ActionKind::DeclareWin { groups }).await
    }

    pub async fn snapshot(&self) -> Result<NodeSnapshot> {
        self.request(|reply| Request::Snapshot { reply }).await
    }

    /// Tell peers we are leaving, then shut down. Returns once the
    /// announcement has been written to every link.
    pub async fn announce_quit(&self) -> Result<()> {
        self.request(|reply| Request::Quit { reply }).await
    }

    /// Stop every node task without telling peers
    pub fn shutdown(&self) {
        let _ = self.stop.send(());
    }
}
