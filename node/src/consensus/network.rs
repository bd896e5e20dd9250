use super::peer_registry::PeerRegistry;
use super::protocol::Message;
use super::NodeEvent;
use anyhow::Result;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info, warn};

pub type LinkId = u64;

/// Live TCP links to peers, keyed by a local link id.
/// Readers own the read halves; the write halves live here.
#[derive(Clone, Default)]
pub struct Connections {
    links: Arc<RwLock<HashMap<LinkId, Link>>>,
    next_id: Arc<AtomicU64>,
}

struct Link {
    peer: SocketAddr,
    writer: OwnedWriteHalf,
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    async fn add(&self, peer: SocketAddr, writer: OwnedWriteHalf) -> LinkId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.links.write().await.insert(id, Link { peer, writer });
        id
    }

    pub async fn remove(&self, id: LinkId) {
        if let Some(link) = self.links.write().await.remove(&id) {
            debug!(peer = %link.peer, link = id, "Link removed");
        }
    }

    pub async fn len(&self) -> usize {
        self.links.read().await.len()
    }

    /// Write one message to every link; links that fail the write are dropped.
    /// Returns how many links accepted it.
    pub async fn broadcast(&self, msg: &Message) -> Result<usize> {
        let line = msg.encode()?;
        let mut links = self.links.write().await;

        let mut failed = Vec::new();
        for (id, link) in links.iter_mut() {
            if let Err(e) = link.writer.write_all(&line).await {
                warn!(peer = %link.peer, error = %e, "Send failed, dropping link");
                failed.push(*id);
            }
        }
        for id in &failed {
            links.remove(id);
        }
        Ok(links.len())
    }

    /// Register a connected stream and start its reader
    pub async fn attach(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        events: mpsc::Sender<NodeEvent>,
        stop: broadcast::Receiver<()>,
    ) {
        let (reader, writer) = stream.into_split();
        let id = self.add(peer, writer).await;
        tokio::spawn(read_loop(id, peer, reader, self.clone(), events, stop));
    }
}

/// Decode newline-delimited messages from one link until EOF or stop.
/// Undecodable lines are logged and skipped.
async fn read_loop(
    id: LinkId,
    peer: SocketAddr,
    reader: OwnedReadHalf,
    connections: Connections,
    events: mpsc::Sender<NodeEvent>,
    mut stop: broadcast::Receiver<()>,
) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        tokio::select! {
            _ = stop.recv() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match Message::decode(line.as_bytes()) {
                        Ok(msg) => {
                            if events.send(NodeEvent::Inbound(msg)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(%peer, error = %e, "Dropping undecodable line"),
                    }
                }
                Ok(None) => {
                    info!(%peer, "Peer closed connection");
                    break;
                }
                Err(e) => {
                    warn!(%peer, error = %e, "Read failed");
                    break;
                }
            }
        }
    }
    connections.remove(id).await;
}

/// Accept inbound links until stopped
pub async fn accept_loop(
    listener: TcpListener,
    connections: Connections,
    events: mpsc::Sender<NodeEvent>,
    stop: broadcast::Sender<()>,
) {
    let mut stop_rx = stop.subscribe();
    loop {
        tokio::select! {
            _ = stop_rx.recv() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    info!(%peer, "Accepted connection");
                    connections.attach(stream, peer, events.clone(), stop.subscribe()).await;
                }
                Err(e) => warn!(error = %e, "Accept failed"),
            }
        }
    }
    debug!("Accept loop stopped");
}

/// Dial every other configured node once. Failures are logged; the peer can
/// still reach us through the accept loop.
pub async fn dial_peers(
    registry: &PeerRegistry,
    me: &str,
    connections: &Connections,
    events: &mpsc::Sender<NodeEvent>,
    stop: &broadcast::Sender<()>,
) {
    for (player, addr) in registry.others(me) {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                let peer = match stream.peer_addr() {
                    Ok(peer) => peer,
                    Err(e) => {
                        warn!(peer = player, %addr, error = %e, "Connected socket has no peer address");
                        continue;
                    }
                };
                info!(peer = player, %addr, "Connected to peer");
                connections.attach(stream, peer, events.clone(), stop.subscribe()).await;
            }
            Err(e) => warn!(peer = player, %addr, error = %e, "Failed to connect"),
        }
    }
}
