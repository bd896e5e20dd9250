//! Token-based replication of the Rami game between 2-4 peer nodes.
//!
//! One actor task owns the [`Replica`]. Connection readers, timers and the
//! [`NodeHandle`] only enqueue [`NodeEvent`]s; a single broadcaster task
//! writes the replica's outgoing messages to every link.

pub mod api;
pub mod liveness;
pub mod network;
pub mod peer_registry;
pub mod protocol;
pub mod replica;
pub mod token;

pub use api::{NodeHandle, ProposeOutcome, Request};
pub use peer_registry::PeerRegistry;
pub use protocol::{Action, ActionKey, ActionKind, Message, Payload};
pub use replica::{NodeSnapshot, ProposeError, Replica, COMMIT_QUORUM};

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use network::Connections;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

/// Capacity of the actor's inbound queue
const EVENT_QUEUE: usize = 1024;
/// Pause between binding and dialing, so peers started together are listening
const CONNECT_DELAY: Duration = Duration::from_millis(500);

/// Periodic timer kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Heartbeat,
    Liveness,
}

/// Everything the node actor reacts to
pub enum NodeEvent {
    Inbound(Message),
    Tick(Tick),
    Request(Request),
}

/// Work for the broadcaster task
enum Outbound {
    Message(Message),
    /// Answered once every earlier message has been written
    Flush(oneshot::Sender<()>),
}

/// Bind, connect to peers, deal the first hand if we are the initiator and
/// start the node's tasks.
pub async fn start_node(config: NodeConfig) -> Result<NodeHandle> {
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    let local_addr = listener
        .local_addr()
        .context("Listener has no local address")?;
    info!(player = %config.player_id, %local_addr, "Listening");

    let (stop_tx, _) = broadcast::channel(1);
    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let connections = Connections::new();

    tokio::spawn(network::accept_loop(
        listener,
        connections.clone(),
        events_tx.clone(),
        stop_tx.clone(),
    ));

    tokio::time::sleep(CONNECT_DELAY).await;
    network::dial_peers(
        &config.peers,
        &config.player_id,
        &connections,
        &events_tx,
        &stop_tx,
    )
    .await;

    let mut replica = Replica::new(
        config.player_id.clone(),
        config.players.clone(),
        config.seed,
        config.heartbeat_timeout,
        StdRng::from_entropy(),
        Instant::now(),
    );
    replica.hello();
    if config.is_initiator() {
        replica.start_new_hand();
    }

    tokio::spawn(run_broadcaster(outbound_rx, connections));
    spawn_ticker(
        Tick::Heartbeat,
        config.heartbeat_interval,
        events_tx.clone(),
        stop_tx.subscribe(),
    );
    spawn_ticker(
        Tick::Liveness,
        config.heartbeat_interval,
        events_tx.clone(),
        stop_tx.subscribe(),
    );
    tokio::spawn(run_actor(
        replica,
        events_rx,
        outbound_tx,
        stop_tx.clone(),
        stop_tx.subscribe(),
    ));

    info!(
        player = %config.player_id,
        players = ?config.players,
        initiator = %config.initiator,
        seed = config.seed,
        "Node started"
    );
    Ok(NodeHandle::new(
        config.player_id,
        local_addr,
        events_tx,
        stop_tx,
    ))
}

fn spawn_ticker(
    tick: Tick,
    period: Duration,
    events: mpsc::Sender<NodeEvent>,
    mut stop: broadcast::Receiver<()>,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = stop.recv() => break,
                _ = interval.tick() => {
                    if events.send(NodeEvent::Tick(tick)).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
}

fn flush_outbox(replica: &mut Replica, outbound: &mpsc::UnboundedSender<Outbound>) {
    for msg in replica.drain_outbox() {
        debug!(player = %msg.sender, kind = msg.payload.name(), "Broadcasting");
        if outbound.send(Outbound::Message(msg)).is_err() {
            warn!("Broadcaster stopped, dropping outgoing message");
        }
    }
}

/// Owns the replica; every state change happens here
async fn run_actor(
    mut replica: Replica,
    mut events: mpsc::Receiver<NodeEvent>,
    outbound: mpsc::UnboundedSender<Outbound>,
    stop: broadcast::Sender<()>,
    mut stop_rx: broadcast::Receiver<()>,
) {
    flush_outbox(&mut replica, &outbound);
    loop {
        let event = tokio::select! {
            _ = stop_rx.recv() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            NodeEvent::Inbound(msg) => replica.handle_message(msg, Instant::now()),
            NodeEvent::Tick(Tick::Heartbeat) => replica.heartbeat(),
            NodeEvent::Tick(Tick::Liveness) => replica.sweep_liveness(Instant::now()),
            NodeEvent::Request(Request::Propose { kind, reply }) => {
                let _ = reply.send(replica.propose(kind).into());
            }
            NodeEvent::Request(Request::Snapshot { reply }) => {
                let _ = reply.send(replica.snapshot());
            }
            NodeEvent::Request(Request::Quit { reply }) => {
                replica.announce_quit();
                flush_outbox(&mut replica, &outbound);
                let _ = outbound.send(Outbound::Flush(reply));
                let _ = stop.send(());
                break;
            }
        }
        flush_outbox(&mut replica, &outbound);
    }
    info!(player = %replica.me(), "Node stopped");
}

/// Write queued messages in order; ends once the actor is gone
async fn run_broadcaster(
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    connections: Connections,
) {
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Message(msg) => {
                if let Err(e) = connections.broadcast(&msg).await {
                    warn!(kind = msg.payload.name(), error = %e, "Broadcast failed");
                }
            }
            Outbound::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{DrawSource, Phase};
    use std::path::PathBuf;
    use tokio::time::{sleep, timeout};

    /// Distinct ports that were free a moment ago
    fn free_ports(n: usize) -> Vec<u16> {
        let listeners: Vec<_> = (0..n)
            .map(|_| std::net::TcpListener::bind("127.0.0.1:0").unwrap())
            .collect();
        listeners
            .iter()
            .map(|l| l.local_addr().unwrap().port())
            .collect()
    }

    fn config(player: &str, peers: &PeerRegistry) -> NodeConfig {
        NodeConfig {
            player_id: player.to_string(),
            listen_addr: peers.get_address(player).unwrap().to_string(),
            peers: peers.clone(),
            players: peers.players(),
            initiator: "P1".to_string(),
            seed: 42,
            heartbeat_interval: Duration::from_millis(100),
            heartbeat_timeout: Duration::from_secs(3),
            log_dir: PathBuf::from("logs"),
        }
    }

    async fn wait_for(
        handle: &NodeHandle,
        mut done: impl FnMut(&NodeSnapshot) -> bool,
    ) -> NodeSnapshot {
        timeout(Duration::from_secs(10), async {
            loop {
                let snapshot = handle.snapshot().await.unwrap();
                if done(&snapshot) {
                    return snapshot;
                }
                sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .expect("condition not reached in time")
    }

    #[tokio::test]
    async fn test_two_nodes_commit_a_draw() {
        let ports = free_ports(2);
        let mut peers = PeerRegistry::new();
        peers.register("P1", format!("127.0.0.1:{}", ports[0]));
        peers.register("P2", format!("127.0.0.1:{}", ports[1]));

        let p2 = start_node(config("P2", &peers)).await.unwrap();
        let p1 = start_node(config("P1", &peers)).await.unwrap();

        let handles = [p1.clone(), p2.clone()];
        for handle in &handles {
            wait_for(handle, |s| s.game.is_some() && s.token_holder.is_some()).await;
        }

        let dealer = p1.snapshot().await.unwrap().dealer.unwrap();
        let holder = handles
            .iter()
            .find(|h| h.player_id() == dealer)
            .unwrap();
        let other = handles
            .iter()
            .find(|h| h.player_id() != dealer)
            .unwrap();

        assert_eq!(
            other.try_draw(DrawSource::Deck).await.unwrap(),
            ProposeOutcome::NoToken
        );
        assert!(matches!(
            holder.try_draw(DrawSource::Deck).await.unwrap(),
            ProposeOutcome::Proposed(_)
        ));

        for handle in &handles {
            let snapshot = wait_for(handle, |s| {
                s.game.as_ref().map(|g| g.phase) == Some(Phase::AwaitDiscardOrWin)
            })
            .await;
            assert_eq!(snapshot.game.unwrap().hand_sizes[&dealer], 14);
        }

        holder.announce_quit().await.unwrap();
        let survivor = wait_for(other, |s| s.alive_players.len() == 1).await;
        assert_eq!(survivor.token_holder.as_deref(), Some(other.player_id()));
        other.shutdown();
    }
}
