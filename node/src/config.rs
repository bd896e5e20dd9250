//! Node configuration: positional arguments plus `RAMI_*` environment overrides.

use crate::consensus::PeerRegistry;
use crate::game::state::{MAX_PLAYERS, MIN_PLAYERS};
use crate::game::PlayerId;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const LOOPBACK: &str = "127.0.0.1";
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(6);

pub const USAGE: &str = "Usage: rami <player_id> <port> [host_ip]";

/// Configuration for one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub player_id: PlayerId,
    /// Address the listener binds
    pub listen_addr: String,
    /// Where every node (this one included) listens
    pub peers: PeerRegistry,
    /// Seating order, 2-4 players
    pub players: Vec<PlayerId>,
    /// Deals the first hand
    pub initiator: PlayerId,
    /// Base deck seed; hand `n` shuffles with `seed + n`
    pub seed: u64,
    pub heartbeat_interval: Duration,
    /// Silence longer than this marks a peer dead
    pub heartbeat_timeout: Duration,
    pub log_dir: PathBuf,
}

/// Three local nodes on ports 8001-8003
pub fn default_peers() -> PeerRegistry {
    let mut peers = PeerRegistry::new();
    for (i, port) in (8001..=8003).enumerate() {
        peers.register(format!("P{}", i + 1), format!("{}:{}", LOOPBACK, port));
    }
    peers
}

impl Default for NodeConfig {
    fn default() -> Self {
        let peers = default_peers();
        Self {
            player_id: "P1".to_string(),
            listen_addr: format!("{}:8001", LOOPBACK),
            players: peers.players(),
            initiator: "P1".to_string(),
            peers,
            seed: DEFAULT_SEED,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl NodeConfig {
    /// Build from `<player_id> <port> [host_ip]` and the process environment
    pub fn from_args(args: &[String]) -> Result<Self> {
        Self::from_sources(args, |key| std::env::var(key).ok())
    }

    /// Build from positional arguments and an environment lookup
    pub fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let [player_id, port, rest @ ..] = args else {
            bail!("{}", USAGE);
        };
        let port: u16 = port
            .parse()
            .with_context(|| format!("Invalid port '{}'", port))?;
        let host = rest.first().map(String::as_str).unwrap_or(LOOPBACK);
        let bind_host = if host == LOOPBACK { LOOPBACK } else { "0.0.0.0" };

        let mut peers = match env("RAMI_PEERS") {
            Some(list) => list.parse::<PeerRegistry>().context("Invalid RAMI_PEERS")?,
            None => default_peers(),
        };
        // a remote host advertises itself under its own address
        if host != LOOPBACK && peers.contains(player_id) {
            peers.register(player_id.as_str(), format!("{}:{}", host, port));
        }
        let players = peers.players();

        let mut config = Self {
            player_id: player_id.clone(),
            listen_addr: format!("{}:{}", bind_host, port),
            initiator: players.first().cloned().unwrap_or_default(),
            players,
            peers,
            ..Self::default()
        };

        if let Some(seed) = env("RAMI_SEED") {
            config.seed = seed
                .parse()
                .with_context(|| format!("Invalid RAMI_SEED '{}'", seed))?;
        }
        if let Some(ms) = env("RAMI_HEARTBEAT_MS") {
            config.heartbeat_interval = parse_millis("RAMI_HEARTBEAT_MS", &ms)?;
        }
        if let Some(ms) = env("RAMI_HEARTBEAT_TIMEOUT_MS") {
            config.heartbeat_timeout = parse_millis("RAMI_HEARTBEAT_TIMEOUT_MS", &ms)?;
        }
        if let Some(initiator) = env("RAMI_INITIATOR") {
            config.initiator = initiator;
        }
        if let Some(dir) = env("RAMI_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&self.players.len()) {
            bail!(
                "Rami needs {}-{} players, {} configured",
                MIN_PLAYERS,
                MAX_PLAYERS,
                self.players.len()
            );
        }
        if !self.players.contains(&self.player_id) {
            bail!(
                "player_id must be one of: {}",
                self.players.join(", ")
            );
        }
        if !self.players.contains(&self.initiator) {
            bail!("Initiator {} is not a configured player", self.initiator);
        }
        if self.heartbeat_interval.is_zero() {
            bail!("Heartbeat interval must be positive");
        }
        if self.heartbeat_timeout <= self.heartbeat_interval {
            bail!(
                "Heartbeat timeout ({:?}) must exceed the heartbeat interval ({:?})",
                self.heartbeat_timeout,
                self.heartbeat_interval
            );
        }
        Ok(())
    }

    pub fn is_initiator(&self) -> bool {
        self.player_id == self.initiator
    }
}

fn parse_millis(key: &str, value: &str) -> Result<Duration> {
    let ms: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("Invalid {} '{}'", key, value))?;
    Ok(Duration::from_millis(ms))
}
