use crate::game::PlayerId;
use anyhow::{bail, Context, Result};
use std::str::FromStr;

/// Registry mapping player ids to the address their node listens on.
/// Keeps the configured order, which is also the seating order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerRegistry {
    peers: Vec<(PlayerId, String)>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a player with its address, format "HOST:PORT".
    /// Re-registering keeps the player's seat and replaces the address.
    pub fn register(&mut self, player: impl Into<PlayerId>, addr: impl Into<String>) {
        let player = player.into();
        let addr = addr.into();
        match self.peers.iter_mut().find(|(id, _)| *id == player) {
            Some(entry) => entry.1 = addr,
            None => self.peers.push((player, addr)),
        }
    }

    pub fn get_address(&self, player: &str) -> Option<&str> {
        self.peers
            .iter()
            .find(|(id, _)| id == player)
            .map(|(_, addr)| addr.as_str())
    }

    pub fn contains(&self, player: &str) -> bool {
        self.get_address(player).is_some()
    }

    /// Player ids in configured order
    pub fn players(&self) -> Vec<PlayerId> {
        self.peers.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Every registered node except `me`
    pub fn others<'a>(&'a self, me: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.peers
            .iter()
            .filter(move |(id, _)| id != me)
            .map(|(id, addr)| (id.as_str(), addr.as_str()))
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Parses `P1=host:port,P2=host:port,...`
impl FromStr for PeerRegistry {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut registry = PeerRegistry::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (player, addr) = entry
                .split_once('=')
                .with_context(|| format!("Peer entry '{}' is not PLAYER=HOST:PORT", entry))?;
            let (player, addr) = (player.trim(), addr.trim());
            if player.is_empty() {
                bail!("Peer entry '{}' has an empty player id", entry);
            }
            let (host, port) = addr
                .rsplit_once(':')
                .with_context(|| format!("Peer address '{}' has no port", addr))?;
            if host.is_empty() {
                bail!("Peer address '{}' has no host", addr);
            }
            port.parse::<u16>()
                .with_context(|| format!("Invalid port in peer address '{}'", addr))?;
            if registry.contains(player) {
                bail!("Player {} is listed twice", player);
            }
            registry.register(player, addr);
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let mut registry = PeerRegistry::new();
        registry.register("P1", "10.0.1.5:8001");
        registry.register("P2", "10.0.1.6:8002");

        assert_eq!(registry.get_address("P1"), Some("10.0.1.5:8001"));
        assert_eq!(registry.get_address("P2"), Some("10.0.1.6:8002"));
        assert_eq!(registry.get_address("P9"), None);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_overwrite_keeps_seat() {
        let mut registry = PeerRegistry::new();
        registry.register("P1", "10.0.1.5:8001");
        registry.register("P2", "10.0.1.6:8002");
        registry.register("P1", "10.0.1.99:8001");

        assert_eq!(registry.get_address("P1"), Some("10.0.1.99:8001"));
        assert_eq!(registry.players(), vec!["P1".to_string(), "P2".to_string()]);
    }

    #[test]
    fn test_others_excludes_self() {
        let registry: PeerRegistry = "P1=127.0.0.1:8001,P2=127.0.0.1:8002,P3=127.0.0.1:8003"
            .parse()
            .unwrap();
        let others: Vec<_> = registry.others("P2").collect();
        assert_eq!(others, vec![("P1", "127.0.0.1:8001"), ("P3", "127.0.0.1:8003")]);
    }

    #[test]
    fn test_parse_errors() {
        assert!("P1".parse::<PeerRegistry>().is_err());
        assert!("P1=localhost".parse::<PeerRegistry>().is_err());
        assert!("P1=localhost:http".parse::<PeerRegistry>().is_err());
        assert!("=localhost:80".parse::<PeerRegistry>().is_err());
        assert!("P1=a:1,P1=b:2".parse::<PeerRegistry>().is_err());

        let registry: PeerRegistry = " P1 = host-a:9000 , ".parse().unwrap();
        assert_eq!(registry.get_address("P1"), Some("host-a:9000"));
    }
}
