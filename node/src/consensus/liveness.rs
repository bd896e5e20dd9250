use crate::game::PlayerId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Last heartbeat seen per configured player.
///
/// `None` marks a player whose record was cleared when it was declared dead.
#[derive(Debug, Clone)]
pub struct LivenessTracker {
    last_seen: HashMap<PlayerId, Option<Instant>>,
    timeout: Duration,
}

impl LivenessTracker {
    /// Every configured player starts as freshly seen at `now`
    pub fn new(players: &[PlayerId], timeout: Duration, now: Instant) -> Self {
        Self {
            last_seen: players.iter().map(|p| (p.clone(), Some(now))).collect(),
            timeout,
        }
    }

    /// Record a heartbeat. Senders outside the configured set are ignored.
    pub fn record(&mut self, player: &str, now: Instant) {
        if let Some(seen) = self.last_seen.get_mut(player) {
            *seen = Some(now);
        }
    }

    pub fn clear(&mut self, player: &str) {
        if let Some(seen) = self.last_seen.get_mut(player) {
            *seen = None;
        }
    }

    pub fn last_seen(&self, player: &str) -> Option<Instant> {
        self.last_seen.get(player).copied().flatten()
    }

    /// Players other than `me` whose last heartbeat is older than the timeout.
    /// Cleared records are not reported again.
    pub fn expired(&self, me: &str, now: Instant) -> Vec<PlayerId> {
        let mut expired: Vec<PlayerId> = self
            .last_seen
            .iter()
            .filter(|(id, _)| id.as_str() != me)
            .filter_map(|(id, seen)| {
                let seen = (*seen)?;
                (now.saturating_duration_since(seen) > self.timeout).then(|| id.clone())
            })
            .collect();
        expired.sort();
        expired
    }
}
