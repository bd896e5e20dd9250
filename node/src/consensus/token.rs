//! Write-token placement: turn order derivation and rotation.

use crate::game::PlayerId;
use std::collections::BTreeSet;

/// Rotate the configured player list so it starts at the dealer.
/// Returns `None` when the dealer is not a configured player.
pub fn turn_order_from(players: &[PlayerId], dealer: &str) -> Option<Vec<PlayerId>> {
    let idx = players.iter().position(|p| p == dealer)?;
    Some(
        players[idx..]
            .iter()
            .chain(players[..idx].iter())
            .cloned()
            .collect(),
    )
}

/// Next alive player after `current` in `turn_order`, walking cyclically.
///
/// A holder missing from the order (or no holder at all) starts the walk
/// before index 0. The walk covers the whole order, so a lone survivor gets
/// the token back. `None` when nobody in the order is alive.
pub fn next_alive_holder(
    turn_order: &[PlayerId],
    current: Option<&PlayerId>,
    alive: &BTreeSet<PlayerId>,
) -> Option<PlayerId> {
    let n = turn_order.len();
    let start = current
        .and_then(|c| turn_order.iter().position(|p| p == c))
        .map_or(0, |idx| idx + 1);

    (0..n)
        .map(|step| &turn_order[(start + step) % n])
        .find(|candidate| alive.contains(*candidate))
        .cloned()
}
