//! Meld classification: Tirsi (same-rank set) and Suivi (same-suit run).

use super::card::{Card, ACE};
use std::collections::HashSet;

/// Ace counted above the King in an Ace-high run (Q, K, A)
const ACE_HIGH: u8 = 14;

/// Kind of a valid meld
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeldKind {
    Tirsi,
    Suivi,
}

pub fn count_jokers(cards: &[Card]) -> usize {
    cards.iter().filter(|c| c.is_joker()).count()
}

/// Tirsi: 3 or 4 cards of one rank, every natural card a different suit.
/// At most one joker, and never jokers alone.
pub fn is_tirsi(cards: &[Card]) -> bool {
    if !(3..=4).contains(&cards.len()) || count_jokers(cards) > 1 {
        return false;
    }

    let naturals: Vec<(u8, _)> = cards
        .iter()
        .filter_map(|c| Some((c.rank()?, c.suit()?)))
        .collect();
    let Some(&(rank, _)) = naturals.first() else {
        return false;
    };
    if naturals.iter().any(|&(r, _)| r != rank) {
        return false;
    }

    let suits: HashSet<_> = naturals.iter().map(|&(_, s)| s).collect();
    suits.len() == naturals.len()
}

/// Suivi: 3+ cards of one suit with consecutive ranks.
///
/// At most one joker, which may stand in for a single missing rank. The Ace
/// plays low (A, 2, 3) or high (Q, K, A) but a run never wraps (K, A, 2).
pub fn is_suivi(cards: &[Card]) -> bool {
    if cards.len() < 3 {
        return false;
    }
    let jokers = count_jokers(cards);
    if jokers > 1 {
        return false;
    }

    let naturals: Vec<(u8, _)> = cards
        .iter()
        .filter_map(|c| Some((c.rank()?, c.suit()?)))
        .collect();
    let Some(&(_, suit)) = naturals.first() else {
        return false;
    };
    if naturals.iter().any(|&(_, s)| s != suit) {
        return false;
    }

    let mut ranks: Vec<u8> = naturals.iter().map(|&(r, _)| r).collect();
    ranks.sort_unstable();
    if ranks.windows(2).any(|w| w[0] == w[1]) {
        return false;
    }

    let allow_gap = jokers == 1;
    if is_consecutive(&ranks, allow_gap) {
        return true;
    }
    if ranks.contains(&ACE) {
        let mut high: Vec<u8> = ranks
            .iter()
            .map(|&r| if r == ACE { ACE_HIGH } else { r })
            .collect();
        high.sort_unstable();
        return is_consecutive(&high, allow_gap);
    }
    false
}

/// Sorted, distinct ranks form a run; with `allow_gap` a single missing rank
/// may be bridged once.
fn is_consecutive(sorted: &[u8], allow_gap: bool) -> bool {
    let mut gap_used = false;
    for w in sorted.windows(2) {
        match w[1] - w[0] {
            1 => {}
            2 if allow_gap && !gap_used => gap_used = true,
            _ => return false,
        }
    }
    !sorted.is_empty()
}

pub fn is_free_tirsi(cards: &[Card]) -> bool {
    count_jokers(cards) == 0 && is_tirsi(cards)
}

pub fn is_free_suivi(cards: &[Card]) -> bool {
    count_jokers(cards) == 0 && is_suivi(cards)
}

/// Classify a group, trying Tirsi before Suivi
pub fn classify(cards: &[Card]) -> Option<MeldKind> {
    if is_tirsi(cards) {
        Some(MeldKind::Tirsi)
    } else if is_suivi(cards) {
        Some(MeldKind::Suivi)
    } else {
        None
    }
}
