use super::card::Card;
use super::melds::{classify, count_jokers, MeldKind};
use thiserror::Error;

/// Cards a winning arrangement must lay down; the 14th card is discarded
pub const ARRANGED_CARDS: usize = 13;

/// Why a winning arrangement was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArrangementError {
    #[error("arrangement must use exactly 13 cards, got {0}")]
    WrongCardCount(usize),
    #[error("card {0} is not in hand")]
    CardNotInHand(Card),
    #[error("arrangement must leave exactly 1 card to discard, {0} left")]
    WrongLeftover(usize),
    #[error("group {} is too short: {}", .0 + 1, format_group(.1))]
    GroupTooShort(usize, Vec<Card>),
    #[error("group {} is neither a valid Tirsi nor Suivi: {}", .0 + 1, format_group(.1))]
    InvalidGroup(usize, Vec<Card>),
    #[error("need at least one Tirsi without joker")]
    MissingFreeTirsi,
    #[error("need at least one Suivi without joker")]
    MissingFreeSuivi,
}

fn format_group(cards: &[Card]) -> String {
    let parts: Vec<String> = cards.iter().map(Card::to_string).collect();
    format!("[{}]", parts.join(", "))
}

/// Validate a winning arrangement of `hand` (13 dealt + 1 drawn).
///
/// Cards are matched against the hand by value, one-for-one, so the two
/// copies of a card from the merged decks are distinct claims. On success
/// the single card left over for the forced discard is returned.
pub fn validate_arrangement(hand: &[Card], groups: &[Vec<Card>]) -> Result<Card, ArrangementError> {
    let used = groups.iter().map(Vec::len).sum::<usize>();
    if used != ARRANGED_CARDS {
        return Err(ArrangementError::WrongCardCount(used));
    }

    let mut remaining = hand.to_vec();
    for card in groups.iter().flatten() {
        let pos = remaining
            .iter()
            .position(|c| c == card)
            .ok_or(ArrangementError::CardNotInHand(*card))?;
        remaining.swap_remove(pos);
    }

    let leftover = match remaining.as_slice() {
        [card] => *card,
        rest => return Err(ArrangementError::WrongLeftover(rest.len())),
    };

    let mut has_free_tirsi = false;
    let mut has_free_suivi = false;
    for (idx, group) in groups.iter().enumerate() {
        if group.len() < 3 {
            return Err(ArrangementError::GroupTooShort(idx, group.clone()));
        }
        let free = count_jokers(group) == 0;
        match classify(group) {
            Some(MeldKind::Tirsi) => has_free_tirsi |= free,
            Some(MeldKind::Suivi) => has_free_suivi |= free,
            None => return Err(ArrangementError::InvalidGroup(idx, group.clone())),
        }
    }

    if !has_free_tirsi {
        return Err(ArrangementError::MissingFreeTirsi);
    }
    if !has_free_suivi {
        return Err(ArrangementError::MissingFreeSuivi);
    }
    Ok(leftover)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards(text: &str) -> Vec<Card> {
        text.split_whitespace().map(|s| s.parse().unwrap()).collect()
    }

    fn groups(text: &str) -> Vec<Vec<Card>> {
        text.split('|').map(cards).collect()
    }

    const HAND: &str = "7H 7D 7S AH 2H 3H 4H 9C 10C JC QS QD JOKER 5S";

    #[test]
    fn test_valid_arrangement_returns_leftover() {
        let hand = cards(HAND);
        let arrangement = groups("7H 7D 7S | AH 2H 3H 4H | 9C 10C JC | QS QD JOKER");
        assert_eq!(validate_arrangement(&hand, &arrangement), Ok("5S".parse().unwrap()));
    }

    #[test]
    fn test_requires_free_tirsi() {
        let hand = cards("7H 7D JOKER AH 2H 3H 4H 9C 10C JC QS QD QC 5S");
        let arrangement = groups("7H 7D JOKER | AH 2H 3H 4H | 9C 10C JC | QS QD QC");
        assert!(validate_arrangement(&hand, &arrangement).is_ok());

        // the only Tirsi carries the joker
        let hand = cards("7H 7D JOKER AH 2H 3H 4H 9C 10C JC QS KS AS 5S");
        let arrangement = groups("7H 7D JOKER | AH 2H 3H 4H | 9C 10C JC | QS KS AS");
        assert_eq!(
            validate_arrangement(&hand, &arrangement),
            Err(ArrangementError::MissingFreeTirsi)
        );
    }

    #[test]
    fn test_requires_free_suivi() {
        let hand = cards("7H 7D 7S 8H 8D 8S 9H 9D 9S 2C JOKER 4C 5C 5S");
        let arrangement = groups("7H 7D 7S | 8H 8D 8S | 9H 9D 9S | 2C JOKER 4C 5C");
        assert_eq!(
            validate_arrangement(&hand, &arrangement),
            Err(ArrangementError::MissingFreeSuivi)
        );
    }

    #[test]
    fn test_card_count_must_be_thirteen() {
        let hand = cards(HAND);
        let arrangement = groups("7H 7D 7S | AH 2H 3H 4H | 9C 10C JC");
        assert_eq!(
            validate_arrangement(&hand, &arrangement),
            Err(ArrangementError::WrongCardCount(10))
        );
    }

    #[test]
    fn test_duplicates_matched_one_for_one() {
        let hand = cards(HAND);
        // 7H claimed twice but held once
        let arrangement = groups("7H 7D 7H | AH 2H 3H 4H | 9C 10C JC | QS QD JOKER");
        assert_eq!(
            validate_arrangement(&hand, &arrangement),
            Err(ArrangementError::CardNotInHand("7H".parse().unwrap()))
        );

        // both physical copies held: each claim consumes one
        let hand = cards("7H 7H 7D 7S AH 2H 3H 4H 9C 10C JC QS QD 5S");
        let arrangement = groups("7H 7D 7S | AH 2H 3H 4H | 9C 10C JC | QS QD 7H");
        assert!(matches!(
            validate_arrangement(&hand, &arrangement),
            Err(ArrangementError::InvalidGroup(3, _))
        ));
    }

    #[test]
    fn test_wrong_leftover_with_short_hand() {
        let hand = cards("7H 7D 7S AH 2H 3H 4H 9C 10C JC QS QD JOKER");
        let arrangement = groups("7H 7D 7S | AH 2H 3H 4H | 9C 10C JC | QS QD JOKER");
        assert_eq!(
            validate_arrangement(&hand, &arrangement),
            Err(ArrangementError::WrongLeftover(0))
        );
    }

    #[test]
    fn test_short_group_rejected() {
        let hand = cards("7H 7D 7S AH 2H 3H 4H 9C 10C JC QS QD JOKER 5S");
        let arrangement = groups("7H 7D 7S AH | 2H 3H | 4H 9C 10C JC QS QD JOKER");
        assert!(matches!(
            validate_arrangement(&hand, &arrangement),
            Err(ArrangementError::InvalidGroup(0, _))
        ));
        let arrangement = groups("7H 7D 7S | AH 2H | 3H 4H 9C 10C JC QS QD JOKER");
        assert!(matches!(
            validate_arrangement(&hand, &arrangement),
            Err(ArrangementError::GroupTooShort(1, _))
        ));
    }

    #[test]
    fn test_error_messages_are_readable() {
        let err = ArrangementError::GroupTooShort(1, cards("AH 2H"));
        assert_eq!(err.to_string(), "group 2 is too short: [AH, 2H]");
    }
}
