use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Card suit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

    pub fn letter(self) -> char {
        match self {
            Suit::Hearts => 'H',
            Suit::Diamonds => 'D',
            Suit::Clubs => 'C',
            Suit::Spades => 'S',
        }
    }

    pub fn from_letter(ch: char) -> Option<Suit> {
        match ch.to_ascii_uppercase() {
            'H' => Some(Suit::Hearts),
            'D' => Some(Suit::Diamonds),
            'C' => Some(Suit::Clubs),
            'S' => Some(Suit::Spades),
            _ => None,
        }
    }
}

pub const MIN_RANK: u8 = 1;
pub const MAX_RANK: u8 = 13;
pub const ACE: u8 = 1;

/// A playing card. Ace is rank 1, King is rank 13.
///
/// Serialized in its canonical text form (`AH`, `10D`, `QS`, `JOKER`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Card {
    Natural { rank: u8, suit: Suit },
    Joker,
}

impl Card {
    /// Build a natural card. Panics on a rank outside 1..=13, so only use it
    /// with literal ranks; parse text through `FromStr`.
    pub const fn new(rank: u8, suit: Suit) -> Self {
        assert!(rank >= MIN_RANK && rank <= MAX_RANK);
        Card::Natural { rank, suit }
    }

    pub fn is_joker(&self) -> bool {
        matches!(self, Card::Joker)
    }

    pub fn rank(&self) -> Option<u8> {
        match self {
            Card::Natural { rank, .. } => Some(*rank),
            Card::Joker => None,
        }
    }

    pub fn suit(&self) -> Option<Suit> {
        match self {
            Card::Natural { suit, .. } => Some(*suit),
            Card::Joker => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardParseError {
    #[error("empty card string")]
    Empty,
    #[error("invalid rank in card {0:?}")]
    InvalidRank(String),
    #[error("invalid suit in card {0:?}")]
    InvalidSuit(String),
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Card::Joker => write!(f, "JOKER"),
            Card::Natural { rank, suit } => {
                match rank {
                    1 => write!(f, "A")?,
                    11 => write!(f, "J")?,
                    12 => write!(f, "Q")?,
                    13 => write!(f, "K")?,
                    r => write!(f, "{r}")?,
                }
                write!(f, "{}", suit.letter())
            }
        }
    }
}

/// Parse `7H`, `10d`, `QS`, `JOKER`.
impl FromStr for Card {
    type Err = CardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CardParseError::Empty);
        }
        if s.eq_ignore_ascii_case("JOKER") {
            return Ok(Card::Joker);
        }

        let mut chars = s.chars();
        let suit_ch = chars.next_back().ok_or(CardParseError::Empty)?;
        let suit = Suit::from_letter(suit_ch)
            .ok_or_else(|| CardParseError::InvalidSuit(s.to_string()))?;

        let rank_str = chars.as_str();
        let rank = match rank_str.to_ascii_uppercase().as_str() {
            "A" => 1,
            "J" => 11,
            "Q" => 12,
            "K" => 13,
            digits => digits
                .parse::<u8>()
                .ok()
                .filter(|r| (2..=10).contains(r))
                .ok_or_else(|| CardParseError::InvalidRank(s.to_string()))?,
        };

        Ok(Card::Natural { rank, suit })
    }
}

impl TryFrom<String> for Card {
    type Error = CardParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Card> for String {
    fn from(card: Card) -> Self {
        card.to_string()
    }
}

/// Parse a list of card groups given as text, e.g. `[["7H","7D","7S"], ...]`.
pub fn parse_groups<S: AsRef<str>>(groups: &[Vec<S>]) -> Result<Vec<Vec<Card>>, CardParseError> {
    groups
        .iter()
        .map(|group| group.iter().map(|c| c.as_ref().parse()).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_card() -> impl Strategy<Value = Card> {
        prop_oneof![
            1 => Just(Card::Joker),
            52 => (MIN_RANK..=MAX_RANK, 0usize..4)
                .prop_map(|(rank, s)| Card::new(rank, Suit::ALL[s])),
        ]
    }

    proptest! {
        #[test]
        fn text_form_round_trips(card in any_card()) {
            let text = card.to_string();
            prop_assert_eq!(text.parse::<Card>().unwrap(), card);
        }
    }

    #[test]
    fn test_display_face_cards() {
        assert_eq!(Card::new(1, Suit::Hearts).to_string(), "AH");
        assert_eq!(Card::new(10, Suit::Diamonds).to_string(), "10D");
        assert_eq!(Card::new(11, Suit::Clubs).to_string(), "JC");
        assert_eq!(Card::new(12, Suit::Spades).to_string(), "QS");
        assert_eq!(Card::new(13, Suit::Hearts).to_string(), "KH");
        assert_eq!(Card::Joker.to_string(), "JOKER");
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("7h".parse::<Card>().unwrap(), Card::new(7, Suit::Hearts));
        assert_eq!("qd".parse::<Card>().unwrap(), Card::new(12, Suit::Diamonds));
        assert_eq!("joker".parse::<Card>().unwrap(), Card::Joker);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!("".parse::<Card>(), Err(CardParseError::Empty));
        assert!(matches!("7X".parse::<Card>(), Err(CardParseError::InvalidSuit(_))));
        assert!(matches!("1H".parse::<Card>(), Err(CardParseError::InvalidRank(_))));
        assert!(matches!("14S".parse::<Card>(), Err(CardParseError::InvalidRank(_))));
        assert!(matches!("H".parse::<Card>(), Err(CardParseError::InvalidRank(_))));
    }

    #[test]
    fn test_serde_uses_text_form() {
        let json = serde_json::to_string(&vec![Card::new(1, Suit::Spades), Card::Joker]).unwrap();
        assert_eq!(json, r#"["AS","JOKER"]"#);

        let back: Vec<Card> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![Card::new(1, Suit::Spades), Card::Joker]);
        assert!(serde_json::from_str::<Card>(r#""ZZ""#).is_err());
    }

    #[test]
    fn test_parse_groups() {
        let groups = vec![vec!["7H", "7D", "7S"], vec!["AH", "2H", "JOKER"]];
        let parsed = parse_groups(&groups).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1][2], Card::Joker);

        let bad = vec![vec!["7H", "nope"]];
        assert!(parse_groups(&bad).is_err());
    }
}
