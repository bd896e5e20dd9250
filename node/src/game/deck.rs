use super::card::{Card, Suit, MAX_RANK, MIN_RANK};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Number of physical 52-card decks merged into one Rami deck
pub const STANDARD_DECKS: usize = 2;
/// Jokers added on top of the standard decks
pub const JOKERS: usize = 4;
/// 2 x 52 + 4
pub const DECK_SIZE: usize = STANDARD_DECKS * 52 + JOKERS;

/// Shuffled Rami deck. The top of the deck is the end of the vector.
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Build the full 108-card deck and shuffle it deterministically from `seed`.
    /// Replicas constructing a deck from the same seed see the same order.
    pub fn new(seed: u64) -> Self {
        let mut deck = Self::unshuffled();
        let mut rng = StdRng::seed_from_u64(seed);
        deck.cards.shuffle(&mut rng);
        deck
    }

    /// The full deck in construction order (both decks suit by suit, then jokers)
    pub fn unshuffled() -> Self {
        let mut cards = Vec::with_capacity(DECK_SIZE);
        for _ in 0..STANDARD_DECKS {
            for suit in Suit::ALL {
                for rank in MIN_RANK..=MAX_RANK {
                    cards.push(Card::new(rank, suit));
                }
            }
        }
        cards.extend(std::iter::repeat(Card::Joker).take(JOKERS));
        Self { cards }
    }

    /// Remove and return the top card, `None` once the deck is exhausted
    pub fn draw(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    pub fn peek_top(&self) -> Option<&Card> {
        self.cards.last()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}
