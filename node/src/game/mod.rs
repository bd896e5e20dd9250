pub mod arrangement;
pub mod card;
pub mod deck;
pub mod melds;
pub mod state;

pub use arrangement::{validate_arrangement, ArrangementError};
pub use card::{parse_groups, Card, CardParseError, Suit};
pub use deck::{Deck, DECK_SIZE};
pub use melds::{classify, is_free_suivi, is_free_tirsi, is_suivi, is_tirsi, MeldKind};
pub use state::{DrawSource, GameError, GameSummary, Phase, PlayerId, RamiGame, HAND_SIZE};
