use super::arrangement::{validate_arrangement, ArrangementError};
use super::card::Card;
use super::deck::Deck;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Player identifier shared by the game and the network layer (`P1`, `P2`, ...)
pub type PlayerId = String;

/// Cards dealt to each player at the start of a hand
pub const HAND_SIZE: usize = 13;
pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 4;

/// Turn phase of a hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Init,
    AwaitDraw,
    AwaitDiscardOrWin,
    WinDeclared,
    GameOver,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "INIT",
            Phase::AwaitDraw => "AWAIT_DRAW",
            Phase::AwaitDiscardOrWin => "AWAIT_DISCARD_OR_WIN",
            Phase::WinDeclared => "WIN_DECLARED",
            Phase::GameOver => "GAME_OVER",
        };
        f.write_str(name)
    }
}

/// Pile a player draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawSource {
    Deck,
    Discard,
}

impl fmt::Display for DrawSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawSource::Deck => f.write_str("deck"),
            DrawSource::Discard => f.write_str("discard"),
        }
    }
}

/// Rule violations reported by the game engine. None of them mutate state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("Rami supports 2-4 players, got {0}")]
    PlayerCount(usize),
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("not {player}'s turn (current player is {current})")]
    NotYourTurn { player: PlayerId, current: PlayerId },
    #[error("{action} not allowed in phase {phase}")]
    WrongPhase { action: &'static str, phase: Phase },
    #[error("deck is empty")]
    EmptyDeck,
    #[error("discard pile is empty")]
    EmptyDiscard,
    #[error("player does not hold {0}")]
    CardNotHeld(Card),
    #[error("must hold exactly 14 cards to declare a win, holding {0}")]
    HandSize(usize),
    #[error("invalid arrangement: {0}")]
    Arrangement(#[from] ArrangementError),
    #[error("deck ran out while dealing")]
    DeckExhausted,
}

/// A seated player and their hand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub player_id: PlayerId,
    pub hand: Vec<Card>,
}

impl Player {
    fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            hand: Vec::new(),
        }
    }

    fn remove_card(&mut self, card: &Card) -> bool {
        match self.hand.iter().position(|c| c == card) {
            Some(pos) => {
                self.hand.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// Read-only view of a hand in progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    pub current_player: PlayerId,
    pub phase: Phase,
    pub deck_size: usize,
    pub deck_top: Option<Card>,
    pub discard_top: Option<Card>,
    pub hand_sizes: BTreeMap<PlayerId, usize>,
}

/// One hand of Rami: pure game logic, no networking.
///
/// Every replica builds the same `RamiGame` from the same turn order and seed
/// and applies the same committed actions, so replicas stay identical.
#[derive(Debug, Clone)]
pub struct RamiGame {
    deck: Deck,
    discard_pile: Vec<Card>,
    players: BTreeMap<PlayerId, Player>,
    turn_order: Vec<PlayerId>,
    current_player_index: usize,
    phase: Phase,
}

impl RamiGame {
    /// Shuffle a deck from `seed` and deal 13 cards to each player,
    /// round-robin in turn order.
    pub fn new(turn_order: Vec<PlayerId>, seed: u64) -> Result<Self, GameError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&turn_order.len()) {
            return Err(GameError::PlayerCount(turn_order.len()));
        }

        let players = turn_order
            .iter()
            .map(|id| (id.clone(), Player::new(id.clone())))
            .collect::<BTreeMap<_, _>>();
        if players.len() != turn_order.len() {
            return Err(GameError::PlayerCount(players.len()));
        }

        let mut game = Self {
            deck: Deck::new(seed),
            discard_pile: Vec::new(),
            players,
            turn_order,
            current_player_index: 0,
            phase: Phase::Init,
        };
        game.deal()?;
        Ok(game)
    }

    fn deal(&mut self) -> Result<(), GameError> {
        for _ in 0..HAND_SIZE {
            for id in &self.turn_order {
                let card = self.deck.draw().ok_or(GameError::DeckExhausted)?;
                if let Some(player) = self.players.get_mut(id) {
                    player.hand.push(card);
                }
            }
        }
        self.phase = Phase::AwaitDraw;
        Ok(())
    }

    pub fn current_player(&self) -> &PlayerId {
        &self.turn_order[self.current_player_index]
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn turn_order(&self) -> &[PlayerId] {
        &self.turn_order
    }

    pub fn hand(&self, player_id: &str) -> Option<&[Card]> {
        self.players.get(player_id).map(|p| p.hand.as_slice())
    }

    pub fn discard_pile(&self) -> &[Card] {
        &self.discard_pile
    }

    pub fn deck_len(&self) -> usize {
        self.deck.len()
    }

    /// Cards in deck, discard pile and all hands; always 108
    pub fn total_cards(&self) -> usize {
        self.deck.len()
            + self.discard_pile.len()
            + self.players.values().map(|p| p.hand.len()).sum::<usize>()
    }

    pub fn summary(&self) -> GameSummary {
        GameSummary {
            current_player: self.current_player().clone(),
            phase: self.phase,
            deck_size: self.deck.len(),
            deck_top: self.deck.peek_top().copied(),
            discard_top: self.discard_pile.last().copied(),
            hand_sizes: self
                .players
                .iter()
                .map(|(id, p)| (id.clone(), p.hand.len()))
                .collect(),
        }
    }

    fn ensure_turn(&self, player_id: &str) -> Result<&Player, GameError> {
        let player = self
            .players
            .get(player_id)
            .ok_or_else(|| GameError::UnknownPlayer(player_id.to_string()))?;
        if self.current_player() != player_id {
            return Err(GameError::NotYourTurn {
                player: player_id.to_string(),
                current: self.current_player().clone(),
            });
        }
        Ok(player)
    }

    fn advance_turn(&mut self) {
        self.current_player_index = (self.current_player_index + 1) % self.turn_order.len();
        self.phase = Phase::AwaitDraw;
    }

    // ----- Draw -----

    pub fn check_draw(&self, player_id: &str, source: DrawSource) -> Result<(), GameError> {
        self.ensure_turn(player_id)?;
        if self.phase != Phase::AwaitDraw {
            return Err(GameError::WrongPhase {
                action: "draw",
                phase: self.phase,
            });
        }
        match source {
            DrawSource::Deck if self.deck.is_empty() => Err(GameError::EmptyDeck),
            DrawSource::Discard if self.discard_pile.is_empty() => Err(GameError::EmptyDiscard),
            _ => Ok(()),
        }
    }

    pub fn draw(&mut self, player_id: &str, source: DrawSource) -> Result<Card, GameError> {
        self.check_draw(player_id, source)?;
        let card = match source {
            DrawSource::Deck => self.deck.draw().ok_or(GameError::EmptyDeck)?,
            DrawSource::Discard => self.discard_pile.pop().ok_or(GameError::EmptyDiscard)?,
        };
        if let Some(player) = self.players.get_mut(player_id) {
            player.hand.push(card);
        }
        self.phase = Phase::AwaitDiscardOrWin;
        Ok(card)
    }

    // ----- Discard -----

    pub fn check_discard(&self, player_id: &str, card: &Card) -> Result<(), GameError> {
        let player = self.ensure_turn(player_id)?;
        if !matches!(self.phase, Phase::AwaitDiscardOrWin | Phase::WinDeclared) {
            return Err(GameError::WrongPhase {
                action: "discard",
                phase: self.phase,
            });
        }
        if !player.hand.contains(card) {
            return Err(GameError::CardNotHeld(*card));
        }
        Ok(())
    }

    /// Discard a card. After a declared win this is the final discard and
    /// ends the hand; otherwise the turn passes to the next player.
    pub fn discard(&mut self, player_id: &str, card: &Card) -> Result<(), GameError> {
        self.check_discard(player_id, card)?;
        if let Some(player) = self.players.get_mut(player_id) {
            player.remove_card(card);
        }
        self.discard_pile.push(*card);

        if self.phase == Phase::WinDeclared {
            self.phase = Phase::GameOver;
        } else {
            self.advance_turn();
        }
        Ok(())
    }

    // ----- Winning -----

    /// Validate a win declaration and return the card left for the forced discard
    pub fn check_declare_win(&self, player_id: &str, groups: &[Vec<Card>]) -> Result<Card, GameError> {
        let player = self.ensure_turn(player_id)?;
        if self.phase != Phase::AwaitDiscardOrWin {
            return Err(GameError::WrongPhase {
                action: "declare win",
                phase: self.phase,
            });
        }
        if player.hand.len() != HAND_SIZE + 1 {
            return Err(GameError::HandSize(player.hand.len()));
        }
        Ok(validate_arrangement(&player.hand, groups)?)
    }

    /// Declare a win. The hand is left untouched: the caller completes the
    /// hand by discarding the returned card.
    pub fn declare_win(&mut self, player_id: &str, groups: &[Vec<Card>]) -> Result<Card, GameError> {
        let leftover = self.check_declare_win(player_id, groups)?;
        self.phase = Phase::WinDeclared;
        Ok(leftover)
    }

    #[cfg(test)]
    pub(crate) fn replace_hand(&mut self, player_id: &str, hand: Vec<Card>) {
        if let Some(player) = self.players.get_mut(player_id) {
            player.hand = hand;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::card::Suit;
    use crate::game::deck::DECK_SIZE;

    fn ids(names: &[&str]) -> Vec<PlayerId> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn card(text: &str) -> Card {
        text.parse().unwrap()
    }

    /// A natural card value the player does not hold
    fn card_not_held(game: &RamiGame, player: &str) -> Card {
        let hand = game.hand(player).unwrap();
        Suit::ALL
            .iter()
            .flat_map(|&suit| (1..=13).map(move |rank| Card::new(rank, suit)))
            .find(|c| !hand.contains(c))
            .unwrap()
    }

    #[test]
    fn test_deal() {
        let game = RamiGame::new(ids(&["P1", "P2", "P3"]), 42).unwrap();
        assert_eq!(game.phase(), Phase::AwaitDraw);
        assert_eq!(game.current_player(), "P1");
        for id in ["P1", "P2", "P3"] {
            assert_eq!(game.hand(id).unwrap().len(), HAND_SIZE);
        }
        assert_eq!(game.deck_len(), DECK_SIZE - 3 * HAND_SIZE);
        assert_eq!(game.total_cards(), DECK_SIZE);
    }

    #[test]
    fn test_player_count_bounds() {
        assert_eq!(RamiGame::new(ids(&["P1"]), 1).unwrap_err(), GameError::PlayerCount(1));
        assert!(RamiGame::new(ids(&["P1", "P2", "P3", "P4", "P5"]), 1).is_err());
        assert!(RamiGame::new(ids(&["P1", "P1"]), 1).is_err());
        assert!(RamiGame::new(ids(&["P1", "P2", "P3", "P4"]), 1).is_ok());
    }

    #[test]
    fn test_same_seed_same_deal() {
        let a = RamiGame::new(ids(&["P1", "P2"]), 9).unwrap();
        let b = RamiGame::new(ids(&["P1", "P2"]), 9).unwrap();
        assert_eq!(a.hand("P1"), b.hand("P1"));
        assert_eq!(a.summary(), b.summary());
    }

    #[test]
    fn test_turn_cycle() {
        let mut game = RamiGame::new(ids(&["P1", "P2"]), 3).unwrap();

        let drawn = game.draw("P1", DrawSource::Deck).unwrap();
        assert_eq!(game.phase(), Phase::AwaitDiscardOrWin);
        assert_eq!(game.hand("P1").unwrap().len(), HAND_SIZE + 1);

        game.discard("P1", &drawn).unwrap();
        assert_eq!(game.current_player(), "P2");
        assert_eq!(game.phase(), Phase::AwaitDraw);
        assert_eq!(game.discard_pile(), &[drawn]);

        // P2 picks up P1's discard
        assert_eq!(game.draw("P2", DrawSource::Discard).unwrap(), drawn);
        assert!(game.discard_pile().is_empty());
        assert_eq!(game.total_cards(), DECK_SIZE);
    }

    #[test]
    fn test_rule_violations_leave_state_untouched() {
        let mut game = RamiGame::new(ids(&["P1", "P2"]), 3).unwrap();
        let before = game.summary();

        assert!(matches!(
            game.draw("P2", DrawSource::Deck),
            Err(GameError::NotYourTurn { .. })
        ));
        assert_eq!(game.draw("P1", DrawSource::Discard), Err(GameError::EmptyDiscard));
        assert!(matches!(
            game.discard("P1", &card("JOKER")),
            Err(GameError::WrongPhase { .. })
        ));
        assert_eq!(
            game.draw("P9", DrawSource::Deck),
            Err(GameError::UnknownPlayer("P9".to_string()))
        );
        assert_eq!(game.summary(), before);

        game.draw("P1", DrawSource::Deck).unwrap();
        assert!(matches!(
            game.draw("P1", DrawSource::Deck),
            Err(GameError::WrongPhase { action: "draw", .. })
        ));
    }

    #[test]
    fn test_empty_deck_is_observable() {
        let mut game = RamiGame::new(ids(&["P1", "P2"]), 5).unwrap();
        while game.deck.draw().is_some() {}
        assert_eq!(game.summary().deck_size, 0);
        assert_eq!(game.summary().deck_top, None);
        assert_eq!(game.check_draw("P1", DrawSource::Deck), Err(GameError::EmptyDeck));
    }

    #[test]
    fn test_discard_card_not_in_hand_fails_without_mutation() {
        // dealer P2 with players P1..P3 gives turn order [P2, P3, P1]
        let mut game = RamiGame::new(ids(&["P2", "P3", "P1"]), 42).unwrap();
        game.draw("P2", DrawSource::Deck).unwrap();

        let foreign = card_not_held(&game, "P2");
        let hand_before = game.hand("P2").unwrap().to_vec();
        let summary_before = game.summary();

        assert_eq!(game.discard("P2", &foreign), Err(GameError::CardNotHeld(foreign)));
        assert_eq!(game.hand("P2").unwrap(), hand_before.as_slice());
        assert_eq!(game.summary(), summary_before);
    }

    #[test]
    fn test_declare_win_then_final_discard() {
        let mut game = RamiGame::new(ids(&["P1", "P2"]), 11).unwrap();
        game.draw("P1", DrawSource::Deck).unwrap();

        let winning: Vec<Card> = "7H 7D 7S AH 2H 3H 4H 9C 10C JC QS QD JOKER 5S"
            .split_whitespace()
            .map(card)
            .collect();
        game.players.get_mut("P1").unwrap().hand = winning;
        let groups: Vec<Vec<Card>> = "7H 7D 7S | AH 2H 3H 4H | 9C 10C JC | QS QD JOKER"
            .split('|')
            .map(|g| g.split_whitespace().map(card).collect())
            .collect();

        let leftover = game.declare_win("P1", &groups).unwrap();
        assert_eq!(leftover, card("5S"));
        assert_eq!(game.phase(), Phase::WinDeclared);
        // declaring does not touch the hand
        assert_eq!(game.hand("P1").unwrap().len(), 14);
        assert!(matches!(
            game.declare_win("P1", &groups),
            Err(GameError::WrongPhase { .. })
        ));

        game.discard("P1", &leftover).unwrap();
        assert_eq!(game.phase(), Phase::GameOver);
        assert_eq!(game.current_player(), "P1");
        assert_eq!(game.hand("P1").unwrap().len(), 13);
    }

    #[test]
    fn test_declare_win_requires_fourteen_cards() {
        let mut game = RamiGame::new(ids(&["P1", "P2"]), 11).unwrap();
        assert!(matches!(
            game.check_declare_win("P1", &[]),
            Err(GameError::WrongPhase { .. })
        ));
        game.draw("P1", DrawSource::Deck).unwrap();
        game.players.get_mut("P1").unwrap().hand.pop();
        assert_eq!(game.check_declare_win("P1", &[]), Err(GameError::HandSize(13)));
    }

    #[test]
    fn test_invalid_arrangement_is_reported() {
        let mut game = RamiGame::new(ids(&["P1", "P2"]), 11).unwrap();
        game.draw("P1", DrawSource::Deck).unwrap();
        assert_eq!(
            game.declare_win("P1", &[]),
            Err(GameError::Arrangement(ArrangementError::WrongCardCount(0)))
        );
        assert_eq!(game.phase(), Phase::AwaitDiscardOrWin);
    }
}
