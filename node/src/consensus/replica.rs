//! Replica of one node: the game engine plus token, votes and liveness.
//!
//! `Replica` is synchronous and owns no sockets. Inputs are decoded messages,
//! local proposals and timer ticks; outputs are queued in an outbox that the
//! runtime drains and broadcasts to every peer.

use super::liveness::LivenessTracker;
use super::protocol::{Action, ActionKey, ActionKind, Message, Payload};
use super::token::{next_alive_holder, turn_order_from};
use crate::game::{parse_groups, Card, CardParseError, GameError, GameSummary, Phase, PlayerId, RamiGame};
use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Yes-votes needed to commit, independent of how many players are alive
pub const COMMIT_QUORUM: usize = 2;

/// Why a local proposal was not sent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProposeError {
    #[error("cannot act without the write token")]
    NoToken,
    #[error("no hand in progress")]
    NoGame,
}

/// Why an action was rejected by this replica
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("no hand in progress")]
    NoGame,
    #[error("{sender} proposed an action for {player}")]
    ForeignProposal { sender: PlayerId, player: PlayerId },
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Card(#[from] CardParseError),
}

/// Read-only view of a node for the front-end
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub player_id: PlayerId,
    pub hand_number: u64,
    pub dealer: Option<PlayerId>,
    pub turn_order: Vec<PlayerId>,
    pub token_holder: Option<PlayerId>,
    pub alive_players: Vec<PlayerId>,
    pub my_hand: Vec<Card>,
    pub discard_pile: Vec<Card>,
    pub game: Option<GameSummary>,
    pub last_winner: Option<PlayerId>,
}

impl NodeSnapshot {
    pub fn holds_token(&self) -> bool {
        self.token_holder.as_deref() == Some(self.player_id.as_str())
    }
}

pub struct Replica {
    me: PlayerId,
    players: Vec<PlayerId>,
    base_seed: u64,
    rng: StdRng,

    hand_number: u64,
    dealer: Option<PlayerId>,
    turn_order: Vec<PlayerId>,
    token_holder: Option<PlayerId>,
    game: Option<RamiGame>,
    last_winner: Option<PlayerId>,

    alive: BTreeSet<PlayerId>,
    liveness: LivenessTracker,

    next_action_id: u64,
    actions: HashMap<ActionKey, Action>,
    pending_votes: HashMap<ActionKey, BTreeMap<PlayerId, bool>>,
    /// Tallies this node closed as token holder
    decided: HashSet<ActionKey>,
    applied: HashSet<ActionKey>,

    outbox: Vec<Message>,
}

impl Replica {
    /// `players` is the configured player list; `rng` only picks dealers
    pub fn new(
        me: PlayerId,
        players: Vec<PlayerId>,
        base_seed: u64,
        heartbeat_timeout: Duration,
        rng: StdRng,
        now: Instant,
    ) -> Self {
        Self {
            liveness: LivenessTracker::new(&players, heartbeat_timeout, now),
            alive: players.iter().cloned().collect(),
            turn_order: players.clone(),
            me,
            players,
            base_seed,
            rng,
            hand_number: 0,
            dealer: None,
            token_holder: None,
            game: None,
            last_winner: None,
            next_action_id: 0,
            actions: HashMap::new(),
            pending_votes: HashMap::new(),
            decided: HashSet::new(),
            applied: HashSet::new(),
            outbox: Vec::new(),
        }
    }

    pub fn me(&self) -> &PlayerId {
        &self.me
    }

    pub fn holds_token(&self) -> bool {
        self.token_holder.as_ref() == Some(&self.me)
    }

    pub fn token_holder(&self) -> Option<&PlayerId> {
        self.token_holder.as_ref()
    }

    pub fn alive_players(&self) -> &BTreeSet<PlayerId> {
        &self.alive
    }

    pub fn game(&self) -> Option<&RamiGame> {
        self.game.as_ref()
    }

    pub fn hand_number(&self) -> u64 {
        self.hand_number
    }

    /// Take every message queued for broadcast
    pub fn drain_outbox(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.outbox)
    }

    fn send(&mut self, payload: Payload) {
        self.outbox.push(Message::new(self.me.clone(), payload));
    }

    pub fn hello(&mut self) {
        self.send(Payload::Hello {});
    }

    pub fn heartbeat(&mut self) {
        self.send(Payload::Heartbeat {});
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            player_id: self.me.clone(),
            hand_number: self.hand_number,
            dealer: self.dealer.clone(),
            turn_order: self.turn_order.clone(),
            token_holder: self.token_holder.clone(),
            alive_players: self.alive.iter().cloned().collect(),
            my_hand: self
                .game
                .as_ref()
                .and_then(|g| g.hand(&self.me))
                .map(<[Card]>::to_vec)
                .unwrap_or_default(),
            discard_pile: self
                .game
                .as_ref()
                .map(|g| g.discard_pile().to_vec())
                .unwrap_or_default(),
            game: self.game.as_ref().map(RamiGame::summary),
            last_winner: self.last_winner.clone(),
        }
    }

    // ----- Hands -----

    /// Pick a dealer among alive players and start the next hand everywhere
    pub fn start_new_hand(&mut self) {
        let alive = &self.alive;
        let dealer = self
            .players
            .iter()
            .filter(|p| alive.contains(*p))
            .choose(&mut self.rng)
            .cloned();
        match dealer {
            Some(dealer) => self.start_new_hand_with_dealer(dealer),
            None => warn!(player = %self.me, "No alive player can deal"),
        }
    }

    pub fn start_new_hand_with_dealer(&mut self, dealer: PlayerId) {
        let hand = if self.game.is_some() {
            self.hand_number + 1
        } else {
            self.hand_number
        };
        info!(player = %self.me, %dealer, hand, "Starting new hand");
        self.send(Payload::DealerSelected {
            dealer: dealer.clone(),
            hand,
        });
        self.apply_dealer(dealer, hand);
    }

    fn apply_dealer(&mut self, dealer: PlayerId, hand: u64) {
        let Some(turn_order) = turn_order_from(&self.players, &dealer) else {
            warn!(player = %self.me, %dealer, "Ignoring unknown dealer");
            return;
        };

        let seed = self.base_seed.wrapping_add(hand);
        match RamiGame::new(turn_order.clone(), seed) {
            Ok(game) => self.game = Some(game),
            Err(e) => {
                error!(player = %self.me, error = %e, "Failed to deal");
                self.game = None;
            }
        }

        info!(player = %self.me, %dealer, hand, ?turn_order, "Dealer selected");
        self.hand_number = hand;
        self.turn_order = turn_order;
        self.token_holder = Some(dealer.clone());
        self.dealer = Some(dealer);
        self.actions.clear();
        self.pending_votes.clear();

        if self.holds_token() {
            self.announce_token();
        }
    }

    fn observe_win(&mut self, winner: PlayerId) {
        info!(player = %self.me, %winner, hand = self.hand_number, "Hand won");
        self.last_winner = Some(winner);
        if self.holds_token() {
            self.start_new_hand();
        }
    }

    // ----- Token -----

    fn announce_token(&mut self) {
        self.send(Payload::TokenAnnounce {
            token_holder: self.token_holder.clone(),
        });
    }

    fn rotate_token(&mut self) {
        self.token_holder = next_alive_holder(&self.turn_order, self.token_holder.as_ref(), &self.alive);
        info!(player = %self.me, holder = ?self.token_holder, "Token rotated");
        self.announce_token();
    }

    // ----- Liveness -----

    /// Declare dead every peer whose heartbeat is older than the timeout
    pub fn sweep_liveness(&mut self, now: Instant) {
        for peer in self.liveness.expired(&self.me, now) {
            self.mark_dead(&peer, "heartbeat timeout");
        }
    }

    pub fn mark_dead(&mut self, player: &str, reason: &str) {
        if !self.alive.remove(player) {
            return;
        }
        warn!(player = %self.me, peer = player, reason, "Player removed from alive set");
        self.liveness.clear(player);
        for votes in self.pending_votes.values_mut() {
            votes.remove(player);
        }

        if self.token_holder.as_deref() == Some(player) {
            self.rotate_token();
        }

        // a smaller alive set may complete a tally
        if self.holds_token() {
            let mine: Vec<ActionKey> = self
                .pending_votes
                .keys()
                .filter(|k| k.proposer == self.me)
                .cloned()
                .collect();
            for key in mine {
                self.try_tally(&key);
            }
        }
    }

    /// Broadcast our own departure and stop counting ourselves alive
    pub fn announce_quit(&mut self) {
        info!(player = %self.me, "Announcing quit");
        self.send(Payload::PlayerQuit {
            player: self.me.clone(),
        });
        let me = self.me.clone();
        self.mark_dead(&me, "self quit");
    }

    // ----- Proposals -----

    /// Propose an action for this player. Requires the write token.
    pub fn propose(&mut self, kind: ActionKind) -> Result<Action, ProposeError> {
        if !self.holds_token() {
            warn!(player = %self.me, kind = kind.name(), "Cannot propose: no token");
            return Err(ProposeError::NoToken);
        }
        if self.game.is_none() {
            warn!(player = %self.me, kind = kind.name(), "Cannot propose: no hand in progress");
            return Err(ProposeError::NoGame);
        }

        self.next_action_id += 1;
        let action = Action {
            action_id: self.next_action_id,
            player: self.me.clone(),
            kind,
        };
        let key = action.key();
        info!(player = %self.me, action_id = action.action_id, kind = action.kind.name(), "Proposing action");

        self.actions.insert(key.clone(), action.clone());
        self.pending_votes
            .insert(key.clone(), BTreeMap::from([(self.me.clone(), true)]));
        self.send(Payload::ActionPropose(action.clone()));
        self.try_tally(&key);
        Ok(action)
    }

    /// Check an action against this replica without mutating anything
    pub fn check_action(&self, action: &Action) -> Result<(), ActionError> {
        let game = self.game.as_ref().ok_or(ActionError::NoGame)?;
        let player = action.player.as_str();
        match &action.kind {
            ActionKind::Draw { source } => game.check_draw(player, *source)?,
            ActionKind::Discard { card } => game.check_discard(player, &card.parse()?)?,
            ActionKind::DeclareWin { groups } => {
                game.check_declare_win(player, &parse_groups(groups)?)?;
            }
        }
        Ok(())
    }

    fn on_propose(&mut self, sender: PlayerId, action: Action) {
        let key = action.key();
        if self.applied.contains(&key) || self.decided.contains(&key) {
            debug!(player = %self.me, action = %key, "Ignoring proposal already settled");
            return;
        }

        let verdict = if sender != action.player {
            Err(ActionError::ForeignProposal {
                sender,
                player: action.player.clone(),
            })
        } else {
            self.check_action(&action)
        };
        let vote = verdict.is_ok();
        match verdict {
            Ok(()) => debug!(player = %self.me, action = %key, kind = action.kind.name(), "Voting yes"),
            Err(e) => info!(player = %self.me, action = %key, kind = action.kind.name(), reason = %e, "Voting no"),
        }

        self.pending_votes
            .entry(key.clone())
            .or_default()
            .insert(self.me.clone(), vote);
        self.actions.insert(key.clone(), action);
        self.send(Payload::ActionVote {
            action_id: key.action_id,
            proposer: Some(key.proposer),
            vote,
        });
    }

    fn on_vote(&mut self, voter: PlayerId, key: ActionKey, vote: bool) {
        if self.decided.contains(&key) || self.applied.contains(&key) {
            return;
        }
        self.pending_votes
            .entry(key.clone())
            .or_default()
            .insert(voter, vote);
        self.try_tally(&key);
    }

    /// Close the tally of one of our own proposals once every alive player voted
    fn try_tally(&mut self, key: &ActionKey) {
        if !self.holds_token() || key.proposer != self.me || self.decided.contains(key) {
            return;
        }
        let Some(votes) = self.pending_votes.get(key) else {
            return;
        };
        if !self.alive.iter().all(|p| votes.contains_key(p)) {
            return;
        }
        let yes = votes
            .iter()
            .filter(|(voter, vote)| **vote && self.alive.contains(*voter))
            .count();
        let Some(action) = self.actions.get(key).cloned() else {
            return;
        };

        self.decided.insert(key.clone());
        self.pending_votes.remove(key);

        if yes >= COMMIT_QUORUM {
            info!(player = %self.me, action = %key, kind = action.kind.name(), yes, "Committed action");
            self.send(Payload::ActionCommit {
                action: action.clone(),
            });
            self.apply(&action);

            let hand_over = self.game.as_ref().map_or(true, |g| g.phase() == Phase::GameOver);
            if matches!(action.kind, ActionKind::Discard { .. }) && !hand_over {
                self.rotate_token();
            }
        } else {
            warn!(
                player = %self.me,
                action = %key,
                kind = action.kind.name(),
                yes,
                alive = self.alive.len(),
                "Aborted action: insufficient votes"
            );
            self.send(Payload::ActionAbort {
                action_id: key.action_id,
                proposer: Some(key.proposer.clone()),
            });
            self.rotate_token();
        }
    }

    // ----- Commit -----

    /// Apply a committed action once. Failures are logged, never propagated.
    fn apply(&mut self, action: &Action) {
        let key = action.key();
        if self.game.is_none() {
            warn!(player = %self.me, action = %key, "Commit without a hand in progress");
            return;
        }
        if !self.applied.insert(key.clone()) {
            debug!(player = %self.me, action = %key, "Duplicate commit ignored");
            return;
        }
        self.pending_votes.remove(&key);

        match self.apply_to_game(action) {
            Ok(Some(winner)) => {
                if self.holds_token() {
                    self.send(Payload::WinDecision {
                        winner: winner.clone(),
                    });
                    self.observe_win(winner);
                }
            }
            Ok(None) => {}
            Err(e) => error!(
                player = %self.me,
                action = %key,
                kind = action.kind.name(),
                error = %e,
                "Failed to apply committed action"
            ),
        }
    }

    /// Mutate the game; returns the winner when the action ended the hand
    fn apply_to_game(&mut self, action: &Action) -> Result<Option<PlayerId>, ActionError> {
        let game = self.game.as_mut().ok_or(ActionError::NoGame)?;
        let player = action.player.as_str();
        match &action.kind {
            ActionKind::Draw { source } => {
                let card = game.draw(player, *source)?;
                info!(player = %self.me, actor = player, %source, %card, "Applied draw");
            }
            ActionKind::Discard { card } => {
                let card: Card = card.parse()?;
                game.discard(player, &card)?;
                info!(player = %self.me, actor = player, %card, "Applied discard");
            }
            ActionKind::DeclareWin { groups } => {
                let groups = parse_groups(groups)?;
                let leftover = game.declare_win(player, &groups)?;
                game.discard(player, &leftover)?;
                info!(player = %self.me, actor = player, %leftover, "Applied win declaration");
                return Ok(Some(action.player.clone()));
            }
        }
        Ok(None)
    }

    // ----- Inbound -----

    pub fn handle_message(&mut self, msg: Message, now: Instant) {
        let Message { sender, payload } = msg;
        match payload {
            Payload::Hello {} => info!(player = %self.me, peer = %sender, "Peer said hello"),
            Payload::Heartbeat {} => self.liveness.record(&sender, now),
            Payload::DealerSelected { dealer, hand } => {
                let stale = hand < self.hand_number
                    || (hand == self.hand_number
                        && self.game.is_some()
                        && self.dealer.as_ref() == Some(&dealer));
                if stale {
                    debug!(player = %self.me, %dealer, hand, "Ignoring repeated dealer selection");
                    return;
                }
                self.apply_dealer(dealer, hand);
            }
            Payload::TokenAnnounce { token_holder } => {
                if self.token_holder != token_holder {
                    info!(player = %self.me, holder = ?token_holder, "Token holder changed");
                }
                self.token_holder = token_holder;
            }
            Payload::ActionPropose(action) => self.on_propose(sender, action),
            Payload::ActionVote {
                action_id,
                proposer,
                vote,
            } => {
                let Some(proposer) = proposer.or_else(|| self.token_holder.clone()) else {
                    debug!(player = %self.me, action_id, "Vote without a known proposer");
                    return;
                };
                self.on_vote(sender, ActionKey { proposer, action_id }, vote);
            }
            Payload::ActionCommit { action } => self.apply(&action),
            Payload::ActionAbort {
                action_id,
                proposer,
            } => {
                let key = ActionKey {
                    proposer: proposer.unwrap_or(sender),
                    action_id,
                };
                warn!(player = %self.me, action = %key, "Action aborted");
                self.pending_votes.remove(&key);
                self.actions.remove(&key);
            }
            Payload::PlayerQuit { player } => {
                info!(player = %self.me, quitter = %player, "Player announced quit");
                self.mark_dead(&player, "player quit");
            }
            Payload::WinDecision { winner } => self.observe_win(winner),
        }
    }
}
