//! Wire messages exchanged between nodes.
//!
//! Every message is one JSON object per line:
//! `{"type": "ACTION_VOTE", "sender": "P2", "payload": {"action_id": 3, "proposer": "P1", "vote": true}}`

use crate::game::{DrawSource, PlayerId};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a proposed action: the proposer's local counter value.
/// Counters are per proposer, so the proposer is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionKey {
    pub proposer: PlayerId,
    pub action_id: u64,
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.proposer, self.action_id)
    }
}

/// Kind-specific part of a game action.
///
/// Cards stay in their text form here; a payload that does not parse is a
/// rule violation found during validation, not a transport error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Draw { source: DrawSource },
    Discard { card: String },
    DeclareWin { groups: Vec<Vec<String>> },
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Draw { .. } => "DRAW",
            ActionKind::Discard { .. } => "DISCARD",
            ActionKind::DeclareWin { .. } => "DECLARE_WIN",
        }
    }
}

/// A game action proposed by the token holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub action_id: u64,
    pub player: PlayerId,
    #[serde(flatten)]
    pub kind: ActionKind,
}

impl Action {
    pub fn key(&self) -> ActionKey {
        ActionKey {
            proposer: self.player.clone(),
            action_id: self.action_id,
        }
    }
}

/// Message body, tagged by `type` with the fields under `payload`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Payload {
    Hello {},
    Heartbeat {},
    DealerSelected {
        dealer: PlayerId,
        #[serde(default)]
        hand: u64,
    },
    TokenAnnounce {
        token_holder: Option<PlayerId>,
    },
    ActionPropose(Action),
    ActionVote {
        action_id: u64,
        #[serde(default)]
        proposer: Option<PlayerId>,
        vote: bool,
    },
    ActionCommit {
        action: Action,
    },
    ActionAbort {
        action_id: u64,
        #[serde(default)]
        proposer: Option<PlayerId>,
    },
    PlayerQuit {
        player: PlayerId,
    },
    WinDecision {
        winner: PlayerId,
    },
}

impl Payload {
    pub fn name(&self) -> &'static str {
        match self {
            Payload::Hello {} => "HELLO",
            Payload::Heartbeat {} => "HEARTBEAT",
            Payload::DealerSelected { .. } => "DEALER_SELECTED",
            Payload::TokenAnnounce { .. } => "TOKEN_ANNOUNCE",
            Payload::ActionPropose(_) => "ACTION_PROPOSE",
            Payload::ActionVote { .. } => "ACTION_VOTE",
            Payload::ActionCommit { .. } => "ACTION_COMMIT",
            Payload::ActionAbort { .. } => "ACTION_ABORT",
            Payload::PlayerQuit { .. } => "PLAYER_QUIT",
            Payload::WinDecision { .. } => "WIN_DECISION",
        }
    }
}

/// A message on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: PlayerId,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Message {
    pub fn new(sender: impl Into<PlayerId>, payload: Payload) -> Self {
        Self {
            sender: sender.into(),
            payload,
        }
    }

    /// Encode as one newline-terminated JSON line
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self).context("Failed to encode message")?;
        line.push(b'\n');
        Ok(line)
    }

    /// Decode one line (without its trailing newline)
    pub fn decode(line: &[u8]) -> Result<Self> {
        serde_json::from_slice(line).context("Failed to decode message")
    }
}
