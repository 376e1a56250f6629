use std::collections::BTreeSet;
use std::fmt;

use duel_engine::cards::Deck;
use duel_engine::types::{ActionKind, Card, MatchOutcome, Phase, RoundWinner, Side};
use serde::{Deserialize, Serialize};

use crate::error::ArenaError;
use crate::ids::{Address, RoomId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoomStatus {
    /// Host is in, seat for a guest is open.
    Waiting,
    /// Both players seated, decks not yet committed.
    Ready,
    InProgress,
    /// Terminal. Never reopened.
    Finished,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RoomStatus::Waiting => "waiting",
            RoomStatus::Ready => "ready",
            RoomStatus::InProgress => "in-progress",
            RoomStatus::Finished => "finished",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spectator {
    pub address: Address,
    pub display_name: String,
    pub joined_at_ms: u64,
}

/// One player's side of the duel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub deck: Option<Deck>,
    /// Card chosen for the current round.
    pub selected: Option<Card>,
    /// Modifier bought for the current round.
    pub action: Option<ActionKind>,
    pub score: u8,
    pub boost_balance: u64,
    pub ante_escrowed: bool,
}

impl Seat {
    fn new(boost_stake: u64) -> Self {
        Self {
            deck: None,
            selected: None,
            action: None,
            score: 0,
            boost_balance: boost_stake,
            ante_escrowed: false,
        }
    }

    pub fn hand(&self) -> &[Card] {
        self.deck.as_ref().map(|d| d.hand()).unwrap_or(&[])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub phase: Phase,
    /// 1-based once play starts; 0 during deck building.
    pub round: u8,
    pub host: Seat,
    pub guest: Seat,
    /// Absolute deadline of the current phase, ms since the epoch.
    pub deadline_ms: Option<u64>,
}

impl GameState {
    fn new(boost_stake: u64) -> Self {
        Self {
            phase: Phase::DeckBuilding,
            round: 0,
            host: Seat::new(boost_stake),
            guest: Seat::new(boost_stake),
            deadline_ms: None,
        }
    }

    pub fn seat(&self, side: Side) -> &Seat {
        match side {
            Side::Host => &self.host,
            Side::Guest => &self.guest,
        }
    }

    pub fn seat_mut(&mut self, side: Side) -> &mut Seat {
        match side {
            Side::Host => &mut self.host,
            Side::Guest => &mut self.guest,
        }
    }
}

/// Append-only entry of the round history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u8,
    pub winner: RoundWinner,
    pub host_score_after: u8,
    pub guest_score_after: u8,
    pub host_card: Card,
    pub guest_card: Card,
    pub host_action: ActionKind,
    pub guest_action: ActionKind,
    pub host_power_x100: u64,
    pub guest_power_x100: u64,
    pub resolved_at_ms: u64,
}

/// Idempotency flags for end-of-match settlement. Each financial step
/// records who it already paid so a retry never pays twice.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finalization {
    pub outcome: Option<MatchOutcome>,
    pub paid: BTreeSet<Address>,
    pub converted: BTreeSet<Address>,
    pub finished: bool,
    pub recorded: bool,
}

/// The replicated room document: the single aggregate every mutation
/// locks, checks and bumps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub created_at_ms: u64,
    pub host: Address,
    pub guest: Option<Address>,
    pub spectators: Vec<Spectator>,
    pub ante: u64,
    pub currency: String,
    /// Set once when both decks are committed.
    pub pot: Option<u64>,
    pub status: RoomStatus,
    pub version: u64,
    pub game: GameState,
    pub history: Vec<RoundRecord>,
    pub finalization: Finalization,
}

impl Room {
    pub fn new(
        id: RoomId,
        host: Address,
        ante: u64,
        currency: impl Into<String>,
        boost_stake: u64,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            created_at_ms: now_ms,
            host,
            guest: None,
            spectators: Vec::new(),
            ante,
            currency: currency.into(),
            pot: None,
            status: RoomStatus::Waiting,
            version: 0,
            game: GameState::new(boost_stake),
            history: Vec::new(),
            finalization: Finalization::default(),
        }
    }

    pub fn side_of(&self, address: &Address) -> Option<Side> {
        if *address == self.host {
            Some(Side::Host)
        } else if self.guest.as_ref() == Some(address) {
            Some(Side::Guest)
        } else {
            None
        }
    }

    pub fn player(&self, side: Side) -> Option<&Address> {
        match side {
            Side::Host => Some(&self.host),
            Side::Guest => self.guest.as_ref(),
        }
    }

    /// Side of a player-only caller, `NotAMember` for anyone else.
    pub fn require_player(&self, address: &Address) -> Result<Side, ArenaError> {
        self.side_of(address)
            .ok_or_else(|| ArenaError::NotAMember(address.clone()))
    }

    pub fn is_spectator(&self, address: &Address) -> bool {
        self.spectators.iter().any(|s| s.address == *address)
    }

    pub fn record_for(&self, round: u8) -> Option<&RoundRecord> {
        self.history.iter().find(|r| r.round == round)
    }

    pub fn is_finished(&self) -> bool {
        self.status == RoomStatus::Finished
    }

    /// Mark a committed mutation so replicas can discard stale documents.
    pub(crate) fn bump(&mut self) {
        self.version += 1;
    }
}
