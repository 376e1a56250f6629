use duel_engine::cards::DeckError;
use duel_engine::types::Phase;
use thiserror::Error;

use crate::betting::RoundBet;
use crate::ids::{Address, RoomId};
use crate::ledger::LedgerError;
use crate::room::RoomStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
    #[error("room {0} already exists")]
    RoomExists(RoomId),
    #[error("room already has a guest")]
    RoomFull,
    #[error("{0} cannot play against themselves")]
    CannotPlaySelf(Address),
    #[error("{action} is not allowed during {phase}")]
    InvalidPhase { action: &'static str, phase: Phase },
    #[error("{action} is not allowed while the room is {status}")]
    InvalidStatus {
        action: &'static str,
        status: RoomStatus,
    },
    #[error("{0} is not a player in this room")]
    NotAMember(Address),
    #[error("{0} already plays in this room")]
    AlreadySeated(Address),
    #[error("{0} is not a spectator in this room")]
    NotASpectator(Address),
    #[error("{0} is not a player that can be backed")]
    InvalidTarget(Address),
    #[error("card {token_id} is not in hand")]
    CardNotInHand { token_id: u64 },
    #[error("invalid deck: {0}")]
    InvalidDeck(#[from] DeckError),
    #[error("insufficient boost balance: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },
    #[error("insufficient betting credits: need {needed}, have {available}")]
    InsufficientCredits { needed: u64, available: u64 },
    #[error("a bet for round {} already exists", .0.round)]
    DuplicateBet(Box<RoundBet>),
    #[error("write targets round {requested} but the room is on round {current}")]
    StaleWrite { requested: u8, current: u8 },
    #[error("amount must be greater than zero")]
    InvalidAmount,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Outcome of an idempotent mutation. `Unchanged` means an earlier call
/// already committed the same effect and the caller gets its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Committed<T> {
    Applied(T),
    Unchanged(T),
}

impl<T> Committed<T> {
    pub fn into_inner(self) -> T {
        match self {
            Committed::Applied(v) | Committed::Unchanged(v) => v,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Committed::Applied(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Committed<U> {
        match self {
            Committed::Applied(v) => Committed::Applied(f(v)),
            Committed::Unchanged(v) => Committed::Unchanged(f(v)),
        }
    }
}
