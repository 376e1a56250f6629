use duel_engine::types::MatchOutcome;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{Address, RoomId};
use crate::room::{Room, RoundRecord};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("history store unavailable: {0}")]
    Unavailable(String),
}

/// Permanent summary of a finished match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub room_id: RoomId,
    pub host: Address,
    pub guest: Option<Address>,
    pub host_score: u8,
    pub guest_score: u8,
    pub pot: u64,
    pub currency: String,
    pub outcome: Option<MatchOutcome>,
    pub winner: Option<Address>,
    pub rounds: Vec<RoundRecord>,
    pub finished_at_ms: u64,
}

impl MatchRecord {
    pub fn from_room(room: &Room, now_ms: u64) -> Self {
        let outcome = room.finalization.outcome;
        let winner = match outcome {
            Some(MatchOutcome::Winner(side)) => room.player(side).cloned(),
            _ => None,
        };
        Self {
            room_id: room.id.clone(),
            host: room.host.clone(),
            guest: room.guest.clone(),
            host_score: room.game.host.score,
            guest_score: room.game.guest.score,
            pot: room.pot.unwrap_or(0),
            currency: room.currency.clone(),
            outcome,
            winner,
            rounds: room.history.clone(),
            finished_at_ms: now_ms,
        }
    }
}

/// Where finished matches go. Failures are reported but never undo or
/// block a finalization.
pub trait HistorySink: Send + Sync {
    fn record(&self, record: MatchRecord) -> Result<(), HistoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryHistory {
    records: Mutex<Vec<MatchRecord>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<MatchRecord> {
        self.records.lock().clone()
    }
}

impl HistorySink for InMemoryHistory {
    fn record(&self, record: MatchRecord) -> Result<(), HistoryError> {
        self.records.lock().push(record);
        Ok(())
    }
}
