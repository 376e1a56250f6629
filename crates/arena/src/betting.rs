//! Per-round spectator wagers.
//!
//! Stakes leave the bettor's credit purse at placement, so settlement only
//! ever credits: winners get `amount * odds`, ties get the stake back and
//! losers get nothing.

use std::collections::{BTreeMap, BTreeSet};

use duel_engine::odds::{default_stake, payout};
use duel_engine::types::{RoundWinner, Side};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::ids::{Address, RoomId};
use crate::ledger::{Ledger, LedgerError, Purse};
use crate::room::{Room, RoomStatus};

const LOG_TARGET: &str = "arena::betting";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BetStatus {
    Active,
    Won,
    Lost,
    Refunded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundBet {
    pub room_id: RoomId,
    pub round: u8,
    pub bettor: Address,
    pub target: Address,
    pub target_side: Side,
    pub amount: u64,
    /// Locked in at placement; later schedule changes do not apply.
    pub odds_x100: u32,
    pub status: BetStatus,
    /// Set only once the bet is `Won`.
    pub payout: Option<u64>,
    pub placed_at_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stake {
    /// Size the wager from the bettor's deposit history.
    Default,
    Custom(u64),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BetRequest {
    pub room_id: RoomId,
    pub round: u8,
    pub bettor: Address,
    pub target: Address,
    pub stake: Stake,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RoundSettlement {
    pub round: u8,
    pub won: usize,
    pub lost: usize,
    pub refunded: usize,
    /// Credits returned to bettors, payouts and refunds together.
    pub credited: u64,
}

type BetKey = (RoomId, u8, Address);

/// Every wager ever placed. Settled bets stay here as the audit trail after
/// their room is gone.
#[derive(Debug, Default)]
pub struct BetBook {
    bets: BTreeMap<BetKey, RoundBet>,
    settled: BTreeSet<(RoomId, u8)>,
}

impl BetBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, room_id: &RoomId, round: u8, bettor: &Address) -> Option<&RoundBet> {
        self.bets.get(&(room_id.clone(), round, bettor.clone()))
    }

    pub fn for_room(&self, room_id: &RoomId) -> Vec<RoundBet> {
        self.bets
            .values()
            .filter(|b| b.room_id == *room_id)
            .cloned()
            .collect()
    }

    pub fn for_round(&self, room_id: &RoomId, round: u8) -> Vec<RoundBet> {
        self.bets
            .values()
            .filter(|b| b.room_id == *room_id && b.round == round)
            .cloned()
            .collect()
    }

    pub fn for_bettor(&self, bettor: &Address) -> Vec<RoundBet> {
        self.bets
            .values()
            .filter(|b| b.bettor == *bettor)
            .cloned()
            .collect()
    }

    pub fn is_settled(&self, room_id: &RoomId, round: u8) -> bool {
        self.settled.contains(&(room_id.clone(), round))
    }

    /// Validate a wager against the locked room and escrow its stake.
    pub fn place(
        &mut self,
        room: &Room,
        request: BetRequest,
        ledger: &dyn Ledger,
        config: &ArenaConfig,
        now_ms: u64,
    ) -> Result<RoundBet, ArenaError> {
        if room.status != RoomStatus::InProgress || !room.game.phase.accepts_bets() {
            return Err(ArenaError::InvalidPhase {
                action: "place bet",
                phase: room.game.phase,
            });
        }
        if request.round != room.game.round {
            return Err(ArenaError::StaleWrite {
                requested: request.round,
                current: room.game.round,
            });
        }
        if room.side_of(&request.bettor).is_some() || !room.is_spectator(&request.bettor) {
            return Err(ArenaError::NotASpectator(request.bettor));
        }
        let target_side = room
            .side_of(&request.target)
            .ok_or_else(|| ArenaError::InvalidTarget(request.target.clone()))?;

        let key = (room.id.clone(), request.round, request.bettor.clone());
        if let Some(existing) = self.bets.get(&key) {
            return Err(ArenaError::DuplicateBet(Box::new(existing.clone())));
        }

        let entry = ledger.credit_entry(&request.bettor);
        let amount = match request.stake {
            Stake::Default => default_stake(
                entry.lifetime_deposited,
                entry.balance,
                config.default_bet_bps,
            ),
            Stake::Custom(amount) => amount,
        };
        if amount == 0 {
            return Err(ArenaError::InvalidAmount);
        }
        ledger
            .debit(&request.bettor, Purse::Credits, amount)
            .map_err(|e| match e {
                LedgerError::InsufficientFunds {
                    needed, available, ..
                } => ArenaError::InsufficientCredits { needed, available },
                other => ArenaError::Ledger(other),
            })?;

        let bet = RoundBet {
            room_id: room.id.clone(),
            round: request.round,
            bettor: request.bettor,
            target: request.target,
            target_side,
            amount,
            odds_x100: config.odds.odds_for_round(request.round),
            status: BetStatus::Active,
            payout: None,
            placed_at_ms: now_ms,
        };
        info!(
            target: LOG_TARGET,
            room_id = %bet.room_id,
            round = bet.round,
            bettor = %bet.bettor,
            target_side = %bet.target_side,
            amount,
            odds_x100 = bet.odds_x100,
            "bet placed"
        );
        self.bets.insert(key, bet.clone());
        Ok(bet)
    }

    /// Settle every still-active bet on `round`. Each bet is credited before
    /// it is marked, so a ledger failure leaves it active for the retry and
    /// nothing already marked is paid again.
    pub fn settle_round(
        &mut self,
        room_id: &RoomId,
        round: u8,
        winner: RoundWinner,
        ledger: &dyn Ledger,
    ) -> Result<RoundSettlement, ArenaError> {
        let mut summary = RoundSettlement {
            round,
            ..RoundSettlement::default()
        };
        for bet in self
            .bets
            .values_mut()
            .filter(|b| b.room_id == *room_id && b.round == round && b.status == BetStatus::Active)
        {
            match winner.side() {
                None => {
                    ledger.credit(&bet.bettor, Purse::Credits, bet.amount)?;
                    bet.status = BetStatus::Refunded;
                    summary.refunded += 1;
                    summary.credited += bet.amount;
                }
                Some(side) if side == bet.target_side => {
                    let won = payout(bet.amount, bet.odds_x100);
                    ledger.credit(&bet.bettor, Purse::Credits, won)?;
                    bet.status = BetStatus::Won;
                    bet.payout = Some(won);
                    summary.won += 1;
                    summary.credited += won;
                }
                Some(_) => {
                    bet.status = BetStatus::Lost;
                    summary.lost += 1;
                }
            }
        }

        if self.settled.insert((room_id.clone(), round)) {
            info!(
                target: LOG_TARGET,
                %room_id,
                round,
                %winner,
                won = summary.won,
                lost = summary.lost,
                refunded = summary.refunded,
                credited = summary.credited,
                "round bets settled"
            );
        } else {
            debug!(target: LOG_TARGET, %room_id, round, "round bets already settled");
        }
        Ok(summary)
    }

    /// Tally of what settling `round` has produced so far. Bets still
    /// active are not counted.
    pub fn round_summary(&self, room_id: &RoomId, round: u8) -> RoundSettlement {
        let mut summary = RoundSettlement {
            round,
            ..RoundSettlement::default()
        };
        for bet in self
            .bets
            .values()
            .filter(|b| b.room_id == *room_id && b.round == round)
        {
            match bet.status {
                BetStatus::Active => {}
                BetStatus::Won => {
                    summary.won += 1;
                    summary.credited += bet.payout.unwrap_or_default();
                }
                BetStatus::Lost => summary.lost += 1,
                BetStatus::Refunded => {
                    summary.refunded += 1;
                    summary.credited += bet.amount;
                }
            }
        }
        summary
    }

    /// Settle every round the room has resolved but whose bets are still
    /// open, e.g. after a ledger outage interrupted the first attempt.
    pub fn settle_outstanding(
        &mut self,
        room: &Room,
        ledger: &dyn Ledger,
    ) -> Result<Vec<RoundSettlement>, ArenaError> {
        let pending: BTreeSet<u8> = self
            .bets
            .values()
            .filter(|b| b.room_id == room.id && b.status == BetStatus::Active)
            .map(|b| b.round)
            .collect();
        let mut settled = Vec::new();
        for round in pending {
            if let Some(record) = room.record_for(round) {
                settled.push(self.settle_round(&room.id, round, record.winner, ledger)?);
            }
        }
        Ok(settled)
    }

    /// Return the stake of every active bet in a cancelled room.
    pub fn refund_active(
        &mut self,
        room_id: &RoomId,
        ledger: &dyn Ledger,
    ) -> Result<u64, ArenaError> {
        let mut refunded = 0u64;
        for bet in self
            .bets
            .values_mut()
            .filter(|b| b.room_id == *room_id && b.status == BetStatus::Active)
        {
            ledger.credit(&bet.bettor, Purse::Credits, bet.amount)?;
            bet.status = BetStatus::Refunded;
            refunded += bet.amount;
        }
        if refunded > 0 {
            info!(target: LOG_TARGET, %room_id, refunded, "active bets refunded");
        }
        Ok(refunded)
    }
}
