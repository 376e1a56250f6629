//! End-of-match money movement.
//!
//! Each transfer is recorded in the room's [`Finalization`] flags right
//! after it succeeds. A failure part way through leaves the flags of the
//! finished steps set, and the retry picks up at the first unpaid address.
//!
//! [`Finalization`]: crate::room::Finalization

use duel_engine::types::{MatchOutcome, Phase, Side};
use serde::Serialize;
use tracing::{info, warn};

use crate::betting::BetBook;
use crate::error::{ArenaError, Committed};
use crate::ids::Address;
use crate::ledger::Ledger;
use crate::room::{Room, RoomStatus};

const LOG_TARGET: &str = "arena::settlement";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FinalizeReport {
    pub outcome: MatchOutcome,
    /// Currency released from escrow by this call.
    pub payouts: Vec<(Address, u64)>,
    /// Credits turned back into currency by this call.
    pub converted: Vec<(Address, u64)>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CancelReport {
    pub refunded_antes: Vec<(Address, u64)>,
    pub refunded_bets: u64,
}

/// Settle a room that reached `game-over`: pay the pot, convert spectator
/// credits, mark it finished. Safe to retry after any failure.
pub fn finalize(
    room: &mut Room,
    book: &mut BetBook,
    ledger: &dyn Ledger,
) -> Result<Committed<FinalizeReport>, ArenaError> {
    let Some(outcome) = room.finalization.outcome else {
        return Err(ArenaError::InvalidPhase {
            action: "finalize",
            phase: room.game.phase,
        });
    };
    if room.finalization.finished {
        return Ok(Committed::Unchanged(FinalizeReport {
            outcome,
            payouts: Vec::new(),
            converted: Vec::new(),
        }));
    }
    if !room.finalization.paid.is_empty() || !room.finalization.converted.is_empty() {
        warn!(target: LOG_TARGET, room_id = %room.id, "resuming interrupted finalization");
    }

    book.settle_outstanding(room, ledger)?;

    let pool = room.id.escrow_pool();
    let mut report = FinalizeReport {
        outcome,
        payouts: Vec::new(),
        converted: Vec::new(),
    };

    let owed: Vec<(Address, u64)> = match outcome {
        MatchOutcome::Winner(side) => room
            .player(side)
            .map(|winner| (winner.clone(), room.pot.unwrap_or(room.ante.saturating_mul(2))))
            .into_iter()
            .collect(),
        MatchOutcome::Draw => Side::BOTH
            .iter()
            .filter_map(|side| room.player(*side).map(|p| (p.clone(), room.ante)))
            .collect(),
    };
    for (address, amount) in owed {
        if room.finalization.paid.contains(&address) {
            continue;
        }
        ledger.transfer(&pool, &address, amount)?;
        room.finalization.paid.insert(address.clone());
        room.bump();
        report.payouts.push((address, amount));
    }

    let spectators: Vec<Address> = room.spectators.iter().map(|s| s.address.clone()).collect();
    for address in spectators {
        if room.finalization.converted.contains(&address) {
            continue;
        }
        let amount = ledger.convert_credits(&address)?;
        room.finalization.converted.insert(address.clone());
        room.bump();
        report.converted.push((address, amount));
    }

    room.status = RoomStatus::Finished;
    room.finalization.finished = true;
    room.bump();
    info!(
        target: LOG_TARGET,
        room_id = %room.id,
        ?outcome,
        payouts = report.payouts.len(),
        converted = report.converted.len(),
        "room finalized"
    );
    Ok(Committed::Applied(report))
}

/// Tear down a room that never got past deck building: every escrowed
/// ante goes back to its owner and open bets are refunded.
pub fn cancel(
    room: &mut Room,
    book: &mut BetBook,
    ledger: &dyn Ledger,
) -> Result<Committed<CancelReport>, ArenaError> {
    if room.is_finished() {
        return Ok(Committed::Unchanged(CancelReport::default()));
    }
    if room.status == RoomStatus::InProgress {
        return Err(ArenaError::InvalidStatus {
            action: "cancel",
            status: room.status,
        });
    }

    let pool = room.id.escrow_pool();
    let mut report = CancelReport::default();
    for side in Side::BOTH {
        let Some(address) = room.player(side).cloned() else {
            continue;
        };
        if !room.game.seat(side).ante_escrowed {
            continue;
        }
        ledger.transfer(&pool, &address, room.ante)?;
        room.game.seat_mut(side).ante_escrowed = false;
        room.bump();
        report.refunded_antes.push((address, room.ante));
    }
    report.refunded_bets = book.refund_active(&room.id, ledger)?;

    room.status = RoomStatus::Finished;
    room.game.phase = Phase::GameOver;
    room.game.deadline_ms = None;
    room.finalization.finished = true;
    room.bump();
    info!(
        target: LOG_TARGET,
        room_id = %room.id,
        refunded_antes = report.refunded_antes.len(),
        refunded_bets = report.refunded_bets,
        "room cancelled"
    );
    Ok(Committed::Applied(report))
}
