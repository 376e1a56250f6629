//! The authoritative arena service.
//!
//! Every intent locks exactly one room for its whole critical section.
//! Before the intent itself runs, any deadline that has already passed is
//! applied, so a room never needs a background task to stay correct; the
//! ticker only makes abandoned rooms progress sooner.
//!
//! Lock order is room, then bet book, then ledger. The registry map lock
//! is never held while waiting for a room lock.

use std::sync::Arc;

use duel_engine::types::{ActionKind, Card, Phase};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::betting::{BetBook, BetRequest, RoundBet, RoundSettlement};
use crate::config::ArenaConfig;
use crate::duel::{self, DeckCommit};
use crate::error::{ArenaError, Committed};
use crate::history::{HistorySink, MatchRecord};
use crate::ids::{Address, RoomId};
use crate::ledger::{CreditLedgerEntry, Ledger};
use crate::registry::{LobbyEntry, RetiredRoom, RoomRegistry};
use crate::room::{Room, RoomStatus, RoundRecord, Spectator};
use crate::settlement::{self, CancelReport, FinalizeReport};
use crate::timeout::{self, ForcedAction};
use crate::view::RoomView;

const LOG_TARGET: &str = "arena::service";

/// What a committed round produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoundOutcome {
    pub record: RoundRecord,
    pub settlement: RoundSettlement,
    /// Filled in when this round ended the match and finalization went
    /// through. A failed finalization is retried by `finalize` or `tick`.
    pub finalized: Option<FinalizeReport>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionOutcome {
    pub action: Committed<ActionKind>,
    /// Present when this purchase completed the pair and the round resolved.
    pub resolved: Option<Committed<RoundOutcome>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeaveOutcome {
    SpectatorLeft,
    Cancelled(CancelReport),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub rooms: usize,
    pub forced: usize,
    pub errors: usize,
}

pub struct Arena {
    config: ArenaConfig,
    registry: RoomRegistry,
    bets: Mutex<BetBook>,
    ledger: Arc<dyn Ledger>,
    history: Arc<dyn HistorySink>,
    rng: Mutex<StdRng>,
}

impl Arena {
    pub fn new(
        config: ArenaConfig,
        ledger: Arc<dyn Ledger>,
        history: Arc<dyn HistorySink>,
    ) -> Result<Self, ArenaError> {
        config.validate()?;
        let seed = config.rng_seed.unwrap_or_else(rand::random);
        Ok(Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            config,
            registry: RoomRegistry::new(),
            bets: Mutex::new(BetBook::new()),
            ledger,
            history,
        })
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub fn lobby(&self) -> Vec<LobbyEntry> {
        self.registry.lobby()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.registry.ids()
    }

    // ------------------------------------------------------------------
    // Room lifecycle
    // ------------------------------------------------------------------

    /// Open a room and escrow the host's ante. Ids are never reused, not
    /// even after the room is gone.
    ///
    /// The ante is escrowed before the room becomes visible, so nobody can
    /// join a room whose host has not paid.
    pub fn create_room(
        &self,
        room_id: RoomId,
        host: Address,
        ante: u64,
        currency: &str,
        now_ms: u64,
    ) -> Result<RoomView, ArenaError> {
        if self.registry.is_taken(&room_id) {
            return Err(ArenaError::RoomExists(room_id));
        }
        let pool = room_id.escrow_pool();
        self.ledger.escrow(&host, &pool, ante)?;

        let mut room = Room::new(
            room_id.clone(),
            host.clone(),
            ante,
            currency,
            self.config.boost_stake,
            now_ms,
        );
        room.game.host.ante_escrowed = true;
        room.bump();
        let view = RoomView::project(&room, Some(&host), now_ms, &self.config);

        if !self.registry.insert(room) {
            // Lost the id to a concurrent create; the ante goes back.
            if let Err(err) = self.ledger.transfer(&pool, &host, ante) {
                warn!(target: LOG_TARGET, %room_id, %host, ante, %err, "ante refund failed");
                return Err(err.into());
            }
            return Err(ArenaError::RoomExists(room_id));
        }
        info!(target: LOG_TARGET, %room_id, %host, ante, currency, "room created");
        Ok(view)
    }

    /// Take the guest seat, escrow the guest's ante and open deck building.
    pub fn join_room(
        &self,
        room_id: &RoomId,
        guest: &Address,
        now_ms: u64,
    ) -> Result<Committed<RoomView>, ArenaError> {
        self.with_room(room_id, now_ms, |room| {
            if *guest == room.host {
                return Err(ArenaError::CannotPlaySelf(guest.clone()));
            }
            if room.guest.as_ref() == Some(guest) {
                return Ok(Committed::Unchanged(self.project(room, guest, now_ms)));
            }
            if room.guest.is_some() {
                return Err(ArenaError::RoomFull);
            }
            if room.status != RoomStatus::Waiting {
                return Err(ArenaError::InvalidStatus {
                    action: "join room",
                    status: room.status,
                });
            }

            self.ledger.escrow(guest, &room.id.escrow_pool(), room.ante)?;
            room.guest = Some(guest.clone());
            room.spectators.retain(|s| s.address != *guest);
            room.game.guest.ante_escrowed = true;
            room.status = RoomStatus::Ready;
            duel::open_phase(room, Phase::DeckBuilding, now_ms, &self.config);
            room.bump();
            info!(target: LOG_TARGET, %room_id, %guest, "guest joined, deck building open");
            Ok(Committed::Applied(self.project(room, guest, now_ms)))
        })
    }

    pub fn spectate(
        &self,
        room_id: &RoomId,
        address: &Address,
        display_name: &str,
        now_ms: u64,
    ) -> Result<Committed<RoomView>, ArenaError> {
        self.with_room(room_id, now_ms, |room| {
            if room.side_of(address).is_some() {
                return Err(ArenaError::AlreadySeated(address.clone()));
            }
            if room.is_finished() {
                return Err(ArenaError::InvalidStatus {
                    action: "spectate",
                    status: room.status,
                });
            }
            if room.is_spectator(address) {
                return Ok(Committed::Unchanged(self.project(room, address, now_ms)));
            }
            room.spectators.push(Spectator {
                address: address.clone(),
                display_name: display_name.to_string(),
                joined_at_ms: now_ms,
            });
            room.bump();
            debug!(target: LOG_TARGET, %room_id, spectator = %address, "spectator joined");
            Ok(Committed::Applied(self.project(room, address, now_ms)))
        })
    }

    /// Spectators may leave at any time. A player leaving before play has
    /// started cancels the room; once the match is running, leaving is not
    /// possible and idle players are moved along by timeouts instead.
    pub fn leave_room(
        &self,
        room_id: &RoomId,
        address: &Address,
        now_ms: u64,
    ) -> Result<LeaveOutcome, ArenaError> {
        self.with_room(room_id, now_ms, |room| {
            if room.is_spectator(address) {
                room.spectators.retain(|s| s.address != *address);
                room.bump();
                debug!(target: LOG_TARGET, %room_id, spectator = %address, "spectator left");
                return Ok(LeaveOutcome::SpectatorLeft);
            }
            room.require_player(address)?;
            let report = self.cancel_locked(room)?;
            Ok(LeaveOutcome::Cancelled(report))
        })
    }

    // ------------------------------------------------------------------
    // Duel intents
    // ------------------------------------------------------------------

    pub fn commit_deck(
        &self,
        room_id: &RoomId,
        actor: &Address,
        cards: Vec<Card>,
        now_ms: u64,
    ) -> Result<Committed<DeckCommit>, ArenaError> {
        self.with_room(room_id, now_ms, |room| {
            duel::commit_deck(room, actor, cards, now_ms, &self.config)
        })
    }

    pub fn select_card(
        &self,
        room_id: &RoomId,
        actor: &Address,
        token_id: u64,
        now_ms: u64,
    ) -> Result<Committed<Card>, ArenaError> {
        self.with_room(room_id, now_ms, |room| {
            duel::select_card(room, actor, token_id, now_ms, &self.config)
        })
    }

    /// Buy a modifier. The purchase that completes the pair resolves the
    /// round, settles its bets and, on game over, finalizes the room.
    pub fn buy_action(
        &self,
        room_id: &RoomId,
        actor: &Address,
        kind: ActionKind,
        now_ms: u64,
    ) -> Result<ActionOutcome, ArenaError> {
        self.with_room(room_id, now_ms, |room| {
            let action = duel::buy_action(room, actor, kind, &self.config)?;
            let resolved = if room.game.phase == Phase::Resolution {
                let round = room.game.round;
                Some(self.resolve_locked(room, round, now_ms)?)
            } else {
                None
            };
            Ok(ActionOutcome { action, resolved })
        })
    }

    /// Resolve `round` if it is pending. Repeats return the recorded result,
    /// also once the final round has retired the room.
    pub fn resolve_round(
        &self,
        room_id: &RoomId,
        round: u8,
        now_ms: u64,
    ) -> Result<Committed<RoundOutcome>, ArenaError> {
        let Some(handle) = self.registry.get(room_id) else {
            return self.resolved_in_archive(room_id, round);
        };
        let mut room = handle.lock();
        // A pending resolution is exactly what this call is for, so skip
        // the catch-up that would otherwise resolve it first.
        if room.game.phase != Phase::Resolution {
            self.catch_up(&mut room, now_ms)?;
        }
        self.resolve_locked(&mut room, round, now_ms)
    }

    // ------------------------------------------------------------------
    // Betting
    // ------------------------------------------------------------------

    pub fn deposit_credits(
        &self,
        address: &Address,
        amount: u64,
    ) -> Result<CreditLedgerEntry, ArenaError> {
        if amount == 0 {
            return Err(ArenaError::InvalidAmount);
        }
        let entry = self.ledger.deposit_credits(address, amount)?;
        info!(target: LOG_TARGET, %address, amount, balance = entry.balance, "credits deposited");
        Ok(entry)
    }

    pub fn credit_entry(&self, address: &Address) -> CreditLedgerEntry {
        self.ledger.credit_entry(address)
    }

    pub fn place_bet(&self, request: BetRequest, now_ms: u64) -> Result<RoundBet, ArenaError> {
        let room_id = request.room_id.clone();
        self.with_room(&room_id, now_ms, |room| {
            self.bets
                .lock()
                .place(room, request, self.ledger.as_ref(), &self.config, now_ms)
        })
    }

    pub fn bet(&self, room_id: &RoomId, round: u8, bettor: &Address) -> Option<RoundBet> {
        self.bets.lock().get(room_id, round, bettor).cloned()
    }

    pub fn bets_for_room(&self, room_id: &RoomId) -> Vec<RoundBet> {
        self.bets.lock().for_room(room_id)
    }

    pub fn bets_for_bettor(&self, bettor: &Address) -> Vec<RoundBet> {
        self.bets.lock().for_bettor(bettor)
    }

    // ------------------------------------------------------------------
    // Time, settlement, reads
    // ------------------------------------------------------------------

    /// Apply elapsed deadlines to one room and retry any settlement work a
    /// ledger failure left behind.
    pub fn tick(&self, room_id: &RoomId, now_ms: u64) -> Result<Vec<ForcedAction>, ArenaError> {
        let handle = self.handle(room_id)?;
        let mut room = handle.lock();
        let forced = self.catch_up(&mut room, now_ms)?;
        if room.status == RoomStatus::InProgress {
            self.bets
                .lock()
                .settle_outstanding(&room, self.ledger.as_ref())?;
        }
        if room.finalization.outcome.is_some() && !room.finalization.recorded {
            self.finish_locked(&mut room, now_ms)?;
        }
        Ok(forced)
    }

    /// Sweep every registered room. Per-room failures are logged and
    /// counted, never propagated.
    pub fn tick_all(&self, now_ms: u64) -> TickSummary {
        let mut summary = TickSummary::default();
        for room_id in self.registry.ids() {
            summary.rooms += 1;
            match self.tick(&room_id, now_ms) {
                Ok(forced) => summary.forced += forced.len(),
                Err(ArenaError::RoomNotFound(_)) => {}
                Err(err) => {
                    summary.errors += 1;
                    warn!(target: LOG_TARGET, %room_id, %err, "tick failed");
                }
            }
        }
        summary
    }

    /// Finalize a room in `game-over`. Retrying after a failure completes
    /// only the steps that did not go through.
    pub fn finalize(
        &self,
        room_id: &RoomId,
        now_ms: u64,
    ) -> Result<Committed<FinalizeReport>, ArenaError> {
        let handle = self.handle(room_id)?;
        let mut room = handle.lock();
        let committed =
            settlement::finalize(&mut room, &mut self.bets.lock(), self.ledger.as_ref())?;
        let report = match &committed {
            Committed::Applied(report) | Committed::Unchanged(report) => report.clone(),
        };
        self.record_and_retire(&mut room, now_ms, &report);
        Ok(committed)
    }

    /// Projected room document for `viewer`, after applying elapsed deadlines.
    pub fn view(
        &self,
        room_id: &RoomId,
        viewer: Option<&Address>,
        now_ms: u64,
    ) -> Result<RoomView, ArenaError> {
        let handle = self.handle(room_id)?;
        let mut room = handle.lock();
        self.catch_up(&mut room, now_ms)?;
        Ok(RoomView::project(&room, viewer, now_ms, &self.config))
    }

    /// Unprojected copy of the room, for audit and tests.
    pub fn snapshot(&self, room_id: &RoomId) -> Result<Room, ArenaError> {
        Ok(self.handle(room_id)?.lock().clone())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn handle(&self, room_id: &RoomId) -> Result<crate::registry::RoomHandle, ArenaError> {
        self.registry
            .get(room_id)
            .ok_or_else(|| ArenaError::RoomNotFound(room_id.clone()))
    }

    fn with_room<T>(
        &self,
        room_id: &RoomId,
        now_ms: u64,
        f: impl FnOnce(&mut Room) -> Result<T, ArenaError>,
    ) -> Result<T, ArenaError> {
        let handle = self.handle(room_id)?;
        let mut room = handle.lock();
        self.catch_up(&mut room, now_ms)?;
        f(&mut *room)
    }

    fn project(&self, room: &Room, viewer: &Address, now_ms: u64) -> RoomView {
        RoomView::project(room, Some(viewer), now_ms, &self.config)
    }

    /// Bring the room up to `now_ms`: force whatever the expired deadline
    /// demands, then resolve a round left waiting in `resolution`.
    fn catch_up(&self, room: &mut Room, now_ms: u64) -> Result<Vec<ForcedAction>, ArenaError> {
        let forced = {
            let mut rng = self.rng.lock();
            timeout::force_expired(room, now_ms, &self.config, &mut *rng)?
        };
        if forced.contains(&ForcedAction::DeckBuildingExpired) {
            info!(target: LOG_TARGET, room_id = %room.id, "deck building expired");
            self.cancel_locked(room)?;
            return Ok(forced);
        }
        if room.game.phase == Phase::Resolution {
            let round = room.game.round;
            self.resolve_locked(room, round, now_ms)?;
        }
        Ok(forced)
    }

    fn resolve_locked(
        &self,
        room: &mut Room,
        round: u8,
        now_ms: u64,
    ) -> Result<Committed<RoundOutcome>, ArenaError> {
        let record = match duel::resolve_round(room, round, now_ms, &self.config)? {
            Committed::Unchanged(record) => {
                return Ok(Committed::Unchanged(RoundOutcome {
                    settlement: self.bets.lock().round_summary(&room.id, round),
                    record,
                    finalized: None,
                }));
            }
            Committed::Applied(record) => record,
        };

        let settlement = self
            .bets
            .lock()
            .settle_round(&room.id, round, record.winner, self.ledger.as_ref())
            .unwrap_or_else(|err| {
                warn!(
                    target: LOG_TARGET,
                    room_id = %room.id,
                    round,
                    %err,
                    "bet settlement deferred"
                );
                RoundSettlement {
                    round,
                    ..RoundSettlement::default()
                }
            });

        let finalized = if room.game.phase == Phase::GameOver {
            match self.finish_locked(room, now_ms) {
                Ok(report) => Some(report),
                Err(err) => {
                    warn!(target: LOG_TARGET, room_id = %room.id, %err, "finalization deferred");
                    None
                }
            }
        } else {
            None
        };

        Ok(Committed::Applied(RoundOutcome {
            record,
            settlement,
            finalized,
        }))
    }

    /// Repeat of a resolution that finished the match: the room is retired,
    /// so the answer comes from its archive.
    fn resolved_in_archive(
        &self,
        room_id: &RoomId,
        round: u8,
    ) -> Result<Committed<RoundOutcome>, ArenaError> {
        let not_found = || ArenaError::RoomNotFound(room_id.clone());
        let archive = self.registry.retired(room_id).ok_or_else(not_found)?;
        let record = archive
            .history
            .iter()
            .find(|r| r.round == round)
            .cloned()
            .ok_or_else(not_found)?;
        let was_last = archive.history.last().map(|r| r.round) == Some(round);
        debug!(target: LOG_TARGET, %room_id, round, "round already resolved, room retired");
        Ok(Committed::Unchanged(RoundOutcome {
            settlement: self.bets.lock().round_summary(room_id, round),
            record,
            finalized: if was_last { archive.finalized } else { None },
        }))
    }

    fn finish_locked(&self, room: &mut Room, now_ms: u64) -> Result<FinalizeReport, ArenaError> {
        let committed =
            settlement::finalize(room, &mut self.bets.lock(), self.ledger.as_ref())?;
        let report = committed.into_inner();
        self.record_and_retire(room, now_ms, &report);
        Ok(report)
    }

    fn cancel_locked(&self, room: &mut Room) -> Result<CancelReport, ArenaError> {
        let report = settlement::cancel(room, &mut self.bets.lock(), self.ledger.as_ref())?;
        self.registry.retire(
            &room.id,
            RetiredRoom {
                history: room.history.clone(),
                finalized: None,
            },
        );
        Ok(report.into_inner())
    }

    fn record_and_retire(&self, room: &mut Room, now_ms: u64, report: &FinalizeReport) {
        if !room.finalization.recorded {
            if let Err(err) = self.history.record(MatchRecord::from_room(room, now_ms)) {
                warn!(target: LOG_TARGET, room_id = %room.id, %err, "match history not recorded");
            }
            room.finalization.recorded = true;
            room.bump();
        }
        let archive = RetiredRoom {
            history: room.history.clone(),
            finalized: Some(report.clone()),
        };
        if self.registry.retire(&room.id, archive).is_some() {
            debug!(target: LOG_TARGET, room_id = %room.id, "room retired");
        }
    }
}
