//! Duel state machine transitions on a locked [`Room`].
//!
//! Every function here takes the room by `&mut` and either commits a
//! transition (bumping the version) or leaves it untouched. Repeats of a
//! transition that already happened come back as [`Committed::Unchanged`].

use duel_engine::cards::Deck;
use duel_engine::resolve::{match_outcome, resolve_round_traced};
use duel_engine::types::{ActionKind, Card, Phase, RoundWinner, Side};
use tracing::{debug, info};

use crate::config::ArenaConfig;
use crate::error::{ArenaError, Committed};
use crate::ids::Address;
use crate::room::{Room, RoomStatus, RoundRecord};

const LOG_TARGET: &str = "arena::duel";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeckCommit {
    pub side: Side,
    /// True when this commit was the second one and play has begun.
    pub match_started: bool,
}

fn require_status(
    room: &Room,
    action: &'static str,
    status: RoomStatus,
) -> Result<(), ArenaError> {
    if room.status != status {
        return Err(ArenaError::InvalidStatus {
            action,
            status: room.status,
        });
    }
    Ok(())
}

fn invalid_phase(room: &Room, action: &'static str) -> ArenaError {
    ArenaError::InvalidPhase {
        action,
        phase: room.game.phase,
    }
}

pub(crate) fn open_phase(room: &mut Room, phase: Phase, now_ms: u64, config: &ArenaConfig) {
    room.game.phase = phase;
    room.game.deadline_ms = config
        .phase_duration_ms(phase)
        .map(|duration| now_ms.saturating_add(duration));
}

pub fn commit_deck(
    room: &mut Room,
    actor: &Address,
    cards: Vec<Card>,
    now_ms: u64,
    config: &ArenaConfig,
) -> Result<Committed<DeckCommit>, ArenaError> {
    let side = room.require_player(actor)?;
    if room.game.seat(side).deck.is_some() {
        debug!(target: LOG_TARGET, room_id = %room.id, %actor, "deck already committed");
        return Ok(Committed::Unchanged(DeckCommit {
            side,
            match_started: room.status == RoomStatus::InProgress,
        }));
    }
    require_status(room, "commit deck", RoomStatus::Ready)?;
    if room.game.phase != Phase::DeckBuilding {
        return Err(invalid_phase(room, "commit deck"));
    }

    let deck = Deck::build(cards)?;
    room.game.seat_mut(side).deck = Some(deck);

    let match_started = Side::BOTH
        .iter()
        .all(|s| room.game.seat(*s).deck.is_some());
    if match_started {
        room.pot = Some(room.ante.saturating_mul(2));
        room.status = RoomStatus::InProgress;
        room.game.round = 1;
        open_phase(room, Phase::CardSelection, now_ms, config);
        info!(
            target: LOG_TARGET,
            room_id = %room.id,
            pot = room.ante.saturating_mul(2),
            "both decks committed, match started"
        );
    }
    room.bump();
    Ok(Committed::Applied(DeckCommit {
        side,
        match_started,
    }))
}

pub fn select_card(
    room: &mut Room,
    actor: &Address,
    token_id: u64,
    now_ms: u64,
    config: &ArenaConfig,
) -> Result<Committed<Card>, ArenaError> {
    let side = room.require_player(actor)?;
    require_status(room, "select card", RoomStatus::InProgress)?;

    let phase = room.game.phase;
    if matches!(phase, Phase::CardSelection | Phase::Reveal) {
        if let Some(existing) = &room.game.seat(side).selected {
            debug!(
                target: LOG_TARGET,
                room_id = %room.id,
                %actor,
                token_id = existing.token_id,
                "card already selected"
            );
            return Ok(Committed::Unchanged(existing.clone()));
        }
    }
    if phase != Phase::CardSelection {
        return Err(invalid_phase(room, "select card"));
    }

    let card = room
        .game
        .seat(side)
        .hand()
        .iter()
        .find(|c| c.token_id == token_id)
        .cloned()
        .ok_or(ArenaError::CardNotInHand { token_id })?;
    room.game.seat_mut(side).selected = Some(card.clone());

    if room.game.seat(side.opponent()).selected.is_some() {
        open_phase(room, Phase::Reveal, now_ms, config);
        debug!(
            target: LOG_TARGET,
            room_id = %room.id,
            round = room.game.round,
            "both cards selected, reveal open"
        );
    }
    room.bump();
    Ok(Committed::Applied(card))
}

/// Record a modifier purchase for the current round. When it completes
/// the pair the room moves to `resolution`; the caller resolves next.
pub fn buy_action(
    room: &mut Room,
    actor: &Address,
    kind: ActionKind,
    config: &ArenaConfig,
) -> Result<Committed<ActionKind>, ArenaError> {
    let side = room.require_player(actor)?;
    require_status(room, "buy action", RoomStatus::InProgress)?;
    if room.game.phase != Phase::Reveal {
        return Err(invalid_phase(room, "buy action"));
    }
    if let Some(existing) = room.game.seat(side).action {
        debug!(
            target: LOG_TARGET,
            room_id = %room.id,
            %actor,
            action = %existing,
            "action already bought"
        );
        return Ok(Committed::Unchanged(existing));
    }

    let cost = config.action_costs.cost(kind);
    let seat = room.game.seat_mut(side);
    if seat.boost_balance < cost {
        return Err(ArenaError::InsufficientFunds {
            needed: cost,
            available: seat.boost_balance,
        });
    }
    seat.boost_balance -= cost;
    seat.action = Some(kind);

    if room.game.seat(side.opponent()).action.is_some() {
        room.game.phase = Phase::Resolution;
        room.game.deadline_ms = None;
    }
    room.bump();
    Ok(Committed::Applied(kind))
}

/// Resolve `round` if the room is waiting in `resolution` for it.
///
/// Only the first caller commits. Later callers for the same round get the
/// recorded outcome back unchanged.
pub fn resolve_round(
    room: &mut Room,
    round: u8,
    now_ms: u64,
    config: &ArenaConfig,
) -> Result<Committed<RoundRecord>, ArenaError> {
    if let Some(record) = room.record_for(round) {
        debug!(target: LOG_TARGET, room_id = %room.id, round, "round already resolved");
        return Ok(Committed::Unchanged(record.clone()));
    }
    if room.game.phase != Phase::Resolution {
        return Err(invalid_phase(room, "resolve round"));
    }
    if round != room.game.round {
        return Err(ArenaError::StaleWrite {
            requested: round,
            current: room.game.round,
        });
    }
    let (Some(host_card), Some(guest_card)) = (
        room.game.host.selected.clone(),
        room.game.guest.selected.clone(),
    ) else {
        return Err(invalid_phase(room, "resolve round"));
    };
    let host_action = room.game.host.action.unwrap_or(ActionKind::Pass);
    let guest_action = room.game.guest.action.unwrap_or(ActionKind::Pass);

    let (result, events) =
        resolve_round_traced(host_card.power, host_action, guest_card.power, guest_action);
    for event in &events {
        debug!(target: LOG_TARGET, room_id = %room.id, round, ?event, "modifier applied");
    }

    // Both spends must succeed before anything on the room changes.
    let mut host_deck = room.game.host.deck.clone();
    let mut guest_deck = room.game.guest.deck.clone();
    if let Some(deck) = host_deck.as_mut() {
        deck.spend(host_card.token_id)?;
    }
    if let Some(deck) = guest_deck.as_mut() {
        deck.spend(guest_card.token_id)?;
    }

    match result.winner {
        RoundWinner::Host => room.game.host.score += 1,
        RoundWinner::Guest => room.game.guest.score += 1,
        RoundWinner::Tie => {}
    }
    for (side, deck) in [(Side::Host, host_deck), (Side::Guest, guest_deck)] {
        let seat = room.game.seat_mut(side);
        seat.deck = deck;
        seat.selected = None;
        seat.action = None;
    }

    let record = RoundRecord {
        round,
        winner: result.winner,
        host_score_after: room.game.host.score,
        guest_score_after: room.game.guest.score,
        host_card,
        guest_card,
        host_action,
        guest_action,
        host_power_x100: result.host_power_x100,
        guest_power_x100: result.guest_power_x100,
        resolved_at_ms: now_ms,
    };
    room.history.push(record.clone());

    info!(
        target: LOG_TARGET,
        room_id = %room.id,
        round,
        winner = %result.winner,
        host_score = record.host_score_after,
        guest_score = record.guest_score_after,
        "round resolved"
    );

    match match_outcome(room.game.host.score, room.game.guest.score, round) {
        Some(outcome) => {
            room.game.phase = Phase::GameOver;
            room.game.deadline_ms = None;
            room.finalization.outcome = Some(outcome);
            info!(target: LOG_TARGET, room_id = %room.id, ?outcome, "game over");
        }
        None => {
            room.game.round = round + 1;
            open_phase(room, Phase::CardSelection, now_ms, config);
        }
    }
    room.bump();
    Ok(Committed::Applied(record))
}

#[cfg(test)]
mod tests {
    use duel_engine::types::MatchOutcome;

    use super::*;
    use crate::fixtures::{deck, guest, host, seated_room, started_room};

    fn config() -> ArenaConfig {
        ArenaConfig::default()
    }

    /// Drive one full round with the first card in each hand.
    fn play_round(
        room: &mut Room,
        host_action: ActionKind,
        guest_action: ActionKind,
    ) -> RoundRecord {
        let cfg = config();
        let h = room.game.host.hand()[0].token_id;
        let g = room.game.guest.hand()[0].token_id;
        select_card(room, &host(), h, 0, &cfg).unwrap();
        select_card(room, &guest(), g, 0, &cfg).unwrap();
        buy_action(room, &host(), host_action, &cfg).unwrap();
        buy_action(room, &guest(), guest_action, &cfg).unwrap();
        let round = room.game.round;
        resolve_round(room, round, 0, &cfg).unwrap().into_inner()
    }

    #[test]
    fn second_deck_commit_starts_match() {
        let cfg = config();
        let mut room = seated_room();
        let first = commit_deck(&mut room, &host(), deck(&[100; 10], 100), 1_000, &cfg).unwrap();
        assert_eq!(
            first,
            Committed::Applied(DeckCommit {
                side: Side::Host,
                match_started: false
            })
        );
        assert_eq!(room.pot, None);

        let second = commit_deck(&mut room, &guest(), deck(&[100; 10], 200), 1_000, &cfg).unwrap();
        assert!(second.into_inner().match_started);
        assert_eq!(room.pot, Some(2 * room.ante));
        assert_eq!(room.status, RoomStatus::InProgress);
        assert_eq!(room.game.phase, Phase::CardSelection);
        assert_eq!(room.game.round, 1);
        assert_eq!(room.game.deadline_ms, Some(1_000 + cfg.card_selection_ms));
    }

    #[test]
    fn repeat_deck_commit_is_a_no_op() {
        let cfg = config();
        let mut room = seated_room();
        commit_deck(&mut room, &host(), deck(&[100; 10], 100), 0, &cfg).unwrap();
        let version = room.version;
        let again = commit_deck(&mut room, &host(), deck(&[5; 10], 300), 0, &cfg).unwrap();
        assert!(!again.is_applied());
        assert_eq!(room.version, version);
        assert_eq!(room.game.host.hand()[0].power, 100);
    }

    #[test]
    fn bad_deck_is_rejected() {
        let cfg = config();
        let mut room = seated_room();
        let err = commit_deck(&mut room, &host(), deck(&[100; 9], 100), 0, &cfg).unwrap_err();
        assert!(matches!(err, ArenaError::InvalidDeck(_)));
        assert!(room.game.host.deck.is_none());
    }

    #[test]
    fn select_requires_card_in_hand() {
        let cfg = config();
        let mut room = started_room(&[100; 10], &[100; 10]);
        // Token 106 is in the reserve, not the hand.
        let err = select_card(&mut room, &host(), 106, 0, &cfg).unwrap_err();
        assert_eq!(err, ArenaError::CardNotInHand { token_id: 106 });
    }

    #[test]
    fn repeat_select_returns_existing_card() {
        let cfg = config();
        let mut room = started_room(&[100; 10], &[100; 10]);
        select_card(&mut room, &host(), 101, 0, &cfg).unwrap();
        let again = select_card(&mut room, &host(), 102, 0, &cfg).unwrap();
        assert_eq!(again, Committed::Unchanged(room.game.host.hand()[0].clone()));
        assert_eq!(room.game.host.selected.as_ref().map(|c| c.token_id), Some(101));
    }

    #[test]
    fn both_selections_open_reveal() {
        let cfg = config();
        let mut room = started_room(&[100; 10], &[100; 10]);
        select_card(&mut room, &host(), 101, 10, &cfg).unwrap();
        assert_eq!(room.game.phase, Phase::CardSelection);
        select_card(&mut room, &guest(), 201, 20, &cfg).unwrap();
        assert_eq!(room.game.phase, Phase::Reveal);
        assert_eq!(room.game.deadline_ms, Some(20 + cfg.reveal_ms));
    }

    #[test]
    fn spectators_cannot_act() {
        let cfg = config();
        let mut room = started_room(&[100; 10], &[100; 10]);
        let err = select_card(&mut room, &Address::new("eve"), 101, 0, &cfg).unwrap_err();
        assert!(matches!(err, ArenaError::NotAMember(_)));
    }

    #[test]
    fn buy_action_outside_reveal_is_rejected() {
        let cfg = config();
        let mut room = started_room(&[100; 10], &[100; 10]);
        let err = buy_action(&mut room, &host(), ActionKind::Boost, &cfg).unwrap_err();
        assert!(matches!(err, ArenaError::InvalidPhase { phase: Phase::CardSelection, .. }));
    }

    #[test]
    fn buy_action_debits_boost_balance_once() {
        let cfg = config();
        let mut room = started_room(&[100; 10], &[100; 10]);
        select_card(&mut room, &host(), 101, 0, &cfg).unwrap();
        select_card(&mut room, &guest(), 201, 0, &cfg).unwrap();

        buy_action(&mut room, &host(), ActionKind::Double, &cfg).unwrap();
        let again = buy_action(&mut room, &host(), ActionKind::Boost, &cfg).unwrap();
        assert_eq!(again, Committed::Unchanged(ActionKind::Double));
        assert_eq!(room.game.host.boost_balance, 1_000 - cfg.action_costs.double);
    }

    #[test]
    fn buy_action_rejects_overspend() {
        let cfg = config();
        let mut room = started_room(&[100; 10], &[100; 10]);
        room.game.host.boost_balance = 99;
        select_card(&mut room, &host(), 101, 0, &cfg).unwrap();
        select_card(&mut room, &guest(), 201, 0, &cfg).unwrap();

        let err = buy_action(&mut room, &host(), ActionKind::Boost, &cfg).unwrap_err();
        assert_eq!(err, ArenaError::InsufficientFunds { needed: 100, available: 99 });
        // Passing stays possible with an empty purse.
        assert!(buy_action(&mut room, &host(), ActionKind::Pass, &cfg).is_ok());
    }

    #[test]
    fn shield_beats_blocked_boost() {
        // Host 100 + boost (blocked) = 100, guest 140 + shield = 140.
        let mut room = started_room(&[100; 10], &[140; 10]);
        let record = play_round(&mut room, ActionKind::Boost, ActionKind::Shield);
        assert_eq!(record.winner, RoundWinner::Guest);
        assert_eq!(room.game.guest.score, 1);
        assert_eq!(room.game.round, 2);
        assert_eq!(room.game.phase, Phase::CardSelection);
    }

    #[test]
    fn tie_leaves_scores_but_spends_round() {
        // 50 x2 = 100 against an unmodified 100.
        let mut room = started_room(&[50; 10], &[100; 10]);
        let record = play_round(&mut room, ActionKind::Double, ActionKind::Shield);
        assert_eq!(record.winner, RoundWinner::Tie);
        assert_eq!((room.game.host.score, room.game.guest.score), (0, 0));
        assert_eq!(room.game.round, 2);
    }

    #[test]
    fn resolution_spends_and_redraws() {
        let mut room = started_room(&[100; 10], &[90; 10]);
        play_round(&mut room, ActionKind::Pass, ActionKind::Pass);
        let hand: Vec<u64> = room.game.host.hand().iter().map(|c| c.token_id).collect();
        assert_eq!(hand, vec![102, 103, 104, 105, 106]);
        assert!(room.game.host.selected.is_none());
        assert!(room.game.guest.action.is_none());
    }

    #[test]
    fn duplicate_resolve_observes_committed_record() {
        let cfg = config();
        let mut room = started_room(&[100; 10], &[90; 10]);
        let record = play_round(&mut room, ActionKind::Pass, ActionKind::Pass);
        let version = room.version;

        let again = resolve_round(&mut room, 1, 99, &cfg).unwrap();
        assert_eq!(again, Committed::Unchanged(record));
        assert_eq!(room.version, version);
        assert_eq!(room.game.host.score, 1);
    }

    #[test]
    fn failed_spend_leaves_room_untouched() {
        let cfg = config();
        let mut room = started_room(&[100; 10], &[90; 10]);
        select_card(&mut room, &host(), 101, 0, &cfg).unwrap();
        select_card(&mut room, &guest(), 201, 0, &cfg).unwrap();
        buy_action(&mut room, &host(), ActionKind::Pass, &cfg).unwrap();
        buy_action(&mut room, &guest(), ActionKind::Pass, &cfg).unwrap();
        // The guest's pick vanished from the hand before resolution.
        room.game.guest.selected = Some(deck(&[90], 299).remove(0));
        let version = room.version;

        let err = resolve_round(&mut room, 1, 0, &cfg).unwrap_err();
        assert!(matches!(err, ArenaError::InvalidDeck(_)));
        assert_eq!((room.game.host.score, room.game.guest.score), (0, 0));
        assert_eq!(room.game.host.hand()[0].token_id, 101);
        assert_eq!(room.game.host.selected.as_ref().map(|c| c.token_id), Some(101));
        assert!(room.history.is_empty());
        assert_eq!(room.version, version);
    }

    #[test]
    fn resolve_outside_resolution_fails() {
        let cfg = config();
        let mut room = started_room(&[100; 10], &[90; 10]);
        assert!(matches!(
            resolve_round(&mut room, 1, 0, &cfg),
            Err(ArenaError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn four_wins_end_the_match() {
        let mut room = started_room(&[100; 10], &[90; 10]);
        for _ in 0..4 {
            play_round(&mut room, ActionKind::Pass, ActionKind::Pass);
        }
        assert_eq!(room.game.phase, Phase::GameOver);
        assert_eq!(room.game.round, 4);
        assert_eq!(room.game.deadline_ms, None);
        assert_eq!(room.finalization.outcome, Some(MatchOutcome::Winner(Side::Host)));
        assert_eq!(room.history.len(), 4);
    }

    #[test]
    fn seven_ties_draw_the_match() {
        let mut room = started_room(&[100; 10], &[100; 10]);
        for _ in 0..7 {
            play_round(&mut room, ActionKind::Pass, ActionKind::Pass);
        }
        assert_eq!(room.game.phase, Phase::GameOver);
        assert_eq!(room.finalization.outcome, Some(MatchOutcome::Draw));
    }
}
