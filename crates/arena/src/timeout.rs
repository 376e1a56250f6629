//! Phase deadlines. Deadlines are absolute timestamps stored in the room,
//! so expiry is a pure function of the room and the current time and can
//! be evaluated by whoever touches the room next.

use duel_engine::types::{ActionKind, Phase, Side};
use rand::Rng;
use tracing::debug;

use crate::config::ArenaConfig;
use crate::duel;
use crate::error::ArenaError;
use crate::room::{Room, RoomStatus};

const LOG_TARGET: &str = "arena::timeout";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForcedAction {
    /// A random card from the idle player's hand was selected.
    CardSelected { side: Side, token_id: u64 },
    /// The idle player passed at no cost.
    Passed { side: Side },
    /// Nobody finished building a deck in time; the room must be cancelled.
    DeckBuildingExpired,
}

/// Milliseconds left in the current phase, `None` if it has no deadline.
pub fn remaining_ms(room: &Room, now_ms: u64) -> Option<u64> {
    room.game
        .deadline_ms
        .map(|deadline| deadline.saturating_sub(now_ms))
}

pub fn is_expired(room: &Room, now_ms: u64) -> bool {
    room.game.deadline_ms.is_some_and(|deadline| now_ms >= deadline)
}

/// Apply whatever the elapsed deadline forces on the idle side(s).
///
/// Safe to call any number of times: an unexpired or already-forced phase
/// yields no actions. Deck-building expiry is only reported; cancelling
/// the room needs the ledger and is left to the caller.
pub fn force_expired<R: Rng + ?Sized>(
    room: &mut Room,
    now_ms: u64,
    config: &ArenaConfig,
    rng: &mut R,
) -> Result<Vec<ForcedAction>, ArenaError> {
    if room.status == RoomStatus::Finished || !is_expired(room, now_ms) {
        return Ok(Vec::new());
    }

    let mut forced = Vec::new();
    match room.game.phase {
        Phase::DeckBuilding => forced.push(ForcedAction::DeckBuildingExpired),
        Phase::CardSelection => {
            for side in Side::BOTH {
                let seat = room.game.seat(side);
                if seat.selected.is_some() || seat.hand().is_empty() {
                    continue;
                }
                let pick = rng.random_range(0..seat.hand().len());
                let token_id = seat.hand()[pick].token_id;
                let Some(actor) = room.player(side).cloned() else {
                    continue;
                };
                duel::select_card(room, &actor, token_id, now_ms, config)?;
                forced.push(ForcedAction::CardSelected { side, token_id });
            }
        }
        Phase::Reveal => {
            for side in Side::BOTH {
                if room.game.seat(side).action.is_some() {
                    continue;
                }
                let Some(actor) = room.player(side).cloned() else {
                    continue;
                };
                duel::buy_action(room, &actor, ActionKind::Pass, config)?;
                forced.push(ForcedAction::Passed { side });
            }
        }
        Phase::Resolution | Phase::GameOver => {}
    }

    if !forced.is_empty() {
        debug!(
            target: LOG_TARGET,
            room_id = %room.id,
            round = room.game.round,
            ?forced,
            "deadline forced actions"
        );
    }
    Ok(forced)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::fixtures::{host, seated_room, started_room};

    #[test]
    fn remaining_counts_down_and_saturates() {
        let room = started_room(&[100; 10], &[100; 10]);
        let deadline = room.game.deadline_ms.unwrap();
        assert_eq!(remaining_ms(&room, deadline - 250), Some(250));
        assert_eq!(remaining_ms(&room, deadline + 5), Some(0));
        assert!(!is_expired(&room, deadline - 1));
        assert!(is_expired(&room, deadline));
    }

    #[test]
    fn nothing_forced_before_deadline() {
        let config = ArenaConfig::default();
        let mut room = started_room(&[100; 10], &[100; 10]);
        let mut rng = StdRng::seed_from_u64(7);
        let forced = force_expired(&mut room, 1, &config, &mut rng).unwrap();
        assert!(forced.is_empty());
        assert_eq!(room.game.phase, Phase::CardSelection);
    }

    #[test]
    fn expired_selection_picks_from_hand() {
        let config = ArenaConfig::default();
        let mut room = started_room(&[100; 10], &[100; 10]);
        crate::duel::select_card(&mut room, &host(), 103, 0, &config).unwrap();
        let hand: Vec<u64> = room.game.guest.hand().iter().map(|c| c.token_id).collect();

        let now = room.game.deadline_ms.unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let forced = force_expired(&mut room, now, &config, &mut rng).unwrap();

        assert_eq!(forced.len(), 1);
        let ForcedAction::CardSelected { side, token_id } = forced[0] else {
            panic!("expected a card selection, got {forced:?}");
        };
        assert_eq!(side, Side::Guest);
        assert!(hand.contains(&token_id));
        // Host keeps the card it chose itself.
        assert_eq!(room.game.host.selected.as_ref().map(|c| c.token_id), Some(103));
        assert_eq!(room.game.phase, Phase::Reveal);
        assert_eq!(room.game.deadline_ms, Some(now + config.reveal_ms));
    }

    #[test]
    fn expired_reveal_passes_for_free() {
        let config = ArenaConfig::default();
        let mut room = started_room(&[100; 10], &[100; 10]);
        let mut rng = StdRng::seed_from_u64(1);
        let now = room.game.deadline_ms.unwrap();
        force_expired(&mut room, now, &config, &mut rng).unwrap();

        let now = room.game.deadline_ms.unwrap();
        let forced = force_expired(&mut room, now, &config, &mut rng).unwrap();
        assert_eq!(
            forced,
            vec![
                ForcedAction::Passed { side: Side::Host },
                ForcedAction::Passed { side: Side::Guest },
            ]
        );
        assert_eq!(room.game.phase, Phase::Resolution);
        assert_eq!(room.game.host.boost_balance, config.boost_stake);
    }

    #[test]
    fn deck_building_expiry_is_reported_only() {
        let config = ArenaConfig::default();
        let mut room = seated_room();
        room.game.deadline_ms = Some(100);
        let mut rng = StdRng::seed_from_u64(1);
        let forced = force_expired(&mut room, 100, &config, &mut rng).unwrap();
        assert_eq!(forced, vec![ForcedAction::DeckBuildingExpired]);
        assert_eq!(room.status, RoomStatus::Ready);
    }

    #[test]
    fn same_seed_same_pick() {
        let config = ArenaConfig::default();
        let pick = |seed| {
            let mut room = started_room(&[100; 10], &[100; 10]);
            let now = room.game.deadline_ms.unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            force_expired(&mut room, now, &config, &mut rng).unwrap()
        };
        assert_eq!(pick(42), pick(42));
    }
}
