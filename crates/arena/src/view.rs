//! Read-side projections of the room document.
//!
//! Clients never see the authoritative [`Room`]; they get a [`RoomView`]
//! cut for their address, with the opponent's hand and any card that has
//! not been revealed yet left out.

use duel_engine::types::{ActionKind, Card, Phase, Side};
use serde::Serialize;

use crate::config::ArenaConfig;
use crate::ids::{Address, RoomId};
use crate::room::{Room, RoomStatus, RoundRecord};
use crate::timeout;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeatView {
    pub address: Option<Address>,
    pub score: u8,
    pub boost_balance: u64,
    pub deck_committed: bool,
    /// Only filled in for the seat's own player.
    pub hand: Option<Vec<Card>>,
    pub hand_size: usize,
    pub reserve_size: usize,
    pub has_selected: bool,
    pub selected: Option<Card>,
    pub has_acted: bool,
    pub action: Option<ActionKind>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SpectatorView {
    pub address: Address,
    pub display_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoomView {
    pub room_id: RoomId,
    pub version: u64,
    pub status: RoomStatus,
    pub phase: Phase,
    pub round: u8,
    pub viewer_side: Option<Side>,
    pub ante: u64,
    pub currency: String,
    pub pot: Option<u64>,
    pub deadline_ms: Option<u64>,
    pub remaining_ms: Option<u64>,
    pub betting_open: bool,
    /// Odds a bet placed now would lock in.
    pub current_odds_x100: Option<u32>,
    pub host: SeatView,
    pub guest: SeatView,
    pub spectators: Vec<SpectatorView>,
    pub history: Vec<RoundRecord>,
}

impl RoomView {
    pub fn project(
        room: &Room,
        viewer: Option<&Address>,
        now_ms: u64,
        config: &ArenaConfig,
    ) -> Self {
        let viewer_side = viewer.and_then(|v| room.side_of(v));
        let betting_open = room.status == RoomStatus::InProgress && room.game.phase.accepts_bets();
        Self {
            room_id: room.id.clone(),
            version: room.version,
            status: room.status,
            phase: room.game.phase,
            round: room.game.round,
            viewer_side,
            ante: room.ante,
            currency: room.currency.clone(),
            pot: room.pot,
            deadline_ms: room.game.deadline_ms,
            remaining_ms: timeout::remaining_ms(room, now_ms),
            betting_open,
            current_odds_x100: betting_open.then(|| config.odds.odds_for_round(room.game.round)),
            host: seat_view(room, Side::Host, viewer_side),
            guest: seat_view(room, Side::Guest, viewer_side),
            spectators: room
                .spectators
                .iter()
                .map(|s| SpectatorView {
                    address: s.address.clone(),
                    display_name: s.display_name.clone(),
                })
                .collect(),
            history: room.history.clone(),
        }
    }
}

fn seat_view(room: &Room, side: Side, viewer_side: Option<Side>) -> SeatView {
    let seat = room.game.seat(side);
    let own = viewer_side == Some(side);
    // Cards are face-up once both are chosen; actions once the round is in.
    let cards_revealed = matches!(room.game.phase, Phase::Reveal | Phase::Resolution);
    let actions_revealed = room.game.phase == Phase::Resolution;
    SeatView {
        address: room.player(side).cloned(),
        score: seat.score,
        boost_balance: seat.boost_balance,
        deck_committed: seat.deck.is_some(),
        hand: own.then(|| seat.hand().to_vec()),
        hand_size: seat.hand().len(),
        reserve_size: seat.deck.as_ref().map(|d| d.reserve_len()).unwrap_or(0),
        has_selected: seat.selected.is_some(),
        selected: seat
            .selected
            .clone()
            .filter(|_| own || cards_revealed),
        has_acted: seat.action.is_some(),
        action: seat.action.filter(|_| own || actions_revealed),
    }
}

/// Client-side replica. Only accepts documents at least as new as the one
/// it holds, so a late delivery can never roll the display back.
#[derive(Clone, Debug, Default)]
pub struct ClientView {
    current: Option<RoomView>,
}

impl ClientView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `view` replaced the held document.
    pub fn observe(&mut self, view: RoomView) -> bool {
        if let Some(current) = &self.current {
            if view.version < current.version {
                return false;
            }
        }
        self.current = Some(view);
        true
    }

    pub fn current(&self) -> Option<&RoomView> {
        self.current.as_ref()
    }

    pub fn version(&self) -> Option<u64> {
        self.current.as_ref().map(|v| v.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duel::select_card;
    use crate::fixtures::{guest, host, started_room};

    #[test]
    fn opponent_hand_is_hidden() {
        let room = started_room(&[100; 10], &[90; 10]);
        let view = RoomView::project(&room, Some(&host()), 0, &ArenaConfig::default());
        assert_eq!(view.viewer_side, Some(Side::Host));
        assert_eq!(view.host.hand.as_ref().map(|h| h.len()), Some(5));
        assert_eq!(view.guest.hand, None);
        assert_eq!(view.guest.hand_size, 5);
    }

    #[test]
    fn pending_pick_stays_secret_until_reveal() {
        let config = ArenaConfig::default();
        let mut room = started_room(&[100; 10], &[90; 10]);
        select_card(&mut room, &host(), 101, 0, &config).unwrap();

        let for_guest = RoomView::project(&room, Some(&guest()), 0, &config);
        assert!(for_guest.host.has_selected);
        assert_eq!(for_guest.host.selected, None);

        select_card(&mut room, &guest(), 201, 0, &config).unwrap();
        let for_guest = RoomView::project(&room, Some(&guest()), 0, &config);
        assert_eq!(for_guest.host.selected.map(|c| c.token_id), Some(101));
    }

    #[test]
    fn spectator_sees_countdown_and_odds() {
        let config = ArenaConfig::default();
        let room = started_room(&[100; 10], &[90; 10]);
        let view = RoomView::project(&room, None, 10_000, &config);
        assert_eq!(view.remaining_ms, Some(config.card_selection_ms - 10_000));
        assert!(view.betting_open);
        assert_eq!(view.current_odds_x100, Some(150));
        assert_eq!(view.host.hand, None);
        assert_eq!(view.guest.hand, None);
    }

    #[test]
    fn client_view_never_regresses() {
        let config = ArenaConfig::default();
        let mut room = started_room(&[100; 10], &[90; 10]);
        let old = RoomView::project(&room, None, 0, &config);
        select_card(&mut room, &host(), 101, 0, &config).unwrap();
        let new = RoomView::project(&room, None, 0, &config);

        let mut client = ClientView::new();
        assert!(client.observe(new.clone()));
        assert!(!client.observe(old));
        assert_eq!(client.version(), Some(new.version));
        assert!(client.observe(new));
    }
}
