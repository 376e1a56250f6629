//! Shared builders for unit tests.

use duel_engine::types::{Card, Rarity};

use crate::config::ArenaConfig;
use crate::duel::commit_deck;
use crate::ids::{Address, RoomId};
use crate::room::{Room, RoomStatus};

pub fn host() -> Address {
    Address::new("host")
}

pub fn guest() -> Address {
    Address::new("guest")
}

/// Cards with token ids `base + 1 ..` and the given powers, in order.
pub fn deck(powers: &[u32], base: u64) -> Vec<Card> {
    powers
        .iter()
        .enumerate()
        .map(|(i, power)| Card {
            token_id: base + 1 + i as u64,
            power: *power,
            collection: "fixture".to_string(),
            rarity: Rarity::Common,
            foil: false,
        })
        .collect()
}

/// Both players seated, no decks yet.
pub fn seated_room() -> Room {
    let mut room = Room::new(RoomId::new("room-1"), host(), 50, "gold", 1_000, 0);
    room.guest = Some(guest());
    room.status = RoomStatus::Ready;
    room
}

/// Match in round 1, card selection open. Host tokens start at 101,
/// guest tokens at 201.
pub fn started_room(host_powers: &[u32], guest_powers: &[u32]) -> Room {
    let config = ArenaConfig::default();
    let mut room = seated_room();
    commit_deck(&mut room, &host(), deck(host_powers, 100), 0, &config).unwrap();
    commit_deck(&mut room, &guest(), deck(guest_powers, 200), 0, &config).unwrap();
    room
}
