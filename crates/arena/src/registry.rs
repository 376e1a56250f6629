use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::ids::{Address, RoomId};
use crate::room::{Room, RoomStatus, RoundRecord};
use crate::settlement::FinalizeReport;

pub type RoomHandle = Arc<Mutex<Room>>;

/// Open room as listed to players looking for a match.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct LobbyEntry {
    pub room_id: RoomId,
    pub host: Address,
    pub ante: u64,
    pub currency: String,
    pub created_at_ms: u64,
}

/// What is kept of a room once it leaves play. Bets are keyed by room id
/// forever, so a retired id is never handed out again.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetiredRoom {
    pub history: Vec<RoundRecord>,
    /// Report of the call that completed finalization; `None` for a
    /// cancelled room.
    pub finalized: Option<FinalizeReport>,
}

/// Arena-style map of live rooms. The map lock is held only long enough
/// to clone a handle out; all room work happens under the room's own lock.
///
/// Lock order inside is `rooms` then `retired`.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, RoomHandle>>,
    retired: RwLock<HashMap<RoomId, RetiredRoom>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new room. Returns `false` if the id is live or retired.
    pub fn insert(&self, room: Room) -> bool {
        let mut rooms = self.rooms.write();
        if rooms.contains_key(&room.id) || self.retired.read().contains_key(&room.id) {
            return false;
        }
        rooms.insert(room.id.clone(), Arc::new(Mutex::new(room)));
        true
    }

    /// True if `room_id` is live or has ever been retired.
    pub fn is_taken(&self, room_id: &RoomId) -> bool {
        self.rooms.read().contains_key(room_id) || self.retired.read().contains_key(room_id)
    }

    pub fn get(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.rooms.read().get(room_id).cloned()
    }

    /// Take a room out of play and keep `archive` under its id. Both maps
    /// change under one write lock, so no insert can slip in between.
    pub fn retire(&self, room_id: &RoomId, archive: RetiredRoom) -> Option<RoomHandle> {
        let mut rooms = self.rooms.write();
        let handle = rooms.remove(room_id);
        self.retired
            .write()
            .entry(room_id.clone())
            .or_insert(archive);
        handle
    }

    pub fn retired(&self, room_id: &RoomId) -> Option<RetiredRoom> {
        self.retired.read().get(room_id).cloned()
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.read().contains_key(room_id)
    }

    pub fn ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.rooms.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.read().is_empty()
    }

    /// Rooms still waiting for a guest, oldest first.
    pub fn lobby(&self) -> Vec<LobbyEntry> {
        let handles: Vec<RoomHandle> = self.rooms.read().values().cloned().collect();
        let mut open: Vec<LobbyEntry> = handles
            .iter()
            .filter_map(|handle| {
                let room = handle.lock();
                (room.status == RoomStatus::Waiting).then(|| LobbyEntry {
                    room_id: room.id.clone(),
                    host: room.host.clone(),
                    ante: room.ante,
                    currency: room.currency.clone(),
                    created_at_ms: room.created_at_ms,
                })
            })
            .collect();
        open.sort_by(|a, b| {
            a.created_at_ms
                .cmp(&b.created_at_ms)
                .then_with(|| a.room_id.cmp(&b.room_id))
        });
        open
    }
}
