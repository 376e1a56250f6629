//! Authoritative card-duel arena.
//!
//! Owns the rooms, runs the duel state machine on them, enforces phase
//! deadlines, takes spectator bets on each round and settles the match
//! against a [`ledger::Ledger`]. Clients only ever see
//! [`view::RoomView`] projections of a room.

pub mod betting;
pub mod clock;
pub mod config;
pub mod driver;
pub mod duel;
pub mod error;
pub mod history;
pub mod ids;
pub mod ledger;
pub mod registry;
pub mod room;
pub mod service;
pub mod settlement;
pub mod timeout;
pub mod view;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::ArenaConfig;
pub use error::{ArenaError, Committed};
pub use ids::{Address, RoomId};
pub use service::Arena;
