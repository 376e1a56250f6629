//! Pure duel rules: cards and decks, action modifiers, round resolution and
//! the spectator odds ladder. No clocks, no I/O, no randomness; every
//! function here is safe to call from any replica and gives the same answer.

pub mod cards;
pub mod codec;
pub mod odds;
pub mod power;
pub mod resolve;
pub mod types;
