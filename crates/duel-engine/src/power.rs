use crate::types::ActionKind;

/// Neutral multiplier x100.
pub const NEUTRAL_X100: u64 = 100;
/// Boost multiplier x100 (+30%).
pub const BOOST_X100: u64 = 130;
/// Double multiplier x100.
pub const DOUBLE_X100: u64 = 200;

/// Multiplier x100 for `own` action given what the opponent played.
/// A shield only cancels boosts; double always applies.
pub fn action_multiplier(own: ActionKind, opponent: ActionKind) -> u64 {
    match own {
        ActionKind::Boost if opponent == ActionKind::Shield => NEUTRAL_X100,
        ActionKind::Boost => BOOST_X100,
        ActionKind::Double => DOUBLE_X100,
        ActionKind::Shield | ActionKind::Pass => NEUTRAL_X100,
    }
}

/// Final card power scaled by 100, so 1.3x stays exact and ties are
/// compared without rounding.
pub fn effective_power_x100(base: u32, own: ActionKind, opponent: ActionKind) -> u64 {
    (base as u64) * action_multiplier(own, opponent)
}

/// Whole-unit power for display. Truncates.
pub fn display_power(power_x100: u64) -> u64 {
    power_x100 / 100
}
