use crate::power::effective_power_x100;
#[cfg(feature = "events")]
use crate::types::RoundEvent;
use crate::types::{
    ActionKind, MatchOutcome, RoundResult, RoundWinner, Side, MAX_ROUNDS, WINNING_SCORE,
};

/// Resolve a single round between the two selected cards.
///
/// Pure: the same four inputs always give the same winner. Order of
/// application is shield (blocks the opposing boost), then boost, then
/// double. Equal final powers are a tie.
pub fn resolve_round(
    host_power: u32,
    host_action: ActionKind,
    guest_power: u32,
    guest_action: ActionKind,
) -> RoundResult {
    let host_power_x100 = effective_power_x100(host_power, host_action, guest_action);
    let guest_power_x100 = effective_power_x100(guest_power, guest_action, host_action);

    let winner = if host_power_x100 > guest_power_x100 {
        RoundWinner::Host
    } else if guest_power_x100 > host_power_x100 {
        RoundWinner::Guest
    } else {
        RoundWinner::Tie
    };

    RoundResult {
        host_power_x100,
        guest_power_x100,
        winner,
    }
}

#[cfg(feature = "events")]
/// Same as [`resolve_round`] but also reports which modifiers took effect.
pub fn resolve_round_traced(
    host_power: u32,
    host_action: ActionKind,
    guest_power: u32,
    guest_action: ActionKind,
) -> (RoundResult, Vec<RoundEvent>) {
    let result = resolve_round(host_power, host_action, guest_power, guest_action);
    let mut events = Vec::with_capacity(2);

    push_events(
        &mut events,
        Side::Host,
        host_action,
        guest_action,
        result.host_power_x100,
    );
    push_events(
        &mut events,
        Side::Guest,
        guest_action,
        host_action,
        result.guest_power_x100,
    );

    (result, events)
}

#[cfg(feature = "events")]
fn push_events(
    events: &mut Vec<RoundEvent>,
    side: Side,
    own: ActionKind,
    opponent: ActionKind,
    power_x100: u64,
) {
    match own {
        ActionKind::Boost if opponent == ActionKind::Shield => {
            events.push(RoundEvent::BoostBlocked { side });
        }
        ActionKind::Boost => events.push(RoundEvent::Boosted { side, power_x100 }),
        ActionKind::Double => events.push(RoundEvent::Doubled { side, power_x100 }),
        ActionKind::Shield => events.push(RoundEvent::ShieldRaised {
            side,
            blocked: opponent == ActionKind::Boost,
        }),
        ActionKind::Pass => {}
    }
}

/// Match result once the scores or the round cap settle it, `None` while
/// play continues. `rounds_played` counts ties.
pub fn match_outcome(host_score: u8, guest_score: u8, rounds_played: u8) -> Option<MatchOutcome> {
    if host_score >= WINNING_SCORE {
        return Some(MatchOutcome::Winner(Side::Host));
    }
    if guest_score >= WINNING_SCORE {
        return Some(MatchOutcome::Winner(Side::Guest));
    }
    if rounds_played < MAX_ROUNDS {
        return None;
    }
    // Round cap reached only when ties ate into the seven rounds.
    Some(if host_score > guest_score {
        MatchOutcome::Winner(Side::Host)
    } else if guest_score > host_score {
        MatchOutcome::Winner(Side::Guest)
    } else {
        MatchOutcome::Draw
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ActionKind::*;

    #[test]
    fn boosted_host_loses_to_bigger_shielded_guest() {
        // Boost blocked by the shield: 100 vs 140
        let result = resolve_round(100, Boost, 140, Shield);
        assert_eq!(result.host_power_x100, 10_000);
        assert_eq!(result.guest_power_x100, 14_000);
        assert_eq!(result.winner, RoundWinner::Guest);
    }

    #[test]
    fn boosted_host_unshielded_guest() {
        // 100 * 1.3 = 130 vs 140 -> guest still wins
        let result = resolve_round(100, Boost, 140, Pass);
        assert_eq!(result.host_power_x100, 13_000);
        assert_eq!(result.winner, RoundWinner::Guest);
    }

    #[test]
    fn double_passes_through_shield_into_a_tie() {
        // 50 * 2 = 100 vs 100 shield -> tie
        let result = resolve_round(50, Double, 100, Shield);
        assert_eq!(result.host_power_x100, 10_000);
        assert_eq!(result.guest_power_x100, 10_000);
        assert_eq!(result.winner, RoundWinner::Tie);
    }

    #[test]
    fn shield_negates_boost_but_not_double() {
        let blocked = resolve_round(80, Boost, 10, Shield);
        assert_eq!(blocked.host_power_x100, 8_000);

        let doubled = resolve_round(80, Double, 10, Shield);
        assert_eq!(doubled.host_power_x100, 16_000);
    }

    #[test]
    fn resolution_is_deterministic_over_all_actions() {
        for ha in ActionKind::ALL {
            for ga in ActionKind::ALL {
                for (hp, gp) in [(1, 1), (100, 77), (77, 100), (50, 100), (130, 100)] {
                    let first = resolve_round(hp, ha, gp, ga);
                    let second = resolve_round(hp, ha, gp, ga);
                    assert_eq!(first, second);
                }
            }
        }
    }

    #[test]
    fn mirrored_inputs_mirror_the_winner() {
        for ha in ActionKind::ALL {
            for ga in ActionKind::ALL {
                let a = resolve_round(90, ha, 70, ga);
                let b = resolve_round(70, ga, 90, ha);
                let flipped = match a.winner {
                    RoundWinner::Host => RoundWinner::Guest,
                    RoundWinner::Guest => RoundWinner::Host,
                    RoundWinner::Tie => RoundWinner::Tie,
                };
                assert_eq!(b.winner, flipped);
            }
        }
    }

    #[cfg(feature = "events")]
    #[test]
    fn traced_resolution_reports_blocked_boost() {
        let (result, events) = resolve_round_traced(100, Boost, 140, Shield);
        assert_eq!(result.winner, RoundWinner::Guest);
        assert!(events.contains(&RoundEvent::BoostBlocked { side: Side::Host }));
        assert!(events.contains(&RoundEvent::ShieldRaised {
            side: Side::Guest,
            blocked: true
        }));
    }

    #[cfg(feature = "events")]
    #[test]
    fn traced_resolution_reports_double() {
        let (_, events) = resolve_round_traced(50, Double, 100, Pass);
        assert_eq!(
            events,
            vec![RoundEvent::Doubled {
                side: Side::Host,
                power_x100: 10_000
            }]
        );
    }

    #[test]
    fn first_to_four_wins() {
        assert_eq!(match_outcome(4, 2, 6), Some(MatchOutcome::Winner(Side::Host)));
        assert_eq!(match_outcome(3, 4, 7), Some(MatchOutcome::Winner(Side::Guest)));
        assert_eq!(match_outcome(3, 3, 6), None);
    }

    #[test]
    fn round_cap_decides_on_score_or_draw() {
        // Ties consumed rounds: 3-2 after seven rounds
        assert_eq!(match_outcome(3, 2, 7), Some(MatchOutcome::Winner(Side::Host)));
        assert_eq!(match_outcome(2, 2, 7), Some(MatchOutcome::Draw));
        assert_eq!(match_outcome(0, 0, 6), None);
    }

    #[test]
    fn tie_free_match_ends_within_seven_rounds() {
        // Alternate winners as long as possible: 3-3 after six, seventh decides
        let mut host = 0u8;
        let mut guest = 0u8;
        let mut rounds = 0u8;
        loop {
            rounds += 1;
            if rounds % 2 == 1 {
                host += 1;
            } else {
                guest += 1;
            }
            if let Some(outcome) = match_outcome(host, guest, rounds) {
                assert_eq!(outcome, MatchOutcome::Winner(Side::Host));
                break;
            }
        }
        assert_eq!(rounds, 7);
        assert_eq!(host, WINNING_SCORE);
    }
}
