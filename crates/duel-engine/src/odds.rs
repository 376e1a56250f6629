/// One step of the odds ladder: every round up to and including
/// `last_round` pays `odds_x100 / 100` times the stake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OddsTier {
    pub last_round: u8,
    pub odds_x100: u32,
}

/// Deterministic odds by round number. Later rounds pay more.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct OddsSchedule {
    tiers: Vec<OddsTier>,
}

impl Default for OddsSchedule {
    /// Rounds 1-3 pay 1.5x, 4-5 pay 1.8x, 6-7 pay 2.0x.
    fn default() -> Self {
        Self {
            tiers: vec![
                OddsTier { last_round: 3, odds_x100: 150 },
                OddsTier { last_round: 5, odds_x100: 180 },
                OddsTier { last_round: 7, odds_x100: 200 },
            ],
        }
    }
}

impl OddsSchedule {
    pub fn new(tiers: Vec<OddsTier>) -> Self {
        Self { tiers }
    }

    pub fn tiers(&self) -> &[OddsTier] {
        &self.tiers
    }

    /// Tiers must be non-empty, strictly ascending by round, and never pay
    /// less than the stake back.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.tiers.is_empty() {
            return Err("odds schedule must have at least one tier");
        }
        for pair in self.tiers.windows(2) {
            if pair[1].last_round <= pair[0].last_round {
                return Err("odds tiers must be ordered by ascending last_round");
            }
        }
        if self.tiers.iter().any(|t| t.odds_x100 < 100) {
            return Err("odds below 1.0x would pay winners less than their stake");
        }
        Ok(())
    }

    /// Odds x100 for `round`. Rounds past the last tier reuse the last tier.
    pub fn odds_for_round(&self, round: u8) -> u32 {
        self.tiers
            .iter()
            .find(|t| round <= t.last_round)
            .or(self.tiers.last())
            .map(|t| t.odds_x100)
            .unwrap_or(100)
    }
}

/// Winning payout: `amount * odds`, truncated. The stake is not added back
/// since it already left the bettor's balance at placement.
pub fn payout(amount: u64, odds_x100: u32) -> u64 {
    ((amount as u128) * (odds_x100 as u128) / 100) as u64
}

/// Default wager: `fraction_bps` of lifetime deposits, or of the current
/// balance for a bettor with no deposit history, capped by the balance.
pub fn default_stake(lifetime_deposited: u64, balance: u64, fraction_bps: u32) -> u64 {
    let basis = if lifetime_deposited > 0 {
        lifetime_deposited
    } else {
        balance
    };
    let sized = ((basis as u128) * (fraction_bps as u128) / 10_000) as u64;
    sized.min(balance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_by_round() {
        let schedule = OddsSchedule::default();
        assert_eq!(schedule.odds_for_round(1), 150);
        assert_eq!(schedule.odds_for_round(3), 150);
        assert_eq!(schedule.odds_for_round(4), 180);
        assert_eq!(schedule.odds_for_round(5), 180);
        assert_eq!(schedule.odds_for_round(6), 200);
        assert_eq!(schedule.odds_for_round(7), 200);
    }

    #[test]
    fn rounds_past_the_ladder_use_last_tier() {
        assert_eq!(OddsSchedule::default().odds_for_round(9), 200);
    }

    #[test]
    fn payout_at_one_and_a_half() {
        // 150 * 1.5 = 225
        assert_eq!(payout(150, 150), 225);
        // 33 * 1.8 = 59.4 -> 59
        assert_eq!(payout(33, 180), 59);
    }

    #[test]
    fn default_stake_uses_deposit_history() {
        // 15% of 2000 deposited, balance still covers it
        assert_eq!(default_stake(2_000, 1_000, 1_500), 300);
        // no history: 15% of balance
        assert_eq!(default_stake(0, 1_000, 1_500), 150);
        // capped by what is left
        assert_eq!(default_stake(10_000, 200, 1_500), 200);
    }

    #[test]
    fn validate_rejects_bad_ladders() {
        assert!(OddsSchedule::default().validate().is_ok());
        assert!(OddsSchedule::new(vec![]).validate().is_err());
        assert!(OddsSchedule::new(vec![
            OddsTier { last_round: 4, odds_x100: 150 },
            OddsTier { last_round: 4, odds_x100: 180 },
        ])
        .validate()
        .is_err());
        assert!(OddsSchedule::new(vec![OddsTier { last_round: 7, odds_x100: 90 }])
            .validate()
            .is_err());
    }
}
