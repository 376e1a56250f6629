use std::path::Path;

use duel_engine::odds::OddsSchedule;
use duel_engine::types::{ActionCosts, Phase};
use serde::{Deserialize, Serialize};

use crate::error::ArenaError;

/// Tunables for every room served by one arena.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Time both players get to commit decks once the guest has joined.
    pub deck_building_ms: u64,
    pub card_selection_ms: u64,
    pub reveal_ms: u64,
    /// Boost currency each player starts a match with.
    pub boost_stake: u64,
    pub action_costs: ActionCosts,
    pub odds: OddsSchedule,
    /// Default wager as basis points of the bettor's lifetime deposits.
    pub default_bet_bps: u32,
    /// How often the background ticker sweeps rooms for expired deadlines.
    pub tick_interval_ms: u64,
    /// Fixed seed for timeout auto-selection; random when unset.
    pub rng_seed: Option<u64>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            deck_building_ms: 120_000,
            card_selection_ms: 30_000,
            reveal_ms: 90_000,
            boost_stake: 1_000,
            action_costs: ActionCosts::default(),
            odds: OddsSchedule::default(),
            default_bet_bps: 1_500,
            tick_interval_ms: 1_000,
            rng_seed: None,
        }
    }
}

impl ArenaConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ArenaError> {
        let config: ArenaConfig =
            serde_json::from_str(raw).map_err(|e| ArenaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ArenaError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ArenaError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ArenaError> {
        let invalid = |msg: &str| Err(ArenaError::Config(msg.to_string()));
        if self.deck_building_ms == 0 {
            return invalid("deck_building_ms must be greater than zero");
        }
        if self.card_selection_ms == 0 {
            return invalid("card_selection_ms must be greater than zero");
        }
        if self.reveal_ms == 0 {
            return invalid("reveal_ms must be greater than zero");
        }
        if self.tick_interval_ms == 0 {
            return invalid("tick_interval_ms must be greater than zero");
        }
        if self.default_bet_bps == 0 || self.default_bet_bps > 10_000 {
            return invalid("default_bet_bps must be within (0, 10000]");
        }
        self.odds
            .validate()
            .map_err(|e| ArenaError::Config(e.to_string()))
    }

    /// Deadline length for phases that have one.
    pub fn phase_duration_ms(&self, phase: Phase) -> Option<u64> {
        match phase {
            Phase::DeckBuilding => Some(self.deck_building_ms),
            Phase::CardSelection => Some(self.card_selection_ms),
            Phase::Reveal => Some(self.reveal_ms),
            Phase::Resolution | Phase::GameOver => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ArenaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.phase_duration_ms(Phase::CardSelection), Some(30_000));
        assert_eq!(config.phase_duration_ms(Phase::Reveal), Some(90_000));
        assert_eq!(config.phase_duration_ms(Phase::Resolution), None);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = ArenaConfig::from_json_str(
            r#"{ "reveal_ms": 5000, "action_costs": { "double": 400 } }"#,
        )
        .unwrap();
        assert_eq!(config.reveal_ms, 5_000);
        assert_eq!(config.card_selection_ms, 30_000);
        assert_eq!(config.action_costs.double, 400);
        assert_eq!(config.action_costs.boost, ActionCosts::default().boost);
    }

    #[test]
    fn odds_ladder_from_json() {
        let config = ArenaConfig::from_json_str(
            r#"{ "odds": [ { "last_round": 7, "odds_x100": 175 } ] }"#,
        )
        .unwrap();
        assert_eq!(config.odds.odds_for_round(2), 175);
    }

    #[test]
    fn rejects_zero_durations() {
        let err = ArenaConfig::from_json_str(r#"{ "card_selection_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, ArenaError::Config(_)));
    }

    #[test]
    fn rejects_unparseable_json() {
        assert!(ArenaConfig::from_json_str("{ nope").is_err());
    }
}
