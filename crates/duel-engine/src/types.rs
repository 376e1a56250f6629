use core::fmt;

/// Cards in a committed deck.
pub const DECK_SIZE: usize = 10;
/// Cards held face-up; the rest of the deck waits in the reserve.
pub const HAND_SIZE: usize = 5;
/// Round wins needed to take the match.
pub const WINNING_SCORE: u8 = 4;
/// Hard cap on rounds in one match (4 + 4 - 1).
pub const MAX_ROUNDS: u8 = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[repr(u8)]
pub enum Side {
    Host = 0,
    Guest = 1,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Host, Side::Guest];

    pub fn opponent(self) -> Side {
        match self {
            Side::Host => Side::Guest,
            Side::Guest => Side::Host,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Host => f.write_str("host"),
            Side::Guest => f.write_str("guest"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[repr(u8)]
pub enum Rarity {
    Common = 0,
    Uncommon = 1,
    Rare = 2,
    Epic = 3,
    Legendary = 4,
}

/// A collectible card as it enters a duel. Only `power` takes part in
/// resolution; the rest is carried for display and audit.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Card {
    pub token_id: u64,
    pub power: u32,
    pub collection: String,
    pub rarity: Rarity,
    pub foil: bool,
}

/// Per-round modifier a player buys with boost currency during `reveal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[repr(u8)]
pub enum ActionKind {
    Pass = 0,
    /// +30% power unless the opponent raised a shield.
    Boost = 1,
    /// Cancels an opposing boost. Does not stop a double.
    Shield = 2,
    /// x2 power, unconditionally.
    Double = 3,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::Pass,
        ActionKind::Boost,
        ActionKind::Shield,
        ActionKind::Double,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Pass => "pass",
            ActionKind::Boost => "boost",
            ActionKind::Shield => "shield",
            ActionKind::Double => "double",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boost-currency price list. `Pass` is always free.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ActionCosts {
    pub boost: u64,
    pub shield: u64,
    pub double: u64,
}

impl Default for ActionCosts {
    fn default() -> Self {
        Self {
            boost: 100,
            shield: 150,
            double: 250,
        }
    }
}

impl ActionCosts {
    pub fn cost(&self, kind: ActionKind) -> u64 {
        match kind {
            ActionKind::Pass => 0,
            ActionKind::Boost => self.boost,
            ActionKind::Shield => self.shield,
            ActionKind::Double => self.double,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum RoundWinner {
    Host,
    Guest,
    Tie,
}

impl RoundWinner {
    pub fn side(self) -> Option<Side> {
        match self {
            RoundWinner::Host => Some(Side::Host),
            RoundWinner::Guest => Some(Side::Guest),
            RoundWinner::Tie => None,
        }
    }
}

impl From<Side> for RoundWinner {
    fn from(side: Side) -> Self {
        match side {
            Side::Host => RoundWinner::Host,
            Side::Guest => RoundWinner::Guest,
        }
    }
}

impl fmt::Display for RoundWinner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundWinner::Host => f.write_str("host"),
            RoundWinner::Guest => f.write_str("guest"),
            RoundWinner::Tie => f.write_str("tie"),
        }
    }
}

/// Result of a whole match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum MatchOutcome {
    Winner(Side),
    Draw,
}

/// Per-room duel phases. Transitions only move forward within a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Phase {
    DeckBuilding,
    CardSelection,
    Reveal,
    Resolution,
    GameOver,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::DeckBuilding => "deck-building",
            Phase::CardSelection => "card-selection",
            Phase::Reveal => "reveal",
            Phase::Resolution => "resolution",
            Phase::GameOver => "game-over",
        }
    }

    /// Spectators may wager while the round's outcome is still open.
    pub fn accepts_bets(&self) -> bool {
        matches!(self, Phase::CardSelection | Phase::Reveal)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one resolved round. Powers are scaled by 100.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundResult {
    pub host_power_x100: u64,
    pub guest_power_x100: u64,
    pub winner: RoundWinner,
}

#[cfg(feature = "events")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundEvent {
    Boosted { side: Side, power_x100: u64 },
    BoostBlocked { side: Side },
    Doubled { side: Side, power_x100: u64 },
    ShieldRaised { side: Side, blocked: bool },
}
