use std::collections::VecDeque;

use thiserror::Error;

use crate::types::{Card, Rarity, DECK_SIZE, HAND_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeckError {
    #[error("deck must hold exactly 10 cards, got {0}")]
    WrongSize(usize),
    #[error("token {0} appears more than once in the deck")]
    DuplicateToken(u64),
    #[error("token {0} has zero power")]
    ZeroPower(u64),
    #[error("token {0} is not in hand")]
    NotInHand(u64),
}

/// A committed deck: five cards in hand, five face-down in reserve.
/// Fixed at deck-build time; afterwards cards only leave the hand when
/// spent, and the reserve only refills it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Deck {
    hand: Vec<Card>,
    reserve: VecDeque<Card>,
}

impl Deck {
    /// Validate a ten-card list. The first five cards form the hand.
    pub fn build(cards: Vec<Card>) -> Result<Deck, DeckError> {
        if cards.len() != DECK_SIZE {
            return Err(DeckError::WrongSize(cards.len()));
        }
        for (i, card) in cards.iter().enumerate() {
            if card.power == 0 {
                return Err(DeckError::ZeroPower(card.token_id));
            }
            if cards[..i].iter().any(|c| c.token_id == card.token_id) {
                return Err(DeckError::DuplicateToken(card.token_id));
            }
        }

        let mut cards = cards;
        let reserve: VecDeque<Card> = cards.split_off(HAND_SIZE).into();
        Ok(Deck {
            hand: cards,
            reserve,
        })
    }

    pub fn hand(&self) -> &[Card] {
        &self.hand
    }

    pub fn reserve_len(&self) -> usize {
        self.reserve.len()
    }

    pub fn in_hand(&self, token_id: u64) -> Option<&Card> {
        self.hand.iter().find(|c| c.token_id == token_id)
    }

    /// Discard a played card and draw the next reserve card into the hand.
    /// With an empty reserve the hand simply shrinks.
    pub fn spend(&mut self, token_id: u64) -> Result<Card, DeckError> {
        let index = self
            .hand
            .iter()
            .position(|c| c.token_id == token_id)
            .ok_or(DeckError::NotInHand(token_id))?;
        let spent = self.hand.remove(index);
        if let Some(next) = self.reserve.pop_front() {
            self.hand.push(next);
        }
        Ok(spent)
    }
}

// ---------------------------------------------------------------------------
// Starter catalogue
// ---------------------------------------------------------------------------

pub struct CardTemplate {
    pub token_id: u64,
    pub power: u32,
    pub collection: &'static str,
    pub rarity: Rarity,
    pub foil: bool,
}

pub const CATALOG: [CardTemplate; 16] = [
    CardTemplate {
        token_id: 1,
        power: 60,
        collection: "ember-court",
        rarity: Rarity::Common,
        foil: false,
    },
    CardTemplate {
        token_id: 2,
        power: 72,
        collection: "ember-court",
        rarity: Rarity::Common,
        foil: false,
    },
    CardTemplate {
        token_id: 3,
        power: 85,
        collection: "ember-court",
        rarity: Rarity::Uncommon,
        foil: false,
    },
    CardTemplate {
        token_id: 4,
        power: 110,
        collection: "ember-court",
        rarity: Rarity::Rare,
        foil: true,
    },
    CardTemplate {
        token_id: 5,
        power: 55,
        collection: "tidebound",
        rarity: Rarity::Common,
        foil: false,
    },
    CardTemplate {
        token_id: 6,
        power: 68,
        collection: "tidebound",
        rarity: Rarity::Common,
        foil: true,
    },
    CardTemplate {
        token_id: 7,
        power: 90,
        collection: "tidebound",
        rarity: Rarity::Uncommon,
        foil: false,
    },
    CardTemplate {
        token_id: 8,
        power: 125,
        collection: "tidebound",
        rarity: Rarity::Epic,
        foil: false,
    },
    CardTemplate {
        token_id: 9,
        power: 64,
        collection: "stonewake",
        rarity: Rarity::Common,
        foil: false,
    },
    CardTemplate {
        token_id: 10,
        power: 80,
        collection: "stonewake",
        rarity: Rarity::Uncommon,
        foil: false,
    },
    CardTemplate {
        token_id: 11,
        power: 100,
        collection: "stonewake",
        rarity: Rarity::Rare,
        foil: false,
    },
    CardTemplate {
        token_id: 12,
        power: 140,
        collection: "stonewake",
        rarity: Rarity::Legendary,
        foil: true,
    },
    CardTemplate {
        token_id: 13,
        power: 50,
        collection: "galewing",
        rarity: Rarity::Common,
        foil: false,
    },
    CardTemplate {
        token_id: 14,
        power: 77,
        collection: "galewing",
        rarity: Rarity::Uncommon,
        foil: false,
    },
    CardTemplate {
        token_id: 15,
        power: 95,
        collection: "galewing",
        rarity: Rarity::Rare,
        foil: false,
    },
    CardTemplate {
        token_id: 16,
        power: 130,
        collection: "galewing",
        rarity: Rarity::Epic,
        foil: true,
    },
];

/// Instantiate catalogue entry `token_id`. Ids start at 1.
pub fn catalog_card(token_id: u64) -> Option<Card> {
    CATALOG
        .iter()
        .find(|t| t.token_id == token_id)
        .map(|t| Card {
            token_id: t.token_id,
            power: t.power,
            collection: t.collection.to_string(),
            rarity: t.rarity,
            foil: t.foil,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(token_id: u64, power: u32) -> Card {
        Card {
            token_id,
            power,
            collection: "test".to_string(),
            rarity: Rarity::Common,
            foil: false,
        }
    }

    fn ten_cards() -> Vec<Card> {
        (1..=10).map(|i| card(i, 10 * i as u32)).collect()
    }

    #[test]
    fn build_splits_hand_and_reserve() {
        let deck = Deck::build(ten_cards()).unwrap();
        assert_eq!(deck.hand().len(), HAND_SIZE);
        assert_eq!(deck.reserve_len(), DECK_SIZE - HAND_SIZE);
        assert_eq!(deck.hand()[0].token_id, 1);
        assert!(deck.in_hand(6).is_none());
    }

    #[test]
    fn rejects_wrong_size() {
        let mut cards = ten_cards();
        cards.pop();
        assert_eq!(Deck::build(cards), Err(DeckError::WrongSize(9)));
    }

    #[test]
    fn rejects_duplicate_tokens() {
        let mut cards = ten_cards();
        cards[7] = card(3, 99);
        assert_eq!(Deck::build(cards), Err(DeckError::DuplicateToken(3)));
    }

    #[test]
    fn rejects_zero_power() {
        let mut cards = ten_cards();
        cards[2].power = 0;
        assert_eq!(Deck::build(cards), Err(DeckError::ZeroPower(3)));
    }

    #[test]
    fn spend_draws_from_reserve_in_order() {
        let mut deck = Deck::build(ten_cards()).unwrap();
        let spent = deck.spend(2).unwrap();
        assert_eq!(spent.token_id, 2);
        assert_eq!(deck.hand().len(), HAND_SIZE);
        assert!(deck.in_hand(6).is_some());
        assert_eq!(deck.reserve_len(), 4);
    }

    #[test]
    fn hand_shrinks_once_reserve_is_empty() {
        let mut deck = Deck::build(ten_cards()).unwrap();
        for _ in 0..5 {
            let next = deck.hand()[0].token_id;
            deck.spend(next).unwrap();
        }
        assert_eq!(deck.reserve_len(), 0);
        assert_eq!(deck.hand().len(), HAND_SIZE);

        let next = deck.hand()[0].token_id;
        deck.spend(next).unwrap();
        assert_eq!(deck.hand().len(), HAND_SIZE - 1);
    }

    #[test]
    fn spend_unknown_token_fails() {
        let mut deck = Deck::build(ten_cards()).unwrap();
        assert_eq!(deck.spend(9), Err(DeckError::NotInHand(9)));
    }

    #[test]
    fn catalog_ids_are_unique_and_powered() {
        for (i, t) in CATALOG.iter().enumerate() {
            assert!(t.power > 0);
            assert!(CATALOG[..i].iter().all(|o| o.token_id != t.token_id));
            assert_eq!(catalog_card(t.token_id).map(|c| c.power), Some(t.power));
        }
        assert!(catalog_card(0).is_none());
    }
}
