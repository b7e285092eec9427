// Program cards and the per-round program deck.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::domain::board::Rotation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramKind {
    Move1,
    Move2,
    Move3,
    BackUp,
    RotateLeft,
    RotateRight,
    UTurn,
}

/// What executing a card does to its robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    /// Single-tile forward steps, resolved one at a time.
    Forward(u8),
    /// One single-tile step against the facing direction.
    Backward,
    /// Quarter turns in the given sense.
    Turn(Rotation, u8),
}

impl ProgramKind {
    pub const fn motion(self) -> Motion {
        match self {
            ProgramKind::Move1 => Motion::Forward(1),
            ProgramKind::Move2 => Motion::Forward(2),
            ProgramKind::Move3 => Motion::Forward(3),
            ProgramKind::BackUp => Motion::Backward,
            ProgramKind::RotateLeft => Motion::Turn(Rotation::CounterClockwise, 1),
            ProgramKind::RotateRight => Motion::Turn(Rotation::Clockwise, 1),
            ProgramKind::UTurn => Motion::Turn(Rotation::Clockwise, 2),
        }
    }
}

/// A program card. Priorities are unique within the deck and double as card identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramCard {
    pub kind: ProgramKind,
    pub priority: u16,
}

impl ProgramCard {
    pub const fn new(kind: ProgramKind, priority: u16) -> Self {
        Self { kind, priority }
    }
}

// (kind, first priority, last priority, step) for the 84-card deck.
const DECK_LAYOUT: [(ProgramKind, u16, u16, u16); 7] = [
    (ProgramKind::UTurn, 10, 60, 10),
    (ProgramKind::RotateLeft, 70, 410, 20),
    (ProgramKind::RotateRight, 80, 420, 20),
    (ProgramKind::BackUp, 430, 480, 10),
    (ProgramKind::Move1, 490, 660, 10),
    (ProgramKind::Move2, 670, 780, 10),
    (ProgramKind::Move3, 790, 840, 10),
];

/// Every card in the standard program deck, in priority order.
pub fn standard_deck() -> Vec<ProgramCard> {
    DECK_LAYOUT
        .iter()
        .flat_map(|&(kind, first, last, step)| {
            (first..=last)
                .step_by(step as usize)
                .map(move |priority| ProgramCard::new(kind, priority))
        })
        .collect()
}

/// Cards available for dealing this round.
#[derive(Debug, Clone)]
pub struct ProgramDeck {
    cards: Vec<ProgramCard>,
}

impl ProgramDeck {
    /// Fresh shuffled deck without the cards still sitting in locked registers.
    pub fn shuffled<R: Rng + ?Sized>(locked: &[ProgramCard], rng: &mut R) -> Self {
        let mut cards: Vec<ProgramCard> = standard_deck()
            .into_iter()
            .filter(|card| !locked.contains(card))
            .collect();
        cards.shuffle(rng);
        Self { cards }
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    /// Deals up to `count` cards; fewer when the deck runs dry.
    pub fn deal(&mut self, count: usize) -> Vec<ProgramCard> {
        let take = count.min(self.cards.len());
        self.cards.split_off(self.cards.len() - take)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[test]
    fn standard_deck_has_84_unique_priorities() {
        let deck = standard_deck();
        assert_eq!(deck.len(), 84);
        let priorities: HashSet<u16> = deck.iter().map(|card| card.priority).collect();
        assert_eq!(priorities.len(), 84);
    }

    #[test]
    fn locked_cards_are_not_dealt_again() {
        let locked = [ProgramCard::new(ProgramKind::Move3, 840)];
        let mut rng = StdRng::seed_from_u64(7);
        let mut deck = ProgramDeck::shuffled(&locked, &mut rng);
        assert_eq!(deck.remaining(), 83);
        let dealt = deck.deal(83);
        assert!(!dealt.contains(&locked[0]));
    }

    #[test]
    fn deal_stops_when_deck_is_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut deck = ProgramDeck::shuffled(&[], &mut rng);
        assert_eq!(deck.deal(80).len(), 80);
        assert_eq!(deck.deal(9).len(), 4);
        assert!(deck.deal(9).is_empty());
    }

    #[test]
    fn same_seed_deals_same_hand() {
        let mut a = ProgramDeck::shuffled(&[], &mut StdRng::seed_from_u64(99));
        let mut b = ProgramDeck::shuffled(&[], &mut StdRng::seed_from_u64(99));
        assert_eq!(a.deal(9), b.deal(9));
    }
}
