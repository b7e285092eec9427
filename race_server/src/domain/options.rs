// Option cards: per-type behavior hooks and the session-scoped deck/discard registry.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::domain::board::Direction;
use crate::domain::errors::CommandError;
use crate::domain::robot::{PowerState, Robot};
use crate::domain::tuning::rules::{ABLATIVE_CAPACITY, MAX_OPTIONS, RAMMING_DAMAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Shield,
    PowerDownShield,
    AblativeCoat,
    MechanicalArm,
    RammingGear,
    SuperiorArchive,
    DoubleBarreledLaser,
    RearFiringLaser,
    HighPowerLaser,
}

impl OptionKind {
    pub const ALL: [OptionKind; 9] = [
        OptionKind::Shield,
        OptionKind::PowerDownShield,
        OptionKind::AblativeCoat,
        OptionKind::MechanicalArm,
        OptionKind::RammingGear,
        OptionKind::SuperiorArchive,
        OptionKind::DoubleBarreledLaser,
        OptionKind::RearFiringLaser,
        OptionKind::HighPowerLaser,
    ];

    /// Passive cards act on their own and can never be spent or discarded.
    pub const fn is_passive(self) -> bool {
        matches!(
            self,
            OptionKind::PowerDownShield
                | OptionKind::AblativeCoat
                | OptionKind::MechanicalArm
                | OptionKind::RammingGear
                | OptionKind::SuperiorArchive
        )
    }

    /// Shield circulates outside the base deck.
    pub const fn in_base_deck(self) -> bool {
        !matches!(self, OptionKind::Shield)
    }

    // Order in which automatic prevention is consulted: renewable blocks before the coat.
    const fn prevention_rank(self) -> u8 {
        match self {
            OptionKind::PowerDownShield => 0,
            OptionKind::Shield => 1,
            OptionKind::AblativeCoat => 2,
            _ => 3,
        }
    }
}

/// A held option card with its usage tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionCard {
    pub kind: OptionKind,
    /// Attack directions already blocked this register (Power-Down Shield).
    pub blocked_directions: Vec<Direction>,
    /// Damage absorbed over the whole game (Ablative Coat).
    pub absorbed: u8,
    /// Front block already used this register (Shield).
    pub used_this_register: bool,
}

impl OptionCard {
    pub fn new(kind: OptionKind) -> Self {
        Self {
            kind,
            blocked_directions: Vec::new(),
            absorbed: 0,
            used_this_register: false,
        }
    }

    pub const fn is_passive(&self) -> bool {
        self.kind.is_passive()
    }

    pub fn reset_per_register(&mut self) {
        self.blocked_directions.clear();
        self.used_this_register = false;
    }
}

/// Facts about an incoming hit that prevention hooks may inspect.
#[derive(Debug, Clone, Copy)]
pub struct HitContext {
    /// Side of the robot the damage arrives from.
    pub attack_from: Direction,
    pub facing: Direction,
    pub power: PowerState,
    /// Damage still unprevented.
    pub residual: u8,
}

/// Shape of a robot's laser volley for one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaserProfile {
    pub front_shots: u8,
    pub high_power: bool,
    pub rear: bool,
}

impl Default for LaserProfile {
    fn default() -> Self {
        Self {
            front_shots: 1,
            high_power: false,
            rear: false,
        }
    }
}

/// Hook points an option card may implement. Defaults are inert.
pub trait OptionBehavior: Sync {
    /// Automatic prevention; returns points blocked (never more than `hit.residual`).
    fn prevent_on_hit(&self, _card: &mut OptionCard, _hit: &HitContext) -> u8 {
        0
    }

    /// Damage dealt to the first robot displaced by the holder's own movement.
    fn ramming_damage(&self) -> u8 {
        0
    }

    fn respawn_damage(&self, base: u8) -> u8 {
        base
    }

    /// Whether sites can be reached from adjacent tiles.
    fn extends_reach(&self) -> bool {
        false
    }

    fn shape_laser(&self, _profile: &mut LaserProfile) {}
}

struct Inert;
impl OptionBehavior for Inert {}

struct ShieldBehavior;
impl OptionBehavior for ShieldBehavior {
    fn prevent_on_hit(&self, card: &mut OptionCard, hit: &HitContext) -> u8 {
        if card.used_this_register || hit.attack_from != hit.facing || hit.residual == 0 {
            return 0;
        }
        card.used_this_register = true;
        1
    }
}

struct PowerDownShieldBehavior;
impl OptionBehavior for PowerDownShieldBehavior {
    fn prevent_on_hit(&self, card: &mut OptionCard, hit: &HitContext) -> u8 {
        if hit.power != PowerState::Off
            || hit.residual == 0
            || card.blocked_directions.contains(&hit.attack_from)
        {
            return 0;
        }
        card.blocked_directions.push(hit.attack_from);
        1
    }
}

struct AblativeCoatBehavior;
impl OptionBehavior for AblativeCoatBehavior {
    fn prevent_on_hit(&self, card: &mut OptionCard, hit: &HitContext) -> u8 {
        let taken = ABLATIVE_CAPACITY.saturating_sub(card.absorbed).min(hit.residual);
        card.absorbed += taken;
        taken
    }
}

struct MechanicalArmBehavior;
impl OptionBehavior for MechanicalArmBehavior {
    fn extends_reach(&self) -> bool {
        true
    }
}

struct RammingGearBehavior;
impl OptionBehavior for RammingGearBehavior {
    fn ramming_damage(&self) -> u8 {
        RAMMING_DAMAGE
    }
}

struct SuperiorArchiveBehavior;
impl OptionBehavior for SuperiorArchiveBehavior {
    fn respawn_damage(&self, _base: u8) -> u8 {
        0
    }
}

struct DoubleBarreledBehavior;
impl OptionBehavior for DoubleBarreledBehavior {
    fn shape_laser(&self, profile: &mut LaserProfile) {
        profile.front_shots = 2;
    }
}

struct RearFiringBehavior;
impl OptionBehavior for RearFiringBehavior {
    fn shape_laser(&self, profile: &mut LaserProfile) {
        profile.rear = true;
    }
}

struct HighPowerBehavior;
impl OptionBehavior for HighPowerBehavior {
    fn shape_laser(&self, profile: &mut LaserProfile) {
        profile.high_power = true;
    }
}

/// Behavior table keyed by card type.
pub fn behavior(kind: OptionKind) -> &'static dyn OptionBehavior {
    match kind {
        OptionKind::Shield => &ShieldBehavior,
        OptionKind::PowerDownShield => &PowerDownShieldBehavior,
        OptionKind::AblativeCoat => &AblativeCoatBehavior,
        OptionKind::MechanicalArm => &MechanicalArmBehavior,
        OptionKind::RammingGear => &RammingGearBehavior,
        OptionKind::SuperiorArchive => &SuperiorArchiveBehavior,
        OptionKind::DoubleBarreledLaser => &DoubleBarreledBehavior,
        OptionKind::RearFiringLaser => &RearFiringBehavior,
        OptionKind::HighPowerLaser => &HighPowerBehavior,
    }
}

/// Runs every automatic prevention hook the robot carries. Returns points prevented
/// together with the card that prevented each point.
pub fn auto_prevent(robot: &mut Robot, attack_from: Direction, amount: u8) -> Vec<(OptionKind, u8)> {
    let facing = robot.facing;
    let power = robot.power;
    let mut order: Vec<usize> = (0..robot.options.len()).collect();
    order.sort_by_key(|&idx| robot.options[idx].kind.prevention_rank());

    let mut residual = amount;
    let mut prevented = Vec::new();
    for idx in order {
        if residual == 0 {
            break;
        }
        let card = &mut robot.options[idx];
        let hit = HitContext {
            attack_from,
            facing,
            power,
            residual,
        };
        let blocked = behavior(card.kind).prevent_on_hit(card, &hit).min(residual);
        if blocked > 0 {
            residual -= blocked;
            prevented.push((card.kind, blocked));
        }
    }
    prevented
}

/// Volley shape after applying every laser modifier the robot holds.
pub fn laser_profile(robot: &Robot) -> LaserProfile {
    let mut profile = LaserProfile::default();
    for card in &robot.options {
        behavior(card.kind).shape_laser(&mut profile);
    }
    profile
}

pub fn respawn_damage(robot: &Robot, base: u8) -> u8 {
    robot
        .options
        .iter()
        .fold(base, |damage, card| behavior(card.kind).respawn_damage(damage))
}

pub fn ramming_damage(robot: &Robot) -> u8 {
    robot
        .options
        .iter()
        .map(|card| behavior(card.kind).ramming_damage())
        .max()
        .unwrap_or(0)
}

pub fn extends_reach(robot: &Robot) -> bool {
    robot.options.iter().any(|card| behavior(card.kind).extends_reach())
}

/// Session-scoped option deck and discard pile.
///
/// The deck is filled once and never replenished: a discarded card is gone for good.
#[derive(Debug, Clone)]
pub struct OptionRegistry {
    deck: Vec<OptionKind>,
    discard: Vec<OptionKind>,
}

impl OptionRegistry {
    /// One shuffled instance of every base-deck type.
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut deck: Vec<OptionKind> = OptionKind::ALL
            .into_iter()
            .filter(|kind| kind.in_base_deck())
            .collect();
        deck.shuffle(rng);
        Self {
            deck,
            discard: Vec::new(),
        }
    }

    /// Registry with a fixed deck order; the last element is drawn first.
    pub fn with_deck(deck: Vec<OptionKind>) -> Self {
        Self {
            deck: deck.into_iter().filter(|kind| kind.in_base_deck()).collect(),
            discard: Vec::new(),
        }
    }

    pub fn deck(&self) -> &[OptionKind] {
        &self.deck
    }

    pub fn discard_pile(&self) -> &[OptionKind] {
        &self.discard
    }

    /// Draws the top card into the robot's hand. No-op on an empty deck or a full hand.
    pub fn draw(&mut self, robot: &mut Robot) -> Option<OptionKind> {
        if robot.options.len() >= MAX_OPTIONS {
            return None;
        }
        let kind = self.deck.pop()?;
        robot.options.push(OptionCard::new(kind));
        Some(kind)
    }

    /// Out-of-deck path for Shield cards. Base-deck types cannot be granted.
    pub fn grant(&mut self, robot: &mut Robot, kind: OptionKind) -> bool {
        if kind.in_base_deck() || robot.options.len() >= MAX_OPTIONS {
            return false;
        }
        robot.options.push(OptionCard::new(kind));
        true
    }

    /// Spends an active card from the robot's hand onto the permanent discard pile.
    pub fn discard(&mut self, robot: &mut Robot, kind: OptionKind) -> Result<(), CommandError> {
        let idx = robot
            .options
            .iter()
            .position(|card| card.kind == kind)
            .ok_or(CommandError::OptionNotHeld)?;
        if kind.is_passive() {
            return Err(CommandError::OptionPassive);
        }
        robot.options.remove(idx);
        self.discard.push(kind);
        Ok(())
    }

    /// Clears per-register usage on every card in play.
    pub fn reset_per_register(&self, robots: &mut [Robot]) {
        for card in robots.iter_mut().flat_map(|robot| robot.options.iter_mut()) {
            card.reset_per_register();
        }
    }
}
