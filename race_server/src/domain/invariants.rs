// Structural sanity checks run after every register; a violation tears the session down.

use std::collections::HashMap;

use crate::domain::errors::EngineError;
use crate::domain::options::OptionKind;
use crate::domain::state::GameState;
use crate::domain::tuning::rules::{LETHAL_DAMAGE, LOCK_FREE_DAMAGE, MAX_OPTIONS, REGISTERS};

/// Every broken invariant, described. Empty when the state is sound.
#[must_use]
pub fn check_invariants(state: &GameState) -> Vec<String> {
    let mut violations = Vec::new();
    let mut occupied = HashMap::new();

    for robot in &state.robots {
        if robot.damage > LETHAL_DAMAGE {
            violations.push(format!("robot {} has damage {} > {}", robot.id, robot.damage, LETHAL_DAMAGE));
        }
        let locks = robot.damage.saturating_sub(LOCK_FREE_DAMAGE).min(REGISTERS);
        if robot.locked_registers != locks {
            violations.push(format!(
                "robot {} has {} locked registers at damage {}",
                robot.id, robot.locked_registers, robot.damage
            ));
        }
        if robot.options.len() > MAX_OPTIONS {
            violations.push(format!("robot {} holds {} option cards", robot.id, robot.options.len()));
        }
        if !robot.is_targetable() {
            continue;
        }
        if state.board.tile_at(robot.position).is_none() {
            violations.push(format!("robot {} is off the board at {}", robot.id, robot.position));
        }
        if let Some(other) = occupied.insert(robot.position, robot.id) {
            violations.push(format!("robots {} and {} share tile {}", other, robot.id, robot.position));
        }
    }

    if state.options.deck().contains(&OptionKind::Shield) {
        violations.push("shield found in the option deck".to_string());
    }

    let mut seen: HashMap<OptionKind, usize> = HashMap::new();
    let in_hands = state.robots.iter().flat_map(|robot| robot.options.iter().map(|card| card.kind));
    let everywhere = in_hands
        .chain(state.options.deck().iter().copied())
        .chain(state.options.discard_pile().iter().copied());
    for kind in everywhere.filter(|kind| kind.in_base_deck()) {
        *seen.entry(kind).or_default() += 1;
    }
    for (kind, count) in seen {
        if count > 1 {
            violations.push(format!("{count} copies of {kind:?} in play"));
        }
    }

    violations
}

/// Fails with the first violation found.
pub fn ensure_invariants(state: &GameState) -> Result<(), EngineError> {
    match check_invariants(state).into_iter().next() {
        Some(violation) => Err(EngineError::Invariant(violation)),
        None => Ok(()),
    }
}
