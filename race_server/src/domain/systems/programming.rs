// Dealing program cards and filling registers.

use tracing::debug;

use crate::domain::errors::CommandError;
use crate::domain::program::{ProgramCard, ProgramDeck};
use crate::domain::robot::{PowerState, Robot, RobotId};
use crate::domain::state::GameState;
use crate::domain::tuning::rules::REGISTERS;

/// Reshuffles the program deck and deals every robot that programs this round.
///
/// Cards sitting in locked registers stay where they are and are kept out of the deck.
pub fn deal_programs(state: &mut GameState) {
    let locked: Vec<ProgramCard> = state
        .robots
        .iter()
        .filter(|robot| robot.is_targetable())
        .flat_map(Robot::locked_cards)
        .collect();
    let mut deck = ProgramDeck::shuffled(&locked, &mut state.rng);
    let hand_size = state.tuning.hand_size;

    for robot in &mut state.robots {
        robot.dealt.clear();
        let unlocked = robot.unlocked_slots();
        if robot.power == PowerState::Off || !robot.is_targetable() {
            robot.program = [None; REGISTERS as usize];
        } else {
            for slot in &mut robot.program[..unlocked] {
                *slot = None;
            }
        }

        if robot.needs_program() {
            let hand = usize::from(hand_size.saturating_sub(robot.damage));
            robot.dealt = deck.deal(hand);
            robot.program_ready = unlocked == 0;
            debug!(robot = robot.id, hand = robot.dealt.len(), locked = robot.locked_registers, "program dealt");
        } else {
            robot.program_ready = true;
        }
    }
}

fn programmable(state: &mut GameState, id: RobotId) -> Result<&mut Robot, CommandError> {
    let robot = state.find_mut(id).ok_or(CommandError::UnknownRobot)?;
    if !robot.alive {
        return Err(CommandError::RobotEliminated);
    }
    if robot.awaiting_respawn {
        return Err(CommandError::RobotDestroyed);
    }
    if robot.power == PowerState::Off {
        return Err(CommandError::PoweredDown);
    }
    if robot.program_ready {
        return Err(CommandError::AlreadySubmitted);
    }
    Ok(robot)
}

fn check_slot(robot: &Robot, slot: usize) -> Result<(), CommandError> {
    if slot >= usize::from(REGISTERS) {
        return Err(CommandError::InvalidSlot);
    }
    if slot >= robot.unlocked_slots() {
        return Err(CommandError::SlotLocked);
    }
    Ok(())
}

fn dealt_card(robot: &Robot, priority: u16) -> Result<ProgramCard, CommandError> {
    robot
        .dealt
        .iter()
        .find(|card| card.priority == priority)
        .copied()
        .ok_or(CommandError::CardUnavailable)
}

/// Places a dealt card into an unlocked register.
pub fn select_card(state: &mut GameState, id: RobotId, slot: usize, priority: u16) -> Result<(), CommandError> {
    let robot = programmable(state, id)?;
    check_slot(robot, slot)?;
    let card = dealt_card(robot, priority)?;
    let elsewhere = robot
        .program
        .iter()
        .enumerate()
        .any(|(idx, placed)| idx != slot && *placed == Some(card));
    if elsewhere {
        return Err(CommandError::CardAlreadyUsed);
    }
    robot.program[slot] = Some(card);
    Ok(())
}

pub fn remove_card(state: &mut GameState, id: RobotId, slot: usize) -> Result<(), CommandError> {
    let robot = programmable(state, id)?;
    check_slot(robot, slot)?;
    robot.program[slot] = None;
    Ok(())
}

/// Locks in a full program: one dealt card per unlocked register, in register order.
pub fn submit_program(state: &mut GameState, id: RobotId, priorities: &[u16]) -> Result<(), CommandError> {
    let robot = programmable(state, id)?;
    let expected = robot.unlocked_slots();
    if priorities.len() != expected {
        return Err(CommandError::WrongCardCount {
            expected,
            actual: priorities.len(),
        });
    }
    let mut cards = Vec::with_capacity(expected);
    for &priority in priorities {
        let card = dealt_card(robot, priority)?;
        if cards.contains(&card) {
            return Err(CommandError::CardAlreadyUsed);
        }
        cards.push(card);
    }
    for (slot, card) in cards.into_iter().enumerate() {
        robot.program[slot] = Some(card);
    }
    robot.program_ready = true;
    Ok(())
}

/// Completes every unfinished program with unused dealt cards, in dealt order.
/// Returns the robots that needed filling.
pub fn fill_program_defaults(state: &mut GameState) -> Vec<RobotId> {
    let mut filled = Vec::new();
    for robot in state.robots.iter_mut().filter(|robot| robot.needs_program() && !robot.program_ready) {
        let unlocked = robot.unlocked_slots();
        let mut spare = robot
            .dealt
            .iter()
            .copied()
            .filter(|card| !robot.program.contains(&Some(*card)))
            .collect::<Vec<_>>()
            .into_iter();
        for slot in &mut robot.program[..unlocked] {
            if slot.is_none() {
                *slot = spare.next();
            }
        }
        robot.program_ready = true;
        filled.push(robot.id);
    }
    filled
}

/// Whether every robot that programs this round has a program locked in.
pub fn all_programs_ready(state: &GameState) -> bool {
    state
        .robots
        .iter()
        .filter(|robot| robot.needs_program())
        .all(|robot| robot.program_ready)
}
