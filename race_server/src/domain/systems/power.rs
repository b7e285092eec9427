// Power-down announcements and round-start power transitions.

use tracing::info;

use crate::domain::errors::CommandError;
use crate::domain::events::RaceEvent;
use crate::domain::robot::{PowerState, RobotId};
use crate::domain::state::GameState;

fn set_power(state: &mut GameState, id: RobotId, power: PowerState) -> Result<(), CommandError> {
    let robot = state.find_mut(id).ok_or(CommandError::UnknownRobot)?;
    if robot.power == power {
        return Ok(());
    }
    robot.power = power;
    state.emit(RaceEvent::PowerStateChanged { robot: id, state: power });
    Ok(())
}

/// Flips a pending announcement on or off while programs are being written.
pub fn toggle_power_down(state: &mut GameState, id: RobotId) -> Result<PowerState, CommandError> {
    let robot = state.find(id).ok_or(CommandError::UnknownRobot)?;
    if !robot.alive {
        return Err(CommandError::RobotEliminated);
    }
    if robot.awaiting_respawn {
        return Err(CommandError::RobotDestroyed);
    }
    let next = match robot.power {
        PowerState::On => PowerState::Announcing,
        PowerState::Announcing => PowerState::On,
        PowerState::Off => return Err(CommandError::PoweredDown),
    };
    set_power(state, id, next)?;
    Ok(next)
}

/// Robots sitting powered down that must choose whether to stay down.
pub fn awaiting_power_decision(state: &GameState) -> Vec<RobotId> {
    state
        .robots
        .iter()
        .filter(|robot| robot.is_targetable() && robot.power == PowerState::Off)
        .map(|robot| robot.id)
        .collect()
}

/// Applies a powered-down robot's choice. Cancelling powers it back on.
pub fn resolve_power_decision(state: &mut GameState, id: RobotId, stay_down: bool) -> Result<(), CommandError> {
    let robot = state.find(id).ok_or(CommandError::UnknownRobot)?;
    if !robot.is_targetable() || robot.power != PowerState::Off {
        return Err(CommandError::WrongPhase);
    }
    if !stay_down {
        set_power(state, id, PowerState::On)?;
        info!(robot = id, "power-down cancelled");
    }
    Ok(())
}

/// Announced robots shut down for the round and shed all damage.
pub fn apply_announced_power_downs(state: &mut GameState) -> Vec<RobotId> {
    let announced: Vec<RobotId> = state
        .robots
        .iter()
        .filter(|robot| robot.is_targetable() && robot.power == PowerState::Announcing)
        .map(|robot| robot.id)
        .collect();
    for &id in &announced {
        if let Some(robot) = state.find_mut(id) {
            robot.power = PowerState::Off;
            robot.damage = 0;
            robot.refresh_locked_registers();
            state.emit(RaceEvent::PowerStateChanged {
                robot: id,
                state: PowerState::Off,
            });
            info!(robot = id, "robot powered down");
        }
    }
    announced
}
