// Pending damage entries: automatic prevention, interactive spending and settlement.

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::board::Direction;
use crate::domain::errors::{CommandError, EngineError};
use crate::domain::events::{AttackId, DestroyCause, RaceEvent};
use crate::domain::options::{self, OptionKind};
use crate::domain::robot::RobotId;
use crate::domain::state::GameState;

/// One hit on one robot, held open until it is settled exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingDamage {
    pub attack: AttackId,
    pub target: RobotId,
    /// Side of the target the damage arrives from.
    pub attack_from: Direction,
    pub amount: u8,
    pub prevented: u8,
    pub completed: bool,
}

impl PendingDamage {
    pub fn residual(&self) -> u8 {
        self.amount.saturating_sub(self.prevented)
    }
}

pub fn open(state: &mut GameState, target: RobotId, attack_from: Direction, amount: u8) -> PendingDamage {
    PendingDamage {
        attack: state.next_attack_id(),
        target,
        attack_from,
        amount,
        prevented: 0,
        completed: false,
    }
}

/// Runs the target's passive prevention hooks against the entry.
pub fn auto_prevent(state: &mut GameState, pending: &mut PendingDamage) -> Result<(), EngineError> {
    let robot = state.robot_mut(pending.target)?;
    if pending.completed || !robot.is_targetable() {
        return Ok(());
    }
    let blocks = options::auto_prevent(robot, pending.attack_from, pending.residual());
    for (option, amount) in blocks {
        pending.prevented += amount;
        state.emit(RaceEvent::DamagePrevented {
            robot: pending.target,
            attack: pending.attack,
            amount,
            option,
        });
    }
    Ok(())
}

/// Whether the target can still do anything about the entry interactively.
pub fn negotiable(state: &GameState, pending: &PendingDamage) -> bool {
    !pending.completed
        && pending.residual() > 0
        && state
            .find(pending.target)
            .is_some_and(|robot| robot.is_targetable() && robot.holds_active_option())
}

/// Spends an active option card to block one point of the entry.
pub fn spend_option(
    state: &mut GameState,
    pending: &mut PendingDamage,
    kind: OptionKind,
) -> Result<(), CommandError> {
    if pending.completed {
        return Err(CommandError::DecisionClosed);
    }
    let robot = state
        .robots
        .iter_mut()
        .find(|robot| robot.id == pending.target)
        .ok_or(CommandError::UnknownRobot)?;
    if !robot.is_targetable() {
        return Err(CommandError::RobotDestroyed);
    }
    state.options.discard(robot, kind)?;
    let amount = pending.residual().min(1);
    pending.prevented += amount;
    state.emit(RaceEvent::OptionDiscarded {
        robot: pending.target,
        option: kind,
    });
    state.emit(RaceEvent::DamagePrevented {
        robot: pending.target,
        attack: pending.attack,
        amount,
        option: kind,
    });
    Ok(())
}

/// Applies whatever damage remains. Returns false when the entry was already settled.
pub fn settle(state: &mut GameState, pending: &mut PendingDamage) -> Result<bool, EngineError> {
    if pending.completed {
        return Ok(false);
    }
    pending.completed = true;

    let net = pending.residual();
    let robot = state.robot_mut(pending.target)?;
    if !robot.is_targetable() {
        debug!(robot = pending.target, attack = pending.attack, "hit on destroyed robot dropped");
        return Ok(true);
    }
    if net == 0 {
        return Ok(true);
    }
    let lethal = robot.take_damage(net);
    let total = robot.damage;
    state.emit(RaceEvent::RobotDamaged {
        robot: pending.target,
        amount: net,
        total,
    });
    info!(robot = pending.target, amount = net, total, "robot damaged");
    if lethal {
        state.destroy_robot(pending.target, DestroyCause::Damage)?;
    }
    Ok(true)
}

/// Damage that never opens an interactive window (ramming).
pub fn apply_immediately(
    state: &mut GameState,
    target: RobotId,
    attack_from: Direction,
    amount: u8,
) -> Result<(), EngineError> {
    let mut pending = open(state, target, attack_from, amount);
    auto_prevent(state, &mut pending)?;
    settle(state, &mut pending)?;
    Ok(())
}
