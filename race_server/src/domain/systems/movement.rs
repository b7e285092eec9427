// Card-driven movement and chain-push resolution.

use tracing::debug;

use crate::domain::board::Direction;
use crate::domain::errors::EngineError;
use crate::domain::events::{DestroyCause, RaceEvent};
use crate::domain::options;
use crate::domain::program::{Motion, ProgramCard};
use crate::domain::robot::{PowerState, RobotId};
use crate::domain::state::GameState;
use crate::domain::systems::damage;

/// Who is driving a displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    /// The robot's own program card.
    Active,
    /// Conveyors, gears and pushers.
    Board,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PushOutcome {
    /// Robots that changed tile (or fell off), mover first.
    pub moved: Vec<RobotId>,
    pub blocked: bool,
    pub fell_off: Option<RobotId>,
}

/// Robots lined up on consecutive tiles from `mover` in `direction`, mover first.
/// `None` when a wall anywhere along the line blocks the push.
pub fn push_chain(state: &GameState, mover: RobotId, direction: Direction) -> Result<Option<Vec<RobotId>>, EngineError> {
    let mut position = state.robot(mover)?.position;
    let mut chain = vec![mover];
    loop {
        if state.board.wall_between(position, direction) {
            return Ok(None);
        }
        let next = position.step(direction);
        if !state.board.in_bounds(next) {
            return Ok(Some(chain));
        }
        match state.occupant(next) {
            Some(id) => {
                chain.push(id);
                position = next;
            }
            None => return Ok(Some(chain)),
        }
    }
}

/// Moves `mover` one tile, shoving every robot in front of it. All or nothing.
pub fn push(
    state: &mut GameState,
    mover: RobotId,
    direction: Direction,
    drive: Drive,
) -> Result<PushOutcome, EngineError> {
    if !state.robot(mover)?.is_targetable() {
        return Ok(PushOutcome::default());
    }
    let Some(chain) = push_chain(state, mover, direction)? else {
        debug!(robot = mover, ?direction, "push blocked by wall");
        return Ok(PushOutcome {
            blocked: true,
            ..PushOutcome::default()
        });
    };

    let mut outcome = PushOutcome {
        moved: chain.clone(),
        ..PushOutcome::default()
    };
    // Front of the chain first so nobody steps onto an occupied tile.
    for &id in chain.iter().rev() {
        let robot = state.robot_mut(id)?;
        let from = robot.position;
        let to = from.step(direction);
        robot.position = to;
        state.emit(RaceEvent::RobotMoved { robot: id, from, to });
        if !state.board.in_bounds(to) {
            outcome.fell_off = Some(id);
            state.destroy_robot(id, DestroyCause::FellOffBoard)?;
        }
    }

    if drive == Drive::Active && chain.len() > 1 {
        let ram = options::ramming_damage(state.robot(mover)?);
        let rammed = chain[1];
        if ram > 0 && state.robot(rammed)?.is_targetable() {
            damage::apply_immediately(state, rammed, direction.opposite(), ram)?;
        }
    }

    for &id in &chain {
        let robot = state.robot(id)?;
        if robot.is_targetable() && state.board.is_pit(robot.position) {
            state.destroy_robot(id, DestroyCause::Pit)?;
        }
    }
    Ok(outcome)
}

/// Resolves one program card for one robot.
pub fn execute_card(state: &mut GameState, id: RobotId, card: ProgramCard) -> Result<(), EngineError> {
    let robot = state.robot(id)?;
    if !robot.is_targetable() || robot.power == PowerState::Off {
        return Ok(());
    }
    state.emit(RaceEvent::CardExecuted { robot: id, card });
    match card.kind.motion() {
        Motion::Forward(steps) => {
            for _ in 0..steps {
                let facing = state.robot(id)?.facing;
                let outcome = push(state, id, facing, Drive::Active)?;
                if outcome.blocked || !state.robot(id)?.is_targetable() {
                    break;
                }
            }
        }
        Motion::Backward => {
            let facing = state.robot(id)?.facing;
            push(state, id, facing.opposite(), Drive::Active)?;
        }
        Motion::Turn(rotation, quarters) => {
            let robot = state.robot_mut(id)?;
            for _ in 0..quarters {
                robot.facing = robot.facing.rotate(rotation);
            }
        }
    }
    Ok(())
}

/// Card phase of a register: every programmed robot, highest priority first.
/// Equal priorities resolve in robot-id order.
pub fn run_card_phase(state: &mut GameState, register: u8) -> Result<(), EngineError> {
    let slot = usize::from(register.saturating_sub(1));
    let mut queue: Vec<(RobotId, ProgramCard)> = state
        .robots
        .iter()
        .filter(|robot| robot.is_targetable() && robot.power != PowerState::Off)
        .filter_map(|robot| robot.program.get(slot).copied().flatten().map(|card| (robot.id, card)))
        .collect();
    queue.sort_by(|(a_id, a), (b_id, b)| b.priority.cmp(&a.priority).then(a_id.cmp(b_id)));

    for (id, card) in queue {
        execute_card(state, id, card)?;
    }
    Ok(())
}
