// Laser beam tracing for board-mounted and robot-mounted lasers.

use serde::Serialize;

use crate::domain::board::{Board, Direction, Position};
use crate::domain::events::RaceEvent;
use crate::domain::options;
use crate::domain::robot::{PowerState, RobotId};
use crate::domain::state::GameState;

/// Which half of a tile a beam starts or ends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BeamStop {
    Robot,
    Wall,
    Edge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "robot", rename_all = "snake_case")]
pub enum BeamSource {
    Board,
    Robot(RobotId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BeamTrace {
    pub source: BeamSource,
    pub origin: Position,
    pub direction: Direction,
    /// Tiles the beam crosses, origin first.
    pub path: Vec<Position>,
    /// Robots hit, in beam order.
    pub hits: Vec<RobotId>,
    pub stop: BeamStop,
    pub start: Alignment,
    pub end: Alignment,
    pub damage: u8,
}

/// Parameters for a single beam.
#[derive(Debug, Clone, Copy)]
pub struct Shot {
    pub origin: Position,
    pub direction: Direction,
    pub damage: u8,
    /// `None` for board-mounted lasers.
    pub shooter: Option<RobotId>,
    pub high_power: bool,
}

/// A beam landing on a robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaserHit {
    pub target: RobotId,
    pub attack_from: Direction,
    pub damage: u8,
    pub source: BeamSource,
}

/// Follows a beam tile by tile until it hits a robot, a wall or the board edge.
///
/// Robot beams start at the front of the shooter's tile and can never hit the shooter.
/// Board beams start at the back of the mount tile and hit a robot standing on it.
/// High-power beams pierce every robot and at most one wall.
pub fn trace_beam<F>(board: &Board, occupant: F, shot: Shot) -> BeamTrace
where
    F: Fn(Position) -> Option<RobotId>,
{
    let start = if shot.shooter.is_some() {
        Alignment::Front
    } else {
        Alignment::Back
    };
    let mut trace = BeamTrace {
        source: shot.shooter.map_or(BeamSource::Board, BeamSource::Robot),
        origin: shot.origin,
        direction: shot.direction,
        path: vec![shot.origin],
        hits: Vec::new(),
        stop: BeamStop::Edge,
        start,
        end: Alignment::Back,
        damage: shot.damage,
    };

    if shot.shooter.is_none() {
        if let Some(id) = occupant(shot.origin) {
            trace.hits.push(id);
            if !shot.high_power {
                trace.stop = BeamStop::Robot;
                trace.end = Alignment::Front;
                return trace;
            }
        }
    }

    let mut position = shot.origin;
    let mut walls_pierced = 0u8;
    loop {
        if board.wall_between(position, shot.direction) {
            if shot.high_power && walls_pierced == 0 {
                walls_pierced += 1;
            } else {
                trace.stop = BeamStop::Wall;
                trace.end = Alignment::Back;
                return trace;
            }
        }
        let next = position.step(shot.direction);
        if !board.in_bounds(next) {
            trace.stop = BeamStop::Edge;
            trace.end = Alignment::Back;
            return trace;
        }
        trace.path.push(next);
        position = next;

        if let Some(id) = occupant(next).filter(|&id| Some(id) != shot.shooter) {
            trace.hits.push(id);
            if !shot.high_power {
                trace.stop = BeamStop::Robot;
                trace.end = Alignment::Front;
                return trace;
            }
        }
    }
}

/// Every shot fired this register: board lasers, then each powered robot's volley.
pub fn plan_shots(state: &GameState) -> Vec<Shot> {
    let mut shots: Vec<Shot> = state
        .board
        .lasers()
        .iter()
        .map(|laser| Shot {
            origin: laser.position,
            direction: laser.direction,
            damage: laser.damage,
            shooter: None,
            high_power: false,
        })
        .collect();

    let damage = state.tuning.robot_laser_damage;
    for robot in state.robots.iter().filter(|r| r.is_targetable() && r.power != PowerState::Off) {
        let profile = options::laser_profile(robot);
        for _ in 0..profile.front_shots {
            shots.push(Shot {
                origin: robot.position,
                direction: robot.facing,
                damage,
                shooter: Some(robot.id),
                high_power: profile.high_power,
            });
        }
        if profile.rear {
            // Rear beam ignores every other modifier.
            shots.push(Shot {
                origin: robot.position,
                direction: robot.facing.opposite(),
                damage,
                shooter: Some(robot.id),
                high_power: false,
            });
        }
    }
    shots
}

/// Fires every laser against the current positions and reports the resulting hits.
pub fn fire_lasers(state: &mut GameState) -> Vec<LaserHit> {
    let traces: Vec<BeamTrace> = plan_shots(state)
        .into_iter()
        .map(|shot| trace_beam(&state.board, |p| state.occupant(p), shot))
        .collect();

    let mut hits = Vec::new();
    for trace in traces {
        for &target in &trace.hits {
            hits.push(LaserHit {
                target,
                attack_from: trace.direction.opposite(),
                damage: trace.damage,
                source: trace.source,
            });
        }
        state.emit(RaceEvent::BeamFired(trace));
    }
    hits
}
