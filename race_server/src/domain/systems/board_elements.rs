// Board-element phase: conveyors, pushers, gears and pits.

use std::collections::HashSet;

use crate::domain::board::{Direction, TileKind};
use crate::domain::errors::EngineError;
use crate::domain::events::DestroyCause;
use crate::domain::robot::RobotId;
use crate::domain::state::GameState;
use crate::domain::systems::movement::{self, Drive};

/// Runs every board element for the given register, in rulebook order.
pub fn run_board_elements(state: &mut GameState, register: u8) -> Result<(), EngineError> {
    conveyor_pass(state, true)?;
    conveyor_pass(state, false)?;
    pusher_pass(state, register)?;
    gear_pass(state)?;
    pit_sweep(state)
}

/// Moves robots standing on conveyors one tile. Robots furthest along their belt go first
/// so a queue of robots advances together; each robot moves at most once per pass.
fn conveyor_pass(state: &mut GameState, express_only: bool) -> Result<(), EngineError> {
    let mut riders: Vec<(RobotId, Direction, i32)> = state
        .robots
        .iter()
        .filter(|robot| robot.is_targetable())
        .filter_map(|robot| {
            let kind = &state.board.tile_at(robot.position)?.kind;
            let direction = match kind {
                TileKind::ExpressConveyor { direction } => *direction,
                TileKind::Conveyor { direction } if !express_only => *direction,
                _ => return None,
            };
            let (dx, dy) = direction.offset();
            let lead = robot.position.x * dx + robot.position.y * dy;
            Some((robot.id, direction, lead))
        })
        .collect();
    riders.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));

    let mut moved: HashSet<RobotId> = HashSet::new();
    for (id, direction, _) in riders {
        if moved.contains(&id) || !state.robot(id)?.is_targetable() {
            continue;
        }
        let outcome = movement::push(state, id, direction, Drive::Board)?;
        moved.extend(outcome.moved.iter().copied());
        if outcome.blocked {
            continue;
        }
        turn_with_belt(state, id, direction)?;
    }
    Ok(())
}

// A robot carried onto a belt that bends a quarter turn turns with it.
fn turn_with_belt(state: &mut GameState, id: RobotId, carried: Direction) -> Result<(), EngineError> {
    let robot = state.robot(id)?;
    if !robot.is_targetable() {
        return Ok(());
    }
    let next = state
        .board
        .tile_at(robot.position)
        .and_then(|tile| tile.kind.conveyor_direction());
    let Some(next) = next else {
        return Ok(());
    };
    let robot = state.robot_mut(id)?;
    if next == carried.rotate_cw() {
        robot.facing = robot.facing.rotate_cw();
    } else if next == carried.rotate_ccw() {
        robot.facing = robot.facing.rotate_ccw();
    }
    Ok(())
}

fn pusher_pass(state: &mut GameState, register: u8) -> Result<(), EngineError> {
    let pushed: Vec<(RobotId, Direction)> = state
        .robots
        .iter()
        .filter(|robot| robot.is_targetable())
        .filter_map(|robot| match &state.board.tile_at(robot.position)?.kind {
            TileKind::Pusher {
                direction,
                registers,
            } if registers.contains(&register) => Some((robot.id, *direction)),
            _ => None,
        })
        .collect();
    for (id, direction) in pushed {
        movement::push(state, id, direction, Drive::Board)?;
    }
    Ok(())
}

fn gear_pass(state: &mut GameState) -> Result<(), EngineError> {
    let board = &state.board;
    for robot in state.robots.iter_mut().filter(|robot| robot.is_targetable()) {
        if let Some(TileKind::Gear { rotation }) = board.tile_at(robot.position).map(|tile| &tile.kind) {
            robot.facing = robot.facing.rotate(*rotation);
        }
    }
    Ok(())
}

fn pit_sweep(state: &mut GameState) -> Result<(), EngineError> {
    let fallen: Vec<RobotId> = state
        .robots
        .iter()
        .filter(|robot| robot.is_targetable() && state.board.is_pit(robot.position))
        .map(|robot| robot.id)
        .collect();
    for id in fallen {
        state.destroy_robot(id, DestroyCause::Pit)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::board::{Board, Position, Rotation};
    use crate::domain::tuning::RuleTuning;

    fn state_with(starts: &[(i32, i32, Direction)], tweak: impl FnOnce(&mut Board)) -> GameState {
        let mut board = Board::new("elements", 6, 6).unwrap();
        for (i, &(x, y, dir)) in starts.iter().enumerate() {
            board.add_start(i as u8 + 1, Position::new(x, y), dir).unwrap();
        }
        tweak(&mut board);
        let roster: Vec<String> = (1..=starts.len()).map(|i| format!("bot-{i}")).collect();
        GameState::new(board, &roster, RuleTuning::default(), 11).unwrap()
    }

    #[test]
    fn express_conveyor_moves_twice() {
        let mut state = state_with(&[(0, 0, Direction::Down)], |board| {
            for x in 0..3 {
                board
                    .set_kind(Position::new(x, 0), TileKind::ExpressConveyor { direction: Direction::Right })
                    .unwrap();
            }
        });
        run_board_elements(&mut state, 1).unwrap();
        assert_eq!(state.robot(1).unwrap().position, Position::new(2, 0));
    }

    #[test]
    fn conveyor_queue_advances_together() {
        let mut state = state_with(&[(0, 2, Direction::Up), (1, 2, Direction::Up)], |board| {
            for x in 0..2 {
                board
                    .set_kind(Position::new(x, 2), TileKind::Conveyor { direction: Direction::Right })
                    .unwrap();
            }
        });
        run_board_elements(&mut state, 1).unwrap();
        assert_eq!(state.robot(1).unwrap().position, Position::new(1, 2));
        assert_eq!(state.robot(2).unwrap().position, Position::new(2, 2));
    }

    #[test]
    fn conveyor_bend_turns_the_rider() {
        let mut state = state_with(&[(0, 3, Direction::Up)], |board| {
            board
                .set_kind(Position::new(0, 3), TileKind::Conveyor { direction: Direction::Right })
                .unwrap();
            board
                .set_kind(Position::new(1, 3), TileKind::Conveyor { direction: Direction::Down })
                .unwrap();
        });
        run_board_elements(&mut state, 1).unwrap();
        let robot = state.robot(1).unwrap();
        assert_eq!(robot.position, Position::new(1, 3));
        assert_eq!(robot.facing, Direction::Right);
    }

    #[test]
    fn gear_rotates_in_place() {
        let mut state = state_with(&[(2, 2, Direction::Up)], |board| {
            board
                .set_kind(Position::new(2, 2), TileKind::Gear { rotation: Rotation::CounterClockwise })
                .unwrap();
        });
        run_board_elements(&mut state, 1).unwrap();
        assert_eq!(state.robot(1).unwrap().facing, Direction::Left);
        assert_eq!(state.robot(1).unwrap().position, Position::new(2, 2));
    }

    #[test]
    fn pusher_fires_only_on_listed_registers() {
        let mut state = state_with(&[(3, 3, Direction::Up)], |board| {
            board
                .set_kind(
                    Position::new(3, 3),
                    TileKind::Pusher {
                        direction: Direction::Left,
                        registers: vec![2, 4],
                    },
                )
                .unwrap();
        });
        run_board_elements(&mut state, 1).unwrap();
        assert_eq!(state.robot(1).unwrap().position, Position::new(3, 3));
        run_board_elements(&mut state, 2).unwrap();
        assert_eq!(state.robot(1).unwrap().position, Position::new(2, 3));
    }

    #[test]
    fn conveyor_into_pit_destroys() {
        let mut state = state_with(&[(4, 4, Direction::Up)], |board| {
            board
                .set_kind(Position::new(4, 4), TileKind::Conveyor { direction: Direction::Down })
                .unwrap();
            board.set_kind(Position::new(4, 5), TileKind::Pit).unwrap();
        });
        run_board_elements(&mut state, 3).unwrap();
        assert!(state.robot(1).unwrap().awaiting_respawn);
    }
}
