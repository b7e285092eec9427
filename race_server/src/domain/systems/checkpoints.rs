// Checkpoint, repair and option-site contact plus respawn placement.

use tracing::info;

use crate::domain::board::{Board, Direction, Position, TileKind};
use crate::domain::errors::{CommandError, EngineError};
use crate::domain::events::RaceEvent;
use crate::domain::options;
use crate::domain::robot::RobotId;
use crate::domain::state::GameState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Site {
    Checkpoint(u8),
    Option,
    Repair,
}

impl Site {
    // Contention order when a Mechanical Arm can reach several sites.
    const fn rank(self) -> u8 {
        match self {
            Site::Checkpoint(_) => 0,
            Site::Option => 1,
            Site::Repair => 2,
        }
    }
}

/// Which sites a pass resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitePass {
    /// End of registers 1-4.
    CheckpointsOnly,
    /// After register 5.
    All,
}

fn site_at(board: &Board, position: Position, next_checkpoint: u8, pass: SitePass) -> Option<Site> {
    if board.checkpoint_at(position) == Some(next_checkpoint) {
        return Some(Site::Checkpoint(next_checkpoint));
    }
    if pass == SitePass::CheckpointsOnly {
        return None;
    }
    match board.tile_at(position)?.kind {
        TileKind::Option => Some(Site::Option),
        TileKind::Repair => Some(Site::Repair),
        _ => None,
    }
}

/// Orthogonal and diagonal neighbours reachable without crossing a wall.
/// A diagonal counts when either L-shaped route around the corner is open.
pub fn reachable_neighbours(board: &Board, from: Position) -> Vec<Position> {
    let open = |at: Position, dir: Direction| board.in_bounds(at.step(dir)) && !board.wall_between(at, dir);

    let mut tiles: Vec<Position> = Direction::ALL
        .into_iter()
        .filter(|&dir| open(from, dir))
        .map(|dir| from.step(dir))
        .collect();

    for dir in Direction::ALL {
        let side = dir.rotate_cw();
        let corner = from.step(dir).step(side);
        let via_first = open(from, dir) && open(from.step(dir), side);
        let via_second = open(from, side) && open(from.step(side), dir);
        if via_first || via_second {
            tiles.push(corner);
        }
    }
    tiles
}

/// Resolves site contact for every robot on the board.
pub fn site_pass(state: &mut GameState, pass: SitePass) -> Result<(), EngineError> {
    for id in state.targetable_ids() {
        touch_sites(state, id, pass)?;
    }
    Ok(())
}

fn touch_sites(state: &mut GameState, id: RobotId, pass: SitePass) -> Result<(), EngineError> {
    let robot = state.robot(id)?;
    let position = robot.position;
    let reach = options::extends_reach(robot);

    let next = robot.checkpoints_visited + 1;
    if let Some(site) = site_at(&state.board, position, next, pass) {
        apply_site(state, id, position, site)?;
    }

    if reach {
        let next = state.robot(id)?.checkpoints_visited + 1;
        let best = reachable_neighbours(&state.board, position)
            .into_iter()
            .filter_map(|tile| site_at(&state.board, tile, next, pass).map(|site| (site, tile)))
            .min_by_key(|(site, _)| site.rank());
        if let Some((site, tile)) = best {
            apply_site(state, id, tile, site)?;
        }
    }
    Ok(())
}

fn apply_site(state: &mut GameState, id: RobotId, tile: Position, site: Site) -> Result<(), EngineError> {
    match site {
        Site::Checkpoint(number) => {
            let robot = state.robot_mut(id)?;
            robot.checkpoints_visited = number;
            robot.archive = tile;
            robot.archive_facing = robot.facing;
            state.emit(RaceEvent::CheckpointReached {
                robot: id,
                checkpoint: number,
            });
            info!(robot = id, checkpoint = number, "checkpoint reached");
            if number == state.board.checkpoint_count() && state.winner.is_none() {
                state.winner = Some(id);
                info!(robot = id, "final checkpoint reached");
            }
        }
        Site::Option => {
            let robot = state
                .robots
                .iter_mut()
                .find(|robot| robot.id == id)
                .ok_or(EngineError::MissingRobot(id))?;
            robot.repair(1);
            if let Some(option) = state.options.draw(robot) {
                state.emit(RaceEvent::OptionDrawn { robot: id, option });
            }
        }
        Site::Repair => state.robot_mut(id)?.repair(1),
    }
    Ok(())
}

fn respawn_tile_free(state: &GameState, tile: Position) -> bool {
    state.board.in_bounds(tile) && !state.board.is_pit(tile) && state.occupant(tile).is_none()
}

/// Fallback placement: the archive marker, or the first free tile around it.
pub fn default_respawn(state: &GameState, id: RobotId) -> Option<(Position, Direction)> {
    let robot = state.find(id)?;
    let archive = robot.archive;
    if state.occupant(archive).is_none() {
        return Some((archive, robot.archive_facing));
    }
    let ring = [
        (0, -1),
        (1, 0),
        (0, 1),
        (-1, 0),
        (1, -1),
        (1, 1),
        (-1, 1),
        (-1, -1),
    ];
    ring.into_iter()
        .map(|(dx, dy)| archive.offset(dx, dy))
        .find(|&tile| respawn_tile_free(state, tile))
        .map(|tile| (tile, robot.archive_facing))
}

/// Puts a destroyed robot back on the board.
///
/// An alternate tile is only accepted while the archive marker is occupied, and must be a
/// free, non-pit tile next to it. Without one a contested archive falls back to the
/// default placement.
pub fn respawn(
    state: &mut GameState,
    id: RobotId,
    facing: Direction,
    alternate: Option<Position>,
) -> Result<Position, CommandError> {
    let robot = state.find(id).ok_or(CommandError::UnknownRobot)?;
    if !robot.alive {
        return Err(CommandError::RobotEliminated);
    }
    if !robot.awaiting_respawn {
        return Err(CommandError::WrongPhase);
    }
    let archive = robot.archive;
    let contested = state.occupant(archive).is_some();

    let tile = match alternate {
        None if !contested => archive,
        None => default_respawn(state, id)
            .map(|(tile, _)| tile)
            .ok_or(CommandError::InvalidRespawnTile)?,
        Some(tile) => {
            if !contested || tile.king_distance(archive) != 1 || !respawn_tile_free(state, tile) {
                return Err(CommandError::InvalidRespawnTile);
            }
            tile
        }
    };

    let damage = options::respawn_damage(robot, state.tuning.respawn_damage);
    let robot = state.find_mut(id).ok_or(CommandError::UnknownRobot)?;
    robot.respawn(tile, facing, damage);
    robot.program_ready = false;
    state.emit(RaceEvent::RobotRespawned {
        robot: id,
        position: tile,
        facing,
        damage,
    });
    info!(robot = id, %tile, damage, "robot respawned");
    Ok(tile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::DestroyCause;
    use crate::domain::options::{OptionCard, OptionKind};
    use crate::domain::tuning::RuleTuning;

    fn state_with(starts: &[(i32, i32)], tweak: impl FnOnce(&mut Board)) -> GameState {
        let mut board = Board::new("sites", 6, 6).unwrap();
        for (i, &(x, y)) in starts.iter().enumerate() {
            board.add_start(i as u8 + 1, Position::new(x, y), Direction::Up).unwrap();
        }
        tweak(&mut board);
        let roster: Vec<String> = (1..=starts.len()).map(|i| format!("bot-{i}")).collect();
        GameState::new(board, &roster, RuleTuning::default(), 17).unwrap()
    }

    #[test]
    fn checkpoints_must_be_taken_in_order() {
        let mut state = state_with(&[(1, 1)], |board| {
            board.add_checkpoint(Position::new(4, 4)).unwrap();
            board.add_checkpoint(Position::new(1, 1)).unwrap();
        });
        site_pass(&mut state, SitePass::CheckpointsOnly).unwrap();
        assert_eq!(state.robot(1).unwrap().checkpoints_visited, 0);

        state.robot_mut(1).unwrap().position = Position::new(4, 4);
        site_pass(&mut state, SitePass::CheckpointsOnly).unwrap();
        let robot = state.robot(1).unwrap();
        assert_eq!(robot.checkpoints_visited, 1);
        assert_eq!(robot.archive, Position::new(4, 4));
    }

    #[test]
    fn final_checkpoint_declares_winner() {
        let mut state = state_with(&[(2, 2)], |board| {
            board.add_checkpoint(Position::new(2, 2)).unwrap();
        });
        site_pass(&mut state, SitePass::CheckpointsOnly).unwrap();
        assert_eq!(state.winner, Some(1));
    }

    #[test]
    fn repair_sites_wait_for_the_full_pass() {
        let mut state = state_with(&[(3, 3)], |board| {
            board.set_kind(Position::new(3, 3), TileKind::Repair).unwrap();
        });
        state.robot_mut(1).unwrap().take_damage(3);
        site_pass(&mut state, SitePass::CheckpointsOnly).unwrap();
        assert_eq!(state.robot(1).unwrap().damage, 3);
        site_pass(&mut state, SitePass::All).unwrap();
        assert_eq!(state.robot(1).unwrap().damage, 2);
    }

    #[test]
    fn mechanical_arm_prefers_checkpoint_over_option_and_repair() {
        let mut state = state_with(&[(2, 2)], |board| {
            board.set_kind(Position::new(2, 1), TileKind::Repair).unwrap();
            board.set_kind(Position::new(3, 2), TileKind::Option).unwrap();
            board.add_checkpoint(Position::new(1, 3)).unwrap();
            board.add_checkpoint(Position::new(5, 5)).unwrap();
        });
        state
            .robot_mut(1)
            .unwrap()
            .options
            .push(OptionCard::new(OptionKind::MechanicalArm));
        site_pass(&mut state, SitePass::All).unwrap();
        let robot = state.robot(1).unwrap();
        assert_eq!(robot.checkpoints_visited, 1);
        assert_eq!(robot.options.len(), 1);
    }

    #[test]
    fn mechanical_arm_collects_own_tile_and_one_neighbour() {
        let mut state = state_with(&[(2, 2)], |board| {
            board.set_kind(Position::new(2, 2), TileKind::Repair).unwrap();
            board.set_kind(Position::new(3, 2), TileKind::Option).unwrap();
        });
        {
            let robot = state.robot_mut(1).unwrap();
            robot.options.push(OptionCard::new(OptionKind::MechanicalArm));
            robot.take_damage(3);
        }
        site_pass(&mut state, SitePass::All).unwrap();

        let robot = state.robot(1).unwrap();
        assert_eq!(robot.damage, 1);
        assert_eq!(robot.options.len(), 2);
        let drawn = state
            .drain_events()
            .into_iter()
            .filter(|event| matches!(event, RaceEvent::OptionDrawn { robot: 1, .. }))
            .count();
        assert_eq!(drawn, 1);
    }

    #[test]
    fn mechanical_arm_takes_two_checkpoints_in_one_pass() {
        let mut state = state_with(&[(2, 2)], |board| {
            board.add_checkpoint(Position::new(2, 2)).unwrap();
            board.add_checkpoint(Position::new(3, 2)).unwrap();
            board.add_checkpoint(Position::new(5, 5)).unwrap();
        });
        state
            .robot_mut(1)
            .unwrap()
            .options
            .push(OptionCard::new(OptionKind::MechanicalArm));
        site_pass(&mut state, SitePass::CheckpointsOnly).unwrap();

        let robot = state.robot(1).unwrap();
        assert_eq!(robot.checkpoints_visited, 2);
        assert_eq!(robot.archive, Position::new(3, 2));
        assert_eq!(state.winner, None);
    }

    #[test]
    fn mechanical_arm_cannot_reach_through_walls() {
        let mut state = state_with(&[(2, 2)], |board| {
            board.add_checkpoint(Position::new(3, 2)).unwrap();
            board.add_wall(Position::new(2, 2), Direction::Right).unwrap();
        });
        state
            .robot_mut(1)
            .unwrap()
            .options
            .push(OptionCard::new(OptionKind::MechanicalArm));
        site_pass(&mut state, SitePass::CheckpointsOnly).unwrap();
        assert_eq!(state.robot(1).unwrap().checkpoints_visited, 0);
    }

    #[test]
    fn diagonal_reach_needs_one_open_corner_route() {
        let mut board = Board::new("diag", 4, 4).unwrap();
        let centre = Position::new(1, 1);
        assert!(reachable_neighbours(&board, centre).contains(&Position::new(2, 0)));

        board.add_wall(centre, Direction::Up).unwrap();
        board.add_wall(centre, Direction::Right).unwrap();
        assert!(!reachable_neighbours(&board, centre).contains(&Position::new(2, 0)));
    }

    #[test]
    fn respawn_applies_two_damage_unless_superior_archive() {
        let mut state = state_with(&[(0, 0), (5, 5)], |_| {});
        state.destroy_robot(1, DestroyCause::FellOffBoard).unwrap();
        respawn(&mut state, 1, Direction::Down, None).unwrap();
        assert_eq!(state.robot(1).unwrap().damage, 2);

        state
            .robot_mut(2)
            .unwrap()
            .options
            .push(OptionCard::new(OptionKind::SuperiorArchive));
        for _ in 0..2 {
            state.destroy_robot(2, DestroyCause::Pit).unwrap();
            respawn(&mut state, 2, Direction::Up, None).unwrap();
            assert_eq!(state.robot(2).unwrap().damage, 0);
        }
    }

    #[test]
    fn alternate_tile_only_when_archive_is_contested() {
        let mut state = state_with(&[(2, 2), (4, 4)], |_| {});
        state.destroy_robot(1, DestroyCause::Pit).unwrap();
        assert_eq!(
            respawn(&mut state, 1, Direction::Up, Some(Position::new(2, 3))),
            Err(CommandError::InvalidRespawnTile)
        );

        state.robot_mut(2).unwrap().position = Position::new(2, 2);
        assert_eq!(
            respawn(&mut state, 1, Direction::Up, Some(Position::new(4, 4))),
            Err(CommandError::InvalidRespawnTile)
        );
        assert_eq!(
            respawn(&mut state, 1, Direction::Up, Some(Position::new(3, 3))),
            Ok(Position::new(3, 3))
        );
    }

    #[test]
    fn respawn_requires_a_destroyed_robot() {
        let mut state = state_with(&[(2, 2)], |_| {});
        assert_eq!(
            respawn(&mut state, 1, Direction::Up, None),
            Err(CommandError::WrongPhase)
        );
    }
}
