// Authoritative race state plus the snapshot types handed to collaborators.

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::domain::board::{Board, Direction, Position};
use crate::domain::errors::EngineError;
use crate::domain::events::{AttackId, DestroyCause, RaceEvent};
use crate::domain::options::{OptionKind, OptionRegistry};
use crate::domain::program::ProgramCard;
use crate::domain::robot::{PowerState, Robot, RobotId};
use crate::domain::tuning::RuleTuning;

#[derive(Debug, Clone, Serialize)]
pub struct RobotSnapshot {
    pub id: RobotId,
    pub name: String,
    pub position: Position,
    pub facing: Direction,
    pub damage: u8,
    pub lives: u8,
    pub alive: bool,
    pub awaiting_respawn: bool,
    pub checkpoints_visited: u8,
    pub archive: Position,
    pub locked_registers: u8,
    pub power: PowerState,
    pub options: Vec<OptionKind>,
    pub program: Vec<Option<ProgramCard>>,
    pub dealt: Vec<ProgramCard>,
    pub program_ready: bool,
}

impl From<&Robot> for RobotSnapshot {
    fn from(r: &Robot) -> Self {
        Self {
            id: r.id,
            name: r.name.clone(),
            position: r.position,
            facing: r.facing,
            damage: r.damage,
            lives: r.lives,
            alive: r.alive,
            awaiting_respawn: r.awaiting_respawn,
            checkpoints_visited: r.checkpoints_visited,
            archive: r.archive,
            locked_registers: r.locked_registers,
            power: r.power,
            options: r.options.iter().map(|card| card.kind).collect(),
            program: r.program.to_vec(),
            dealt: r.dealt.clone(),
            program_ready: r.program_ready,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GameSnapshot {
    pub round: u32,
    pub register: u8,
    pub robots: Vec<RobotSnapshot>,
    pub option_deck_remaining: usize,
    pub winner: Option<RobotId>,
}

pub struct GameState {
    pub board: Board,
    pub robots: Vec<Robot>,
    pub options: OptionRegistry,
    pub tuning: RuleTuning,
    pub round: u32,
    /// Register being resolved (1-based); 0 outside register execution.
    pub register: u8,
    pub winner: Option<RobotId>,
    pub(crate) rng: StdRng,
    events: Vec<RaceEvent>,
    next_attack: AttackId,
}

impl GameState {
    /// Places one robot per roster entry on starting positions 1..=n.
    pub fn new(
        board: Board,
        roster: &[String],
        tuning: RuleTuning,
        seed: u64,
    ) -> Result<Self, EngineError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut robots = Vec::with_capacity(roster.len());
        for (idx, name) in roster.iter().enumerate() {
            let number = u8::try_from(idx + 1)
                .map_err(|_| EngineError::Invariant("roster too large".to_string()))?;
            let start = board.start(number).ok_or_else(|| {
                EngineError::Invariant(format!("board has no starting position {number}"))
            })?;
            robots.push(Robot::new(number, name.clone(), start, tuning.starting_lives));
        }
        let options = OptionRegistry::new(&mut rng);
        Ok(Self {
            board,
            robots,
            options,
            tuning,
            round: 0,
            register: 0,
            winner: None,
            rng,
            events: Vec::new(),
            next_attack: 1,
        })
    }

    pub fn find(&self, id: RobotId) -> Option<&Robot> {
        self.robots.iter().find(|robot| robot.id == id)
    }

    pub fn find_mut(&mut self, id: RobotId) -> Option<&mut Robot> {
        self.robots.iter_mut().find(|robot| robot.id == id)
    }

    pub fn robot(&self, id: RobotId) -> Result<&Robot, EngineError> {
        self.find(id).ok_or(EngineError::MissingRobot(id))
    }

    pub fn robot_mut(&mut self, id: RobotId) -> Result<&mut Robot, EngineError> {
        self.find_mut(id).ok_or(EngineError::MissingRobot(id))
    }

    /// Robot standing on `position`, ignoring destroyed ones.
    pub fn occupant(&self, position: Position) -> Option<RobotId> {
        self.robots
            .iter()
            .find(|robot| robot.is_targetable() && robot.position == position)
            .map(|robot| robot.id)
    }

    pub fn targetable_ids(&self) -> Vec<RobotId> {
        self.robots
            .iter()
            .filter(|robot| robot.is_targetable())
            .map(|robot| robot.id)
            .collect()
    }

    pub fn emit(&mut self, event: RaceEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<RaceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Whether `attack` was handed out by this session. Ids grow monotonically from 1.
    pub fn attack_issued(&self, attack: AttackId) -> bool {
        attack != 0 && attack < self.next_attack
    }

    pub fn next_attack_id(&mut self) -> AttackId {
        let id = self.next_attack;
        self.next_attack += 1;
        id
    }

    /// Takes a robot out of play. Already-destroyed robots are left alone.
    pub fn destroy_robot(&mut self, id: RobotId, cause: DestroyCause) -> Result<(), EngineError> {
        let robot = self.robot_mut(id)?;
        if !robot.is_targetable() {
            return Ok(());
        }
        let position = robot.position;
        robot.destroy();
        let lives = robot.lives;
        if cause == DestroyCause::FellOffBoard {
            self.emit(RaceEvent::RobotFellOffBoard {
                robot: id,
                position,
            });
        }
        self.emit(RaceEvent::RobotDestroyed { robot: id, cause });
        tracing::info!(robot = id, ?cause, lives, "robot destroyed");
        Ok(())
    }

    /// Clears per-register option usage. Called once at every register boundary.
    pub fn reset_per_register(&mut self) {
        self.options.reset_per_register(&mut self.robots);
    }

    /// Robots still holding lives.
    pub fn contenders(&self) -> impl Iterator<Item = &Robot> {
        self.robots.iter().filter(|robot| robot.alive)
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            round: self.round,
            register: self.register,
            robots: self.robots.iter().map(RobotSnapshot::from).collect(),
            option_deck_remaining: self.options.deck().len(),
            winner: self.winner,
        }
    }

    pub fn emit_snapshot(&mut self) {
        let snapshot = self.snapshot();
        self.emit(RaceEvent::Snapshot(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> Board {
        let mut board = Board::new("arena", 6, 6).unwrap();
        board.add_start(1, Position::new(0, 0), Direction::Right).unwrap();
        board.add_start(2, Position::new(5, 5), Direction::Left).unwrap();
        board
    }

    #[test]
    fn roster_is_placed_on_numbered_starts() {
        let roster = vec!["Zoom Bot".to_string(), "Spin Bot".to_string()];
        let state = GameState::new(board(), &roster, RuleTuning::default(), 1).unwrap();
        assert_eq!(state.robot(2).unwrap().position, Position::new(5, 5));
        assert_eq!(state.occupant(Position::new(0, 0)), Some(1));
    }

    #[test]
    fn roster_larger_than_starts_is_rejected() {
        let roster: Vec<String> = (0..3).map(|i| format!("bot-{i}")).collect();
        assert!(GameState::new(board(), &roster, RuleTuning::default(), 1).is_err());
    }

    #[test]
    fn only_handed_out_attack_ids_count_as_issued() {
        let roster = vec!["Zoom Bot".to_string()];
        let mut state = GameState::new(board(), &roster, RuleTuning::default(), 1).unwrap();
        assert!(!state.attack_issued(1));

        let first = state.next_attack_id();
        let second = state.next_attack_id();
        assert!(state.attack_issued(first));
        assert!(state.attack_issued(second));
        assert!(!state.attack_issued(0));
        assert!(!state.attack_issued(second + 1));
    }

    #[test]
    fn destroyed_robots_leave_the_occupancy_map() {
        let roster = vec!["Zoom Bot".to_string()];
        let mut state = GameState::new(board(), &roster, RuleTuning::default(), 1).unwrap();
        state.destroy_robot(1, DestroyCause::Pit).unwrap();
        assert_eq!(state.occupant(Position::new(0, 0)), None);
        assert!(matches!(
            state.drain_events().as_slice(),
            [RaceEvent::RobotDestroyed {
                robot: 1,
                cause: DestroyCause::Pit
            }]
        ));
    }
}
