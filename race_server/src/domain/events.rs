// Events produced while resolving a round. Read-only hand-off to external collaborators.

use serde::Serialize;

use crate::domain::board::{Direction, Position};
use crate::domain::options::OptionKind;
use crate::domain::program::ProgramCard;
use crate::domain::robot::{PowerState, RobotId};
use crate::domain::state::GameSnapshot;
use crate::domain::systems::lasers::BeamTrace;

/// Identity of one hit awaiting damage resolution.
pub type AttackId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DestroyCause {
    Damage,
    FellOffBoard,
    Pit,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RaceEvent {
    Snapshot(GameSnapshot),
    RoundStarted {
        round: u32,
    },
    RegisterStarted {
        register: u8,
    },
    CardExecuted {
        robot: RobotId,
        card: ProgramCard,
    },
    RobotMoved {
        robot: RobotId,
        from: Position,
        to: Position,
    },
    RobotDamaged {
        robot: RobotId,
        amount: u8,
        total: u8,
    },
    DamagePrevented {
        robot: RobotId,
        attack: AttackId,
        amount: u8,
        option: OptionKind,
    },
    RobotDestroyed {
        robot: RobotId,
        cause: DestroyCause,
    },
    RobotFellOffBoard {
        robot: RobotId,
        position: Position,
    },
    RobotRespawned {
        robot: RobotId,
        position: Position,
        facing: Direction,
        damage: u8,
    },
    CheckpointReached {
        robot: RobotId,
        checkpoint: u8,
    },
    OptionDrawn {
        robot: RobotId,
        option: OptionKind,
    },
    OptionDiscarded {
        robot: RobotId,
        option: OptionKind,
    },
    BeamFired(BeamTrace),
    DamagePreventionOpportunity {
        robot: RobotId,
        attack: AttackId,
        residual: u8,
        deadline_ms: u64,
    },
    PowerStateChanged {
        robot: RobotId,
        state: PowerState,
    },
    GameOver {
        winner: Option<RobotId>,
    },
}
