// Domain-level errors: rejected player commands and structural engine failures.

use std::fmt;

use crate::domain::board::Position;
use crate::domain::robot::RobotId;

/// Reasons a player command is refused. A refused command never changes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    WrongPhase,
    UnknownRobot,
    RobotDestroyed,
    RobotEliminated,
    PoweredDown,
    AlreadySubmitted,
    InvalidSlot,
    SlotLocked,
    CardUnavailable,
    CardAlreadyUsed,
    WrongCardCount { expected: usize, actual: usize },
    NoPendingDamage,
    DecisionClosed,
    OptionNotHeld,
    OptionPassive,
    InvalidRespawnTile,
    SessionClosed,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::WrongPhase => write!(f, "command not allowed in the current phase"),
            CommandError::UnknownRobot => write!(f, "no such robot in this session"),
            CommandError::RobotDestroyed => write!(f, "robot is destroyed"),
            CommandError::RobotEliminated => write!(f, "robot is out of the race"),
            CommandError::PoweredDown => write!(f, "robot is powered down"),
            CommandError::AlreadySubmitted => write!(f, "program already submitted"),
            CommandError::InvalidSlot => write!(f, "register slot out of range"),
            CommandError::SlotLocked => write!(f, "register slot is locked"),
            CommandError::CardUnavailable => write!(f, "card was not dealt to this robot"),
            CommandError::CardAlreadyUsed => write!(f, "card is already placed in a register"),
            CommandError::WrongCardCount { expected, actual } => {
                write!(f, "expected {expected} cards, got {actual}")
            }
            CommandError::NoPendingDamage => write!(f, "no pending damage for that attack"),
            CommandError::DecisionClosed => write!(f, "decision window already closed"),
            CommandError::OptionNotHeld => write!(f, "option card not held"),
            CommandError::OptionPassive => write!(f, "passive option cards cannot be spent"),
            CommandError::InvalidRespawnTile => write!(f, "respawn tile is not available"),
            CommandError::SessionClosed => write!(f, "session is no longer running"),
        }
    }
}

impl std::error::Error for CommandError {}

/// Structural failures. Fatal to the owning session only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    MissingTile { robot: RobotId, position: Position },
    MissingRobot(RobotId),
    Invariant(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::MissingTile { robot, position } => {
                write!(f, "robot {robot} references missing tile {position}")
            }
            EngineError::MissingRobot(robot) => write!(f, "robot {robot} does not exist"),
            EngineError::Invariant(detail) => write!(f, "invariant violated: {detail}"),
        }
    }
}

impl std::error::Error for EngineError {}
