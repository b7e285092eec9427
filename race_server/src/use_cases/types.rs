// Use-case level inputs/outputs for a race session.

use serde::Serialize;
use tokio::sync::oneshot;

use crate::domain::board::{Direction, Position};
use crate::domain::events::AttackId;
use crate::domain::options::OptionKind;
use crate::domain::{CommandError, RobotId};

/// What a player asks its robot to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerAction {
    SubmitProgram { priorities: Vec<u16> },
    SelectCard { slot: usize, priority: u16 },
    RemoveCard { slot: usize },
    TogglePowerDown,
    ContinuePowerDown,
    CancelPowerDown,
    Respawn { facing: Direction, alternate: Option<Position> },
    AcceptDamage { attack: AttackId },
    UseOption { attack: AttackId, option: OptionKind },
}

/// A player action plus the channel its verdict is returned on.
#[derive(Debug)]
pub struct PlayerCommand {
    pub robot: RobotId,
    pub action: PlayerAction,
    pub reply: oneshot::Sender<Result<(), CommandError>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionPhase {
    Starting,
    PowerDecisions { round: u32 },
    Programming { round: u32 },
    Executing { round: u32, register: u8 },
    DamageNegotiation { round: u32, register: u8 },
    Respawning { round: u32 },
    Finished { winner: Option<RobotId> },
    Aborted { reason: String },
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Finished { .. } | SessionPhase::Aborted { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantSummary {
    pub robot: RobotId,
    pub name: String,
    pub checkpoints: u8,
    pub damage: u8,
    pub lives: u8,
    pub eliminated: bool,
}

/// End-of-session report handed to external collaborators. Never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub course_id: String,
    pub participants: Vec<ParticipantSummary>,
    pub winner: Option<RobotId>,
    pub rounds: u32,
    /// Unix epoch milliseconds.
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    pub duration_ms: u64,
}
