// Wire protocol DTOs for the command/event boundary.

use serde::{Deserialize, Serialize};

use crate::domain::board::{Direction, Position};
use crate::domain::events::AttackId;
use crate::domain::options::OptionKind;
use crate::domain::{CommandError, RaceEvent, RobotId};
use crate::use_cases::{PlayerAction, SessionHandle, SessionPhase, SessionSummary};

/// Messages a player client sends to a session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    SubmitProgram {
        robot: RobotId,
        priorities: Vec<u16>,
    },
    SelectCard {
        robot: RobotId,
        slot: usize,
        priority: u16,
    },
    RemoveCard {
        robot: RobotId,
        slot: usize,
    },
    TogglePowerDown {
        robot: RobotId,
    },
    ContinuePowerDown {
        robot: RobotId,
    },
    CancelPowerDown {
        robot: RobotId,
    },
    Respawn {
        robot: RobotId,
        facing: Direction,
        #[serde(default)]
        alternate: Option<Position>,
    },
    AcceptDamage {
        robot: RobotId,
        attack: AttackId,
    },
    UseOption {
        robot: RobotId,
        attack: AttackId,
        option: OptionKind,
    },
}

impl ClientMessage {
    /// Splits the message into the addressed robot and the action it carries.
    pub fn into_action(self) -> (RobotId, PlayerAction) {
        match self {
            ClientMessage::SubmitProgram { robot, priorities } => {
                (robot, PlayerAction::SubmitProgram { priorities })
            }
            ClientMessage::SelectCard { robot, slot, priority } => {
                (robot, PlayerAction::SelectCard { slot, priority })
            }
            ClientMessage::RemoveCard { robot, slot } => (robot, PlayerAction::RemoveCard { slot }),
            ClientMessage::TogglePowerDown { robot } => (robot, PlayerAction::TogglePowerDown),
            ClientMessage::ContinuePowerDown { robot } => (robot, PlayerAction::ContinuePowerDown),
            ClientMessage::CancelPowerDown { robot } => (robot, PlayerAction::CancelPowerDown),
            ClientMessage::Respawn {
                robot,
                facing,
                alternate,
            } => (robot, PlayerAction::Respawn { facing, alternate }),
            ClientMessage::AcceptDamage { robot, attack } => (robot, PlayerAction::AcceptDamage { attack }),
            ClientMessage::UseOption { robot, attack, option } => {
                (robot, PlayerAction::UseOption { attack, option })
            }
        }
    }
}

impl ClientMessage {
    pub fn from_action(robot: RobotId, action: PlayerAction) -> Self {
        match action {
            PlayerAction::SubmitProgram { priorities } => ClientMessage::SubmitProgram { robot, priorities },
            PlayerAction::SelectCard { slot, priority } => ClientMessage::SelectCard { robot, slot, priority },
            PlayerAction::RemoveCard { slot } => ClientMessage::RemoveCard { robot, slot },
            PlayerAction::TogglePowerDown => ClientMessage::TogglePowerDown { robot },
            PlayerAction::ContinuePowerDown => ClientMessage::ContinuePowerDown { robot },
            PlayerAction::CancelPowerDown => ClientMessage::CancelPowerDown { robot },
            PlayerAction::Respawn { facing, alternate } => ClientMessage::Respawn {
                robot,
                facing,
                alternate,
            },
            PlayerAction::AcceptDamage { attack } => ClientMessage::AcceptDamage { robot, attack },
            PlayerAction::UseOption { attack, option } => ClientMessage::UseOption { robot, attack, option },
        }
    }
}

/// Forwards one client message to its session and wraps the verdict for the wire.
pub async fn dispatch(handle: &SessionHandle, msg: ClientMessage) -> ServerMessage {
    let (robot, action) = msg.into_action();
    ServerMessage::CommandResult(handle.send(robot, action).await.into())
}

/// Decodes a text frame from a client. Malformed frames are answered without reaching the session.
pub async fn handle_client_text(handle: &SessionHandle, text: &str) -> ServerMessage {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => dispatch(handle, msg).await,
        Err(e) => {
            tracing::debug!(error = %e, "malformed client message");
            ServerMessage::CommandResult(CommandResultDto {
                ok: false,
                error: Some(format!("malformed message: {e}")),
            })
        }
    }
}

/// Messages a session sends to its clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    // Something happened on the board.
    Event(RaceEvent),
    // Session lifecycle transitions.
    Phase(SessionPhase),
    // Verdict on one client command.
    CommandResult(CommandResultDto),
    // End-of-session report.
    Summary(SessionSummary),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResultDto {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<(), CommandError>> for CommandResultDto {
    fn from(verdict: Result<(), CommandError>) -> Self {
        match verdict {
            Ok(()) => Self { ok: true, error: None },
            Err(e) => Self {
                ok: false,
                error: Some(e.to_string()),
            },
        }
    }
}
