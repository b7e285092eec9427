// Scripted player that drives one robot through a session.
//
// Used by the headless runner and by tests; it answers every window the session opens.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::robot::PowerState;
use crate::domain::state::RobotSnapshot;
use crate::domain::tuning::rules::REGISTERS;
use crate::domain::{RaceEvent, RobotId};
use crate::interface_adapters::protocol::{ClientMessage, ServerMessage, dispatch};
use crate::use_cases::{PlayerAction, SessionHandle, SessionPhase};

/// Cards to submit: the first dealt cards, one per unlocked register.
pub fn choose_program(robot: &RobotSnapshot) -> Vec<u16> {
    let open = usize::from(REGISTERS.saturating_sub(robot.locked_registers));
    robot.dealt.iter().take(open).map(|card| card.priority).collect()
}

/// What the autopilot does in response to one snapshot, if anything.
pub fn react_to_snapshot(phase: &SessionPhase, robot: &RobotSnapshot) -> Option<PlayerAction> {
    match phase {
        SessionPhase::PowerDecisions { .. } if robot.power == PowerState::Off => {
            Some(PlayerAction::CancelPowerDown)
        }
        SessionPhase::Programming { .. }
            if !robot.program_ready && robot.power != PowerState::Off && !robot.dealt.is_empty() =>
        {
            Some(PlayerAction::SubmitProgram {
                priorities: choose_program(robot),
            })
        }
        SessionPhase::Respawning { .. } if robot.alive && robot.awaiting_respawn => Some(PlayerAction::Respawn {
            facing: robot.facing,
            alternate: None,
        }),
        _ => None,
    }
}

/// Subscribes now and plays `robot` on a spawned task until the session ends.
pub fn spawn_autopilot(handle: &SessionHandle, robot: RobotId) -> JoinHandle<()> {
    tokio::spawn(run_autopilot(handle.clone(), handle.subscribe(), robot))
}

/// Plays `robot` from the events on `events` until the session ends.
pub async fn run_autopilot(handle: SessionHandle, mut events: broadcast::Receiver<RaceEvent>, robot: RobotId) {
    loop {
        let action = match events.recv().await {
            Ok(RaceEvent::Snapshot(snapshot)) => snapshot
                .robots
                .iter()
                .find(|candidate| candidate.id == robot)
                .and_then(|me| react_to_snapshot(&handle.phase(), me)),
            Ok(RaceEvent::DamagePreventionOpportunity {
                robot: target, attack, ..
            }) if target == robot => Some(PlayerAction::AcceptDamage { attack }),
            Ok(RaceEvent::GameOver { .. }) => break,
            Ok(_) => None,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                debug!(robot, missed = n, "autopilot lagged");
                None
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let Some(action) = action else {
            continue;
        };
        match dispatch(&handle, ClientMessage::from_action(robot, action)).await {
            ServerMessage::CommandResult(verdict) if !verdict.ok => {
                debug!(robot, error = ?verdict.error, "autopilot command rejected");
            }
            _ => {}
        }
    }
}
