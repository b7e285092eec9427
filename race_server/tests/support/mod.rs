// Shared fixtures for integration tests: hand-built boards and directly spawned sessions.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use race_server::domain::board::{Board, Direction, Position};
use race_server::domain::systems::{damage, lasers};
use race_server::domain::tuning::RuleTuning;
use race_server::domain::{CommandError, GameState, RaceEvent, RobotId};
use race_server::use_cases::game::{SessionChannels, SessionSetup, session_task};
use race_server::use_cases::{PlayerAction, PlayerCommand, SessionPhase, SessionSummary, WaitSettings};
use tokio::sync::{Notify, broadcast, mpsc, oneshot, watch};

/// Board of the given size with one numbered start per robot.
pub fn board_with(width: i32, height: i32, robots: &[(i32, i32, Direction)]) -> Board {
    let mut board = Board::new("fixture", width, height).expect("board size");
    for (i, &(x, y, facing)) in robots.iter().enumerate() {
        board
            .add_start(i as u8 + 1, Position::new(x, y), facing)
            .expect("start inside board");
    }
    board
}

pub fn state_on(board: Board, tuning: RuleTuning) -> GameState {
    let roster: Vec<String> = (1..=board.starts().len()).map(|i| format!("bot-{i}")).collect();
    GameState::new(board, &roster, tuning, 42).expect("state")
}

/// Fires every laser once and settles each hit without negotiation.
pub fn fire_and_settle(state: &mut GameState) {
    for hit in lasers::fire_lasers(state) {
        let mut pending = damage::open(state, hit.target, hit.attack_from, hit.damage);
        damage::auto_prevent(state, &mut pending).expect("auto prevent");
        damage::settle(state, &mut pending).expect("settle");
    }
}

pub fn damage_of(state: &GameState, id: RobotId) -> u8 {
    state.robot(id).expect("robot").damage
}

/// Walls on all four sides so the robot can only turn.
pub fn wall_in(board: &mut Board, at: Position) {
    for side in Direction::ALL {
        board.add_wall(at, side).expect("wall");
    }
}

pub fn quick_waits() -> WaitSettings {
    WaitSettings {
        program_timeout: Duration::from_secs(2),
        damage_window: Duration::from_millis(500),
        decision_timeout: Duration::from_secs(1),
        ceiling: Duration::from_secs(10),
    }
}

pub fn one_round() -> RuleTuning {
    RuleTuning {
        max_rounds: 1,
        ..RuleTuning::default()
    }
}

/// Test-side ends of a session task spawned directly from a `GameState`.
pub struct TestSession {
    pub command_tx: mpsc::Sender<PlayerCommand>,
    pub events: broadcast::Receiver<RaceEvent>,
    pub phase_rx: watch::Receiver<SessionPhase>,
    pub summary_rx: watch::Receiver<Option<SessionSummary>>,
    pub shutdown: Arc<Notify>,
}

impl TestSession {
    pub fn spawn(state: GameState, waits: WaitSettings) -> Self {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (events_tx, events) = broadcast::channel(4096);
        let (phase_tx, phase_rx) = watch::channel(SessionPhase::Starting);
        let (summary_tx, summary_rx) = watch::channel(None);
        let shutdown = Arc::new(Notify::new());
        tokio::spawn(session_task(
            SessionSetup {
                session_id: format!("test-{}", uuid::Uuid::new_v4()),
                course_id: "fixture".to_string(),
                state,
                waits,
            },
            SessionChannels {
                command_rx,
                events_tx,
                phase_tx,
                summary_tx,
                shutdown: shutdown.clone(),
            },
        ));
        Self {
            command_tx,
            events,
            phase_rx,
            summary_rx,
            shutdown,
        }
    }

    pub async fn send(&self, robot: RobotId, action: PlayerAction) -> Result<(), CommandError> {
        let (reply, verdict) = oneshot::channel();
        self.command_tx
            .send(PlayerCommand { robot, action, reply })
            .await
            .map_err(|_| CommandError::SessionClosed)?;
        verdict.await.map_err(|_| CommandError::SessionClosed)?
    }

    /// Next event matching `pick`, skipping everything before it.
    pub async fn next_event<T>(&mut self, mut pick: impl FnMut(&RaceEvent) -> Option<T>) -> T {
        loop {
            let event = self.events.recv().await.expect("event stream open");
            if let Some(found) = pick(&event) {
                return found;
            }
        }
    }

    pub async fn summary(&mut self) -> SessionSummary {
        self.summary_rx
            .wait_for(Option::is_some)
            .await
            .expect("summary channel open")
            .clone()
            .expect("summary present")
    }

    pub async fn terminal_phase(&mut self) -> SessionPhase {
        self.phase_rx
            .wait_for(SessionPhase::is_terminal)
            .await
            .expect("phase channel open")
            .clone()
    }
}
