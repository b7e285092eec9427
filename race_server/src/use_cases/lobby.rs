// Session registry: spawns isolated race sessions and tracks their handles.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{Notify, RwLock, broadcast, mpsc, oneshot, watch};
use tracing::{info, warn};

use super::decisions::WaitSettings;
use super::game::{SessionChannels, SessionSetup, session_task};
use super::types::{PlayerAction, PlayerCommand, SessionPhase, SessionSummary};
use crate::domain::courses::{CourseCatalog, CourseError};
use crate::domain::tuning::RuleTuning;
use crate::domain::{CommandError, EngineError, GameState, RaceEvent, RobotId};

/// Shared configuration for spawning sessions.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Capacity for inbound player commands.
    pub command_channel_capacity: usize,
    /// Capacity for broadcast race events.
    pub event_broadcast_capacity: usize,
    pub waits: WaitSettings,
    pub tuning: RuleTuning,
    /// Fixed deck seed; `None` draws a fresh one per session.
    pub seed: Option<u64>,
}

/// Errors returned by registry operations.
#[derive(Debug)]
pub enum RegistryError {
    /// Session already exists and cannot be re-created.
    AlreadyExists,
    NoPlayers,
    TooManyPlayers { max: usize },
    Course(CourseError),
    Engine(EngineError),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::AlreadyExists => write!(f, "session already exists"),
            RegistryError::NoPlayers => write!(f, "a session needs at least one player"),
            RegistryError::TooManyPlayers { max } => write!(f, "course has room for {max} players"),
            RegistryError::Course(e) => write!(f, "{e}"),
            RegistryError::Engine(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<CourseError> for RegistryError {
    fn from(e: CourseError) -> Self {
        RegistryError::Course(e)
    }
}

impl From<EngineError> for RegistryError {
    fn from(e: EngineError) -> Self {
        RegistryError::Engine(e)
    }
}

/// Per-session channels.
#[derive(Clone)]
pub struct SessionHandle {
    /// Identifier callers use to target this session.
    pub session_id: Arc<str>,
    /// Sender for player commands into the session task.
    pub command_tx: mpsc::Sender<PlayerCommand>,
    /// Broadcast sender for race events.
    pub events_tx: broadcast::Sender<RaceEvent>,
    /// Watch sender for the session phase.
    pub phase_tx: watch::Sender<SessionPhase>,
    /// Watch sender for the end-of-session summary.
    pub summary_tx: watch::Sender<Option<SessionSummary>>,
    shutdown: Arc<Notify>,
}

impl SessionHandle {
    /// Sends an action for `robot` and waits for the session's verdict.
    pub async fn send(&self, robot: RobotId, action: PlayerAction) -> Result<(), CommandError> {
        let (reply, verdict) = oneshot::channel();
        self.command_tx
            .send(PlayerCommand { robot, action, reply })
            .await
            .map_err(|_| CommandError::SessionClosed)?;
        verdict.await.map_err(|_| CommandError::SessionClosed)?
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RaceEvent> {
        self.events_tx.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase_tx.borrow().clone()
    }

    pub fn summary(&self) -> Option<SessionSummary> {
        self.summary_tx.borrow().clone()
    }

    /// Asks the session task to stop at its next wait.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

/// Thread-safe registry for running sessions.
pub struct SessionRegistry {
    /// Global settings applied to newly created sessions.
    settings: SessionSettings,
    courses: Arc<CourseCatalog>,
    /// Map of session id to active handle.
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new(settings: SessionSettings, courses: Arc<CourseCatalog>) -> Self {
        Self {
            settings,
            courses,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates a session on `course_id` with one robot per player and spawns its task.
    pub async fn create_session(
        &self,
        session_id: String,
        course_id: &str,
        players: Vec<String>,
    ) -> Result<SessionHandle, RegistryError> {
        self.create_session_with(session_id, course_id, players, |_| ())
            .await
            .map(|(handle, ())| handle)
    }

    /// Like `create_session`, but runs `attach` on the handle before the session task
    /// starts, so subscriptions made there see the opening snapshot.
    pub async fn create_session_with<T>(
        &self,
        session_id: String,
        course_id: &str,
        players: Vec<String>,
        attach: impl FnOnce(&SessionHandle) -> T,
    ) -> Result<(SessionHandle, T), RegistryError> {
        let board = self.courses.get(course_id)?.clone();
        if players.is_empty() {
            return Err(RegistryError::NoPlayers);
        }
        if players.len() > board.starts().len() {
            return Err(RegistryError::TooManyPlayers {
                max: board.starts().len(),
            });
        }

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session_id) {
            return Err(RegistryError::AlreadyExists);
        }

        let seed = self.settings.seed.unwrap_or_else(rand::random);
        let state = GameState::new(board, &players, self.settings.tuning, seed)?;

        // Channel wiring for the session task.
        let (command_tx, command_rx) = mpsc::channel::<PlayerCommand>(self.settings.command_channel_capacity);
        let (events_tx, _events_rx) = broadcast::channel::<RaceEvent>(self.settings.event_broadcast_capacity);
        let (phase_tx, phase_rx) = watch::channel(SessionPhase::Starting);
        let (summary_tx, _summary_rx) = watch::channel::<Option<SessionSummary>>(None);
        let shutdown = Arc::new(Notify::new());

        let handle = SessionHandle {
            session_id: Arc::from(session_id.as_str()),
            command_tx,
            events_tx: events_tx.clone(),
            phase_tx: phase_tx.clone(),
            summary_tx: summary_tx.clone(),
            shutdown: shutdown.clone(),
        };
        let attached = attach(&handle);

        tokio::spawn(session_task(
            SessionSetup {
                session_id: session_id.clone(),
                course_id: course_id.to_string(),
                state,
                waits: self.settings.waits,
            },
            SessionChannels {
                command_rx,
                events_tx,
                phase_tx,
                summary_tx,
                shutdown,
            },
        ));
        spawn_end_watcher(Arc::clone(&self.sessions), handle.session_id.clone(), phase_rx);

        info!(session_id = %session_id, course = course_id, players = players.len(), "session created");
        sessions.insert(session_id, handle.clone());
        Ok((handle, attached))
    }

    /// Returns a session handle for the provided id, if it exists.
    pub async fn get_session(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn remove_session(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.write().await.remove(session_id)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

// Drops the session from the registry once it finishes or aborts.
fn spawn_end_watcher(
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
    session_id: Arc<str>,
    mut phase_rx: watch::Receiver<SessionPhase>,
) {
    tokio::spawn(async move {
        loop {
            let phase = phase_rx.borrow_and_update().clone();
            if phase.is_terminal() {
                if let SessionPhase::Aborted { reason } = &phase {
                    warn!(session_id = %session_id, reason = %reason, "session aborted");
                }
                break;
            }
            if phase_rx.changed().await.is_err() {
                break;
            }
        }
        sessions.write().await.remove(session_id.as_ref());
        info!(session_id = %session_id, "session removed");
    });
}
