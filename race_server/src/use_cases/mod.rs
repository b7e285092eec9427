// Use cases layer: session orchestration on top of the domain rules.

pub mod decisions;
pub mod game;
pub mod lobby;
pub mod types;

pub use decisions::{DecisionSlot, WaitSettings};
pub use lobby::{RegistryError, SessionHandle, SessionRegistry, SessionSettings};
pub use types::{ParticipantSummary, PlayerAction, PlayerCommand, SessionPhase, SessionSummary};
