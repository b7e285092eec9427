// Deadline-bounded decisions that settle exactly once.

use std::time::Duration;

use tokio::time::Instant;

use crate::domain::CommandError;

/// Per-session bounds on how long the orchestrator waits for players.
#[derive(Debug, Clone, Copy)]
pub struct WaitSettings {
    /// Programming window per round.
    pub program_timeout: Duration,
    /// Time a robot has to answer one damage-prevention opportunity.
    pub damage_window: Duration,
    /// Power-down and respawn choices.
    pub decision_timeout: Duration,
    /// Hard upper bound applied to every wait above.
    pub ceiling: Duration,
}

impl WaitSettings {
    /// Deadline for a wait of `duration` starting now, clamped to the ceiling.
    pub fn deadline(&self, duration: Duration) -> Instant {
        Instant::now() + duration.min(self.ceiling)
    }
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            program_timeout: Duration::from_secs(30),
            damage_window: Duration::from_secs(5),
            decision_timeout: Duration::from_secs(10),
            ceiling: Duration::from_secs(60),
        }
    }
}

/// A pending choice about `subject` that closes at a deadline.
///
/// Settling is one-shot: whichever of the player's answer or the deadline comes first
/// wins, and everything after it is rejected with `DecisionClosed`. Answers are refused
/// from the deadline on, even while the slot still waits for the orchestrator to settle it.
#[derive(Debug, Clone)]
pub struct DecisionSlot<T> {
    pub subject: T,
    deadline: Instant,
    settled: bool,
}

impl<T> DecisionSlot<T> {
    pub fn new(subject: T, deadline: Instant) -> Self {
        Self {
            subject,
            deadline,
            settled: false,
        }
    }

    /// Not yet settled. A slot past its deadline stays unsettled until the fallback runs.
    pub fn is_open(&self) -> bool {
        !self.settled
    }

    /// Fails when the slot already settled or its deadline has passed.
    pub fn ensure_open(&self) -> Result<(), CommandError> {
        if self.settled || Instant::now() >= self.deadline {
            Err(CommandError::DecisionClosed)
        } else {
            Ok(())
        }
    }

    /// Closes the slot. Returns false if it was already closed.
    pub fn settle(&mut self) -> bool {
        !std::mem::replace(&mut self.settled, true)
    }
}
