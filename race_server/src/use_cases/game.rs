// Round orchestrator: one task per session, sole owner of that session's GameState.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{Notify, broadcast, mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::decisions::{DecisionSlot, WaitSettings};
use super::types::{ParticipantSummary, PlayerAction, PlayerCommand, SessionPhase, SessionSummary};
use crate::domain::events::AttackId;
use crate::domain::invariants;
use crate::domain::systems::checkpoints::{self, SitePass};
use crate::domain::systems::damage::{self, PendingDamage};
use crate::domain::systems::lasers::{self, LaserHit};
use crate::domain::systems::{board_elements, movement, power, programming};
use crate::domain::tuning::rules::REGISTERS;
use crate::domain::{CommandError, EngineError, GameState, RaceEvent, RobotId};

/// Channel ends owned by the session task.
pub struct SessionChannels {
    pub command_rx: mpsc::Receiver<PlayerCommand>,
    pub events_tx: broadcast::Sender<RaceEvent>,
    pub phase_tx: watch::Sender<SessionPhase>,
    pub summary_tx: watch::Sender<Option<SessionSummary>>,
    pub shutdown: Arc<Notify>,
}

/// Everything a session needs besides its channels.
pub struct SessionSetup {
    pub session_id: String,
    pub course_id: String,
    pub state: GameState,
    pub waits: WaitSettings,
}

// Reasons the round loop stops before the race is decided.
enum Halt {
    Shutdown,
    Engine(EngineError),
}

impl From<EngineError> for Halt {
    fn from(error: EngineError) -> Self {
        Halt::Engine(error)
    }
}

/// Runs a session until the race is decided, the session is shut down, or the engine
/// hits a structural failure. The final phase is always published.
pub async fn session_task(setup: SessionSetup, channels: SessionChannels) {
    let span = info_span!("session", session_id = %setup.session_id);
    let mut orchestrator = Orchestrator::new(setup, channels);
    async move {
        info!(course = %orchestrator.course_id, robots = orchestrator.state.robots.len(), "session started");
        match orchestrator.run().await {
            Ok(()) => orchestrator.finish(),
            Err(Halt::Shutdown) => {
                info!("session shut down");
                orchestrator.set_phase(SessionPhase::Aborted {
                    reason: "shut down".to_string(),
                });
            }
            Err(Halt::Engine(e)) => {
                error!(error = %e, "session aborted");
                orchestrator.flush();
                orchestrator.set_phase(SessionPhase::Aborted { reason: e.to_string() });
            }
        }
    }
    .instrument(span)
    .await
}

struct Orchestrator {
    session_id: String,
    course_id: String,
    state: GameState,
    waits: WaitSettings,
    command_rx: mpsc::Receiver<PlayerCommand>,
    commands_open: bool,
    events_tx: broadcast::Sender<RaceEvent>,
    phase_tx: watch::Sender<SessionPhase>,
    summary_tx: watch::Sender<Option<SessionSummary>>,
    shutdown: Arc<Notify>,
    started_wall: SystemTime,
    started: Instant,

    programming_open: bool,
    power_slots: BTreeMap<RobotId, DecisionSlot<RobotId>>,
    respawn_slots: BTreeMap<RobotId, DecisionSlot<RobotId>>,
    damage_slots: Vec<DecisionSlot<PendingDamage>>,
}

impl Orchestrator {
    fn new(setup: SessionSetup, channels: SessionChannels) -> Self {
        Self {
            session_id: setup.session_id,
            course_id: setup.course_id,
            state: setup.state,
            waits: setup.waits,
            command_rx: channels.command_rx,
            commands_open: true,
            events_tx: channels.events_tx,
            phase_tx: channels.phase_tx,
            summary_tx: channels.summary_tx,
            shutdown: channels.shutdown,
            started_wall: SystemTime::now(),
            started: Instant::now(),
            programming_open: false,
            power_slots: BTreeMap::new(),
            respawn_slots: BTreeMap::new(),
            damage_slots: Vec::new(),
        }
    }

    async fn run(&mut self) -> Result<(), Halt> {
        self.set_phase(SessionPhase::Starting);
        self.state.emit_snapshot();
        self.flush();

        loop {
            self.state.round += 1;
            let round = self.state.round;
            self.state.emit(RaceEvent::RoundStarted { round });
            info!(round, "round started");

            self.power_decisions().await?;
            self.programming().await?;
            self.registers().await?;
            if self.race_decided() {
                return Ok(());
            }
            self.respawns().await?;
            if self.race_decided() || self.round_limit_reached() {
                return Ok(());
            }
        }
    }

    fn set_phase(&self, phase: SessionPhase) {
        debug!(?phase, "phase changed");
        let _ = self.phase_tx.send(phase);
    }

    fn flush(&mut self) {
        for event in self.state.drain_events() {
            // No subscribers is fine; events are fire-and-forget.
            let _ = self.events_tx.send(event);
        }
    }

    /// Handles commands until `done` holds, the deadline passes, or shutdown is requested.
    async fn wait_until<F>(&mut self, deadline: Instant, done: F) -> Result<(), Halt>
    where
        F: Fn(&Self) -> bool,
    {
        loop {
            if done(self) {
                return Ok(());
            }
            // Shutdown and the deadline win over a queued command.
            tokio::select! {
                biased;
                _ = self.shutdown.notified() => return Err(Halt::Shutdown),
                _ = sleep_until(deadline) => return Ok(()),
                command = self.command_rx.recv(), if self.commands_open => match command {
                    Some(command) => self.dispatch(command)?,
                    None => {
                        debug!("all command senders dropped");
                        self.commands_open = false;
                    }
                },
            }
        }
    }

    fn dispatch(&mut self, command: PlayerCommand) -> Result<(), EngineError> {
        let PlayerCommand { robot, action, reply } = command;
        let verdict = self.apply(robot, action.clone())?;
        if let Err(e) = verdict {
            debug!(robot, ?action, error = %e, "command rejected");
        }
        self.flush();
        let _ = reply.send(verdict);
        Ok(())
    }

    fn programming_window(&self) -> Result<(), CommandError> {
        if self.programming_open {
            Ok(())
        } else {
            Err(CommandError::WrongPhase)
        }
    }

    fn apply(&mut self, robot: RobotId, action: PlayerAction) -> Result<Result<(), CommandError>, EngineError> {
        if self.state.find(robot).is_none() {
            return Ok(Err(CommandError::UnknownRobot));
        }
        let verdict = match action {
            PlayerAction::SubmitProgram { priorities } => self
                .programming_window()
                .and_then(|()| programming::submit_program(&mut self.state, robot, &priorities)),
            PlayerAction::SelectCard { slot, priority } => self
                .programming_window()
                .and_then(|()| programming::select_card(&mut self.state, robot, slot, priority)),
            PlayerAction::RemoveCard { slot } => self
                .programming_window()
                .and_then(|()| programming::remove_card(&mut self.state, robot, slot)),
            PlayerAction::TogglePowerDown => self
                .programming_window()
                .and_then(|()| power::toggle_power_down(&mut self.state, robot).map(|_| ())),
            PlayerAction::ContinuePowerDown => self.power_choice(robot, true),
            PlayerAction::CancelPowerDown => self.power_choice(robot, false),
            PlayerAction::Respawn { facing, alternate } => {
                let Some(slot) = self.respawn_slots.get_mut(&robot) else {
                    return Ok(Err(CommandError::WrongPhase));
                };
                slot.ensure_open()
                    .and_then(|()| checkpoints::respawn(&mut self.state, robot, facing, alternate))
                    .map(|_| {
                        slot.settle();
                    })
            }
            PlayerAction::AcceptDamage { attack } => {
                let idx = match self.damage_slot(robot, attack) {
                    Ok(idx) => idx,
                    Err(e) => return Ok(Err(e)),
                };
                self.settle_damage(idx)?;
                Ok(())
            }
            PlayerAction::UseOption { attack, option } => {
                let idx = match self.damage_slot(robot, attack) {
                    Ok(idx) => idx,
                    Err(e) => return Ok(Err(e)),
                };
                let slot = &mut self.damage_slots[idx];
                if let Err(e) = damage::spend_option(&mut self.state, &mut slot.subject, option) {
                    return Ok(Err(e));
                }
                if !damage::negotiable(&self.state, &slot.subject) {
                    self.settle_damage(idx)?;
                }
                Ok(())
            }
        };
        Ok(verdict)
    }

    fn power_choice(&mut self, robot: RobotId, stay_down: bool) -> Result<(), CommandError> {
        let slot = self.power_slots.get_mut(&robot).ok_or(CommandError::WrongPhase)?;
        slot.ensure_open()?;
        power::resolve_power_decision(&mut self.state, robot, stay_down)?;
        slot.settle();
        Ok(())
    }

    // Open damage entry for `attack` aimed at `robot`.
    fn damage_slot(&self, robot: RobotId, attack: AttackId) -> Result<usize, CommandError> {
        let found = self.damage_slots.iter().position(|slot| slot.subject.attack == attack);
        match found {
            Some(idx) if self.damage_slots[idx].subject.target != robot => Err(CommandError::NoPendingDamage),
            Some(idx) => {
                self.damage_slots[idx].ensure_open()?;
                Ok(idx)
            }
            // Every issued attack without an open slot here has already settled.
            None if self.state.attack_issued(attack) => Err(CommandError::DecisionClosed),
            None => Err(CommandError::NoPendingDamage),
        }
    }

    fn settle_damage(&mut self, idx: usize) -> Result<(), EngineError> {
        let slot = &mut self.damage_slots[idx];
        if slot.settle() {
            damage::settle(&mut self.state, &mut slot.subject)?;
        }
        Ok(())
    }

    async fn power_decisions(&mut self) -> Result<(), Halt> {
        let round = self.state.round;
        self.power_slots.clear();
        let waiting = power::awaiting_power_decision(&self.state);
        if !waiting.is_empty() {
            self.set_phase(SessionPhase::PowerDecisions { round });
            let deadline = self.waits.deadline(self.waits.decision_timeout);
            for id in waiting {
                self.power_slots.insert(id, DecisionSlot::new(id, deadline));
            }
            self.state.emit_snapshot();
            self.flush();

            self.wait_until(deadline, |o| o.power_slots.values().all(|slot| !slot.is_open()))
                .await?;

            for (&id, slot) in &mut self.power_slots {
                if slot.settle() {
                    // Undecided robots power back on.
                    if let Err(e) = power::resolve_power_decision(&mut self.state, id, false) {
                        warn!(robot = id, error = %e, "power fallback skipped");
                    }
                }
            }
        }
        power::apply_announced_power_downs(&mut self.state);
        self.flush();
        Ok(())
    }

    async fn programming(&mut self) -> Result<(), Halt> {
        let round = self.state.round;
        programming::deal_programs(&mut self.state);
        self.programming_open = true;
        self.set_phase(SessionPhase::Programming { round });
        self.state.emit_snapshot();
        self.flush();

        let deadline = self.waits.deadline(self.waits.program_timeout);
        let waited = self
            .wait_until(deadline, |o| programming::all_programs_ready(&o.state))
            .await;
        self.programming_open = false;
        waited?;

        let filled = programming::fill_program_defaults(&mut self.state);
        if !filled.is_empty() {
            info!(?filled, "programs completed from dealt cards");
        }
        Ok(())
    }

    async fn registers(&mut self) -> Result<(), Halt> {
        let round = self.state.round;
        for register in 1..=REGISTERS {
            self.state.register = register;
            self.state.reset_per_register();
            self.state.emit(RaceEvent::RegisterStarted { register });
            self.set_phase(SessionPhase::Executing { round, register });

            movement::run_card_phase(&mut self.state, register)?;
            board_elements::run_board_elements(&mut self.state, register)?;
            self.flush();

            let hits = lasers::fire_lasers(&mut self.state);
            self.resolve_hits(hits).await?;

            let pass = if register == REGISTERS {
                SitePass::All
            } else {
                SitePass::CheckpointsOnly
            };
            checkpoints::site_pass(&mut self.state, pass)?;
            invariants::ensure_invariants(&self.state)?;
            self.flush();

            if self.race_decided() {
                break;
            }
        }
        self.state.register = 0;
        Ok(())
    }

    /// Opens one damage entry per hit. Entries the target cannot influence settle at once;
    /// the rest wait for the robot's answer or the window deadline.
    async fn resolve_hits(&mut self, hits: Vec<LaserHit>) -> Result<(), Halt> {
        self.damage_slots.clear();
        let deadline = self.waits.deadline(self.waits.damage_window);
        let window_ms = u64::try_from(deadline.saturating_duration_since(Instant::now()).as_millis()).unwrap_or(u64::MAX);

        for hit in hits {
            let mut pending = damage::open(&mut self.state, hit.target, hit.attack_from, hit.damage);
            damage::auto_prevent(&mut self.state, &mut pending)?;
            if damage::negotiable(&self.state, &pending) {
                self.state.emit(RaceEvent::DamagePreventionOpportunity {
                    robot: pending.target,
                    attack: pending.attack,
                    residual: pending.residual(),
                    deadline_ms: window_ms,
                });
                self.damage_slots.push(DecisionSlot::new(pending, deadline));
            } else {
                damage::settle(&mut self.state, &mut pending)?;
            }
        }
        self.flush();

        if self.damage_slots.is_empty() {
            return Ok(());
        }
        self.set_phase(SessionPhase::DamageNegotiation {
            round: self.state.round,
            register: self.state.register,
        });
        self.wait_until(deadline, |o| o.damage_slots.iter().all(|slot| !slot.is_open()))
            .await?;

        for idx in 0..self.damage_slots.len() {
            self.settle_damage(idx)?;
        }
        self.flush();
        Ok(())
    }

    async fn respawns(&mut self) -> Result<(), Halt> {
        self.respawn_slots.clear();
        let waiting: Vec<RobotId> = self
            .state
            .robots
            .iter()
            .filter(|robot| robot.alive && robot.awaiting_respawn)
            .map(|robot| robot.id)
            .collect();
        if waiting.is_empty() {
            return Ok(());
        }

        self.set_phase(SessionPhase::Respawning { round: self.state.round });
        let deadline = self.waits.deadline(self.waits.decision_timeout);
        for id in waiting {
            self.respawn_slots.insert(id, DecisionSlot::new(id, deadline));
        }
        self.state.emit_snapshot();
        self.flush();

        self.wait_until(deadline, |o| o.respawn_slots.values().all(|slot| !slot.is_open()))
            .await?;

        for (&id, slot) in &mut self.respawn_slots {
            if !slot.settle() {
                continue;
            }
            let facing = self.state.robot(id)?.archive_facing;
            if let Err(e) = checkpoints::respawn(&mut self.state, id, facing, None) {
                warn!(robot = id, error = %e, "no free tile near archive; respawn deferred");
            }
        }
        invariants::ensure_invariants(&self.state)?;
        self.flush();
        Ok(())
    }

    /// Settles the winner once the race can no longer continue.
    fn race_decided(&mut self) -> bool {
        if self.state.winner.is_some() {
            return true;
        }
        let contenders: Vec<RobotId> = self.state.contenders().map(|robot| robot.id).collect();
        match (self.state.robots.len(), contenders.as_slice()) {
            (total, [last]) if total > 1 => {
                self.state.winner = Some(*last);
                true
            }
            (_, []) => true,
            _ => false,
        }
    }

    /// At the round limit the robot furthest along wins; a tie has no winner.
    fn round_limit_reached(&mut self) -> bool {
        let limit = self.state.tuning.max_rounds;
        if limit == 0 || self.state.round < limit {
            return false;
        }
        let best = self
            .state
            .contenders()
            .map(|robot| robot.checkpoints_visited)
            .max()
            .unwrap_or(0);
        let leaders: Vec<RobotId> = self
            .state
            .contenders()
            .filter(|robot| robot.checkpoints_visited == best)
            .map(|robot| robot.id)
            .collect();
        if let [leader] = leaders.as_slice() {
            self.state.winner = Some(*leader);
        }
        info!(round = self.state.round, winner = ?self.state.winner, "round limit reached");
        true
    }

    fn finish(&mut self) {
        let winner = self.state.winner;
        self.state.emit(RaceEvent::GameOver { winner });
        self.state.emit_snapshot();
        self.flush();

        let ended_wall = SystemTime::now();
        let summary = SessionSummary {
            session_id: self.session_id.clone(),
            course_id: self.course_id.clone(),
            participants: self
                .state
                .robots
                .iter()
                .map(|robot| ParticipantSummary {
                    robot: robot.id,
                    name: robot.name.clone(),
                    checkpoints: robot.checkpoints_visited,
                    damage: robot.damage,
                    lives: robot.lives,
                    eliminated: !robot.alive,
                })
                .collect(),
            winner,
            rounds: self.state.round,
            started_at_ms: epoch_ms(self.started_wall),
            ended_at_ms: epoch_ms(ended_wall),
            duration_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(?winner, rounds = summary.rounds, duration_ms = summary.duration_ms, "session finished");
        let _ = self.summary_tx.send(Some(summary));
        self.set_phase(SessionPhase::Finished { winner });
    }
}

fn epoch_ms(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
