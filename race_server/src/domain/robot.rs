// Per-player robot state.

use serde::{Deserialize, Serialize};

use crate::domain::board::{Direction, Position, StartingPosition};
use crate::domain::options::OptionCard;
use crate::domain::program::ProgramCard;
use crate::domain::tuning::rules::{LETHAL_DAMAGE, LOCK_FREE_DAMAGE, REGISTERS};

pub type RobotId = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    On,
    /// Will power down at the start of the next round.
    Announcing,
    Off,
}

#[derive(Debug, Clone)]
pub struct Robot {
    pub id: RobotId,
    pub name: String,
    pub position: Position,
    pub facing: Direction,

    // Health.
    pub damage: u8,
    pub lives: u8,
    /// False once the robot has run out of lives.
    pub alive: bool,
    /// Destroyed this round and waiting to re-enter at the archive marker.
    pub awaiting_respawn: bool,

    // Race progress.
    pub checkpoints_visited: u8,
    pub archive: Position,
    pub archive_facing: Direction,

    // Programming.
    pub locked_registers: u8,
    pub power: PowerState,
    pub program: [Option<ProgramCard>; REGISTERS as usize],
    pub dealt: Vec<ProgramCard>,
    pub program_ready: bool,

    pub options: Vec<OptionCard>,
}

impl Robot {
    pub fn new(id: RobotId, name: impl Into<String>, start: &StartingPosition, lives: u8) -> Self {
        Self {
            id,
            name: name.into(),
            position: start.position,
            facing: start.direction,
            damage: 0,
            lives,
            alive: lives > 0,
            awaiting_respawn: false,
            checkpoints_visited: 0,
            archive: start.position,
            archive_facing: start.direction,
            locked_registers: 0,
            power: PowerState::On,
            program: [None; REGISTERS as usize],
            dealt: Vec::new(),
            program_ready: false,
            options: Vec::new(),
        }
    }

    /// On the board and able to be hit, pushed or scored.
    pub const fn is_targetable(&self) -> bool {
        self.alive && !self.awaiting_respawn
    }

    /// Holds at least one card that may be spent to prevent damage.
    pub fn holds_active_option(&self) -> bool {
        self.options.iter().any(|card| !card.is_passive())
    }

    /// Adds damage, capped at the lethal threshold. Returns true when now lethal.
    pub fn take_damage(&mut self, amount: u8) -> bool {
        self.damage = self.damage.saturating_add(amount).min(LETHAL_DAMAGE);
        self.refresh_locked_registers();
        self.damage >= LETHAL_DAMAGE
    }

    pub fn repair(&mut self, amount: u8) {
        self.damage = self.damage.saturating_sub(amount);
        self.refresh_locked_registers();
    }

    pub fn refresh_locked_registers(&mut self) {
        self.locked_registers = self.damage.saturating_sub(LOCK_FREE_DAMAGE).min(REGISTERS);
    }

    /// Registers the player may fill this round.
    pub const fn unlocked_slots(&self) -> usize {
        (REGISTERS - self.locked_registers) as usize
    }

    /// Cards held in locked registers carry over between rounds.
    pub fn locked_cards(&self) -> Vec<ProgramCard> {
        self.program[self.unlocked_slots()..]
            .iter()
            .flatten()
            .copied()
            .collect()
    }

    /// Removes the robot from play. Costs a life; the last life eliminates it.
    pub fn destroy(&mut self) {
        self.awaiting_respawn = true;
        self.lives = self.lives.saturating_sub(1);
        if self.lives == 0 {
            self.alive = false;
        }
        self.program = [None; REGISTERS as usize];
        self.dealt.clear();
    }

    /// Places the robot back on the board after destruction.
    pub fn respawn(&mut self, position: Position, facing: Direction, damage: u8) {
        self.position = position;
        self.facing = facing;
        self.damage = 0;
        self.take_damage(damage);
        self.awaiting_respawn = false;
        self.power = PowerState::On;
    }

    /// Whether this robot must submit a program this round.
    pub fn needs_program(&self) -> bool {
        self.is_targetable() && self.power != PowerState::Off
    }
}
