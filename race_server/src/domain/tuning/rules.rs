// Gameplay rules for a race session.
//
// Keep this separate from runtime/server configuration (wait ceilings, buffer sizes, etc.).

/// Registers per round.
pub const REGISTERS: u8 = 5;

/// Damage at which a robot is destroyed.
pub const LETHAL_DAMAGE: u8 = 10;

/// Option cards a robot may hold at once.
pub const MAX_OPTIONS: usize = 7;

/// Lifetime absorption of an Ablative Coat.
pub const ABLATIVE_CAPACITY: u8 = 2;

/// Damage dealt by a Ramming Gear to the first displaced robot.
pub const RAMMING_DAMAGE: u8 = 1;

/// Damage at or below which no register is locked.
pub const LOCK_FREE_DAMAGE: u8 = 4;

#[derive(Debug, Clone, Copy)]
pub struct RuleTuning {
    /// Lives each robot starts with.
    pub starting_lives: u8,

    /// Program cards dealt to an undamaged robot.
    pub hand_size: u8,

    /// Damage applied on respawn (before option-card modifiers).
    pub respawn_damage: u8,

    /// Damage per robot laser beam.
    pub robot_laser_damage: u8,

    /// Rounds before the race is called (0 disables the limit).
    pub max_rounds: u32,
}

impl Default for RuleTuning {
    fn default() -> Self {
        Self {
            starting_lives: 3,
            hand_size: 9,
            respawn_damage: 2,
            robot_laser_damage: 1,
            max_rounds: 0,
        }
    }
}
