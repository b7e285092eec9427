// Rule systems that mutate `GameState` during a round.

pub mod board_elements;
pub mod checkpoints;
pub mod damage;
pub mod lasers;
pub mod movement;
pub mod power;
pub mod programming;
