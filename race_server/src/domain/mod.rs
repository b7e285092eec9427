// Domain layer: board geometry, robots, cards and the rules that resolve a round.

pub mod board;
pub mod courses;
pub mod errors;
pub mod events;
pub mod invariants;
pub mod options;
pub mod program;
pub mod robot;
pub mod state;
pub mod systems;
pub mod tuning;

pub use board::{Board, Direction, Position};
pub use errors::{CommandError, EngineError};
pub use events::RaceEvent;
pub use robot::{PowerState, Robot, RobotId};
pub use state::{GameSnapshot, GameState, RobotSnapshot};
