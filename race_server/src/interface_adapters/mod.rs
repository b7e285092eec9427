// Interface adapters: wire protocol, event fan-out and scripted players.

pub mod autopilot;
pub mod events;
pub mod protocol;
pub mod utils;
