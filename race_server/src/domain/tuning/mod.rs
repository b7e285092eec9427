// Gameplay tuning, kept apart from runtime configuration (timeouts, channel sizes).

pub mod rules;

pub use rules::RuleTuning;
