use std::{env, path::PathBuf, time::Duration};

use crate::domain::courses::DEFAULT_COURSE;
use crate::domain::tuning::RuleTuning;
use crate::use_cases::WaitSettings;

// Runtime/server settings (not gameplay tuning).

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.trim().parse().ok())
}

fn millis(name: &str, default: u64) -> Duration {
    Duration::from_millis(parsed(name).unwrap_or(default))
}

/// Directory scanned for `*.json` course files on startup.
pub fn course_dir() -> Option<PathBuf> {
    env::var("RACE_COURSE_DIR")
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from)
}

pub fn course_id() -> String {
    env::var("RACE_COURSE_ID").unwrap_or_else(|_| DEFAULT_COURSE.to_string())
}

/// Comma-separated robot names for the headless session.
pub fn players() -> Vec<String> {
    let raw = env::var("RACE_PLAYERS").unwrap_or_else(|_| "Twonky,Hammer Bot,Spin Bot,Zoom Bot".to_string());
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn wait_settings() -> WaitSettings {
    WaitSettings {
        program_timeout: millis("PROGRAM_TIMEOUT_MS", 30_000),
        damage_window: millis("DAMAGE_WINDOW_MS", 5_000),
        decision_timeout: millis("DECISION_TIMEOUT_MS", 10_000),
        ceiling: millis("WAIT_CEILING_MS", 60_000),
    }
}

pub fn rule_tuning() -> RuleTuning {
    let defaults = RuleTuning::default();
    RuleTuning {
        starting_lives: parsed("STARTING_LIVES").unwrap_or(defaults.starting_lives),
        max_rounds: parsed("MAX_ROUNDS").unwrap_or(DEFAULT_MAX_ROUNDS),
        ..defaults
    }
}

/// Fixed deck seed for reproducible sessions.
pub fn seed() -> Option<u64> {
    parsed("RACE_SEED")
}

pub const COMMAND_CHANNEL_CAPACITY: usize = 256;
pub const EVENT_BROADCAST_CAPACITY: usize = 1024;

// Round limit for headless sessions (0 disables it).
pub const DEFAULT_MAX_ROUNDS: u32 = 40;
