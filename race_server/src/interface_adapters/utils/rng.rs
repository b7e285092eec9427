use std::{
    sync::{
        OnceLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Process-unique session identifier, e.g. `race-1739912345678`.
///
/// Seeded from the wall clock and bumped per call, so two sessions created in the same
/// millisecond still get distinct ids.
pub fn session_id() -> String {
    static NEXT: OnceLock<AtomicU64> = OnceLock::new();
    let next = NEXT.get_or_init(|| AtomicU64::new(now_millis()));
    format!("race-{}", next.fetch_add(1, Ordering::Relaxed))
}
