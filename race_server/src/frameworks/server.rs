// Framework bootstrap for the headless race runner.

use std::io::Result;
use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::RobotId;
use crate::domain::courses::CourseCatalog;
use crate::frameworks::{config, course_files};
use crate::interface_adapters::autopilot::spawn_autopilot;
use crate::interface_adapters::events::spawn_session_serializer;
use crate::interface_adapters::utils::rng::session_id;
use crate::use_cases::{SessionPhase, SessionRegistry, SessionSettings, SessionSummary};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Built-in courses plus any course files from the configured directory.
pub fn build_registry() -> Result<Arc<SessionRegistry>> {
    let mut catalog = CourseCatalog::builtin().map_err(std::io::Error::other)?;
    if let Some(dir) = config::course_dir() {
        course_files::load_course_dir(&mut catalog, &dir).map_err(std::io::Error::other)?;
    }
    tracing::debug!(courses = ?catalog.ids().collect::<Vec<_>>(), "course catalog ready");

    let settings = SessionSettings {
        command_channel_capacity: config::COMMAND_CHANNEL_CAPACITY,
        event_broadcast_capacity: config::EVENT_BROADCAST_CAPACITY,
        waits: config::wait_settings(),
        tuning: config::rule_tuning(),
        seed: config::seed(),
    };
    Ok(Arc::new(SessionRegistry::new(settings, Arc::new(catalog))))
}

/// Runs one session to completion with every robot on autopilot.
pub async fn run(registry: Arc<SessionRegistry>, course_id: &str, players: Vec<String>) -> Result<SessionSummary> {
    let robots = (1..=players.len())
        .map(RobotId::try_from)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(std::io::Error::other)?;

    // Everything that listens to the session subscribes before its task starts.
    let (handle, mut encoded) = registry
        .create_session_with(session_id(), course_id, players, |handle| {
            for &robot in &robots {
                spawn_autopilot(handle, robot);
            }
            spawn_session_serializer(handle, config::EVENT_BROADCAST_CAPACITY)
                .bytes_tx
                .subscribe()
        })
        .await
        .map_err(std::io::Error::other)?;
    let mut phase_rx: watch::Receiver<SessionPhase> = handle.phase_tx.subscribe();
    let mut summary_rx = handle.summary_tx.subscribe();

    tokio::spawn(async move {
        while let Ok(line) = encoded.recv().await {
            tracing::trace!(event = %line, "race event");
        }
    });

    loop {
        let phase = phase_rx.borrow_and_update().clone();
        match phase {
            SessionPhase::Finished { .. } => break,
            SessionPhase::Aborted { reason } => {
                return Err(std::io::Error::other(format!("session aborted: {reason}")));
            }
            _ => {}
        }
        phase_rx
            .changed()
            .await
            .map_err(|_| std::io::Error::other("session phase channel closed"))?;
    }

    let summary = summary_rx
        .wait_for(Option::is_some)
        .await
        .map_err(|_| std::io::Error::other("session ended without a summary"))?
        .clone()
        .ok_or_else(|| std::io::Error::other("session ended without a summary"))?;
    Ok(summary)
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let registry = build_registry()?;
    let course_id = config::course_id();
    let players = config::players();
    tracing::info!(course = %course_id, players = ?players, "starting headless race");

    let summary = run(registry, &course_id, players).await.inspect_err(|e| {
        tracing::error!(error = %e, "race failed");
    })?;
    let report = serde_json::to_string_pretty(&summary).map_err(std::io::Error::other)?;
    tracing::info!(winner = ?summary.winner, rounds = summary.rounds, "race finished");
    println!("{report}");
    Ok(())
}
