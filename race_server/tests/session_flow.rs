mod support;

use std::sync::Arc;
use std::time::Duration;

use race_server::domain::board::{BoardLaser, Direction, Position};
use race_server::domain::courses::CourseCatalog;
use race_server::domain::options::{OptionCard, OptionKind, OptionRegistry};
use race_server::domain::tuning::RuleTuning;
use race_server::domain::{CommandError, GameState, PowerState, RaceEvent};
use race_server::interface_adapters::protocol::{ServerMessage, handle_client_text};
use race_server::use_cases::{PlayerAction, SessionPhase, SessionRegistry, SessionSettings};
use support::{TestSession, board_with, one_round, quick_waits, state_on, wall_in};
use tokio::time::Instant;

/// One robot boxed in by walls at (2,2), optionally standing on a board laser.
fn boxed_robot(laser: bool, option: Option<OptionKind>, tuning: RuleTuning) -> GameState {
    let mut board = board_with(5, 5, &[(2, 2, Direction::Up)]);
    wall_in(&mut board, Position::new(2, 2));
    if laser {
        board
            .add_laser(BoardLaser {
                position: Position::new(2, 2),
                direction: Direction::Right,
                damage: 1,
            })
            .unwrap();
    }
    let mut state = state_on(board, tuning);
    state.options = OptionRegistry::with_deck(Vec::new());
    if let Some(kind) = option {
        state.robot_mut(1).unwrap().options.push(OptionCard::new(kind));
    }
    state
}

fn count_cards(events: &[RaceEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, RaceEvent::CardExecuted { robot: 1, .. }))
        .count()
}

#[tokio::test(start_paused = true)]
async fn when_nobody_submits_then_programs_are_filled_at_the_deadline() {
    let mut session = TestSession::spawn(boxed_robot(false, None, one_round()), quick_waits());
    let started = Instant::now();
    let mut cards = Vec::new();

    session
        .next_event(|event| matches!(event, RaceEvent::RegisterStarted { register: 1 }).then_some(()))
        .await;
    assert!(started.elapsed() >= quick_waits().program_timeout);

    loop {
        let event = session.events.recv().await.unwrap();
        if matches!(event, RaceEvent::GameOver { .. }) {
            break;
        }
        cards.push(event);
    }
    assert_eq!(count_cards(&cards), 5);

    let summary = session.summary().await;
    assert_eq!(summary.rounds, 1);
    assert_eq!(summary.winner, Some(1));
    assert_eq!(session.terminal_phase().await, SessionPhase::Finished { winner: Some(1) });
}

#[tokio::test(start_paused = true)]
async fn when_program_is_submitted_early_then_registers_start_without_waiting() {
    let mut session = TestSession::spawn(boxed_robot(false, None, one_round()), quick_waits());
    let started = Instant::now();

    let dealt = session
        .next_event(|event| match event {
            RaceEvent::Snapshot(snapshot) if !snapshot.robots[0].dealt.is_empty() => {
                Some(snapshot.robots[0].dealt.clone())
            }
            _ => None,
        })
        .await;

    assert_eq!(
        session
            .send(1, PlayerAction::SubmitProgram {
                priorities: vec![dealt[0].priority],
            })
            .await,
        Err(CommandError::WrongCardCount { expected: 5, actual: 1 })
    );
    assert_eq!(
        session.send(1, PlayerAction::ContinuePowerDown).await,
        Err(CommandError::WrongPhase)
    );
    assert_eq!(
        session.send(1, PlayerAction::AcceptDamage { attack: 99 }).await,
        Err(CommandError::NoPendingDamage)
    );
    assert_eq!(session.send(7, PlayerAction::TogglePowerDown).await, Err(CommandError::UnknownRobot));

    let priorities: Vec<u16> = dealt.iter().take(5).map(|card| card.priority).collect();
    session
        .send(1, PlayerAction::SubmitProgram { priorities })
        .await
        .unwrap();

    session
        .next_event(|event| matches!(event, RaceEvent::RegisterStarted { register: 1 }).then_some(()))
        .await;
    assert!(started.elapsed() < quick_waits().program_timeout);
}

#[tokio::test(start_paused = true)]
async fn when_damage_answer_arrives_after_the_window_then_it_is_rejected() {
    let waits = quick_waits();
    let mut session = TestSession::spawn(
        boxed_robot(true, Some(OptionKind::RearFiringLaser), one_round()),
        waits,
    );

    let attack = session
        .next_event(|event| match event {
            RaceEvent::DamagePreventionOpportunity {
                robot: 1, attack, residual, ..
            } => {
                assert_eq!(*residual, 1);
                Some(*attack)
            }
            _ => None,
        })
        .await;

    tokio::time::sleep(waits.damage_window + Duration::from_millis(1)).await;

    assert_eq!(
        session.send(1, PlayerAction::AcceptDamage { attack }).await,
        Err(CommandError::DecisionClosed)
    );
    let total = session
        .next_event(|event| match event {
            RaceEvent::RobotDamaged { robot: 1, total, .. } => Some(*total),
            _ => None,
        })
        .await;
    assert_eq!(total, 1);
}

#[tokio::test(start_paused = true)]
async fn when_clock_passes_the_window_before_the_answer_then_the_option_is_kept() {
    let waits = quick_waits();
    let mut session = TestSession::spawn(
        boxed_robot(true, Some(OptionKind::RearFiringLaser), one_round()),
        waits,
    );
    let mut log = session.events.resubscribe();

    let attack = session
        .next_event(|event| match event {
            RaceEvent::DamagePreventionOpportunity { robot: 1, attack, .. } => Some(*attack),
            _ => None,
        })
        .await;
    let opened = Instant::now();
    tokio::time::advance(waits.damage_window + Duration::from_millis(50)).await;
    assert!(opened.elapsed() > waits.damage_window);

    assert_eq!(
        session
            .send(1, PlayerAction::UseOption {
                attack,
                option: OptionKind::RearFiringLaser,
            })
            .await,
        Err(CommandError::DecisionClosed)
    );

    // Nobody answers any window, so every register lands in full.
    let summary = session.summary().await;
    assert_eq!(summary.participants[0].damage, 5);
    let mut discarded = 0;
    while let Ok(event) = log.try_recv() {
        if matches!(event, RaceEvent::OptionDiscarded { robot: 1, .. }) {
            discarded += 1;
        }
    }
    assert_eq!(discarded, 0);
}

#[tokio::test(start_paused = true)]
async fn when_option_is_spent_then_one_point_is_blocked_and_the_card_is_gone() {
    let mut session = TestSession::spawn(
        boxed_robot(true, Some(OptionKind::RearFiringLaser), one_round()),
        quick_waits(),
    );

    let attack = session
        .next_event(|event| match event {
            RaceEvent::DamagePreventionOpportunity { robot: 1, attack, .. } => Some(*attack),
            _ => None,
        })
        .await;
    session
        .send(1, PlayerAction::UseOption {
            attack,
            option: OptionKind::RearFiringLaser,
        })
        .await
        .unwrap();

    let discarded = session
        .next_event(|event| match event {
            RaceEvent::OptionDiscarded { robot: 1, option } => Some(*option),
            _ => None,
        })
        .await;
    assert_eq!(discarded, OptionKind::RearFiringLaser);

    // The remaining four registers hit a robot with nothing left to spend.
    let summary = session.summary().await;
    assert_eq!(summary.participants[0].damage, 4);
}

#[tokio::test(start_paused = true)]
async fn when_robot_powers_down_then_it_sits_out_a_round_with_damage_cleared() {
    let tuning = RuleTuning {
        max_rounds: 3,
        ..RuleTuning::default()
    };
    let mut state = boxed_robot(false, None, tuning);
    {
        let robot = state.robot_mut(1).unwrap();
        robot.damage = 3;
        robot.refresh_locked_registers();
    }
    let mut session = TestSession::spawn(state, quick_waits());
    let mut log = session.events.resubscribe();

    assert_eq!(session.send(1, PlayerAction::TogglePowerDown).await, Ok(()));

    let robot = session
        .next_event(|event| match event {
            RaceEvent::Snapshot(snapshot) if snapshot.round == 2 => Some(snapshot.robots[0].clone()),
            _ => None,
        })
        .await;
    assert_eq!(robot.power, PowerState::Off);
    assert_eq!(robot.damage, 0);
    assert!(robot.dealt.is_empty());

    session
        .phase_rx
        .wait_for(|phase| *phase == SessionPhase::PowerDecisions { round: 3 })
        .await
        .unwrap();
    assert_eq!(session.send(1, PlayerAction::ContinuePowerDown).await, Ok(()));

    let summary = session.summary().await;
    assert_eq!(summary.rounds, 3);

    let mut events = Vec::new();
    while let Ok(event) = log.try_recv() {
        events.push(event);
    }
    let transitions: Vec<PowerState> = events
        .iter()
        .filter_map(|event| match event {
            RaceEvent::PowerStateChanged { robot: 1, state } => Some(*state),
            _ => None,
        })
        .collect();
    assert_eq!(transitions, vec![PowerState::Announcing, PowerState::Off]);
    // Only round 1 ran cards.
    assert_eq!(count_cards(&events), 5);
}

#[tokio::test(start_paused = true)]
async fn when_powered_down_robot_stays_silent_then_it_powers_back_on() {
    let tuning = RuleTuning {
        max_rounds: 3,
        ..RuleTuning::default()
    };
    let mut session = TestSession::spawn(boxed_robot(false, None, tuning), quick_waits());
    let mut log = session.events.resubscribe();

    session.send(1, PlayerAction::TogglePowerDown).await.unwrap();
    session.summary().await;

    let mut transitions = Vec::new();
    while let Ok(event) = log.try_recv() {
        if let RaceEvent::PowerStateChanged { robot: 1, state } = event {
            transitions.push(state);
        }
    }
    assert_eq!(
        transitions,
        vec![PowerState::Announcing, PowerState::Off, PowerState::On]
    );
}

fn registry_with_jammed_course() -> Arc<SessionRegistry> {
    let mut catalog = CourseCatalog::builtin().unwrap();
    // Two starts on one boxed-in tile: the robots can never separate.
    let mut jammed = board_with(5, 5, &[(2, 2, Direction::Up), (2, 2, Direction::Down)]);
    wall_in(&mut jammed, Position::new(2, 2));
    catalog.insert("jammed", jammed).unwrap();

    let settings = SessionSettings {
        command_channel_capacity: 16,
        event_broadcast_capacity: 1024,
        waits: quick_waits(),
        tuning: one_round(),
        seed: Some(7),
    };
    Arc::new(SessionRegistry::new(settings, Arc::new(catalog)))
}

#[tokio::test(start_paused = true)]
async fn when_one_session_aborts_then_its_neighbour_still_finishes() {
    let registry = registry_with_jammed_course();
    let jammed = registry
        .create_session(
            "jammed-1".to_string(),
            "jammed",
            vec!["Twonky".to_string(), "Hammer Bot".to_string()],
        )
        .await
        .unwrap();
    let healthy = registry
        .create_session("arena-1".to_string(), "test-arena", vec!["Zoom Bot".to_string()])
        .await
        .unwrap();
    let mut jammed_phase = jammed.phase_tx.subscribe();
    let mut healthy_phase = healthy.phase_tx.subscribe();
    let mut healthy_summary = healthy.summary_tx.subscribe();

    let ended = jammed_phase
        .wait_for(SessionPhase::is_terminal)
        .await
        .unwrap()
        .clone();
    match ended {
        SessionPhase::Aborted { reason } => assert!(reason.contains("invariant")),
        other => panic!("expected abort, got {other:?}"),
    }

    let ended = healthy_phase
        .wait_for(SessionPhase::is_terminal)
        .await
        .unwrap()
        .clone();
    assert!(matches!(ended, SessionPhase::Finished { .. }));
    let summary = healthy_summary
        .wait_for(Option::is_some)
        .await
        .unwrap()
        .clone()
        .unwrap();
    assert_eq!(summary.rounds, 1);
    assert_eq!(summary.course_id, "test-arena");

    for _ in 0..10 {
        if registry.session_count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(registry.get_session("jammed-1").await.is_none());
    assert!(registry.get_session("arena-1").await.is_none());
}

#[tokio::test(start_paused = true)]
async fn when_every_robot_is_on_autopilot_then_the_race_reaches_a_summary() {
    let settings = SessionSettings {
        command_channel_capacity: 64,
        event_broadcast_capacity: 4096,
        waits: quick_waits(),
        tuning: RuleTuning {
            max_rounds: 2,
            ..RuleTuning::default()
        },
        seed: Some(11),
    };
    let registry = Arc::new(SessionRegistry::new(
        settings,
        Arc::new(CourseCatalog::builtin().unwrap()),
    ));

    let players = vec!["Twonky".to_string(), "Spin Bot".to_string()];
    let summary = race_server::run(registry.clone(), "test-arena", players)
        .await
        .unwrap();

    assert_eq!(summary.participants.len(), 2);
    assert!((1..=2).contains(&summary.rounds));
    assert!(summary.ended_at_ms >= summary.started_at_ms);
}

#[tokio::test(start_paused = true)]
async fn when_client_text_arrives_then_the_verdict_goes_back_on_the_wire() {
    let registry = registry_with_jammed_course();
    let handle = registry
        .create_session("wire-1".to_string(), "test-arena", vec!["Twonky".to_string()])
        .await
        .unwrap();

    match handle_client_text(&handle, "{not json").await {
        ServerMessage::CommandResult(verdict) => {
            assert!(!verdict.ok);
            assert!(verdict.error.unwrap().starts_with("malformed message"));
        }
        other => panic!("expected a command result, got {other:?}"),
    }

    let reply = handle_client_text(&handle, r#"{"type":"TogglePowerDown","data":{"robot":9}}"#).await;
    match reply {
        ServerMessage::CommandResult(verdict) => {
            assert!(!verdict.ok);
            assert_eq!(verdict.error.as_deref(), Some("no such robot in this session"));
        }
        other => panic!("expected a command result, got {other:?}"),
    }
    handle.shutdown();
}
