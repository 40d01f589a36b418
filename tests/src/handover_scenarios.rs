//! End-to-end handover scenarios against the decision core.
//!
//! Each test drives whole broadcast cycles through the state machine and
//! timer queue with exact control of simulation time.

use std::time::Duration;

use integration_tests::{init_test_logging, ScenarioBench};
use towersim_common::{HandoverConfig, SimTime, TowerId};
use towersim_terminal::phy::HandoverEvent;
use towersim_terminal::HandoverPhase;

fn config() -> HandoverConfig {
    HandoverConfig {
        enable_handover: true,
        hysteresis_factor: 5.0,
        handover_delta_ms: 10,
        handover_detachment_ms: 40,
        handover_attachment_ms: 60,
        min_rssi: 1.0,
    }
}

fn bench() -> ScenarioBench {
    init_test_logging();
    ScenarioBench::new(config(), TowerId(0))
}

/// Serving tower at 10, factor 5 gives threshold 2. A neighbor at the
/// exact boundary must not trigger a switch; one above it completes the
/// full detach/attach sequence onto the new tower.
#[test]
fn test_boundary_candidate_then_full_handover() {
    let mut bench = bench();

    bench.broadcast_cycle(10.0, &[(TowerId(1), 12.0)]);
    assert_eq!(bench.machine.phase(), HandoverPhase::None);
    assert!(bench.take_events().is_empty());
    bench.run_one_cycle();

    bench.broadcast_cycle(10.0, &[(TowerId(1), 14.0)]);
    assert_eq!(bench.machine.phase(), HandoverPhase::Evaluating);

    bench.run_one_cycle();
    bench.run_one_cycle();
    assert_eq!(bench.machine.serving_tower(), TowerId(1));
    assert_eq!(bench.machine.phase(), HandoverPhase::None);

    let events = bench.take_events();
    assert!(matches!(events[0], HandoverEvent::EvaluationStarted { .. }));
    assert!(matches!(
        events.last(),
        Some(HandoverEvent::Completed {
            old_tower: TowerId(0),
            new_tower: TowerId(1),
            ..
        })
    ));
}

/// The wall-clock span from the evaluation trigger to serving-tower
/// reassignment is exactly delta + detachment + attachment.
#[test]
fn test_completion_latency_is_exact() {
    let mut bench = bench();
    bench.broadcast_cycle(10.0, &[(TowerId(1), 20.0)]);
    bench.run_until(SimTime::from_millis(1000));
    assert_eq!(
        bench.completion_latency(),
        Some(Duration::from_millis(10 + 40 + 60))
    );
}

/// A zero hysteresis factor degenerates to "any stronger tower wins".
#[test]
fn test_zero_factor_any_stronger_tower_wins() {
    init_test_logging();
    let mut bench = ScenarioBench::new(
        HandoverConfig {
            hysteresis_factor: 0.0,
            ..config()
        },
        TowerId(0),
    );
    bench.broadcast_cycle(10.0, &[(TowerId(1), 10.1)]);
    assert_eq!(bench.machine.phase(), HandoverPhase::Evaluating);

    bench.run_until(SimTime::from_millis(1000));
    assert_eq!(bench.machine.serving_tower(), TowerId(1));
}

/// Serving strength recovering inside the consolidation window aborts
/// the transition and nothing about the association changes.
#[test]
fn test_flap_suppressed_by_revalidation() {
    let mut bench = bench();
    bench.broadcast_cycle(10.0, &[(TowerId(1), 14.0)]);
    assert_eq!(bench.machine.phase(), HandoverPhase::Evaluating);

    // strength recovers before the delta window closes
    if let Some(event) = bench
        .machine
        .on_serving_observation(13.0, &mut bench.timers)
    {
        panic!("unexpected event: {event:?}");
    }
    bench.run_until(SimTime::from_millis(1000));

    assert_eq!(bench.machine.serving_tower(), TowerId(0));
    let events = bench.take_events();
    assert!(matches!(events[0], HandoverEvent::EvaluationStarted { .. }));
    assert!(matches!(
        events[1],
        HandoverEvent::EvaluationAborted {
            candidate: TowerId(1)
        }
    ));
    assert_eq!(events.len(), 2);
}

/// Repeated noisy cycles around the threshold never complete a handover
/// when each window's re-validation fails.
#[test]
fn test_noisy_signal_does_not_flap() {
    let mut bench = bench();
    for _ in 0..10 {
        // neighbor looks strong at first, serving recovers mid-window
        bench.broadcast_cycle(10.0, &[(TowerId(1), 12.5)]);
        bench
            .machine
            .on_serving_observation(11.0, &mut bench.timers);
        bench.run_one_cycle();
    }
    assert_eq!(bench.machine.serving_tower(), TowerId(0));
    assert!(bench.completion_latency().is_none());
}

/// The strongest neighbor of the window wins; ties keep the tower
/// observed first.
#[test]
fn test_strongest_neighbor_wins_ties_first_seen() {
    let mut bench = bench();
    bench.broadcast_cycle(
        10.0,
        &[(TowerId(1), 14.0), (TowerId(2), 15.0), (TowerId(3), 15.0)],
    );
    bench.run_until(SimTime::from_millis(1000));
    assert_eq!(bench.machine.serving_tower(), TowerId(2));
}

/// The min_rssi floor detaches the terminal even while an attachment is
/// in flight, and the cancelled transition never completes afterwards.
#[test]
fn test_floor_wins_mid_transition() {
    let mut bench = bench();
    bench.broadcast_cycle(10.0, &[(TowerId(1), 14.0)]);
    bench.run_until(SimTime::from_millis(60));
    assert_eq!(bench.machine.phase(), HandoverPhase::Attaching);

    let event = bench
        .machine
        .on_serving_observation(0.2, &mut bench.timers);
    assert!(matches!(event, Some(HandoverEvent::Detached { .. })));
    assert!(bench.machine.is_detached());

    bench.run_until(SimTime::from_millis(2000));
    assert_eq!(bench.machine.serving_tower(), TowerId(0));
    assert_eq!(bench.machine.phase(), HandoverPhase::None);
    assert!(bench.completion_latency().is_none());
}

/// A completed handover drops the buffers addressed to the old serving
/// tower and leaves the new tower's buffers alone.
#[test]
fn test_buffers_reconciled_on_completion() {
    let mut bench = bench();
    bench.buffer_frame(TowerId(0), b"old tower frame");
    bench.buffer_frame(TowerId(1), b"new tower frame");

    bench.broadcast_cycle(10.0, &[(TowerId(1), 20.0)]);
    bench.run_until(SimTime::from_millis(1000));
    assert_eq!(bench.machine.serving_tower(), TowerId(1));

    let terminal = bench.terminal;
    assert_eq!(bench.buffers.len(terminal, TowerId(0)), 0);
    assert_eq!(bench.buffers.len(terminal, TowerId(1)), 1);
}

/// Disabled handover tracks signal strengths but never leaves the
/// initial tower.
#[test]
fn test_disabled_handover_stays_put() {
    init_test_logging();
    let mut bench = ScenarioBench::new(
        HandoverConfig {
            enable_handover: false,
            ..config()
        },
        TowerId(0),
    );
    for _ in 0..5 {
        bench.broadcast_cycle(5.0, &[(TowerId(1), 50.0)]);
        bench.run_one_cycle();
    }
    assert_eq!(bench.machine.serving_tower(), TowerId(0));
    assert!(bench.take_events().is_empty());
}

/// Back-to-back handovers: after completing onto tower 1, a later
/// stronger tower 0 takes the terminal back.
#[test]
fn test_sequential_handovers() {
    let mut bench = bench();
    bench.broadcast_cycle(10.0, &[(TowerId(1), 20.0)]);
    bench.run_until(SimTime::from_millis(200));
    assert_eq!(bench.machine.serving_tower(), TowerId(1));

    // serving is now tower 1 at 20, threshold 4; tower 0 must beat 24
    bench.broadcast_cycle(20.0, &[(TowerId(0), 30.0)]);
    bench.run_until(SimTime::from_millis(400));
    assert_eq!(bench.machine.serving_tower(), TowerId(0));

    let completions = bench
        .take_events()
        .into_iter()
        .filter(|event| matches!(event, HandoverEvent::Completed { .. }))
        .count();
    assert_eq!(completions, 2);
}
