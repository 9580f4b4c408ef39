//! Phase engine behaviour over simulated time.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use sigma::observability::EventEmitter;
use sigma::phase::{PhaseEngine, PhaseKind, SegmentTimes};
use sigma::schedule::{Direction, Schedule};
use sigma::store::StateStore;

fn engine(events: EventEmitter) -> Arc<PhaseEngine> {
    let store = Arc::new(StateStore::new(
        Schedule::default(),
        SegmentTimes::default(),
        Instant::now(),
    ));
    Arc::new(PhaseEngine::new(
        store,
        Duration::from_millis(200),
        Arc::new(events),
    ))
}

#[tokio::test(start_paused = true)]
async fn staged_schedule_waits_for_cycle_boundary() {
    let engine = engine(EventEmitter::noop());
    let store = Arc::clone(engine.store());
    let task = engine.start_timer_task();

    tokio::time::sleep(Duration::from_secs(5)).await;
    let next = Schedule::uniform(20.0, 60.0);
    assert!(!store.stage(next));

    // default cycle is 10s overhead plus 4 x 10s green
    tokio::time::sleep(Duration::from_secs(40)).await;
    assert_eq!(store.active_schedule(), Schedule::default());
    assert_eq!(store.pending_schedule(), Some(next));
    assert!(store.snapshot(Instant::now()).using_pending);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(store.active_schedule(), next);
    assert_eq!(store.pending_schedule(), None);
    assert_eq!(store.cycles_completed(), 1);

    let snapshot = store.snapshot(Instant::now());
    assert!((snapshot.cycle_length - 90.0).abs() < 1e-9);
    assert!(!snapshot.using_pending);

    engine.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn last_stage_before_boundary_wins() {
    let engine = engine(EventEmitter::noop());
    let store = Arc::clone(engine.store());
    let task = engine.start_timer_task();

    let first = Schedule::uniform(15.0, 45.0);
    let second = Schedule::uniform(30.0, 90.0);
    assert!(!store.stage(first));
    assert!(store.stage(second));

    tokio::time::sleep(Duration::from_secs(51)).await;
    assert_eq!(store.active_schedule(), second);

    engine.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn countdowns_follow_the_rotation() {
    let engine = engine(EventEmitter::noop());
    let store = Arc::clone(engine.store());
    let task = engine.start_timer_task();

    // [0, 0.5) all-red, [0.5, 2.0) yellow, [2.0, 12.0) north green
    tokio::time::sleep(Duration::from_secs(7)).await;
    let snapshot = store.snapshot(Instant::now());
    assert_eq!(snapshot.active_direction, Direction::North);
    assert_eq!(snapshot.phase, PhaseKind::Green);
    assert_eq!(snapshot.remaining, 5);
    assert_eq!(snapshot.green.north, 5);
    assert_eq!(snapshot.red.live.north, 0);
    assert!(snapshot.red.live.east > 0);

    // east green runs [14.5, 24.5)
    tokio::time::sleep(Duration::from_secs(10)).await;
    let snapshot = store.snapshot(Instant::now());
    assert_eq!(snapshot.active_direction, Direction::East);
    assert_eq!(snapshot.phase, PhaseKind::Green);
    assert!(snapshot.red.live.north > 0);
    assert_eq!(snapshot.red.live.east, 0);

    engine.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn lifecycle_events_are_written() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let engine = engine(EventEmitter::from_file(file.path()).unwrap());
    let store = Arc::clone(engine.store());
    let task = engine.start_timer_task();

    store.stage(Schedule::uniform(12.0, 36.0));
    tokio::time::sleep(Duration::from_secs(51)).await;
    engine.shutdown();
    task.await.unwrap();

    let text = std::fs::read_to_string(file.path()).unwrap();
    let types: Vec<String> = text
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["type"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(types.first().map(String::as_str), Some("EngineStarted"));
    assert!(types.iter().any(|t| t == "CycleCompleted"));
    assert!(types.iter().any(|t| t == "ScheduleAdopted"));
    assert_eq!(types.last().map(String::as_str), Some("EngineStopped"));
}
