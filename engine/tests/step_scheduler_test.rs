//! Integration tests for fixed timestep scheduling

use physview::physics::{
    BodyId, BodySettings, MotionType, PhysicsSystem, PhysicsWorld, ShapeRef, StepScheduler,
    TickListener,
};
use std::sync::{Arc, RwLock};
use tracing::info;

const STEP: f32 = 1.0 / 60.0;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

#[test]
fn test_cap_example_from_one_second_frame() {
    init_logging();
    let mut world = PhysicsWorld::new();
    let mut scheduler = StepScheduler::new(STEP, 4).unwrap();

    assert_eq!(scheduler.advance(&mut world, 0.0).unwrap(), 0);
    assert_eq!(scheduler.advance(&mut world, 1.0).unwrap(), 4);

    let expected_lag = 1.0 - (1.0 / STEP).floor() * STEP;
    assert!((scheduler.lag() - expected_lag).abs() < 1e-6);
    assert_eq!(world.step_count(), 4);
}

#[test]
fn test_time_is_conserved_without_cap_hits() {
    let mut world = PhysicsWorld::new();
    let mut scheduler = StepScheduler::new(STEP, 4).unwrap();
    scheduler.advance(&mut world, 0.0).unwrap();

    let deltas = [0.004, 0.016, 0.021, 0.0, 0.033, 0.011, 0.05, 0.017, 0.009];
    let mut total = 0.0f64;
    for delta in deltas {
        let substeps = scheduler.advance(&mut world, delta).unwrap();
        assert!(substeps <= 4);
        total += delta as f64;
    }

    assert_eq!(scheduler.discarded_substeps(), 0);
    let simulated = scheduler.total_substeps() as f64 * STEP as f64 + scheduler.lag() as f64;
    assert!((simulated - total).abs() < 1e-4, "simulated {simulated}, elapsed {total}");
    assert!(scheduler.lag() >= 0.0 && scheduler.lag() < STEP);
}

#[test]
fn test_substeps_never_exceed_cap() {
    let mut world = PhysicsWorld::new();
    let mut scheduler = StepScheduler::new(STEP, 4).unwrap();
    scheduler.advance(&mut world, 0.0).unwrap();

    for delta in [0.5, 10.0, 0.07, 3.3, 0.0001] {
        assert!(scheduler.advance(&mut world, delta).unwrap() <= 4);
    }
    assert!(scheduler.discarded_substeps() > 0);
}

/// Spawns a ball before every substep and counts completed substeps
struct Spawner {
    spawned: Arc<RwLock<Vec<BodyId>>>,
    completed: u32,
}

impl TickListener<PhysicsWorld> for Spawner {
    fn pre_physics_tick(&mut self, world: &mut PhysicsWorld, _timestep: f32) {
        let ball = world.add_body(BodySettings::new(ShapeRef::sphere(0.1), MotionType::Dynamic));
        self.spawned.write().unwrap().push(ball);
    }

    fn physics_tick(&mut self, world: &mut PhysicsWorld, _timestep: f32) {
        self.completed += 1;
        assert_eq!(world.step_count(), self.completed as u64);
    }
}

#[test]
fn test_listeners_can_mutate_the_world() {
    init_logging();
    let mut world = PhysicsWorld::new();
    let mut scheduler = StepScheduler::new(STEP, 4).unwrap();
    let spawned = Arc::new(RwLock::new(Vec::new()));
    scheduler.add_tick_listener(Box::new(Spawner {
        spawned: spawned.clone(),
        completed: 0,
    }));

    scheduler.advance(&mut world, 0.0).unwrap();
    let substeps = scheduler.advance(&mut world, STEP * 3.5).unwrap();

    let spawned = spawned.read().unwrap();
    info!(substeps, spawned = spawned.len(), "Listener run complete");
    assert_eq!(substeps, 3);
    assert_eq!(spawned.len(), 3);
    assert!(spawned.iter().all(|b| world.is_body_present(*b)));
}
