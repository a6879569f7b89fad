//! Fixed timestep scheduling of physics substeps
//!
//! Wall-clock frame time is accumulated as lag and converted into whole
//! fixed-length substeps. The number of substeps per frame is capped; time
//! beyond the cap is dropped rather than carried into later frames.

use crate::config::{ConfigError, SyncConfig};
use crate::physics::system::{PhysicsSystem, StepError};
use tracing::{debug, trace, warn};

/// Callbacks run around every substep
///
/// Listeners receive the simulation itself and may mutate it (add or remove
/// bodies, apply impulses). They run in registration order.
pub trait TickListener<P: ?Sized> {
    /// Called before each substep
    fn pre_physics_tick(&mut self, system: &mut P, timestep: f32) {
        let _ = (system, timestep);
    }

    /// Called after each substep
    fn physics_tick(&mut self, system: &mut P, timestep: f32) {
        let _ = (system, timestep);
    }
}

pub struct StepScheduler<P: ?Sized> {
    timestep: f32,
    max_substeps: u32,
    /// Simulation time owed but not yet stepped, always in `[0, timestep)`
    lag: f32,
    started: bool,
    listeners: Vec<Box<dyn TickListener<P>>>,
    total_substeps: u64,
    discarded_substeps: u64,
}

impl<P: PhysicsSystem + ?Sized> StepScheduler<P> {
    pub fn new(timestep: f32, max_substeps: u32) -> Result<Self, ConfigError> {
        if !timestep.is_finite() || timestep <= 0.0 {
            return Err(ConfigError::InvalidTimestep(timestep));
        }
        if max_substeps == 0 {
            return Err(ConfigError::InvalidSubstepCap(max_substeps));
        }
        debug!(timestep, max_substeps, "Creating step scheduler");
        Ok(Self {
            timestep,
            max_substeps,
            lag: 0.0,
            started: false,
            listeners: Vec::new(),
            total_substeps: 0,
            discarded_substeps: 0,
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, ConfigError> {
        Self::new(config.timestep, config.max_substeps)
    }

    pub fn add_tick_listener(&mut self, listener: Box<dyn TickListener<P>>) {
        self.listeners.push(listener);
    }

    /// Advance the simulation by `delta` seconds of wall-clock time
    ///
    /// Returns the number of substeps executed. The first call only
    /// establishes the baseline and never steps.
    pub fn advance(&mut self, system: &mut P, delta: f32) -> Result<u32, StepError> {
        assert!(
            delta.is_finite() && delta >= 0.0,
            "frame delta must be finite and non-negative, got {delta}"
        );
        if !self.started {
            self.started = true;
            trace!("First advance, establishing baseline");
            return Ok(0);
        }

        let time_since_step = self.lag + delta;
        let owed = (time_since_step / self.timestep).floor() as u32;
        self.lag = (time_since_step - owed as f32 * self.timestep).max(0.0);

        let substeps = owed.min(self.max_substeps);
        if owed > substeps {
            self.discarded_substeps += (owed - substeps) as u64;
            warn!(
                owed,
                executed = substeps,
                "Substep cap reached, dropping simulation time"
            );
        }

        for _ in 0..substeps {
            for listener in &mut self.listeners {
                listener.pre_physics_tick(system, self.timestep);
            }
            system.step_once(self.timestep)?;
            for listener in &mut self.listeners {
                listener.physics_tick(system, self.timestep);
            }
            self.total_substeps += 1;
        }

        trace!(substeps, lag = self.lag, "Advanced physics");
        Ok(substeps)
    }

    pub fn timestep(&self) -> f32 {
        self.timestep
    }

    pub fn max_substeps(&self) -> u32 {
        self.max_substeps
    }

    pub fn lag(&self) -> f32 {
        self.lag
    }

    /// How far between the last and the next substep the clock is, in `[0, 1)`
    pub fn interpolation_alpha(&self) -> f32 {
        self.lag / self.timestep
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn total_substeps(&self) -> u64 {
        self.total_substeps
    }

    /// Substeps owed but dropped by the cap
    pub fn discarded_substeps(&self) -> u64 {
        self.discarded_substeps
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::world::PhysicsWorld;
    use std::sync::{Arc, RwLock};

    const STEP: f32 = 1.0 / 60.0;

    fn scheduler() -> StepScheduler<PhysicsWorld> {
        StepScheduler::new(STEP, 4).unwrap()
    }

    struct Recorder {
        name: &'static str,
        log: Arc<RwLock<Vec<String>>>,
    }

    impl TickListener<PhysicsWorld> for Recorder {
        fn pre_physics_tick(&mut self, _: &mut PhysicsWorld, _: f32) {
            self.log.write().unwrap().push(format!("pre:{}", self.name));
        }

        fn physics_tick(&mut self, world: &mut PhysicsWorld, _: f32) {
            self.log
                .write()
                .unwrap()
                .push(format!("post:{}@{}", self.name, world.step_count()));
        }
    }

    #[test]
    fn test_first_advance_is_baseline_only() {
        let mut world = PhysicsWorld::new();
        let mut scheduler = scheduler();

        assert_eq!(scheduler.advance(&mut world, 1.0).unwrap(), 0);
        assert_eq!(scheduler.lag(), 0.0);
        assert_eq!(world.step_count(), 0);
        assert!(scheduler.is_started());
    }

    #[test]
    fn test_zero_delta_runs_nothing() {
        let mut world = PhysicsWorld::new();
        let mut scheduler = scheduler();
        scheduler.advance(&mut world, 0.0).unwrap();

        assert_eq!(scheduler.advance(&mut world, 0.0).unwrap(), 0);
        assert_eq!(world.step_count(), 0);
    }

    #[test]
    fn test_cap_drops_time_and_keeps_uncapped_lag() {
        let mut world = PhysicsWorld::new();
        let mut scheduler = scheduler();
        scheduler.advance(&mut world, 0.0).unwrap();

        let substeps = scheduler.advance(&mut world, 1.0).unwrap();

        assert_eq!(substeps, 4);
        assert_eq!(world.step_count(), 4);
        let expected = 1.0 - (1.0 / STEP).floor() * STEP;
        assert!((scheduler.lag() - expected).abs() < 1e-6);
        assert_eq!(
            scheduler.discarded_substeps(),
            (1.0 / STEP).floor() as u64 - 4
        );
    }

    #[test]
    fn test_partial_steps_accumulate() {
        let mut world = PhysicsWorld::new();
        let mut scheduler = scheduler();
        scheduler.advance(&mut world, 0.0).unwrap();

        assert_eq!(scheduler.advance(&mut world, STEP * 0.6).unwrap(), 0);
        assert!((scheduler.interpolation_alpha() - 0.6).abs() < 1e-4);
        assert_eq!(scheduler.advance(&mut world, STEP * 0.6).unwrap(), 1);
        assert!((scheduler.lag() - STEP * 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_listener_order() {
        let mut world = PhysicsWorld::new();
        let mut scheduler = scheduler();
        let log = Arc::new(RwLock::new(Vec::new()));
        for name in ["a", "b"] {
            scheduler.add_tick_listener(Box::new(Recorder {
                name,
                log: log.clone(),
            }));
        }
        scheduler.advance(&mut world, 0.0).unwrap();
        scheduler.advance(&mut world, STEP * 2.5).unwrap();

        let log = log.read().unwrap();
        assert_eq!(
            *log,
            vec![
                "pre:a", "pre:b", "post:a@1", "post:b@1", "pre:a", "pre:b", "post:a@2", "post:b@2"
            ]
        );
    }

    #[test]
    fn test_step_failure_propagates() {
        let mut world = PhysicsWorld::new();
        let mut scheduler = scheduler();
        scheduler.advance(&mut world, 0.0).unwrap();

        world.fail_next_step("solver diverged");
        let result = scheduler.advance(&mut world, STEP);
        assert!(matches!(result, Err(StepError(msg)) if msg == "solver diverged"));
    }

    #[test]
    fn test_rejects_bad_configuration() {
        assert!(matches!(
            StepScheduler::<PhysicsWorld>::new(0.0, 4),
            Err(ConfigError::InvalidTimestep(_))
        ));
        assert!(matches!(
            StepScheduler::<PhysicsWorld>::new(STEP, 0),
            Err(ConfigError::InvalidSubstepCap(0))
        ));
    }

    #[test]
    #[should_panic(expected = "non-negative")]
    fn test_negative_delta_is_rejected() {
        let mut world = PhysicsWorld::new();
        let mut scheduler = scheduler();
        let _ = scheduler.advance(&mut world, -1.0);
    }
}
