//! Headless Pachinko demo
//!
//! Balls are dropped onto a static field of pins and bars every few seconds
//! of simulated time. Frames are driven from a synthetic clock and drawn to a
//! recording backend, so the whole synchronization layer runs without a
//! window. Pass a JSON config path as the first argument to override the
//! defaults.

use physview::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::FRAC_PI_4;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Simulated seconds between balls
const ADD_INTERVAL: f32 = 3.0;
const BALL_RADIUS: f32 = 1.0;
const FRAME_TIME: Duration = Duration::from_micros(16_667);

/// State shared between the ball dropper and the frame loop
#[derive(Debug, Default)]
struct DropQueue {
    /// Balls added during physics ticks, not yet visualized
    pending: Vec<BodyId>,
    time_since_added: f32,
}

struct BallDropper {
    queue: Arc<RwLock<DropQueue>>,
    ball: ShapeRef,
    rng: StdRng,
}

impl TickListener<PhysicsWorld> for BallDropper {
    fn pre_physics_tick(&mut self, world: &mut PhysicsWorld, timestep: f32) {
        let mut queue = self
            .queue
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if queue.time_since_added >= ADD_INTERVAL {
            let ball = world.add_body(
                BodySettings::new(self.ball.clone(), MotionType::Dynamic)
                    .with_position(Vec3::new(0.0, 4.0, 0.0))
                    .allow_sleeping(false),
            );
            // random horizontal impulse
            let x_impulse = 1.0 - 2.0 * self.rng.gen::<f32>();
            world.add_impulse(ball, Vec3::new(x_impulse, 0.0, 0.0));
            debug!(ball = %ball, x_impulse, "Dropped ball");
            queue.pending.push(ball);
            queue.time_since_added = 0.0;
        }
        queue.time_since_added += timestep;
    }
}

/// Field layout for a given number of pin rows
struct Field {
    shape: ShapeRef,
    /// Height of the horizontal stop at the bottom
    bottom: f32,
}

fn build_field(num_rows: u32) -> Field {
    assert!((4..=9).contains(&num_rows), "row count must be 4..=9, got {num_rows}");

    let bar_half_width = 0.3;
    let last_row = num_rows - 1;
    let mut children = Vec::new();

    let pin_half_height = 1.0;
    let pin_half_width = 0.5f32.sqrt() * bar_half_width;
    let pin = ShapeRef::cuboid(Vec3::splat(pin_half_width));
    let pin_spacing = 2.0 * (bar_half_width + BALL_RADIUS);
    let row_spacing = 2.0 * pin_spacing;
    let rot45 = Quat::from_rotation_z(FRAC_PI_4);

    for row in 0..num_rows {
        let y = -row_spacing * row as f32;
        let mut num_pins = num_rows - (row % 2);
        if row == last_row {
            num_pins += 2;
        }
        for index in 0..num_pins {
            let x = pin_spacing * (index as f32 - (num_pins - 1) as f32 / 2.0);
            children.push(CompoundChild::new(pin.clone(), Vec3::new(x, y, 0.0), rot45));
        }
    }

    // vertical bars
    let bar_half_length = 0.5 * row_spacing * (11 - num_rows) as f32;
    let bar = ShapeRef::cuboid(Vec3::new(bar_half_width, bar_half_length, pin_half_height));
    let num_bars = num_rows - (last_row % 2) + 2;
    let y_bar = -row_spacing * last_row as f32 - bar_half_length;
    for index in 0..num_bars {
        let x = pin_spacing * (index as f32 - (num_bars - 1) as f32 / 2.0);
        children.push(CompoundChild::new(bar.clone(), Vec3::new(x, y_bar, 0.0), Quat::IDENTITY));
    }

    // horizontal stop at the bottom
    let y_stop = y_bar - bar_half_length;
    let stop_half_width = pin_spacing * (num_bars - 1) as f32 / 2.0 + bar_half_width;
    let stop = ShapeRef::cuboid(Vec3::new(stop_half_width, bar_half_width, pin_half_height));
    children.push(CompoundChild::new(stop, Vec3::new(0.0, y_stop, 0.0), Quat::IDENTITY));

    Field {
        shape: ShapeRef::compound(children),
        bottom: y_stop,
    }
}

/// Replace every body with a fresh playing field; returns its bottom height
fn restart_simulation(
    ctx: &mut FrameContext<PhysicsWorld>,
    world: &mut PhysicsWorld,
    queue: &RwLock<DropQueue>,
    num_rows: u32,
) -> Result<f32, FrameError> {
    world.remove_all_bodies();

    let field = build_field(num_rows);
    let body = world.add_body(BodySettings::new(field.shape, MotionType::Static));
    ctx.visualize_shape(world, PoseTarget::Body(body))?;

    let mut queue = queue.write().unwrap_or_else(std::sync::PoisonError::into_inner);
    queue.pending.clear();
    queue.time_since_added = ADD_INTERVAL;
    info!(num_rows, bottom = field.bottom, "Simulation restarted");
    Ok(field.bottom)
}

fn main() -> Result<(), FrameError> {
    let config = match std::env::args().nth(1) {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::default(),
    };
    match &config.log_filter {
        Some(filter) => physview::init_logging_with_filter(filter),
        None => physview::init_logging(),
    }
    info!("Starting Pachinko demo");

    let mut world = PhysicsWorld::new();
    let mut backend = RecordingBackend::new();
    let mut ctx = FrameContext::new(config)?;

    let queue = Arc::new(RwLock::new(DropQueue::default()));
    ctx.add_tick_listener(Box::new(BallDropper {
        queue: queue.clone(),
        ball: ShapeRef::sphere(BALL_RADIUS),
        rng: StdRng::from_entropy(),
    }));

    ctx.visualize_axes(&world, None, 2.0)?;
    let mut bottom = restart_simulation(&mut ctx, &mut world, &queue, 7)?;

    let mut now = Instant::now();
    for frame in 0..3600u32 {
        match frame {
            1200 => bottom = restart_simulation(&mut ctx, &mut world, &queue, 5)?,
            2000 => ctx.set_physics_speed(0.0)?,
            2300 => ctx.set_physics_speed(1.0)?,
            _ => {}
        }

        let stats = ctx.frame(&mut world, &mut backend, now)?;
        now += FRAME_TIME;

        let pending = std::mem::take(
            &mut queue
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .pending,
        );
        for ball in pending {
            ctx.visualize_shape(&world, PoseTarget::Body(ball))?;
        }

        // nothing collides in this world, so balls fall through the field
        let lost: Vec<BodyId> = world
            .body_ids()
            .into_iter()
            .filter(|id| world.body_position(*id).is_some_and(|p| p.y < bottom - 20.0))
            .collect();
        for ball in lost {
            world.remove_body(ball);
        }

        if stats.frame % 300 == 0 {
            info!(
                frame = stats.frame,
                visible = ctx.geometries().len(),
                bodies = world.body_count(),
                cached = ctx.cache().len(),
                pruned = stats.pruned,
                "Frame stats"
            );
        }
    }

    ctx.shutdown();
    world.remove_all_bodies();
    info!(
        frames = backend.frames(),
        uploads = backend.upload_count(),
        uploaded_bytes = backend.uploaded_bytes(),
        simulated_seconds = world.elapsed(),
        "Pachinko demo finished"
    );
    Ok(())
}
