//! In-memory physics world used by tests and the demo
//!
//! Bodies, characters, constraints and vehicles are entities in a
//! [`hecs::World`]. Integration is explicit Euler with gravity, damping and
//! an optional horizontal floor; there is no collision between bodies. The
//! world exists to drive the synchronization layer end to end, not to be a
//! faithful simulator.

use crate::physics::shape::{Aabb, ShapeRef};
use crate::physics::system::{
    BodyId, BodyInfo, CharacterId, CharacterInfo, ConstraintId, ConstraintInfo, MotionType,
    PhysicsSystem, Pose, SoftBodyInfo, StepError, VehicleInfo, VirtualCharacterId, WheelInfo,
};
use glam::{Quat, Vec3};
use hecs::Entity;
use std::f32::consts::FRAC_PI_2;
use tracing::{debug, info, trace};

/// Speed below which a body starts counting towards sleep
const SLEEP_SPEED: f32 = 0.05;
/// Seconds a body must stay slow before it is deactivated
const SLEEP_DELAY: f32 = 0.5;
/// Tolerance for "standing on the floor"
const SUPPORT_EPSILON: f32 = 1e-3;

/// Parameters for a new rigid body
#[derive(Debug, Clone)]
pub struct BodySettings {
    pub shape: ShapeRef,
    pub position: Vec3,
    pub rotation: Quat,
    pub motion: MotionType,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub is_sensor: bool,
    pub allow_sleeping: bool,
    pub gravity_factor: f32,
    pub linear_damping: f32,
}

impl BodySettings {
    pub fn new(shape: ShapeRef, motion: MotionType) -> Self {
        Self {
            shape,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            motion,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            is_sensor: false,
            allow_sleeping: true,
            gravity_factor: 1.0,
            linear_damping: 0.05,
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_linear_velocity(mut self, velocity: Vec3) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, velocity: Vec3) -> Self {
        self.angular_velocity = velocity;
        self
    }

    pub fn with_gravity_factor(mut self, factor: f32) -> Self {
        self.gravity_factor = factor;
        self
    }

    pub fn sensor(mut self) -> Self {
        self.is_sensor = true;
        self
    }

    pub fn allow_sleeping(mut self, allow: bool) -> Self {
        self.allow_sleeping = allow;
        self
    }
}

/// Wheel attached to a vehicle body
#[derive(Debug, Clone, Copy)]
pub struct WheelSettings {
    /// Hub position in the body's local frame
    pub position: Vec3,
    pub radius: f32,
    pub width: f32,
}

struct RigidBody {
    shape: ShapeRef,
    motion: MotionType,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    is_sensor: bool,
    allow_sleeping: bool,
    gravity_factor: f32,
    linear_damping: f32,
    active: bool,
    sleep_timer: f32,
}

struct SoftBody {
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    edges: Vec<[u32; 2]>,
}

struct Character {
    body: Entity,
    supported: bool,
}

struct VirtualCharacter {
    pose: Pose,
    shape: ShapeRef,
    velocity: Vec3,
    supported: bool,
}

struct TwoBodyConstraint {
    body1: Entity,
    body2: Entity,
    pivot1: Vec3,
    pivot2: Vec3,
}

struct Vehicle {
    body: Entity,
    wheels: Vec<WheelSettings>,
}

fn to_bits(entity: Entity) -> u64 {
    entity.to_bits().get()
}

fn world_bounds(shape: &ShapeRef, pose: &Pose) -> Aabb {
    shape
        .local_bounds()
        .transformed(Vec3::ONE, pose.orientation, pose.location)
}

pub struct PhysicsWorld {
    world: hecs::World,
    gravity: Vec3,
    floor: Option<f32>,
    step_count: u64,
    elapsed: f32,
    pending_failure: Option<String>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        info!("Initializing physics world");
        Self {
            world: hecs::World::new(),
            gravity: Vec3::new(0.0, -9.81, 0.0),
            floor: None,
            step_count: 0,
            elapsed: 0.0,
            pending_failure: None,
        }
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
        debug!(gravity = ?gravity, "Physics gravity set");
    }

    /// Horizontal plane that dynamic bodies, soft bodies and characters rest on
    pub fn set_floor(&mut self, height: Option<f32>) {
        self.floor = height;
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Simulated seconds so far
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Make the next step fail with `message`
    pub fn fail_next_step(&mut self, message: impl Into<String>) {
        self.pending_failure = Some(message.into());
    }

    pub fn add_body(&mut self, settings: BodySettings) -> BodyId {
        BodyId(to_bits(self.spawn_body(settings)))
    }

    fn spawn_body(&mut self, settings: BodySettings) -> Entity {
        let pose = Pose::new(settings.position, settings.rotation);
        let body = RigidBody {
            shape: settings.shape,
            motion: settings.motion,
            linear_velocity: settings.linear_velocity,
            angular_velocity: settings.angular_velocity,
            is_sensor: settings.is_sensor,
            allow_sleeping: settings.allow_sleeping,
            gravity_factor: settings.gravity_factor,
            linear_damping: settings.linear_damping,
            active: settings.motion != MotionType::Static,
            sleep_timer: 0.0,
        };
        let entity = self.world.spawn((pose, body));
        debug!(body = to_bits(entity), motion = ?settings.motion, "Added rigid body");
        entity
    }

    /// Add a soft body from world-space vertices and edges between them
    pub fn add_soft_body(&mut self, positions: Vec<Vec3>, edges: Vec<[u32; 2]>) -> BodyId {
        let velocities = vec![Vec3::ZERO; positions.len()];
        let entity = self.world.spawn((SoftBody {
            positions,
            velocities,
            edges,
        },));
        debug!(body = to_bits(entity), "Added soft body");
        BodyId(to_bits(entity))
    }

    /// Remove a rigid or soft body, along with every constraint, vehicle and
    /// character attached to it
    pub fn remove_body(&mut self, body: BodyId) -> bool {
        let Some(entity) = self.body_entity(body) else {
            return false;
        };
        let dependents: Vec<Entity> = self
            .world
            .query::<&TwoBodyConstraint>()
            .iter()
            .filter(|(_, c)| c.body1 == entity || c.body2 == entity)
            .map(|(e, _)| e)
            .chain(
                self.world
                    .query::<&Vehicle>()
                    .iter()
                    .filter(|(_, v)| v.body == entity)
                    .map(|(e, _)| e),
            )
            .chain(
                self.world
                    .query::<&Character>()
                    .iter()
                    .filter(|(_, c)| c.body == entity)
                    .map(|(e, _)| e),
            )
            .collect();
        for dependent in &dependents {
            if let Err(err) = self.world.despawn(*dependent) {
                trace!(body = %body, ?dependent, %err, "Dependent already gone");
            }
        }
        let removed = self.world.despawn(entity).is_ok();
        debug!(body = %body, dependents = dependents.len(), "Removed body");
        removed
    }

    /// Remove every rigid and soft body (and everything attached to them)
    pub fn remove_all_bodies(&mut self) {
        for body in self.body_ids() {
            self.remove_body(body);
        }
    }

    /// Rigid and soft bodies currently in the world
    pub fn body_ids(&self) -> Vec<BodyId> {
        let mut ids: Vec<BodyId> = self
            .world
            .query::<&RigidBody>()
            .iter()
            .map(|(e, _)| BodyId(to_bits(e)))
            .chain(
                self.world
                    .query::<&SoftBody>()
                    .iter()
                    .map(|(e, _)| BodyId(to_bits(e))),
            )
            .collect();
        ids.sort();
        ids
    }

    pub fn body_count(&self) -> usize {
        self.body_ids().len()
    }

    /// Character backed by a dynamic body that never sleeps
    pub fn add_character(&mut self, shape: ShapeRef, position: Vec3) -> CharacterId {
        let body = self.spawn_body(
            BodySettings::new(shape, MotionType::Dynamic)
                .with_position(position)
                .allow_sleeping(false),
        );
        let entity = self.world.spawn((Character {
            body,
            supported: false,
        },));
        CharacterId(to_bits(entity))
    }

    /// Remove a character and its backing body
    pub fn remove_character(&mut self, character: CharacterId) -> bool {
        let Some(entity) = Entity::from_bits(character.0) else {
            return false;
        };
        let body = match self.world.get::<&Character>(entity) {
            Ok(c) => c.body,
            Err(_) => return false,
        };
        let _ = self.world.despawn(body);
        self.world.despawn(entity).is_ok()
    }

    pub fn add_virtual_character(&mut self, shape: ShapeRef, position: Vec3) -> VirtualCharacterId {
        let entity = self.world.spawn((VirtualCharacter {
            pose: Pose::from_location(position),
            shape,
            velocity: Vec3::ZERO,
            supported: false,
        },));
        VirtualCharacterId(to_bits(entity))
    }

    pub fn remove_virtual_character(&mut self, character: VirtualCharacterId) -> bool {
        Entity::from_bits(character.0)
            .filter(|e| self.world.get::<&VirtualCharacter>(*e).is_ok())
            .is_some_and(|e| self.world.despawn(e).is_ok())
    }

    /// Join two rigid bodies at a world-space pivot
    pub fn add_constraint(&mut self, body1: BodyId, body2: BodyId, pivot: Vec3) -> Option<ConstraintId> {
        let e1 = self.body_entity(body1)?;
        let e2 = self.body_entity(body2)?;
        let pose1 = *self.world.get::<&Pose>(e1).ok()?;
        let pose2 = *self.world.get::<&Pose>(e2).ok()?;
        let constraint = TwoBodyConstraint {
            body1: e1,
            body2: e2,
            pivot1: pose1.orientation.inverse() * (pivot - pose1.location),
            pivot2: pose2.orientation.inverse() * (pivot - pose2.location),
        };
        let entity = self.world.spawn((constraint,));
        debug!(constraint = to_bits(entity), body1 = %body1, body2 = %body2, "Added constraint");
        Some(ConstraintId(to_bits(entity)))
    }

    /// Remove a two-body or vehicle constraint
    pub fn remove_constraint(&mut self, constraint: ConstraintId) -> bool {
        if !self.is_constraint_present(constraint) {
            return false;
        }
        Entity::from_bits(constraint.0).is_some_and(|e| self.world.despawn(e).is_ok())
    }

    pub fn add_vehicle(&mut self, body: BodyId, wheels: Vec<WheelSettings>) -> Option<ConstraintId> {
        let body = self.body_entity(body)?;
        let entity = self.world.spawn((Vehicle { body, wheels },));
        Some(ConstraintId(to_bits(entity)))
    }

    /// Replace a body's shape
    pub fn set_body_shape(&mut self, body: BodyId, shape: ShapeRef) -> bool {
        self.with_rigid_body(body, |b, _| b.shape = shape)
    }

    pub fn set_linear_velocity(&mut self, body: BodyId, velocity: Vec3) -> bool {
        self.with_rigid_body(body, |b, _| {
            b.linear_velocity = velocity;
            b.active = b.motion != MotionType::Static;
            b.sleep_timer = 0.0;
        })
    }

    /// Apply an impulse to a unit-mass body
    pub fn add_impulse(&mut self, body: BodyId, impulse: Vec3) -> bool {
        self.with_rigid_body(body, |b, _| {
            if b.motion == MotionType::Dynamic {
                b.linear_velocity += impulse;
                b.active = true;
                b.sleep_timer = 0.0;
            }
        })
    }

    pub fn set_position(&mut self, body: BodyId, position: Vec3) -> bool {
        self.with_rigid_body(body, |_, pose| pose.location = position)
    }

    pub fn body_position(&self, body: BodyId) -> Option<Vec3> {
        self.body(body).map(|b| b.pose.location)
    }

    fn with_rigid_body(&mut self, body: BodyId, f: impl FnOnce(&mut RigidBody, &mut Pose)) -> bool {
        let Some(entity) = Entity::from_bits(body.0) else {
            return false;
        };
        match self.world.query_one_mut::<(&mut RigidBody, &mut Pose)>(entity) {
            Ok((b, pose)) => {
                f(b, pose);
                true
            }
            Err(_) => false,
        }
    }

    fn body_entity(&self, body: BodyId) -> Option<Entity> {
        Entity::from_bits(body.0).filter(|e| self.is_body_entity(*e))
    }

    fn is_body_entity(&self, entity: Entity) -> bool {
        self.world
            .entity(entity)
            .is_ok_and(|e| e.has::<RigidBody>() || e.has::<SoftBody>())
    }

    fn integrate_rigid_bodies(&mut self, dt: f32) {
        let gravity = self.gravity;
        let floor = self.floor;
        for (_, (pose, body)) in self.world.query_mut::<(&mut Pose, &mut RigidBody)>() {
            if body.motion == MotionType::Static || !body.active {
                continue;
            }
            if body.motion == MotionType::Dynamic {
                body.linear_velocity += gravity * body.gravity_factor * dt;
                body.linear_velocity *= (1.0 - body.linear_damping).powf(dt);
            }

            pose.location += body.linear_velocity * dt;
            if body.angular_velocity.length_squared() > 1e-12 {
                let spin = Quat::from_scaled_axis(body.angular_velocity * dt);
                pose.orientation = (spin * pose.orientation).normalize();
            }

            if let (Some(height), MotionType::Dynamic) = (floor, body.motion) {
                let bounds = world_bounds(&body.shape, pose);
                if bounds.min.y < height {
                    pose.location.y += height - bounds.min.y;
                    if body.linear_velocity.y < 0.0 {
                        body.linear_velocity.y = 0.0;
                    }
                    body.linear_velocity.x *= 0.9;
                    body.linear_velocity.z *= 0.9;
                    body.angular_velocity *= 0.9;
                }
            }

            let slow = body.linear_velocity.length() < SLEEP_SPEED
                && body.angular_velocity.length() < SLEEP_SPEED;
            if body.allow_sleeping && body.motion == MotionType::Dynamic && slow {
                body.sleep_timer += dt;
                if body.sleep_timer >= SLEEP_DELAY {
                    body.active = false;
                    body.linear_velocity = Vec3::ZERO;
                    body.angular_velocity = Vec3::ZERO;
                }
            } else {
                body.sleep_timer = 0.0;
            }
        }
    }

    fn integrate_soft_bodies(&mut self, dt: f32) {
        let gravity = self.gravity;
        let floor = self.floor;
        for (_, soft) in self.world.query_mut::<&mut SoftBody>() {
            for (position, velocity) in soft.positions.iter_mut().zip(&mut soft.velocities) {
                *velocity += gravity * dt;
                *position += *velocity * dt;
                if let Some(height) = floor {
                    if position.y < height {
                        position.y = height;
                        *velocity = Vec3::ZERO;
                    }
                }
            }
        }
    }

    fn update_characters(&mut self, dt: f32) {
        let floor = self.floor;
        let gravity = self.gravity;

        let supports: Vec<(Entity, bool)> = self
            .world
            .query::<&Character>()
            .iter()
            .map(|(e, c)| {
                let supported = floor.is_some_and(|height| {
                    self.world
                        .query_one::<(&Pose, &RigidBody)>(c.body)
                        .ok()
                        .and_then(|mut q| {
                            q.get()
                                .map(|(pose, b)| world_bounds(&b.shape, pose).min.y <= height + SUPPORT_EPSILON)
                        })
                        .unwrap_or(false)
                });
                (e, supported)
            })
            .collect();
        for (entity, supported) in supports {
            if let Ok(mut character) = self.world.get::<&mut Character>(entity) {
                character.supported = supported;
            }
        }

        for (_, character) in self.world.query_mut::<&mut VirtualCharacter>() {
            character.velocity += gravity * dt;
            character.pose.location += character.velocity * dt;
            character.supported = false;
            if let Some(height) = floor {
                let bounds = world_bounds(&character.shape, &character.pose);
                if bounds.min.y <= height + SUPPORT_EPSILON {
                    character.pose.location.y += (height - bounds.min.y).max(0.0);
                    character.velocity = Vec3::ZERO;
                    character.supported = true;
                }
            }
        }
    }
}

impl PhysicsSystem for PhysicsWorld {
    fn step_once(&mut self, timestep: f32) -> Result<(), StepError> {
        if let Some(message) = self.pending_failure.take() {
            return Err(StepError(message));
        }
        self.integrate_rigid_bodies(timestep);
        self.integrate_soft_bodies(timestep);
        self.update_characters(timestep);
        self.step_count += 1;
        self.elapsed += timestep;
        trace!(step = self.step_count, "Physics step");
        Ok(())
    }

    fn is_body_present(&self, body: BodyId) -> bool {
        self.body_entity(body).is_some()
    }

    fn is_constraint_present(&self, constraint: ConstraintId) -> bool {
        Entity::from_bits(constraint.0).is_some_and(|e| {
            self.world
                .entity(e)
                .is_ok_and(|e| e.has::<TwoBodyConstraint>() || e.has::<Vehicle>())
        })
    }

    fn body(&self, body: BodyId) -> Option<BodyInfo> {
        let entity = Entity::from_bits(body.0)?;
        let mut query = self.world.query_one::<(&Pose, &RigidBody)>(entity).ok()?;
        let (pose, b) = query.get()?;
        Some(BodyInfo {
            pose: *pose,
            shape: b.shape.clone(),
            motion: b.motion,
            is_sensor: b.is_sensor,
            is_active: b.active && b.motion != MotionType::Static,
            bounds: world_bounds(&b.shape, pose),
        })
    }

    fn soft_body(&self, body: BodyId) -> Option<SoftBodyInfo> {
        let entity = Entity::from_bits(body.0)?;
        let soft = self.world.get::<&SoftBody>(entity).ok()?;
        Some(SoftBodyInfo {
            positions: soft.positions.clone(),
            edges: soft.edges.clone(),
            bounds: Aabb::from_points(soft.positions.iter().copied()),
        })
    }

    fn character(&self, character: CharacterId) -> Option<CharacterInfo> {
        let entity = Entity::from_bits(character.0)?;
        let (body, supported) = {
            let c = self.world.get::<&Character>(entity).ok()?;
            (c.body, c.supported)
        };
        let info = self.body(BodyId(to_bits(body)))?;
        Some(CharacterInfo {
            pose: info.pose,
            shape: info.shape,
            is_supported: supported,
            bounds: info.bounds,
            body: Some(BodyId(to_bits(body))),
        })
    }

    fn virtual_character(&self, character: VirtualCharacterId) -> Option<CharacterInfo> {
        let entity = Entity::from_bits(character.0)?;
        let c = self.world.get::<&VirtualCharacter>(entity).ok()?;
        Some(CharacterInfo {
            pose: c.pose,
            shape: c.shape.clone(),
            is_supported: c.supported,
            bounds: world_bounds(&c.shape, &c.pose),
            body: None,
        })
    }

    fn constraint(&self, constraint: ConstraintId) -> Option<ConstraintInfo> {
        let entity = Entity::from_bits(constraint.0)?;
        let c = self.world.get::<&TwoBodyConstraint>(entity).ok()?;
        Some(ConstraintInfo {
            body1: BodyId(to_bits(c.body1)),
            body2: BodyId(to_bits(c.body2)),
            pivot1: c.pivot1,
            pivot2: c.pivot2,
        })
    }

    fn vehicle(&self, vehicle: ConstraintId) -> Option<VehicleInfo> {
        let entity = Entity::from_bits(vehicle.0)?;
        let v = self.world.get::<&Vehicle>(entity).ok()?;
        let pose = *self.world.get::<&Pose>(v.body).ok()?;
        // wheel axles run along the body's X axis
        let axle = pose.orientation * Quat::from_rotation_z(FRAC_PI_2);
        let wheels = v
            .wheels
            .iter()
            .map(|w| WheelInfo {
                pose: Pose::new(pose.transform_point(w.position), axle),
                radius: w.radius,
                width: w.width,
            })
            .collect();
        Some(VehicleInfo {
            body: BodyId(to_bits(v.body)),
            wheels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn falling_ball(world: &mut PhysicsWorld, y: f32) -> BodyId {
        world.add_body(
            BodySettings::new(ShapeRef::sphere(0.5), MotionType::Dynamic)
                .with_position(Vec3::new(0.0, y, 0.0)),
        )
    }

    #[test]
    fn test_gravity_moves_dynamic_bodies_only() {
        let mut world = PhysicsWorld::new();
        let ball = falling_ball(&mut world, 10.0);
        let ground = world.add_body(BodySettings::new(
            ShapeRef::cuboid(Vec3::new(10.0, 0.5, 10.0)),
            MotionType::Static,
        ));

        for _ in 0..10 {
            world.step_once(1.0 / 60.0).unwrap();
        }

        assert!(world.body_position(ball).unwrap().y < 10.0);
        assert_eq!(world.body_position(ground).unwrap(), Vec3::ZERO);
        assert!(!world.body(ground).unwrap().is_active);
        assert_eq!(world.step_count(), 10);
    }

    #[test]
    fn test_floor_stops_fall_and_body_sleeps() {
        let mut world = PhysicsWorld::new();
        world.set_floor(Some(0.0));
        let ball = falling_ball(&mut world, 1.0);

        for _ in 0..300 {
            world.step_once(1.0 / 60.0).unwrap();
        }

        let info = world.body(ball).unwrap();
        assert!((info.bounds.min.y - 0.0).abs() < 1e-3);
        assert!(!info.is_active);
    }

    #[test]
    fn test_remove_body_removes_attached_constraints() {
        let mut world = PhysicsWorld::new();
        let a = falling_ball(&mut world, 0.0);
        let b = falling_ball(&mut world, 2.0);
        let joint = world.add_constraint(a, b, Vec3::Y).unwrap();
        assert!(world.is_constraint_present(joint));

        let info = world.constraint(joint).unwrap();
        assert_eq!(info.pivot1, Vec3::Y);
        assert_eq!(info.pivot2, -Vec3::Y);

        assert!(world.remove_body(a));
        assert!(!world.is_body_present(a));
        assert!(world.is_body_present(b));
        assert!(!world.is_constraint_present(joint));
        assert!(!world.remove_body(a));
    }

    #[test]
    fn test_remove_body_removes_every_dependent() {
        let mut world = PhysicsWorld::new();
        let chassis = falling_ball(&mut world, 0.0);
        let left = falling_ball(&mut world, -2.0);
        let right = falling_ball(&mut world, 2.0);
        let joints = [
            world.add_constraint(left, chassis, Vec3::ZERO).unwrap(),
            world.add_constraint(chassis, right, Vec3::ZERO).unwrap(),
        ];
        let vehicle = world.add_vehicle(chassis, Vec::new()).unwrap();

        assert!(world.remove_body(chassis));
        for joint in joints {
            assert!(!world.is_constraint_present(joint));
        }
        assert!(!world.is_constraint_present(vehicle));
        assert!(world.is_body_present(left));
        assert!(world.is_body_present(right));
        assert_eq!(world.body_count(), 2);
    }

    #[test]
    fn test_stale_ids_stay_absent() {
        let mut world = PhysicsWorld::new();
        let a = falling_ball(&mut world, 0.0);
        world.remove_body(a);
        let b = falling_ball(&mut world, 0.0);
        assert_ne!(a, b);
        assert!(!world.is_body_present(a));
    }

    #[test]
    fn test_character_lands_and_is_supported() {
        let mut world = PhysicsWorld::new();
        world.set_floor(Some(0.0));
        let character = world.add_character(ShapeRef::capsule(0.5, 0.3), Vec3::new(0.0, 2.0, 0.0));
        assert!(!world.character(character).unwrap().is_supported);

        for _ in 0..120 {
            world.step_once(1.0 / 60.0).unwrap();
        }
        let info = world.character(character).unwrap();
        assert!(info.is_supported);

        let body = info.body.unwrap();
        assert!(world.remove_body(body));
        assert!(world.character(character).is_none());
    }

    #[test]
    fn test_virtual_character() {
        let mut world = PhysicsWorld::new();
        world.set_floor(Some(0.0));
        let character = world.add_virtual_character(ShapeRef::sphere(0.5), Vec3::new(0.0, 0.5, 0.0));
        world.step_once(1.0 / 60.0).unwrap();
        let info = world.virtual_character(character).unwrap();
        assert!(info.is_supported);
        assert!(info.body.is_none());
        assert!(world.remove_virtual_character(character));
        assert!(world.virtual_character(character).is_none());
    }

    #[test]
    fn test_soft_body_and_vehicle_queries() {
        let mut world = PhysicsWorld::new();
        let cloth = world.add_soft_body(vec![Vec3::ZERO, Vec3::X, Vec3::Z], vec![[0, 1], [1, 2], [2, 0]]);
        assert!(world.is_body_present(cloth));
        assert!(world.body(cloth).is_none());
        assert_eq!(world.soft_body(cloth).unwrap().edges.len(), 3);

        let chassis = falling_ball(&mut world, 1.0);
        let vehicle = world
            .add_vehicle(
                chassis,
                vec![WheelSettings {
                    position: Vec3::new(1.0, 0.0, 0.0),
                    radius: 0.4,
                    width: 0.2,
                }],
            )
            .unwrap();
        let info = world.vehicle(vehicle).unwrap();
        assert_eq!(info.body, chassis);
        assert_eq!(info.wheels[0].pose.location, Vec3::new(1.0, 1.0, 0.0));
        assert!(world.is_constraint_present(vehicle));
        assert!(world.constraint(vehicle).is_none());

        world.remove_all_bodies();
        assert_eq!(world.body_count(), 0);
        assert!(!world.is_constraint_present(vehicle));
    }

    #[test]
    fn test_injected_failure_happens_once() {
        let mut world = PhysicsWorld::new();
        world.fail_next_step("boom");
        assert!(world.step_once(0.01).is_err());
        assert!(world.step_once(0.01).is_ok());
        assert_eq!(world.step_count(), 1);
    }
}
