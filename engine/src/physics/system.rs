//! Interface to the physics simulation being visualized
//!
//! The synchronization layer never owns simulation state. Everything it needs
//! to know about bodies, characters, constraints and vehicles is queried
//! through [`PhysicsSystem`] once per frame.

use crate::physics::shape::{Aabb, ShapeRef};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

entity_id!(
    /// Rigid or soft body
    BodyId,
    "body"
);
entity_id!(
    /// Two-body constraint or vehicle constraint
    ConstraintId,
    "constraint"
);
entity_id!(
    /// Character backed by a physics body
    CharacterId,
    "character"
);
entity_id!(
    /// Character that exists outside the body set
    VirtualCharacterId,
    "virtual-character"
);

/// Failure reported by a single simulation step
#[derive(Debug, thiserror::Error)]
#[error("physics step failed: {0}")]
pub struct StepError(pub String);

/// Location and orientation of an entity's center of mass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub location: Vec3,
    pub orientation: Quat,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        location: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };

    pub fn new(location: Vec3, orientation: Quat) -> Self {
        Self {
            location,
            orientation,
        }
    }

    pub fn from_location(location: Vec3) -> Self {
        Self::new(location, Quat::IDENTITY)
    }

    /// Transform a point from the local frame into world space
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.location + self.orientation * local
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionType {
    Static,
    Kinematic,
    Dynamic,
}

/// Snapshot of a rigid body
#[derive(Debug, Clone)]
pub struct BodyInfo {
    pub pose: Pose,
    pub shape: ShapeRef,
    pub motion: MotionType,
    pub is_sensor: bool,
    pub is_active: bool,
    pub bounds: Aabb,
}

impl BodyInfo {
    pub fn is_dynamic(&self) -> bool {
        self.motion == MotionType::Dynamic
    }
}

/// Snapshot of a soft body's vertices (world space) and edges
#[derive(Debug, Clone, Default)]
pub struct SoftBodyInfo {
    pub positions: Vec<Vec3>,
    pub edges: Vec<[u32; 2]>,
    pub bounds: Option<Aabb>,
}

/// Snapshot of a character, body-backed or virtual
#[derive(Debug, Clone)]
pub struct CharacterInfo {
    pub pose: Pose,
    pub shape: ShapeRef,
    pub is_supported: bool,
    pub bounds: Aabb,
    /// Backing body, `None` for virtual characters
    pub body: Option<BodyId>,
}

/// Snapshot of a two-body constraint
///
/// Pivots are given relative to each body's center of mass, in that body's
/// local frame.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintInfo {
    pub body1: BodyId,
    pub body2: BodyId,
    pub pivot1: Vec3,
    pub pivot2: Vec3,
}

#[derive(Debug, Clone, Copy)]
pub struct WheelInfo {
    /// World pose of the wheel hub; the wheel's axle is its local Y axis
    pub pose: Pose,
    pub radius: f32,
    pub width: f32,
}

#[derive(Debug, Clone)]
pub struct VehicleInfo {
    pub body: BodyId,
    pub wheels: Vec<WheelInfo>,
}

/// Queries and stepping the visualizer needs from a physics engine
///
/// All queries return `None` (or `false`) for entities that are not, or no
/// longer, part of the system.
pub trait PhysicsSystem {
    /// Advance the simulation by exactly one fixed step
    fn step_once(&mut self, timestep: f32) -> Result<(), StepError>;

    fn is_body_present(&self, body: BodyId) -> bool;

    fn is_constraint_present(&self, constraint: ConstraintId) -> bool;

    fn body(&self, body: BodyId) -> Option<BodyInfo>;

    fn soft_body(&self, body: BodyId) -> Option<SoftBodyInfo>;

    fn character(&self, character: CharacterId) -> Option<CharacterInfo>;

    fn virtual_character(&self, character: VirtualCharacterId) -> Option<CharacterInfo>;

    fn constraint(&self, constraint: ConstraintId) -> Option<ConstraintInfo>;

    fn vehicle(&self, vehicle: ConstraintId) -> Option<VehicleInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_transform_point() {
        let pose = Pose::new(
            Vec3::new(1.0, 0.0, 0.0),
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        );
        let p = pose.transform_point(Vec3::X);
        assert!((p - Vec3::new(1.0, 0.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(BodyId(7).to_string(), "body#7");
        assert_eq!(VirtualCharacterId(2).to_string(), "virtual-character#2");
    }
}
