//! Physics side of the layer
//!
//! [`PhysicsSystem`] is the seam to a physics engine. [`StepScheduler`] drives
//! it with fixed timesteps, and [`PhysicsWorld`] is a small ECS-backed
//! implementation used by tests and the demo.

pub mod scheduler;
pub mod shape;
pub mod system;
pub mod world;

// Re-export commonly used types
pub use scheduler::{StepScheduler, TickListener};
pub use shape::{Aabb, CompoundChild, Decoration, ShapeGeometry, ShapeId, ShapeRef, ShapeSubType, ShapeType};
pub use system::{
    BodyId, BodyInfo, CharacterId, CharacterInfo, ConstraintId, ConstraintInfo, MotionType,
    PhysicsSystem, Pose, SoftBodyInfo, StepError, VehicleInfo, VirtualCharacterId, WheelInfo,
};
pub use world::{BodySettings, PhysicsWorld, WheelSettings};
