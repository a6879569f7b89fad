//! Geometries mirroring physics entities and the set of visible ones

pub mod geometry;
pub mod lifecycle;

pub use geometry::{
    Binding, ConstraintEnd, Geometry, GeometryError, GeometryId, GeometryState, PoseTarget,
};
pub use lifecycle::GeometryRegistry;
