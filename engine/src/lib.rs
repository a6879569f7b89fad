//! Physics-to-render synchronization layer
//!
//! This crate keeps a renderer in step with a rigid-body simulation: a
//! fixed-timestep scheduler drives the physics, a weakly-held cache turns
//! collision shapes into meshes, and a registry of geometries mirrors physics
//! entities, hiding each one once its entity is gone.

pub mod cache;
pub mod config;
pub mod core;
pub mod frame;
pub mod graphics;
pub mod meshing;
pub mod physics;
pub mod scene;

// Re-export commonly used types
pub mod prelude {
    // Frame loop
    pub use crate::frame::{FrameContext, FrameError, FrameStats};

    // Config types
    pub use crate::config::{ConfigError, SyncConfig};

    // Math types
    pub use crate::core::Transform;
    pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

    // Graphics types
    pub use crate::graphics::{
        colors, Axis, BuiltinMesh, DrawCommand, Material, Mesh, RecordingBackend, RenderBackend,
        RenderFlags, Topology, Vertex,
    };

    // Meshing and caching
    pub use crate::cache::{MeshCache, ShapeFingerprint};
    pub use crate::meshing::{MeshingError, MeshingStrategy, NormalsOption, PositionsOption, UvsOption};

    // Physics types
    pub use crate::physics::{
        BodyId, BodySettings, CharacterId, CompoundChild, ConstraintId, MotionType, PhysicsSystem,
        PhysicsWorld, Pose, ShapeRef, StepError, StepScheduler, TickListener, VirtualCharacterId,
        WheelSettings,
    };

    // Scene types
    pub use crate::scene::{Binding, Geometry, GeometryId, GeometryRegistry, GeometryState, PoseTarget};

    pub use wgpu;
}

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn";

/// Initialize logging for the engine
pub fn init_logging() {
    init_logging_with_filter(DEFAULT_LOG_FILTER);
}

/// Initialize logging, falling back to `filter` when `RUST_LOG` is unset
pub fn init_logging_with_filter(filter: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
