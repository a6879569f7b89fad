//! Per-frame driver tying physics stepping to geometry rendering
//!
//! [`FrameContext`] owns everything the layer keeps between frames: the step
//! scheduler with its tick listeners, the mesh cache, the builtin mesh library
//! and the visible geometries. Each [`FrameContext::frame`] advances physics,
//! prunes geometries of removed entities, refreshes and draws the survivors,
//! and periodically purges dead cache entries.

use crate::cache::MeshCache;
use crate::config::{ConfigError, SyncConfig};
use crate::graphics::backend::{DrawCommand, RenderBackend};
use crate::graphics::material::colors;
use crate::graphics::mesh_library::{Axis, BuiltinMesh, MeshLibrary};
use crate::meshing::{MeshingError, MeshingStrategy};
use crate::physics::scheduler::{StepScheduler, TickListener};
use crate::physics::system::{BodyId, ConstraintId, PhysicsSystem, StepError};
use crate::scene::geometry::{links_mesh, Binding, ConstraintEnd, Geometry, GeometryError, GeometryId, PoseTarget};
use crate::scene::lifecycle::GeometryRegistry;
use glam::Vec4;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Meshing(#[from] MeshingError),
    #[error(transparent)]
    Step(#[from] StepError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("{0} is not part of the physics system")]
    UnknownEntity(String),
}

/// What happened during one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame number, starting at 1
    pub frame: u64,
    pub substeps: u32,
    /// Geometries hidden because their entity was removed
    pub pruned: usize,
    pub drawn: usize,
    /// Dead cache entries dropped by this frame's purge, if one ran
    pub evicted: usize,
}

pub struct FrameContext<P: PhysicsSystem + ?Sized> {
    config: SyncConfig,
    scheduler: StepScheduler<P>,
    cache: MeshCache,
    registry: GeometryRegistry,
    library: MeshLibrary,
    frame_count: u64,
    last_update: Option<Instant>,
}

impl<P: PhysicsSystem + ?Sized> FrameContext<P> {
    pub fn new(config: SyncConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let scheduler = StepScheduler::from_config(&config)?;
        info!(
            timestep = config.timestep,
            max_substeps = config.max_substeps,
            "Frame context created"
        );
        Ok(Self {
            config,
            scheduler,
            cache: MeshCache::new(),
            registry: GeometryRegistry::new(),
            library: MeshLibrary::new(),
            frame_count: 0,
            last_update: None,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &StepScheduler<P> {
        &self.scheduler
    }

    pub fn cache(&self) -> &MeshCache {
        &self.cache
    }

    pub fn geometries(&self) -> &GeometryRegistry {
        &self.registry
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn add_tick_listener(&mut self, listener: Box<dyn TickListener<P>>) {
        self.scheduler.add_tick_listener(listener);
    }

    /// Scale applied to wall-clock time before it reaches the scheduler
    pub fn physics_speed(&self) -> f32 {
        self.config.physics_speed
    }

    /// Set the physics speed; zero pauses the simulation
    pub fn set_physics_speed(&mut self, speed: f32) -> Result<(), ConfigError> {
        if !speed.is_finite() || speed < 0.0 {
            return Err(ConfigError::InvalidPhysicsSpeed(speed));
        }
        self.config.physics_speed = speed;
        debug!(speed, "Physics speed changed");
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.config.physics_speed == 0.0
    }

    /// Advance physics by `delta` wall-clock seconds, scaled by the physics speed
    pub fn update_physics(&mut self, system: &mut P, delta: f32) -> Result<u32, FrameError> {
        let scaled = delta * self.config.physics_speed;
        Ok(self.scheduler.advance(system, scaled)?)
    }

    /// Run one frame at time `now`
    ///
    /// The first frame only records the time; physics starts stepping on
    /// the second.
    pub fn frame(
        &mut self,
        system: &mut P,
        backend: &mut dyn RenderBackend,
        now: Instant,
    ) -> Result<FrameStats, FrameError> {
        let delta = self
            .last_update
            .map_or(0.0, |last| now.saturating_duration_since(last).as_secs_f32());
        self.last_update = Some(now);

        let substeps = self.update_physics(system, delta)?;
        let pruned = self.registry.prune_removed(&*system).len();

        backend.begin_frame();
        let mut drawn = 0;
        for geometry in self.registry.iter_mut() {
            geometry.update(&*system, &mut self.cache)?;
            geometry.freeze_static_mesh();
            if geometry.mesh().is_empty() {
                continue;
            }
            backend.draw(DrawCommand {
                geometry: geometry.id(),
                mesh: geometry.mesh(),
                model: geometry.model_matrix(),
                material: geometry.material(),
                flags: geometry.flags(),
            });
            drawn += 1;
        }
        backend.end_frame();

        self.frame_count += 1;
        let interval = u64::from(self.config.eviction_interval_frames);
        let evicted = if self.frame_count % interval == 0 {
            self.cache.purge()
        } else {
            0
        };

        let stats = FrameStats {
            frame: self.frame_count,
            substeps,
            pruned,
            drawn,
            evicted,
        };
        trace!(?stats, "Frame complete");
        Ok(stats)
    }

    /// Make a free-standing geometry visible
    pub fn add_geometry(&mut self, geometry: Geometry) -> Result<GeometryId, FrameError> {
        Ok(self.registry.make_visible(geometry)?)
    }

    pub fn hide(&mut self, id: GeometryId) -> Option<Geometry> {
        self.registry.hide(id)
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.registry.get(id)
    }

    pub fn geometry_mut(&mut self, id: GeometryId) -> Option<&mut Geometry> {
        self.registry.get_mut(id)
    }

    /// Shared builtin mesh
    pub fn builtin_mesh(&mut self, builtin: BuiltinMesh) -> Arc<crate::graphics::Mesh> {
        self.library.get(builtin)
    }

    /// Visualize the collision shape of a body or character
    pub fn visualize_shape(&mut self, system: &P, target: PoseTarget) -> Result<GeometryId, FrameError> {
        self.visualize_shape_with_uv_scale(system, target, 1.0)
    }

    pub fn visualize_shape_with_uv_scale(
        &mut self,
        system: &P,
        target: PoseTarget,
        uv_scale: f32,
    ) -> Result<GeometryId, FrameError> {
        let shape = match target {
            PoseTarget::Body(body) => system.body(body).map(|b| b.shape),
            PoseTarget::Character { character, .. } => system.character(character).map(|c| c.shape),
            PoseTarget::VirtualCharacter(character) => {
                system.virtual_character(character).map(|c| c.shape)
            }
        }
        .ok_or_else(|| FrameError::UnknownEntity(describe(&target)))?;

        let strategy = MeshingStrategy::for_shape(&shape, uv_scale);
        let (fingerprint, mesh) = self.cache.mesh_for(&shape, &strategy)?;
        let binding = match target {
            PoseTarget::Body(body) => Binding::BodyShape { body, fingerprint },
            PoseTarget::Character { character, body } => Binding::CharacterShape {
                character,
                body,
                fingerprint,
            },
            PoseTarget::VirtualCharacter(character) => Binding::VirtualCharacterShape {
                character,
                fingerprint,
            },
        };

        let mut geometry = Geometry::new(mesh, binding);
        geometry
            .set_automatic_color(true)
            .set_specular_color(colors::GRAY)
            .set_back_culling(shape.is_convex());
        self.show(system, geometry)
    }

    /// Visualize the local axes of `target`, or the world axes if `None`
    pub fn visualize_axes(
        &mut self,
        system: &P,
        target: Option<PoseTarget>,
        length: f32,
    ) -> Result<[GeometryId; 3], FrameError> {
        assert!(length >= 0.0, "axis length must be non-negative, got {length}");
        if let Some(t) = target {
            if t.pose(system).is_none() {
                return Err(FrameError::UnknownEntity(describe(&t)));
            }
        }
        let mut ids = [GeometryId(0); 3];
        for (slot, axis) in ids.iter_mut().zip(Axis::ALL) {
            let mesh = self.library.get(BuiltinMesh::Arrow(axis));
            let mut geometry = Geometry::new(mesh, Binding::LocalAxis { target, axis, length });
            geometry.set_color(axis_color(axis)).set_depth_test(false);
            *slot = self.show(system, geometry)?;
        }
        Ok(ids)
    }

    /// One geometry per wheel of a vehicle
    pub fn visualize_wheels(&mut self, system: &P, vehicle: ConstraintId) -> Result<Vec<GeometryId>, FrameError> {
        let info = system
            .vehicle(vehicle)
            .ok_or_else(|| FrameError::UnknownEntity(vehicle.to_string()))?;
        let mesh = self.library.get(BuiltinMesh::UnitCylinder);
        (0..info.wheels.len())
            .map(|wheel_index| {
                let geometry = Geometry::new(mesh.clone(), Binding::Wheel { vehicle, wheel_index });
                self.show(system, geometry)
            })
            .collect()
    }

    /// Edges of a soft body
    pub fn visualize_links(&mut self, system: &P, body: BodyId) -> Result<GeometryId, FrameError> {
        let soft = system
            .soft_body(body)
            .ok_or_else(|| FrameError::UnknownEntity(body.to_string()))?;
        let mut geometry = Geometry::new(Arc::new(links_mesh(&soft)), Binding::SoftBodyLinks { body });
        geometry.set_color(colors::ORANGE);
        self.show(system, geometry)
    }

    /// World-space bounding box of a body or character
    pub fn visualize_aabb(&mut self, system: &P, target: PoseTarget) -> Result<GeometryId, FrameError> {
        if target.bounds(system).is_none() {
            return Err(FrameError::UnknownEntity(describe(&target)));
        }
        let mesh = self.library.get(BuiltinMesh::BoxOutline);
        self.show(system, Geometry::new(mesh, Binding::BoundingBox { target }))
    }

    /// Arrows from each end body's center of mass to its pivot
    pub fn visualize_constraint(
        &mut self,
        system: &P,
        constraint: ConstraintId,
    ) -> Result<[GeometryId; 2], FrameError> {
        if system.constraint(constraint).is_none() {
            return Err(FrameError::UnknownEntity(constraint.to_string()));
        }
        let mesh = self.library.get(BuiltinMesh::Arrow(Axis::Z));
        let mut ids = [GeometryId(0); 2];
        for (slot, (end, color)) in ids
            .iter_mut()
            .zip([(ConstraintEnd::First, colors::GREEN), (ConstraintEnd::Second, colors::RED)])
        {
            let mut geometry = Geometry::new(mesh.clone(), Binding::ConstraintArrow { constraint, end });
            geometry.set_color(color);
            *slot = self.show(system, geometry)?;
        }
        Ok(ids)
    }

    /// Hide every geometry and drop all cached meshes
    pub fn shutdown(&mut self) {
        let hidden = self.registry.clear();
        self.cache.clear();
        info!(
            hidden = hidden.len(),
            frames = self.frame_count,
            substeps = self.scheduler.total_substeps(),
            "Frame context shut down"
        );
    }

    fn show(&mut self, system: &P, mut geometry: Geometry) -> Result<GeometryId, FrameError> {
        geometry.update(system, &mut self.cache)?;
        Ok(self.registry.make_visible(geometry)?)
    }
}

fn axis_color(axis: Axis) -> Vec4 {
    match axis {
        Axis::X => colors::RED,
        Axis::Y => colors::GREEN,
        Axis::Z => colors::BLUE,
    }
}

fn describe(target: &PoseTarget) -> String {
    match target {
        PoseTarget::Body(body) => body.to_string(),
        PoseTarget::Character { character, .. } => character.to_string(),
        PoseTarget::VirtualCharacter(character) => character.to_string(),
    }
}
