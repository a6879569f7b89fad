//! Renderable proxies for physics entities
//!
//! A [`Geometry`] owns its render state (mesh, material, flags, model
//! transform) and a [`Binding`] naming the physics entity it mirrors. Each
//! frame the binding pulls the entity's current pose, shape and status from
//! the [`PhysicsSystem`] and refreshes the render state accordingly.

use crate::cache::{MeshCache, ShapeFingerprint};
use crate::core::Transform;
use crate::graphics::buffer::BufferUsage;
use crate::graphics::material::{colors, Material, RenderFlags};
use crate::graphics::mesh::{Mesh, Topology};
use crate::graphics::mesh_library::Axis;
use crate::meshing::MeshingError;
use crate::physics::shape::{Aabb, ShapeRef};
use crate::physics::system::{
    BodyId, BodyInfo, CharacterId, CharacterInfo, ConstraintId, PhysicsSystem, Pose, SoftBodyInfo,
    VirtualCharacterId,
};
use glam::{Mat4, Quat, Vec3, Vec4};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

static NEXT_GEOMETRY_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub u64);

impl fmt::Display for GeometryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "geometry#{}", self.0)
    }
}

/// Lifecycle of a geometry: `Unattached → Visible → Hidden`, never back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryState {
    Unattached,
    Visible,
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("{0} has been hidden and cannot be made visible again")]
    Hidden(GeometryId),
    #[error("{0} is already visible")]
    AlreadyVisible(GeometryId),
}

/// Entity whose pose or bounds a decoration follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseTarget {
    Body(BodyId),
    /// A character, removed together with its backing body
    Character {
        character: CharacterId,
        body: BodyId,
    },
    VirtualCharacter(VirtualCharacterId),
}

impl PoseTarget {
    /// Target for a character, resolving its backing body
    pub fn character<P: PhysicsSystem + ?Sized>(system: &P, character: CharacterId) -> Option<Self> {
        let body = system.character(character)?.body?;
        Some(PoseTarget::Character { character, body })
    }

    pub fn was_removed_from<P: PhysicsSystem + ?Sized>(&self, system: &P) -> bool {
        match self {
            PoseTarget::Body(body) | PoseTarget::Character { body, .. } => {
                !system.is_body_present(*body)
            }
            PoseTarget::VirtualCharacter(_) => false,
        }
    }

    pub fn pose<P: PhysicsSystem + ?Sized>(&self, system: &P) -> Option<Pose> {
        match self {
            PoseTarget::Body(body) => system.body(*body).map(|b| b.pose),
            PoseTarget::Character { character, .. } => system.character(*character).map(|c| c.pose),
            PoseTarget::VirtualCharacter(character) => {
                system.virtual_character(*character).map(|c| c.pose)
            }
        }
    }

    pub fn bounds<P: PhysicsSystem + ?Sized>(&self, system: &P) -> Option<Aabb> {
        match self {
            PoseTarget::Body(body) => system
                .body(*body)
                .map(|b| b.bounds)
                .or_else(|| system.soft_body(*body).and_then(|s| s.bounds)),
            PoseTarget::Character { character, .. } => {
                system.character(*character).map(|c| c.bounds)
            }
            PoseTarget::VirtualCharacter(character) => {
                system.virtual_character(*character).map(|c| c.bounds)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintEnd {
    First,
    Second,
}

/// What a geometry visualizes
#[derive(Debug, Clone)]
pub enum Binding {
    /// Not tied to any entity; never removed automatically
    Floating,
    /// Shape of a rigid body (including vehicle bodies)
    BodyShape {
        body: BodyId,
        fingerprint: ShapeFingerprint,
    },
    CharacterShape {
        character: CharacterId,
        body: BodyId,
        fingerprint: ShapeFingerprint,
    },
    VirtualCharacterShape {
        character: VirtualCharacterId,
        fingerprint: ShapeFingerprint,
    },
    /// Edges of a soft body
    SoftBodyLinks { body: BodyId },
    /// Arrow from one end's center of mass to its pivot
    ConstraintArrow {
        constraint: ConstraintId,
        end: ConstraintEnd,
    },
    /// One axis of a local frame, or of the world frame if there is no target
    LocalAxis {
        target: Option<PoseTarget>,
        axis: Axis,
        length: f32,
    },
    /// World-space bounding box
    BoundingBox { target: PoseTarget },
    Wheel {
        vehicle: ConstraintId,
        wheel_index: usize,
    },
}

impl Binding {
    /// Whether the bound entity is gone from `system`
    pub fn was_removed_from<P: PhysicsSystem + ?Sized>(&self, system: &P) -> bool {
        match self {
            Binding::Floating | Binding::VirtualCharacterShape { .. } => false,
            Binding::BodyShape { body, .. }
            | Binding::CharacterShape { body, .. }
            | Binding::SoftBodyLinks { body } => !system.is_body_present(*body),
            Binding::ConstraintArrow { constraint, .. } => {
                !system.is_constraint_present(*constraint)
            }
            Binding::Wheel { vehicle, .. } => !system.is_constraint_present(*vehicle),
            Binding::LocalAxis { target, .. } => {
                target.is_some_and(|t| t.was_removed_from(system))
            }
            Binding::BoundingBox { target } => target.was_removed_from(system),
        }
    }
}

/// Color of a rigid body that has not been given an explicit one
pub fn body_color(info: &BodyInfo) -> Vec4 {
    if info.is_sensor {
        colors::YELLOW
    } else if info.is_dynamic() && info.is_active {
        colors::MAGENTA
    } else {
        colors::GRAY
    }
}

/// Color of a character that has not been given an explicit one
pub fn character_color(info: &CharacterInfo) -> Vec4 {
    if info.is_supported {
        colors::BROWN
    } else {
        colors::PINK
    }
}

/// Dynamic line-list mesh of a soft body's edges
pub fn links_mesh(soft: &SoftBodyInfo) -> Mesh {
    let indices: Vec<u32> = soft.edges.iter().flatten().copied().collect();
    let mut mesh = Mesh::new(Topology::LineList, &soft.positions).with_indices(&indices);
    mesh.set_dynamic();
    mesh
}

/// A renderable proxy
#[derive(Debug)]
pub struct Geometry {
    id: GeometryId,
    mesh: Arc<Mesh>,
    material: Material,
    flags: RenderFlags,
    transform: Transform,
    binding: Binding,
    state: GeometryState,
    automatic_color: bool,
}

impl Geometry {
    pub fn new(mesh: Arc<Mesh>, binding: Binding) -> Self {
        Self {
            id: GeometryId(NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed)),
            mesh,
            material: Material::default(),
            flags: RenderFlags::default(),
            transform: Transform::IDENTITY,
            binding,
            state: GeometryState::Unattached,
            automatic_color: false,
        }
    }

    /// Geometry not tied to any physics entity
    pub fn floating(mesh: Arc<Mesh>) -> Self {
        Self::new(mesh, Binding::Floating)
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn flags(&self) -> RenderFlags {
        self.flags
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn state(&self) -> GeometryState {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.state == GeometryState::Visible
    }

    pub fn has_automatic_color(&self) -> bool {
        self.automatic_color
    }

    pub fn model_matrix(&self) -> Mat4 {
        self.transform.to_matrix()
    }

    /// Set an explicit base color; disables automatic coloring
    pub fn set_color(&mut self, color: Vec4) -> &mut Self {
        self.material.base_color = color;
        self.automatic_color = false;
        self
    }

    /// Let the binding choose the base color from the entity's status
    pub fn set_automatic_color(&mut self, enable: bool) -> &mut Self {
        self.automatic_color = enable;
        self
    }

    pub fn set_specular_color(&mut self, color: Vec4) -> &mut Self {
        self.material.specular_color = color;
        self
    }

    pub fn set_alpha_discard_threshold(&mut self, threshold: f32) -> &mut Self {
        assert!((0.0..=1.0).contains(&threshold), "threshold out of range: {threshold}");
        self.material.alpha_discard_threshold = threshold;
        self
    }

    pub fn set_point_size(&mut self, size: f32) -> &mut Self {
        assert!(size.is_finite() && size > 0.0, "invalid point size: {size}");
        self.material.point_size = size;
        self
    }

    pub fn set_depth_test(&mut self, enable: bool) -> &mut Self {
        self.flags.depth_test = enable;
        self
    }

    pub fn set_back_culling(&mut self, enable: bool) -> &mut Self {
        self.flags.back_culling = enable;
        self
    }

    pub fn set_front_culling(&mut self, enable: bool) -> &mut Self {
        self.flags.front_culling = enable;
        self
    }

    pub fn set_wireframe(&mut self, enable: bool) -> &mut Self {
        self.flags.wireframe = enable;
        self
    }

    pub fn set_location(&mut self, location: Vec3) -> &mut Self {
        assert!(location.is_finite(), "non-finite location {location}");
        self.transform.position = location;
        self
    }

    pub fn set_orientation(&mut self, orientation: Quat) -> &mut Self {
        assert!(orientation.is_finite(), "non-finite orientation");
        self.transform.rotation = orientation.normalize();
        self
    }

    pub fn set_scale(&mut self, scale: Vec3) -> &mut Self {
        assert!(scale.is_finite(), "non-finite scale {scale}");
        self.transform.scale = scale;
        self
    }

    pub fn set_uniform_scale(&mut self, scale: f32) -> &mut Self {
        self.set_scale(Vec3::splat(scale))
    }

    /// Translate by `offset` in world space
    pub fn move_by(&mut self, offset: Vec3) -> &mut Self {
        let location = self.transform.position + offset;
        self.set_location(location)
    }

    /// Apply `rotation` after the current orientation
    pub fn rotate(&mut self, rotation: Quat) -> &mut Self {
        let orientation = rotation * self.transform.rotation;
        self.set_orientation(orientation)
    }

    pub fn reset_model_transform(&mut self) -> &mut Self {
        self.transform = Transform::IDENTITY;
        self
    }

    pub fn set_mesh(&mut self, mesh: Arc<Mesh>) -> &mut Self {
        self.mesh = mesh;
        self
    }

    pub fn was_removed_from<P: PhysicsSystem + ?Sized>(&self, system: &P) -> bool {
        self.binding.was_removed_from(system)
    }

    pub(crate) fn attach(&mut self) -> Result<(), GeometryError> {
        match self.state {
            GeometryState::Unattached => {
                self.state = GeometryState::Visible;
                Ok(())
            }
            GeometryState::Visible => Err(GeometryError::AlreadyVisible(self.id)),
            GeometryState::Hidden => Err(GeometryError::Hidden(self.id)),
        }
    }

    pub(crate) fn detach(&mut self) {
        self.state = GeometryState::Hidden;
    }

    /// Static meshes are uploaded once, so no writes are allowed after the
    /// first draw. Dynamic meshes stay writable.
    pub(crate) fn freeze_static_mesh(&mut self) {
        if self.mesh.usage() == BufferUsage::Static && self.mesh.is_mutable() {
            Arc::make_mut(&mut self.mesh).make_immutable();
        }
    }

    /// Pull the bound entity's current state into color, mesh and transform
    ///
    /// Entities missing from `system` leave the geometry untouched.
    pub fn update<P: PhysicsSystem + ?Sized>(
        &mut self,
        system: &P,
        cache: &mut MeshCache,
    ) -> Result<(), MeshingError> {
        match &mut self.binding {
            Binding::Floating => {}
            Binding::BodyShape { body, fingerprint } => {
                if let Some(info) = system.body(*body) {
                    if self.automatic_color {
                        self.material.base_color = body_color(&info);
                    }
                    refresh_mesh(&mut self.mesh, fingerprint, &info.shape, cache)?;
                    self.transform = pose_transform(info.pose);
                }
            }
            Binding::CharacterShape {
                character,
                fingerprint,
                ..
            } => {
                if let Some(info) = system.character(*character) {
                    if self.automatic_color {
                        self.material.base_color = character_color(&info);
                    }
                    refresh_mesh(&mut self.mesh, fingerprint, &info.shape, cache)?;
                    self.transform = pose_transform(info.pose);
                }
            }
            Binding::VirtualCharacterShape {
                character,
                fingerprint,
            } => {
                if let Some(info) = system.virtual_character(*character) {
                    if self.automatic_color {
                        self.material.base_color = character_color(&info);
                    }
                    refresh_mesh(&mut self.mesh, fingerprint, &info.shape, cache)?;
                    self.transform = pose_transform(info.pose);
                }
            }
            Binding::SoftBodyLinks { body } => {
                if let Some(soft) = system.soft_body(*body) {
                    let same_counts = self.mesh.vertex_count() == soft.positions.len()
                        && self.mesh.count_lines() == soft.edges.len();
                    if same_counts && self.mesh.is_mutable() {
                        Arc::make_mut(&mut self.mesh).set_positions(&soft.positions);
                    } else {
                        debug!(geometry = %self.id, body = %body, "Rebuilding soft body links mesh");
                        self.mesh = Arc::new(links_mesh(&soft));
                    }
                }
            }
            Binding::ConstraintArrow { constraint, end } => {
                let end_body = system.constraint(*constraint).map(|c| match end {
                    ConstraintEnd::First => (c.body1, c.pivot1),
                    ConstraintEnd::Second => (c.body2, c.pivot2),
                });
                if let Some((info, pivot)) =
                    end_body.and_then(|(body, pivot)| Some((system.body(body)?, pivot)))
                {
                    let offset = info.pose.orientation * pivot;
                    let length = offset.length();
                    self.transform.position = info.pose.location;
                    self.transform.scale = Vec3::splat(length);
                    if length > 0.0 {
                        self.transform.rotation = Quat::from_rotation_arc(Vec3::Z, offset / length);
                    }
                }
            }
            Binding::LocalAxis { target, length, .. } => {
                if let Some(pose) = target.and_then(|t| t.pose(system)) {
                    self.transform.position = pose.location;
                    self.transform.rotation = pose.orientation;
                }
                self.transform.scale = Vec3::splat(*length);
            }
            Binding::BoundingBox { target } => {
                if let Some(bounds) = target.bounds(system) {
                    self.transform = Transform {
                        position: bounds.center(),
                        rotation: Quat::IDENTITY,
                        scale: bounds.extent(),
                    };
                }
            }
            Binding::Wheel {
                vehicle,
                wheel_index,
            } => {
                let wheel = system
                    .vehicle(*vehicle)
                    .and_then(|v| v.wheels.get(*wheel_index).copied());
                if let Some(wheel) = wheel {
                    self.transform = Transform {
                        position: wheel.pose.location,
                        rotation: wheel.pose.orientation,
                        scale: Vec3::new(wheel.radius, wheel.width * 0.5, wheel.radius),
                    };
                }
            }
        }
        Ok(())
    }
}

fn pose_transform(pose: Pose) -> Transform {
    Transform::from_position_rotation(pose.location, pose.orientation)
}

/// Swap in a fresh mesh when the shape no longer matches its fingerprint
fn refresh_mesh(
    mesh: &mut Arc<Mesh>,
    fingerprint: &mut ShapeFingerprint,
    shape: &ShapeRef,
    cache: &mut MeshCache,
) -> Result<(), MeshingError> {
    if fingerprint.matches(shape) {
        return Ok(());
    }
    let strategy = *fingerprint.strategy();
    let (current, fresh) = cache.mesh_for(shape, &strategy)?;
    debug!(
        shape_id = %shape.id(),
        revision = current.revision(),
        "Shape changed, replacing mesh"
    );
    *fingerprint = current;
    *mesh = fresh;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::system::MotionType;

    fn body_info(motion: MotionType, is_sensor: bool, is_active: bool) -> BodyInfo {
        BodyInfo {
            pose: Pose::IDENTITY,
            shape: ShapeRef::sphere(1.0),
            motion,
            is_sensor,
            is_active,
            bounds: Aabb::from_half_extents(Vec3::ONE),
        }
    }

    fn empty_mesh() -> Arc<Mesh> {
        Arc::new(Mesh::new(Topology::LineList, &[]))
    }

    #[test]
    fn test_automatic_body_colors() {
        assert_eq!(body_color(&body_info(MotionType::Dynamic, true, true)), colors::YELLOW);
        assert_eq!(body_color(&body_info(MotionType::Dynamic, false, true)), colors::MAGENTA);
        assert_eq!(body_color(&body_info(MotionType::Dynamic, false, false)), colors::GRAY);
        assert_eq!(body_color(&body_info(MotionType::Static, false, true)), colors::GRAY);
    }

    #[test]
    fn test_state_transitions_are_one_way() {
        let mut geometry = Geometry::floating(empty_mesh());
        assert_eq!(geometry.state(), GeometryState::Unattached);

        geometry.attach().unwrap();
        assert!(geometry.is_visible());
        assert_eq!(geometry.attach(), Err(GeometryError::AlreadyVisible(geometry.id())));

        geometry.detach();
        assert_eq!(geometry.state(), GeometryState::Hidden);
        assert_eq!(geometry.attach(), Err(GeometryError::Hidden(geometry.id())));
    }

    #[test]
    fn test_explicit_color_disables_automatic_color() {
        let mut geometry = Geometry::floating(empty_mesh());
        geometry.set_automatic_color(true).set_color(colors::BLUE);
        assert!(!geometry.has_automatic_color());
        assert_eq!(geometry.material().base_color, colors::BLUE);
    }

    #[test]
    fn test_transform_setters() {
        let mut geometry = Geometry::floating(empty_mesh());
        geometry
            .set_location(Vec3::X)
            .move_by(Vec3::Y)
            .set_uniform_scale(2.0)
            .rotate(Quat::from_rotation_z(1.0));
        assert_eq!(geometry.transform().position, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(geometry.transform().scale, Vec3::splat(2.0));

        geometry.reset_model_transform();
        assert_eq!(geometry.model_matrix(), Mat4::IDENTITY);
    }

    #[test]
    #[should_panic(expected = "non-finite location")]
    fn test_rejects_non_finite_location() {
        Geometry::floating(empty_mesh()).set_location(Vec3::NAN);
    }

    #[test]
    fn test_links_mesh_is_dynamic_line_list() {
        let soft = SoftBodyInfo {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            edges: vec![[0, 1], [1, 2]],
            bounds: None,
        };
        let mesh = links_mesh(&soft);
        assert_eq!(mesh.topology(), Topology::LineList);
        assert_eq!(mesh.count_lines(), 2);
        assert_eq!(mesh.usage(), crate::graphics::buffer::BufferUsage::Dynamic);
    }

    #[test]
    fn test_floating_geometry_is_never_removed() {
        struct Empty;
        impl PhysicsSystem for Empty {
            fn step_once(&mut self, _: f32) -> Result<(), crate::physics::system::StepError> {
                Ok(())
            }
            fn is_body_present(&self, _: BodyId) -> bool {
                false
            }
            fn is_constraint_present(&self, _: ConstraintId) -> bool {
                false
            }
            fn body(&self, _: BodyId) -> Option<BodyInfo> {
                None
            }
            fn soft_body(&self, _: BodyId) -> Option<SoftBodyInfo> {
                None
            }
            fn character(&self, _: CharacterId) -> Option<CharacterInfo> {
                None
            }
            fn virtual_character(&self, _: VirtualCharacterId) -> Option<CharacterInfo> {
                None
            }
            fn constraint(&self, _: ConstraintId) -> Option<crate::physics::system::ConstraintInfo> {
                None
            }
            fn vehicle(&self, _: ConstraintId) -> Option<crate::physics::system::VehicleInfo> {
                None
            }
        }

        let floating = Geometry::floating(empty_mesh());
        assert!(!floating.was_removed_from(&Empty));

        let world_axis = Geometry::new(
            empty_mesh(),
            Binding::LocalAxis {
                target: None,
                axis: Axis::X,
                length: 1.0,
            },
        );
        assert!(!world_axis.was_removed_from(&Empty));

        let body_axis = Geometry::new(
            empty_mesh(),
            Binding::LocalAxis {
                target: Some(PoseTarget::Body(BodyId(3))),
                axis: Axis::X,
                length: 1.0,
            },
        );
        assert!(body_axis.was_removed_from(&Empty));

        let virtual_box = Geometry::new(
            empty_mesh(),
            Binding::BoundingBox {
                target: PoseTarget::VirtualCharacter(VirtualCharacterId(1)),
            },
        );
        assert!(!virtual_box.was_removed_from(&Empty));
    }
}
