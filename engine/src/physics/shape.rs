//! Collision shape handles shared between the physics world and the visualizer
//!
//! A [`ShapeRef`] is a cheap, clonable handle. Its identity is stable for the
//! lifetime of the shape and its revision count is bumped every time the
//! shape geometry is modified through [`ShapeRef::modify`]. Compound and
//! decorated shapes hold handles to their children, so a child may be
//! modified without touching the parent's revision.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

static NEXT_SHAPE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a shape, stable for the shape's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapeId(pub u64);

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shape#{}", self.0)
    }
}

/// Broad classification of a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeType {
    Convex,
    Compound,
    Decorated,
    Mesh,
    Other,
}

/// Concrete kind of a shape, used to pick a default meshing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeSubType {
    Sphere,
    Box,
    Capsule,
    Cylinder,
    Plane,
    ConvexHull,
    TriangleMesh,
    Compound,
    Scaled,
    RotatedTranslated,
    OffsetCenterOfMass,
    Custom,
}

/// A child of a compound shape, placed relative to the compound's origin
#[derive(Debug, Clone)]
pub struct CompoundChild {
    pub shape: ShapeRef,
    pub position: Vec3,
    pub rotation: Quat,
}

impl CompoundChild {
    pub fn new(shape: ShapeRef, position: Vec3, rotation: Quat) -> Self {
        Self {
            shape,
            position,
            rotation,
        }
    }
}

/// How a decorated shape alters its single inner shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoration {
    /// Non-uniform scale applied to the inner shape
    Scaled(Vec3),
    /// Rigid offset of the inner shape
    RotatedTranslated { position: Vec3, rotation: Quat },
    /// Moves the center of mass; the inner shape shifts by the negated offset
    OffsetCenterOfMass(Vec3),
}

/// Geometry of a collision shape
#[derive(Debug, Clone)]
pub enum ShapeGeometry {
    Sphere {
        radius: f32,
    },
    Box {
        half_extents: Vec3,
    },
    /// Capsule aligned with the local Y axis
    Capsule {
        half_height: f32,
        radius: f32,
    },
    /// Cylinder aligned with the local Y axis
    Cylinder {
        half_height: f32,
        radius: f32,
    },
    /// Finite square patch of the plane `normal·p + constant = 0`
    Plane {
        normal: Vec3,
        constant: f32,
        half_extent: f32,
    },
    /// Convex polyhedron given as counter-clockwise face loops
    ConvexHull {
        points: Vec<Vec3>,
        faces: Vec<Vec<u32>>,
    },
    TriangleMesh {
        vertices: Vec<Vec3>,
        triangles: Vec<[u32; 3]>,
    },
    Compound {
        children: Vec<CompoundChild>,
    },
    Decorated {
        decoration: Decoration,
        inner: ShapeRef,
    },
    /// A user-defined shape the visualizer knows nothing about
    Custom {
        name: String,
    },
}

impl ShapeGeometry {
    pub fn sub_type(&self) -> ShapeSubType {
        match self {
            ShapeGeometry::Sphere { .. } => ShapeSubType::Sphere,
            ShapeGeometry::Box { .. } => ShapeSubType::Box,
            ShapeGeometry::Capsule { .. } => ShapeSubType::Capsule,
            ShapeGeometry::Cylinder { .. } => ShapeSubType::Cylinder,
            ShapeGeometry::Plane { .. } => ShapeSubType::Plane,
            ShapeGeometry::ConvexHull { .. } => ShapeSubType::ConvexHull,
            ShapeGeometry::TriangleMesh { .. } => ShapeSubType::TriangleMesh,
            ShapeGeometry::Compound { .. } => ShapeSubType::Compound,
            ShapeGeometry::Decorated { decoration, .. } => match decoration {
                Decoration::Scaled(_) => ShapeSubType::Scaled,
                Decoration::RotatedTranslated { .. } => ShapeSubType::RotatedTranslated,
                Decoration::OffsetCenterOfMass(_) => ShapeSubType::OffsetCenterOfMass,
            },
            ShapeGeometry::Custom { .. } => ShapeSubType::Custom,
        }
    }

    pub fn shape_type(&self) -> ShapeType {
        match self {
            ShapeGeometry::Sphere { .. }
            | ShapeGeometry::Box { .. }
            | ShapeGeometry::Capsule { .. }
            | ShapeGeometry::Cylinder { .. }
            | ShapeGeometry::ConvexHull { .. } => ShapeType::Convex,
            ShapeGeometry::TriangleMesh { .. } => ShapeType::Mesh,
            ShapeGeometry::Compound { .. } => ShapeType::Compound,
            ShapeGeometry::Decorated { .. } => ShapeType::Decorated,
            ShapeGeometry::Plane { .. } | ShapeGeometry::Custom { .. } => ShapeType::Other,
        }
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box centered on the origin with the given half extents
    pub fn from_half_extents(half_extents: Vec3) -> Self {
        Self {
            min: -half_extents,
            max: half_extents,
        }
    }

    /// Smallest box containing all the given points, or `None` if there are none
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| match acc {
            None => Some(Self::new(p, p)),
            Some(b) => Some(Self::new(b.min.min(p), b.max.max(p))),
        })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half extents of the box
    pub fn extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Bounds of this box after scaling, rotating, then translating it
    pub fn transformed(&self, scale: Vec3, rotation: Quat, translation: Vec3) -> Aabb {
        let corners = self.corners().map(|c| rotation * (c * scale) + translation);
        // eight corners, never empty
        Aabb::from_points(corners).unwrap_or(*self)
    }
}

struct ShapeCell {
    id: ShapeId,
    revision: AtomicU64,
    geometry: RwLock<ShapeGeometry>,
}

/// Shared handle to a collision shape
#[derive(Clone)]
pub struct ShapeRef(Arc<ShapeCell>);

impl ShapeRef {
    /// Create a new shape with a fresh identity and revision 0
    pub fn new(geometry: ShapeGeometry) -> Self {
        let id = ShapeId(NEXT_SHAPE_ID.fetch_add(1, Ordering::Relaxed));
        Self(Arc::new(ShapeCell {
            id,
            revision: AtomicU64::new(0),
            geometry: RwLock::new(geometry),
        }))
    }

    pub fn sphere(radius: f32) -> Self {
        Self::new(ShapeGeometry::Sphere { radius })
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::new(ShapeGeometry::Box { half_extents })
    }

    pub fn capsule(half_height: f32, radius: f32) -> Self {
        Self::new(ShapeGeometry::Capsule {
            half_height,
            radius,
        })
    }

    pub fn cylinder(half_height: f32, radius: f32) -> Self {
        Self::new(ShapeGeometry::Cylinder {
            half_height,
            radius,
        })
    }

    pub fn plane(normal: Vec3, constant: f32, half_extent: f32) -> Self {
        Self::new(ShapeGeometry::Plane {
            normal: normal.normalize_or(Vec3::Y),
            constant,
            half_extent,
        })
    }

    pub fn compound(children: Vec<CompoundChild>) -> Self {
        Self::new(ShapeGeometry::Compound { children })
    }

    pub fn scaled(inner: ShapeRef, scale: Vec3) -> Self {
        Self::new(ShapeGeometry::Decorated {
            decoration: Decoration::Scaled(scale),
            inner,
        })
    }

    pub fn rotated_translated(inner: ShapeRef, position: Vec3, rotation: Quat) -> Self {
        Self::new(ShapeGeometry::Decorated {
            decoration: Decoration::RotatedTranslated { position, rotation },
            inner,
        })
    }

    pub fn id(&self) -> ShapeId {
        self.0.id
    }

    /// Number of modifications made to this shape since it was created
    pub fn revision(&self) -> u64 {
        self.0.revision.load(Ordering::Acquire)
    }

    /// Read access to the shape geometry
    pub fn geometry(&self) -> RwLockReadGuard<'_, ShapeGeometry> {
        self.0
            .geometry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the shape geometry in place and bump the revision count
    ///
    /// Only this shape's revision changes; parents holding this shape as a
    /// child keep their own revision.
    pub fn modify<R>(&self, f: impl FnOnce(&mut ShapeGeometry) -> R) -> R {
        let mut geometry = self
            .0
            .geometry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let result = f(&mut *geometry);
        self.0.revision.fetch_add(1, Ordering::AcqRel);
        result
    }

    pub fn sub_type(&self) -> ShapeSubType {
        self.geometry().sub_type()
    }

    pub fn shape_type(&self) -> ShapeType {
        self.geometry().shape_type()
    }

    pub fn is_convex(&self) -> bool {
        self.shape_type() == ShapeType::Convex
    }

    /// Direct children: every sub-shape of a compound, or the inner shape of
    /// a decorated shape. Empty for simple shapes.
    pub fn children(&self) -> Vec<ShapeRef> {
        match &*self.geometry() {
            ShapeGeometry::Compound { children } => {
                children.iter().map(|c| c.shape.clone()).collect()
            }
            ShapeGeometry::Decorated { inner, .. } => vec![inner.clone()],
            _ => Vec::new(),
        }
    }

    /// Whether this is a compound or decorated shape
    pub fn is_composite(&self) -> bool {
        matches!(
            &*self.geometry(),
            ShapeGeometry::Compound { .. } | ShapeGeometry::Decorated { .. }
        )
    }

    /// Whether two handles refer to the same shape
    pub fn ptr_eq(&self, other: &ShapeRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Bounds of the shape in its own coordinate frame
    pub fn local_bounds(&self) -> Aabb {
        match &*self.geometry() {
            ShapeGeometry::Sphere { radius } => Aabb::from_half_extents(Vec3::splat(*radius)),
            ShapeGeometry::Box { half_extents } => Aabb::from_half_extents(*half_extents),
            ShapeGeometry::Capsule {
                half_height,
                radius,
            } => Aabb::from_half_extents(Vec3::new(*radius, half_height + radius, *radius)),
            ShapeGeometry::Cylinder {
                half_height,
                radius,
            } => Aabb::from_half_extents(Vec3::new(*radius, *half_height, *radius)),
            ShapeGeometry::Plane {
                normal,
                constant,
                half_extent,
            } => {
                let (u, v) = normal.any_orthonormal_pair();
                let center = -*normal * *constant;
                let corners = [
                    center + (u + v) * *half_extent,
                    center + (u - v) * *half_extent,
                    center - (u + v) * *half_extent,
                    center - (u - v) * *half_extent,
                ];
                Aabb::from_points(corners).unwrap_or(Aabb::new(center, center))
            }
            ShapeGeometry::ConvexHull { points, .. } => {
                Aabb::from_points(points.iter().copied()).unwrap_or(Aabb::new(Vec3::ZERO, Vec3::ZERO))
            }
            ShapeGeometry::TriangleMesh { vertices, .. } => Aabb::from_points(vertices.iter().copied())
                .unwrap_or(Aabb::new(Vec3::ZERO, Vec3::ZERO)),
            ShapeGeometry::Compound { children } => children
                .iter()
                .map(|c| {
                    c.shape
                        .local_bounds()
                        .transformed(Vec3::ONE, c.rotation, c.position)
                })
                .reduce(|a, b| a.union(&b))
                .unwrap_or(Aabb::new(Vec3::ZERO, Vec3::ZERO)),
            ShapeGeometry::Decorated { decoration, inner } => {
                let bounds = inner.local_bounds();
                match decoration {
                    Decoration::Scaled(scale) => bounds.transformed(*scale, Quat::IDENTITY, Vec3::ZERO),
                    Decoration::RotatedTranslated { position, rotation } => {
                        bounds.transformed(Vec3::ONE, *rotation, *position)
                    }
                    Decoration::OffsetCenterOfMass(offset) => {
                        Aabb::new(bounds.min - *offset, bounds.max - *offset)
                    }
                }
            }
            ShapeGeometry::Custom { .. } => Aabb::new(Vec3::ZERO, Vec3::ZERO),
        }
    }
}

impl fmt::Debug for ShapeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeRef")
            .field("id", &self.id())
            .field("revision", &self.revision())
            .field("sub_type", &self.sub_type())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes_get_distinct_ids() {
        let a = ShapeRef::sphere(1.0);
        let b = ShapeRef::sphere(1.0);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn test_modify_bumps_revision() {
        let shape = ShapeRef::sphere(1.0);
        assert_eq!(shape.revision(), 0);

        shape.modify(|g| {
            if let ShapeGeometry::Sphere { radius } = g {
                *radius = 2.0;
            }
        });

        assert_eq!(shape.revision(), 1);
        assert!(matches!(*shape.geometry(), ShapeGeometry::Sphere { radius } if radius == 2.0));
    }

    #[test]
    fn test_child_modification_leaves_parent_revision() {
        let child = ShapeRef::cuboid(Vec3::ONE);
        let parent = ShapeRef::compound(vec![CompoundChild::new(
            child.clone(),
            Vec3::ZERO,
            Quat::IDENTITY,
        )]);

        child.modify(|_| ());

        assert_eq!(child.revision(), 1);
        assert_eq!(parent.revision(), 0);
        assert!(parent.children()[0].ptr_eq(&child));
    }

    #[test]
    fn test_classification() {
        assert_eq!(ShapeRef::sphere(1.0).shape_type(), ShapeType::Convex);
        assert_eq!(ShapeRef::compound(vec![]).shape_type(), ShapeType::Compound);
        let scaled = ShapeRef::scaled(ShapeRef::sphere(1.0), Vec3::splat(2.0));
        assert_eq!(scaled.sub_type(), ShapeSubType::Scaled);
        assert!(scaled.is_composite());
        assert_eq!(scaled.children().len(), 1);
        assert!(!ShapeRef::sphere(1.0).is_composite());
    }

    #[test]
    fn test_local_bounds() {
        let capsule = ShapeRef::capsule(1.0, 0.5);
        let bounds = capsule.local_bounds();
        assert_eq!(bounds.max, Vec3::new(0.5, 1.5, 0.5));

        let compound = ShapeRef::compound(vec![
            CompoundChild::new(ShapeRef::sphere(1.0), Vec3::new(-2.0, 0.0, 0.0), Quat::IDENTITY),
            CompoundChild::new(ShapeRef::sphere(1.0), Vec3::new(2.0, 0.0, 0.0), Quat::IDENTITY),
        ]);
        let bounds = compound.local_bounds();
        assert_eq!(bounds.min.x, -3.0);
        assert_eq!(bounds.max.x, 3.0);
        assert_eq!(bounds.extent(), Vec3::new(3.0, 1.0, 1.0));
    }

    #[test]
    fn test_aabb_transformed() {
        let unit = Aabb::from_half_extents(Vec3::ONE);
        let moved = unit.transformed(Vec3::new(2.0, 1.0, 1.0), Quat::IDENTITY, Vec3::Y);
        assert_eq!(moved.center(), Vec3::Y);
        assert_eq!(moved.extent(), Vec3::new(2.0, 1.0, 1.0));
    }
}
