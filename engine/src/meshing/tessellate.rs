//! Triangulation of collision shapes
//!
//! Produces indexed triangle lists in the shape's local frame. Attribute
//! generation (normals, UVs) happens afterwards in [`super::attributes`].

use crate::meshing::strategy::PositionsOption;
use crate::meshing::MeshingError;
use crate::physics::shape::{Decoration, ShapeGeometry, ShapeRef};
use glam::Vec3;
use std::collections::HashMap;
use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// Indexed triangle list, counter-clockwise when seen from outside
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleList {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl TriangleList {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Append another list, remapping its indices
    pub fn append(&mut self, other: TriangleList, transform: impl Fn(Vec3) -> Vec3) {
        let base = self.positions.len() as u32;
        self.positions
            .extend(other.positions.into_iter().map(transform));
        self.indices.extend(other.indices.into_iter().map(|i| i + base));
    }

    /// Duplicate vertices so that no two triangles share one
    pub fn unshared(&self) -> TriangleList {
        let positions: Vec<Vec3> = self
            .indices
            .iter()
            .map(|&i| self.positions[i as usize])
            .collect();
        let indices = (0..positions.len() as u32).collect();
        TriangleList { positions, indices }
    }

    fn map_positions(mut self, f: impl Fn(Vec3) -> Vec3) -> Self {
        for p in &mut self.positions {
            *p = f(*p);
        }
        self
    }
}

/// Segments around the axis of round shapes
fn round_segments(positions: PositionsOption) -> u32 {
    match positions {
        PositionsOption::Low => 16,
        PositionsOption::High => 32,
        PositionsOption::Subdivisions(n) => 4 << n.min(6),
    }
}

/// Cells along each side of a plane patch
fn plane_cells(positions: PositionsOption) -> u32 {
    match positions {
        PositionsOption::Low => 1,
        PositionsOption::High => 8,
        PositionsOption::Subdivisions(n) => 1 << n.min(6),
    }
}

/// Triangulate a shape and all of its children
pub fn tessellate(shape: &ShapeRef, positions: PositionsOption) -> Result<TriangleList, MeshingError> {
    let geometry = shape.geometry();
    let list = match &*geometry {
        ShapeGeometry::Sphere { radius } => match positions {
            PositionsOption::Subdivisions(n) => icosphere(*radius, n.min(6)),
            _ => {
                let sectors = round_segments(positions);
                uv_sphere(*radius, sectors, sectors / 2)
            }
        },
        ShapeGeometry::Box { half_extents } => cuboid(*half_extents),
        ShapeGeometry::Capsule {
            half_height,
            radius,
        } => capsule(*half_height, *radius, round_segments(positions)),
        ShapeGeometry::Cylinder {
            half_height,
            radius,
        } => cylinder(*half_height, *radius, round_segments(positions)),
        ShapeGeometry::Plane {
            normal,
            constant,
            half_extent,
        } => plane_patch(*normal, *constant, *half_extent, plane_cells(positions)),
        ShapeGeometry::ConvexHull { points, faces } => {
            let mut indices = Vec::new();
            for face in faces.iter().filter(|f| f.len() >= 3) {
                for k in 1..face.len() - 1 {
                    indices.extend_from_slice(&[face[0], face[k], face[k + 1]]);
                }
            }
            checked(shape, points.clone(), indices)?
        }
        ShapeGeometry::TriangleMesh {
            vertices,
            triangles,
        } => checked(
            shape,
            vertices.clone(),
            triangles.iter().flatten().copied().collect(),
        )?,
        ShapeGeometry::Compound { children } => {
            let mut merged = TriangleList::default();
            for child in children {
                let part = tessellate(&child.shape, positions)?;
                merged.append(part, |p| child.rotation * p + child.position);
            }
            merged
        }
        ShapeGeometry::Decorated { decoration, inner } => {
            let part = tessellate(inner, positions)?;
            match *decoration {
                Decoration::Scaled(scale) => scaled(part, scale),
                Decoration::RotatedTranslated { position, rotation } => {
                    part.map_positions(|p| rotation * p + position)
                }
                Decoration::OffsetCenterOfMass(offset) => part.map_positions(|p| p - offset),
            }
        }
        ShapeGeometry::Custom { name } => {
            return Err(MeshingError::UnsupportedShape {
                shape: shape.id(),
                kind: name.clone(),
            })
        }
    };
    Ok(list)
}

fn checked(shape: &ShapeRef, positions: Vec<Vec3>, indices: Vec<u32>) -> Result<TriangleList, MeshingError> {
    if let Some(&index) = indices.iter().find(|&&i| i as usize >= positions.len()) {
        return Err(MeshingError::IndexOutOfRange {
            shape: shape.id(),
            index,
            count: positions.len(),
        });
    }
    Ok(TriangleList { positions, indices })
}

/// Scale positions; a mirroring scale flips the winding back to counter-clockwise
fn scaled(list: TriangleList, scale: Vec3) -> TriangleList {
    let mirrored = scale.x * scale.y * scale.z < 0.0;
    let mut list = list.map_positions(|p| p * scale);
    if mirrored {
        for t in list.indices.chunks_exact_mut(3) {
            t.swap(1, 2);
        }
    }
    list
}

/// Surface of revolution around +Y from a `(radius, y)` profile listed bottom to top
fn lathe(profile: &[(f32, f32)], segments: u32) -> TriangleList {
    let segments = segments.max(3);
    let mut positions = Vec::with_capacity(profile.len() * segments as usize);
    for &(radius, y) in profile {
        for j in 0..segments {
            let angle = TAU * j as f32 / segments as f32;
            positions.push(Vec3::new(radius * angle.cos(), y, radius * angle.sin()));
        }
    }

    let mut indices = Vec::new();
    for ring in 0..profile.len().saturating_sub(1) as u32 {
        for j in 0..segments {
            let a = ring * segments + j;
            let b = ring * segments + (j + 1) % segments;
            let c = a + segments;
            let d = b + segments;
            // skip the triangle that collapses onto a pole
            if profile[ring as usize].0 != 0.0 {
                indices.extend_from_slice(&[a, c, b]);
            }
            if profile[ring as usize + 1].0 != 0.0 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
    TriangleList { positions, indices }
}

pub(crate) fn uv_sphere(radius: f32, sectors: u32, stacks: u32) -> TriangleList {
    let stacks = stacks.max(2);
    let profile: Vec<(f32, f32)> = (0..=stacks)
        .map(|i| {
            let latitude = -FRAC_PI_2 + PI * i as f32 / stacks as f32;
            let ring = if i == 0 || i == stacks { 0.0 } else { radius * latitude.cos() };
            (ring, radius * latitude.sin())
        })
        .collect();
    lathe(&profile, sectors)
}

pub(crate) fn capsule(half_height: f32, radius: f32, segments: u32) -> TriangleList {
    let cap_stacks = (segments / 4).max(2);
    let mut profile = Vec::new();
    for i in 0..=cap_stacks {
        let latitude = -FRAC_PI_2 + FRAC_PI_2 * i as f32 / cap_stacks as f32;
        let ring = if i == 0 { 0.0 } else { radius * latitude.cos() };
        profile.push((ring, -half_height + radius * latitude.sin()));
    }
    for i in 0..=cap_stacks {
        let latitude = FRAC_PI_2 * i as f32 / cap_stacks as f32;
        let ring = if i == cap_stacks { 0.0 } else { radius * latitude.cos() };
        profile.push((ring, half_height + radius * latitude.sin()));
    }
    lathe(&profile, segments)
}

pub(crate) fn cylinder(half_height: f32, radius: f32, segments: u32) -> TriangleList {
    lathe(
        &[
            (0.0, -half_height),
            (radius, -half_height),
            (radius, half_height),
            (0.0, half_height),
        ],
        segments,
    )
}

pub(crate) fn cuboid(half_extents: Vec3) -> TriangleList {
    // corner i has +x when bit 0 is set, +y for bit 1, +z for bit 2
    let positions = (0..8)
        .map(|i| {
            let sign = |bit: u32| if i & bit != 0 { 1.0 } else { -1.0 };
            Vec3::new(sign(1), sign(2), sign(4)) * half_extents
        })
        .collect();
    let quads: [[u32; 4]; 6] = [
        [0, 2, 3, 1], // -Z
        [4, 5, 7, 6], // +Z
        [0, 4, 6, 2], // -X
        [1, 3, 7, 5], // +X
        [0, 1, 5, 4], // -Y
        [2, 6, 7, 3], // +Y
    ];
    let indices = quads
        .iter()
        .flat_map(|q| [q[0], q[1], q[2], q[0], q[2], q[3]])
        .collect();
    TriangleList { positions, indices }
}

fn plane_patch(normal: Vec3, constant: f32, half_extent: f32, cells: u32) -> TriangleList {
    let (u, _) = normal.any_orthonormal_pair();
    let v = normal.cross(u);
    let center = -normal * constant;

    let side = cells + 1;
    let mut positions = Vec::with_capacity((side * side) as usize);
    for j in 0..side {
        for i in 0..side {
            let s = 2.0 * i as f32 / cells as f32 - 1.0;
            let t = 2.0 * j as f32 / cells as f32 - 1.0;
            positions.push(center + (u * s + v * t) * half_extent);
        }
    }

    let mut indices = Vec::with_capacity((cells * cells * 6) as usize);
    for j in 0..cells {
        for i in 0..cells {
            let a = j * side + i;
            let b = a + 1;
            let c = a + side + 1;
            let d = a + side;
            indices.extend_from_slice(&[a, b, c, a, c, d]);
        }
    }
    TriangleList { positions, indices }
}

fn icosphere(radius: f32, subdivisions: u8) -> TriangleList {
    let t = (1.0 + 5f32.sqrt()) / 2.0;
    let mut positions: Vec<Vec3> = [
        (-1.0, t, 0.0),
        (1.0, t, 0.0),
        (-1.0, -t, 0.0),
        (1.0, -t, 0.0),
        (0.0, -1.0, t),
        (0.0, 1.0, t),
        (0.0, -1.0, -t),
        (0.0, 1.0, -t),
        (t, 0.0, -1.0),
        (t, 0.0, 1.0),
        (-t, 0.0, -1.0),
        (-t, 0.0, 1.0),
    ]
    .into_iter()
    .map(|(x, y, z)| Vec3::new(x, y, z).normalize())
    .collect();

    let mut triangles: Vec<[u32; 3]> = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let mut midpoint = |a: u32, b: u32, positions: &mut Vec<Vec3>| -> u32 {
            let key = (a.min(b), a.max(b));
            *midpoints.entry(key).or_insert_with(|| {
                let m = (positions[a as usize] + positions[b as usize]).normalize();
                positions.push(m);
                positions.len() as u32 - 1
            })
        };
        let mut refined = Vec::with_capacity(triangles.len() * 4);
        for [a, b, c] in triangles {
            let ab = midpoint(a, b, &mut positions);
            let bc = midpoint(b, c, &mut positions);
            let ca = midpoint(c, a, &mut positions);
            refined.extend_from_slice(&[[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
        }
        triangles = refined;
    }

    TriangleList {
        positions: positions.into_iter().map(|p| p * radius).collect(),
        indices: triangles.into_iter().flatten().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::shape::CompoundChild;
    use glam::Quat;

    /// Signed volume; positive when every triangle winds outward
    fn signed_volume(list: &TriangleList) -> f32 {
        list.triangles()
            .map(|[a, b, c]| {
                let (a, b, c) = (
                    list.positions[a as usize],
                    list.positions[b as usize],
                    list.positions[c as usize],
                );
                a.dot(b.cross(c)) / 6.0
            })
            .sum()
    }

    #[test]
    fn test_cuboid_winds_outward() {
        let list = cuboid(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(list.positions.len(), 8);
        assert_eq!(list.triangle_count(), 12);
        assert!((signed_volume(&list) - 48.0).abs() < 1e-3);
    }

    #[test]
    fn test_round_shapes_wind_outward() {
        assert!(signed_volume(&uv_sphere(1.0, 16, 8)) > 3.0);
        assert!(signed_volume(&icosphere(1.0, 2)) > 3.0);
        assert!(signed_volume(&cylinder(1.0, 1.0, 16)) > 5.0);
        assert!(signed_volume(&capsule(1.0, 0.5, 16)) > 1.0);
    }

    #[test]
    fn test_icosphere_subdivision_counts() {
        assert_eq!(icosphere(1.0, 0).triangle_count(), 20);
        let refined = icosphere(2.0, 2);
        assert_eq!(refined.triangle_count(), 320);
        assert_eq!(refined.positions.len(), 162);
        for p in &refined.positions {
            assert!((p.length() - 2.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_plane_faces_its_normal() {
        let list = plane_patch(Vec3::Y, 0.0, 5.0, 2);
        assert_eq!(list.positions.len(), 9);
        assert_eq!(list.triangle_count(), 8);
        for [a, b, c] in list.triangles() {
            let (a, b, c) = (
                list.positions[a as usize],
                list.positions[b as usize],
                list.positions[c as usize],
            );
            assert!((b - a).cross(c - a).normalize().dot(Vec3::Y) > 0.99);
        }
    }

    #[test]
    fn test_compound_merges_children() {
        let child = ShapeRef::cuboid(Vec3::splat(0.5));
        let compound = ShapeRef::compound(vec![
            CompoundChild::new(child.clone(), Vec3::new(-2.0, 0.0, 0.0), Quat::IDENTITY),
            CompoundChild::new(child, Vec3::new(2.0, 0.0, 0.0), Quat::IDENTITY),
        ]);
        let list = tessellate(&compound, PositionsOption::Low).unwrap();
        assert_eq!(list.positions.len(), 16);
        assert_eq!(list.triangle_count(), 24);
        assert!(list.positions.iter().any(|p| p.x < -2.0));
        assert!(list.positions.iter().any(|p| p.x > 2.0));
        assert_eq!(*list.indices.iter().max().unwrap(), 15);
    }

    #[test]
    fn test_mirroring_scale_keeps_winding() {
        let mirrored = ShapeRef::scaled(ShapeRef::cuboid(Vec3::ONE), Vec3::new(-1.0, 1.0, 1.0));
        let list = tessellate(&mirrored, PositionsOption::Low).unwrap();
        assert!(signed_volume(&list) > 0.0);
    }

    #[test]
    fn test_hull_index_out_of_range() {
        let hull = ShapeRef::new(ShapeGeometry::ConvexHull {
            points: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            faces: vec![vec![0, 1, 3]],
        });
        let result = tessellate(&hull, PositionsOption::Low);
        assert!(matches!(
            result,
            Err(MeshingError::IndexOutOfRange { index: 3, count: 3, .. })
        ));
    }

    #[test]
    fn test_custom_shape_unsupported() {
        let custom = ShapeRef::new(ShapeGeometry::Custom {
            name: "heightfield".into(),
        });
        assert!(matches!(
            tessellate(&custom, PositionsOption::Low),
            Err(MeshingError::UnsupportedShape { .. })
        ));
    }
}
