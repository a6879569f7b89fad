//! Library of builtin decoration meshes
//!
//! These meshes do not depend on any shape, so each is generated once, made
//! immutable and shared by every geometry that uses it.

use crate::graphics::mesh::{Mesh, Topology};
use crate::meshing::tessellate;
use crate::meshing::{attributes, NormalsOption};
use glam::Vec3;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Coordinate axis of a local frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }
}

/// Builtin meshes available to every geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinMesh {
    /// Unit-length arrow from the origin along an axis (line list)
    Arrow(Axis),
    /// Edges of the cube spanning -1..1 on every axis (line list)
    BoxOutline,
    /// Smooth-shaded cylinder along Y with radius 1 and half height 1
    UnitCylinder,
    /// Two unit lines crossing at the origin in the XY plane (line list)
    Crosshairs,
}

/// Lazily populated set of builtin meshes
#[derive(Debug, Default)]
pub struct MeshLibrary {
    meshes: HashMap<BuiltinMesh, Arc<Mesh>>,
}

impl MeshLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a builtin mesh, generating it on first use
    pub fn get(&mut self, builtin: BuiltinMesh) -> Arc<Mesh> {
        self.meshes
            .entry(builtin)
            .or_insert_with(|| {
                debug!(mesh = ?builtin, "Generating builtin mesh");
                let mut mesh = match builtin {
                    BuiltinMesh::Arrow(axis) => arrow(axis),
                    BuiltinMesh::BoxOutline => box_outline(),
                    BuiltinMesh::UnitCylinder => unit_cylinder(),
                    BuiltinMesh::Crosshairs => crosshairs(),
                };
                mesh.make_immutable();
                Arc::new(mesh)
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

fn arrow(axis: Axis) -> Mesh {
    let tip = axis.unit();
    // barbs lie in the plane of the axis and the next axis around
    let side = Vec3::new(tip.z, tip.x, tip.y);
    let positions = [
        Vec3::ZERO,
        tip,
        tip * 0.9 + side * 0.05,
        tip * 0.9 - side * 0.05,
    ];
    Mesh::new(Topology::LineList, &positions).with_indices(&[0, 1, 1, 2, 1, 3])
}

fn box_outline() -> Mesh {
    let corners: Vec<Vec3> = (0..8u32)
        .map(|i| {
            let sign = |bit: u32| if i & bit != 0 { 1.0 } else { -1.0 };
            Vec3::new(sign(1), sign(2), sign(4))
        })
        .collect();
    // corners differing in exactly one bit share an edge
    let mut indices = Vec::with_capacity(24);
    for a in 0..8u32 {
        for bit in [1, 2, 4] {
            if a & bit == 0 {
                indices.extend_from_slice(&[a, a | bit]);
            }
        }
    }
    Mesh::new(Topology::LineList, &corners).with_indices(&indices)
}

fn unit_cylinder() -> Mesh {
    let list = tessellate::cylinder(1.0, 1.0, 24);
    let normals = attributes::normals(&list, NormalsOption::Smooth).unwrap_or_default();
    Mesh::new(Topology::TriangleList, &list.positions)
        .with_indices(&list.indices)
        .with_normals(&normals)
}

fn crosshairs() -> Mesh {
    let positions = [-Vec3::X, Vec3::X, -Vec3::Y, Vec3::Y];
    Mesh::new(Topology::LineList, &positions)
}

/// Line from `start` to `end` split into `segments` equal pieces
pub fn divided_line(start: Vec3, end: Vec3, segments: u32) -> Mesh {
    let segments = segments.max(1);
    let positions: Vec<Vec3> = (0..=segments)
        .map(|i| start.lerp(end, i as f32 / segments as f32))
        .collect();
    let indices: Vec<u32> = (0..segments).flat_map(|i| [i, i + 1]).collect();
    Mesh::new(Topology::LineList, &positions).with_indices(&indices)
}
