//! Mesh generation from collision shapes

pub mod attributes;
pub mod strategy;
pub mod tessellate;

use crate::graphics::mesh::{Mesh, Topology};
use crate::physics::shape::{ShapeId, ShapeRef};
use tracing::trace;

pub use strategy::{MeshingStrategy, NormalsOption, PositionsOption, UvsOption};

/// Errors that can occur while generating a mesh
#[derive(Debug, thiserror::Error)]
pub enum MeshingError {
    #[error("No mesh generator for {kind} shape {shape}")]
    UnsupportedShape { shape: ShapeId, kind: String },
    #[error("Shape {shape} references vertex {index} but has only {count} vertices")]
    IndexOutOfRange {
        shape: ShapeId,
        index: u32,
        count: usize,
    },
}

/// Generate a triangle mesh for `shape` and all of its children
pub fn generate_mesh(shape: &ShapeRef, strategy: &MeshingStrategy) -> Result<Mesh, MeshingError> {
    let list = tessellate::tessellate(shape, strategy.positions)?;

    let mut mesh = if strategy.normals == NormalsOption::Facet {
        let list = list.unshared();
        let mut mesh = Mesh::new(Topology::TriangleList, &list.positions);
        attach_attributes(&mut mesh, &list, strategy);
        mesh
    } else {
        let mut mesh = Mesh::new(Topology::TriangleList, &list.positions).with_indices(&list.indices);
        attach_attributes(&mut mesh, &list, strategy);
        mesh
    };
    mesh.make_immutable();

    trace!(
        shape_id = %shape.id(),
        strategy = %strategy,
        triangles = mesh.count_triangles(),
        "Generated shape mesh"
    );
    Ok(mesh)
}

fn attach_attributes(mesh: &mut Mesh, list: &tessellate::TriangleList, strategy: &MeshingStrategy) {
    if let Some(normals) = attributes::normals(list, strategy.normals) {
        mesh.set_normals(&normals);
    }
    if let Some(uvs) = attributes::uvs(&list.positions, strategy) {
        mesh.set_uvs(&uvs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_facet_mesh_is_unindexed() {
        let mesh = generate_mesh(&ShapeRef::cuboid(Vec3::ONE), &MeshingStrategy::default()).unwrap();
        assert!(mesh.indices().is_none());
        assert_eq!(mesh.vertex_count(), 36);
        assert_eq!(mesh.count_triangles(), 12);
        assert!(mesh.normals().is_some());
        assert!(mesh.uvs().is_none());
        assert!(!mesh.is_mutable());
    }

    #[test]
    fn test_smooth_mesh_is_indexed() {
        let strategy: MeshingStrategy = "low/Smooth".parse().unwrap();
        let mesh = generate_mesh(&ShapeRef::capsule(1.0, 0.5), &strategy).unwrap();
        assert!(mesh.indices().is_some());
        assert!(mesh.count_triangles() > 0);
    }

    #[test]
    fn test_sphere_strategy_adds_uvs() {
        let sphere = ShapeRef::sphere(1.0);
        let strategy = MeshingStrategy::for_shape(&sphere, 1.0);
        let mesh = generate_mesh(&sphere, &strategy).unwrap();
        assert!(mesh.uvs().is_some());
        assert_eq!(mesh.count_triangles(), 20 * 4usize.pow(3));
    }
}
