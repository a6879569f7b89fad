//! Mesh and vertex data structures
//!
//! A [`Mesh`] keeps each vertex attribute in its own [`VertexBuffer`] plus an
//! optional [`IndexBuffer`]. Backends that want a single interleaved stream
//! use [`Mesh::interleaved`], which produces [`Vertex`] values ready for
//! zero-copy upload.

use crate::graphics::buffer::{BufferUsage, IndexBuffer, VertexAttribute, VertexBuffer};
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Vertex data structure for GPU rendering
///
/// This struct is tightly packed for efficient GPU transfer using bytemuck.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in 3D space
    pub position: [f32; 3],
    /// Surface normal vector (normalized, or zero if the mesh has none)
    pub normal: [f32; 3],
    /// Texture coordinates (UV mapping)
    pub uv: [f32; 2],
}

impl Vertex {
    /// Create a new vertex with the given attributes
    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }

    /// Get the vertex attribute layout for wgpu
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // Position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // Normal
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // UV
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Primitive assembly mode of a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topology {
    PointList,
    LineList,
    TriangleList,
}

impl Topology {
    pub fn vertices_per_primitive(self) -> usize {
        match self {
            Topology::PointList => 1,
            Topology::LineList => 2,
            Topology::TriangleList => 3,
        }
    }

    pub fn to_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            Topology::PointList => wgpu::PrimitiveTopology::PointList,
            Topology::LineList => wgpu::PrimitiveTopology::LineList,
            Topology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        }
    }
}

/// Renderable mesh data
#[derive(Debug, Clone)]
pub struct Mesh {
    topology: Topology,
    positions: VertexBuffer,
    normals: Option<VertexBuffer>,
    uvs: Option<VertexBuffer>,
    indices: Option<IndexBuffer>,
    /// Bumped on every write, so backends can tell when to re-upload
    revision: u64,
}

impl Mesh {
    /// Create a non-indexed mesh from vertex positions
    pub fn new(topology: Topology, positions: &[Vec3]) -> Self {
        Self {
            topology,
            positions: VertexBuffer::from_vec3s(VertexAttribute::Position, positions),
            normals: None,
            uvs: None,
            indices: None,
            revision: 0,
        }
    }

    /// Add an index buffer sized to this mesh's vertex count
    pub fn with_indices(mut self, indices: &[u32]) -> Self {
        if self.vertex_count() > 0 {
            self.indices = Some(IndexBuffer::from_indices(self.vertex_count(), indices));
        }
        self
    }

    pub fn with_normals(mut self, normals: &[Vec3]) -> Self {
        self.set_normals(normals);
        self
    }

    pub fn with_uvs(mut self, uvs: &[Vec2]) -> Self {
        self.set_uvs(uvs);
        self
    }

    pub fn set_normals(&mut self, normals: &[Vec3]) {
        self.verify_mutable();
        assert_eq!(normals.len(), self.vertex_count(), "normal count mismatch");
        self.normals = Some(VertexBuffer::from_vec3s(VertexAttribute::Normal, normals));
        self.revision += 1;
    }

    pub fn set_uvs(&mut self, uvs: &[Vec2]) {
        self.verify_mutable();
        assert_eq!(uvs.len(), self.vertex_count(), "uv count mismatch");
        self.uvs = Some(VertexBuffer::from_vec2s(VertexAttribute::TexCoords, uvs));
        self.revision += 1;
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.vertex_count()
    }

    pub fn positions(&self) -> &VertexBuffer {
        &self.positions
    }

    /// Overwrite the position of one vertex
    pub fn set_position(&mut self, vertex: usize, position: Vec3) {
        self.positions.put3(vertex, position);
        self.revision += 1;
    }

    /// Overwrite all positions; the vertex count must not change
    pub fn set_positions(&mut self, positions: &[Vec3]) {
        assert_eq!(positions.len(), self.vertex_count(), "position count mismatch");
        for (vertex, position) in positions.iter().enumerate() {
            self.positions.put3(vertex, *position);
        }
        self.revision += 1;
    }

    pub fn normals(&self) -> Option<&VertexBuffer> {
        self.normals.as_ref()
    }

    pub fn uvs(&self) -> Option<&VertexBuffer> {
        self.uvs.as_ref()
    }

    pub fn indices(&self) -> Option<&IndexBuffer> {
        self.indices.as_ref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of vertices the draw call will submit
    pub fn count_indexed_vertices(&self) -> usize {
        self.indices
            .as_ref()
            .map_or(self.vertex_count(), IndexBuffer::len)
    }

    pub fn count_triangles(&self) -> usize {
        match self.topology {
            Topology::TriangleList => self.count_indexed_vertices() / 3,
            _ => 0,
        }
    }

    pub fn count_lines(&self) -> usize {
        match self.topology {
            Topology::LineList => self.count_indexed_vertices() / 2,
            _ => 0,
        }
    }

    /// A mesh with nothing to draw
    pub fn is_empty(&self) -> bool {
        self.count_indexed_vertices() == 0
    }

    pub fn usage(&self) -> BufferUsage {
        self.positions.usage()
    }

    pub fn is_mutable(&self) -> bool {
        self.positions.is_mutable()
    }

    /// Mark positions (and indices) for re-upload whenever they change
    pub fn set_dynamic(&mut self) {
        self.positions.set_dynamic();
        if let Some(indices) = &mut self.indices {
            indices.set_dynamic();
        }
    }

    /// Freeze every buffer; later writes panic
    pub fn make_immutable(&mut self) {
        self.positions.make_immutable();
        for buffer in [&mut self.normals, &mut self.uvs].into_iter().flatten() {
            buffer.make_immutable();
        }
        if let Some(indices) = &mut self.indices {
            indices.make_immutable();
        }
    }

    /// Vertex indices in draw order, synthesized for non-indexed meshes
    pub fn draw_order(&self) -> Vec<u32> {
        match &self.indices {
            Some(indices) => indices.to_u32_vec(),
            None => (0..self.vertex_count() as u32).collect(),
        }
    }

    /// Interleaved vertices; missing attributes are zero-filled
    pub fn interleaved(&self) -> Vec<Vertex> {
        (0..self.vertex_count())
            .map(|i| {
                let normal = self.normals.as_ref().map_or(Vec3::ZERO, |n| n.get3(i));
                let uv = self.uvs.as_ref().map_or(Vec2::ZERO, |t| t.get2(i));
                Vertex::new(
                    self.positions.get3(i).to_array(),
                    normal.to_array(),
                    uv.to_array(),
                )
            })
            .collect()
    }

    fn verify_mutable(&self) {
        assert!(self.is_mutable(), "mesh is no longer mutable");
    }
}
