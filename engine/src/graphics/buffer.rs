//! CPU-side vertex and index buffers
//!
//! Buffers start out mutable. Once a mesh is shared (through the mesh cache
//! or the builtin library) it is made immutable, and any further write is a
//! programming error that panics.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// How often a buffer's contents are expected to change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BufferUsage {
    /// Uploaded once
    #[default]
    Static,
    /// Re-uploaded whenever modified
    Dynamic,
}

/// Vertex attribute stored in a [`VertexBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexAttribute {
    Position,
    Normal,
    TexCoords,
    Color,
}

/// Flat array of per-vertex floats
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBuffer {
    attribute: VertexAttribute,
    floats_per_vertex: usize,
    data: Vec<f32>,
    usage: BufferUsage,
    mutable: bool,
}

impl VertexBuffer {
    /// Zero-filled buffer for `vertex_count` vertices
    pub fn new(attribute: VertexAttribute, floats_per_vertex: usize, vertex_count: usize) -> Self {
        Self::from_floats(
            attribute,
            floats_per_vertex,
            vec![0.0; floats_per_vertex * vertex_count],
        )
    }

    pub fn from_floats(attribute: VertexAttribute, floats_per_vertex: usize, data: Vec<f32>) -> Self {
        assert!(
            (1..=4).contains(&floats_per_vertex),
            "floats per vertex must be between 1 and 4, got {floats_per_vertex}"
        );
        assert!(
            data.len() % floats_per_vertex == 0,
            "buffer length {} is not a multiple of {floats_per_vertex}",
            data.len()
        );
        Self {
            attribute,
            floats_per_vertex,
            data,
            usage: BufferUsage::Static,
            mutable: true,
        }
    }

    pub fn from_vec3s(attribute: VertexAttribute, values: &[Vec3]) -> Self {
        let data = values.iter().flat_map(|v| v.to_array()).collect();
        Self::from_floats(attribute, 3, data)
    }

    pub fn from_vec2s(attribute: VertexAttribute, values: &[Vec2]) -> Self {
        let data = values.iter().flat_map(|v| v.to_array()).collect();
        Self::from_floats(attribute, 2, data)
    }

    pub fn attribute(&self) -> VertexAttribute {
        self.attribute
    }

    pub fn floats_per_vertex(&self) -> usize {
        self.floats_per_vertex
    }

    pub fn vertex_count(&self) -> usize {
        self.data.len() / self.floats_per_vertex
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Read a 3-float vertex; missing components are zero
    pub fn get3(&self, vertex: usize) -> Vec3 {
        let mut out = [0.0; 3];
        let n = self.floats_per_vertex.min(3);
        let start = vertex * self.floats_per_vertex;
        out[..n].copy_from_slice(&self.data[start..start + n]);
        Vec3::from_array(out)
    }

    pub fn get2(&self, vertex: usize) -> Vec2 {
        let mut out = [0.0; 2];
        let n = self.floats_per_vertex.min(2);
        let start = vertex * self.floats_per_vertex;
        out[..n].copy_from_slice(&self.data[start..start + n]);
        Vec2::from_array(out)
    }

    pub fn put3(&mut self, vertex: usize, value: Vec3) {
        self.verify_mutable();
        assert_eq!(self.floats_per_vertex, 3, "not a 3-float buffer");
        let start = vertex * 3;
        self.data[start..start + 3].copy_from_slice(&value.to_array());
    }

    pub fn put2(&mut self, vertex: usize, value: Vec2) {
        self.verify_mutable();
        assert_eq!(self.floats_per_vertex, 2, "not a 2-float buffer");
        let start = vertex * 2;
        self.data[start..start + 2].copy_from_slice(&value.to_array());
    }

    /// Apply `f` to every 3-float vertex
    pub fn map3(&mut self, mut f: impl FnMut(Vec3) -> Vec3) {
        self.verify_mutable();
        assert_eq!(self.floats_per_vertex, 3, "not a 3-float buffer");
        for chunk in self.data.chunks_exact_mut(3) {
            let v = f(Vec3::new(chunk[0], chunk[1], chunk[2]));
            chunk.copy_from_slice(&v.to_array());
        }
    }

    pub fn set_dynamic(&mut self) {
        self.verify_mutable();
        self.usage = BufferUsage::Dynamic;
    }

    pub fn make_immutable(&mut self) {
        self.mutable = false;
    }

    fn verify_mutable(&self) {
        assert!(self.mutable, "{:?} buffer is no longer mutable", self.attribute);
    }
}

/// Width of the integers stored in an [`IndexBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexWidth {
    U8,
    U16,
    U32,
}

impl IndexWidth {
    /// Narrowest width able to address `max_vertices` vertices
    pub fn for_vertex_count(max_vertices: usize) -> Self {
        let last_index = max_vertices.saturating_sub(1);
        if last_index < (1 << 8) {
            IndexWidth::U8
        } else if last_index < (1 << 16) {
            IndexWidth::U16
        } else {
            IndexWidth::U32
        }
    }

    /// GPU index format; 8-bit indices are widened to 16 bits at upload
    pub fn to_wgpu(self) -> wgpu::IndexFormat {
        match self {
            IndexWidth::U8 | IndexWidth::U16 => wgpu::IndexFormat::Uint16,
            IndexWidth::U32 => wgpu::IndexFormat::Uint32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum IndexData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

/// Vertex indices stored in the narrowest integer type that fits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBuffer {
    data: IndexData,
    max_vertices: usize,
    usage: BufferUsage,
    mutable: bool,
}

impl IndexBuffer {
    /// Zero-filled buffer of `len` indices into a mesh of `max_vertices` vertices
    pub fn new(max_vertices: usize, len: usize) -> Self {
        assert!(max_vertices > 0, "index buffer needs at least one vertex");
        let data = match IndexWidth::for_vertex_count(max_vertices) {
            IndexWidth::U8 => IndexData::U8(vec![0; len]),
            IndexWidth::U16 => IndexData::U16(vec![0; len]),
            IndexWidth::U32 => IndexData::U32(vec![0; len]),
        };
        Self {
            data,
            max_vertices,
            usage: BufferUsage::Static,
            mutable: true,
        }
    }

    pub fn from_indices(max_vertices: usize, indices: &[u32]) -> Self {
        let mut buffer = Self::new(max_vertices, indices.len());
        for (position, &index) in indices.iter().enumerate() {
            buffer.put(position, index);
        }
        buffer
    }

    pub fn width(&self) -> IndexWidth {
        match self.data {
            IndexData::U8(_) => IndexWidth::U8,
            IndexData::U16(_) => IndexWidth::U16,
            IndexData::U32(_) => IndexWidth::U32,
        }
    }

    pub fn max_vertices(&self) -> usize {
        self.max_vertices
    }

    pub fn len(&self) -> usize {
        match &self.data {
            IndexData::U8(v) => v.len(),
            IndexData::U16(v) => v.len(),
            IndexData::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn get(&self, position: usize) -> u32 {
        match &self.data {
            IndexData::U8(v) => v[position] as u32,
            IndexData::U16(v) => v[position] as u32,
            IndexData::U32(v) => v[position],
        }
    }

    pub fn put(&mut self, position: usize, index: u32) {
        assert!(self.mutable, "index buffer is no longer mutable");
        assert!(
            (index as usize) < self.max_vertices,
            "index {index} out of range for {} vertices",
            self.max_vertices
        );
        // range-checked above, so the narrowing casts cannot truncate
        match &mut self.data {
            IndexData::U8(v) => v[position] = index as u8,
            IndexData::U16(v) => v[position] = index as u16,
            IndexData::U32(v) => v[position] = index,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    pub fn to_u32_vec(&self) -> Vec<u32> {
        self.iter().collect()
    }

    /// Raw bytes in GPU format, widening 8-bit indices to 16 bits
    pub fn to_gpu_bytes(&self) -> Vec<u8> {
        match &self.data {
            IndexData::U8(v) => {
                let widened: Vec<u16> = v.iter().map(|&i| i as u16).collect();
                bytemuck::cast_slice(&widened).to_vec()
            }
            IndexData::U16(v) => bytemuck::cast_slice(v).to_vec(),
            IndexData::U32(v) => bytemuck::cast_slice(v).to_vec(),
        }
    }

    pub fn set_dynamic(&mut self) {
        assert!(self.mutable, "index buffer is no longer mutable");
        self.usage = BufferUsage::Dynamic;
    }

    pub fn make_immutable(&mut self) {
        self.mutable = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_width_tiers() {
        assert_eq!(IndexWidth::for_vertex_count(1), IndexWidth::U8);
        assert_eq!(IndexWidth::for_vertex_count(256), IndexWidth::U8);
        assert_eq!(IndexWidth::for_vertex_count(257), IndexWidth::U16);
        assert_eq!(IndexWidth::for_vertex_count(65_536), IndexWidth::U16);
        assert_eq!(IndexWidth::for_vertex_count(65_537), IndexWidth::U32);
    }

    #[test]
    fn test_index_buffer_stores_and_reads_back() {
        let buffer = IndexBuffer::from_indices(300, &[0, 299, 17]);
        assert_eq!(buffer.width(), IndexWidth::U16);
        assert_eq!(buffer.to_u32_vec(), vec![0, 299, 17]);
        assert_eq!(buffer.to_gpu_bytes().len(), 6);
    }

    #[test]
    fn test_u8_indices_widen_for_gpu() {
        let buffer = IndexBuffer::from_indices(4, &[0, 1, 2, 2, 3, 0]);
        assert_eq!(buffer.width(), IndexWidth::U8);
        assert_eq!(buffer.width().to_wgpu(), wgpu::IndexFormat::Uint16);
        assert_eq!(buffer.to_gpu_bytes().len(), 12);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_index_out_of_range() {
        let mut buffer = IndexBuffer::new(3, 1);
        buffer.put(0, 3);
    }

    #[test]
    #[should_panic(expected = "no longer mutable")]
    fn test_immutable_index_buffer_rejects_writes() {
        let mut buffer = IndexBuffer::new(3, 1);
        buffer.make_immutable();
        buffer.put(0, 1);
    }

    #[test]
    fn test_vertex_buffer_put_and_get() {
        let mut buffer = VertexBuffer::new(VertexAttribute::Position, 3, 2);
        buffer.put3(1, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(buffer.get3(1), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(buffer.get3(0), Vec3::ZERO);
        assert_eq!(buffer.vertex_count(), 2);
        assert_eq!(buffer.as_bytes().len(), 24);
    }

    #[test]
    #[should_panic(expected = "floats per vertex")]
    fn test_vertex_buffer_rejects_wide_vertices() {
        VertexBuffer::new(VertexAttribute::Color, 5, 1);
    }

    #[test]
    #[should_panic(expected = "no longer mutable")]
    fn test_immutable_vertex_buffer_rejects_writes() {
        let mut buffer = VertexBuffer::from_vec3s(VertexAttribute::Normal, &[Vec3::Y]);
        buffer.make_immutable();
        buffer.put3(0, Vec3::X);
    }

    #[test]
    fn test_set_dynamic() {
        let mut buffer = VertexBuffer::from_vec2s(VertexAttribute::TexCoords, &[Vec2::ONE]);
        assert_eq!(buffer.usage(), BufferUsage::Static);
        buffer.set_dynamic();
        assert_eq!(buffer.usage(), BufferUsage::Dynamic);
        assert_eq!(buffer.get2(0), Vec2::ONE);
    }
}
