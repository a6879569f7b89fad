//! Seam between the synchronization layer and a concrete renderer
//!
//! The layer produces one [`DrawCommand`] per visible geometry per frame. A
//! backend decides when mesh data must be (re)uploaded: static meshes once,
//! dynamic meshes whenever their data revision changed.

use crate::graphics::buffer::BufferUsage;
use crate::graphics::material::{Material, MaterialUniform, RenderFlags};
use crate::graphics::mesh::{Mesh, Topology};
use crate::scene::geometry::GeometryId;
use glam::{Mat4, Vec4};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::trace;

/// Everything needed to draw one geometry
#[derive(Debug, Clone, Copy)]
pub struct DrawCommand<'a> {
    pub geometry: GeometryId,
    pub mesh: &'a Arc<Mesh>,
    pub model: Mat4,
    pub material: &'a Material,
    pub flags: RenderFlags,
}

pub trait RenderBackend {
    fn begin_frame(&mut self) {}

    fn draw(&mut self, command: DrawCommand<'_>);

    fn end_frame(&mut self) {}
}

/// What a [`RecordingBackend`] saw for one draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub geometry: GeometryId,
    pub topology: Topology,
    pub indexed_vertices: usize,
    pub model: Mat4,
    pub base_color: Vec4,
    pub depth_test: bool,
    /// Whether mesh data was uploaded for this draw
    pub uploaded: bool,
}

struct UploadedMesh {
    mesh: Weak<Mesh>,
    revision: u64,
}

/// Headless backend that records draws instead of rendering them
#[derive(Default)]
pub struct RecordingBackend {
    frames: u64,
    current: Vec<DrawRecord>,
    last_frame: Vec<DrawRecord>,
    uploads: HashMap<usize, UploadedMesh>,
    upload_count: u64,
    uploaded_bytes: u64,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws of the most recently completed frame, in submission order
    pub fn last_frame(&self) -> &[DrawRecord] {
        &self.last_frame
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn upload_count(&self) -> u64 {
        self.upload_count
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_bytes
    }

    /// Meshes currently resident
    pub fn resident_meshes(&self) -> usize {
        self.uploads.len()
    }

    fn upload_if_needed(&mut self, mesh: &Arc<Mesh>) -> bool {
        let key = Arc::as_ptr(mesh) as usize;
        let resident = self.uploads.get(&key).filter(|u| {
            u.mesh
                .upgrade()
                .is_some_and(|m| Arc::ptr_eq(&m, mesh))
        });
        let stale = match resident {
            None => true,
            Some(u) => mesh.usage() == BufferUsage::Dynamic && u.revision != mesh.revision(),
        };
        if !stale {
            return false;
        }

        let vertices = mesh.interleaved();
        let mut bytes = bytemuck::cast_slice::<_, u8>(&vertices).len();
        if let Some(indices) = mesh.indices() {
            bytes += indices.to_gpu_bytes().len();
        }
        self.uploads.insert(
            key,
            UploadedMesh {
                mesh: Arc::downgrade(mesh),
                revision: mesh.revision(),
            },
        );
        self.upload_count += 1;
        self.uploaded_bytes += bytes as u64;
        true
    }
}

impl RenderBackend for RecordingBackend {
    fn begin_frame(&mut self) {
        self.current.clear();
    }

    fn draw(&mut self, command: DrawCommand<'_>) {
        let uploaded = self.upload_if_needed(command.mesh);
        let uniform = MaterialUniform::from(command.material);
        trace!(geometry = %command.geometry, uploaded, "Recorded draw");
        self.current.push(DrawRecord {
            geometry: command.geometry,
            topology: command.mesh.topology(),
            indexed_vertices: command.mesh.count_indexed_vertices(),
            model: command.model,
            base_color: Vec4::from_array(uniform.base_color),
            depth_test: command.flags.depth_test,
            uploaded,
        });
    }

    fn end_frame(&mut self) {
        self.frames += 1;
        self.last_frame = std::mem::take(&mut self.current);
        // release data of meshes nobody holds anymore
        self.uploads.retain(|_, u| u.mesh.strong_count() > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn line() -> Mesh {
        Mesh::new(Topology::LineList, &[Vec3::ZERO, Vec3::X])
    }

    fn draw(backend: &mut RecordingBackend, mesh: &Arc<Mesh>) {
        let material = Material::default();
        backend.begin_frame();
        backend.draw(DrawCommand {
            geometry: GeometryId(1),
            mesh,
            model: Mat4::IDENTITY,
            material: &material,
            flags: RenderFlags::default(),
        });
        backend.end_frame();
    }

    #[test]
    fn test_static_mesh_uploads_once() {
        let mut backend = RecordingBackend::new();
        let mesh = Arc::new(line());

        draw(&mut backend, &mesh);
        draw(&mut backend, &mesh);

        assert_eq!(backend.upload_count(), 1);
        assert!(!backend.last_frame()[0].uploaded);
        assert_eq!(backend.frames(), 2);
    }

    #[test]
    fn test_dynamic_mesh_reuploads_on_change() {
        let mut backend = RecordingBackend::new();
        let mut mesh = line();
        mesh.set_dynamic();
        let mut mesh = Arc::new(mesh);

        draw(&mut backend, &mesh);
        draw(&mut backend, &mesh);
        assert_eq!(backend.upload_count(), 1);

        Arc::make_mut(&mut mesh).set_position(1, Vec3::Y);
        draw(&mut backend, &mesh);
        assert_eq!(backend.upload_count(), 2);
        assert!(backend.last_frame()[0].uploaded);
    }

    #[test]
    fn test_dropped_meshes_are_released() {
        let mut backend = RecordingBackend::new();
        let mesh = Arc::new(line());
        draw(&mut backend, &mesh);
        assert_eq!(backend.resident_meshes(), 1);

        drop(mesh);
        backend.begin_frame();
        backend.end_frame();
        assert_eq!(backend.resident_meshes(), 0);
    }
}
