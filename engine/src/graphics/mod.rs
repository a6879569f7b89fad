//! Graphics module
//!
//! Renderer-facing data: buffers, meshes, materials, the builtin mesh library
//! and the backend seam the frame loop draws through.

pub mod backend;
pub mod buffer;
pub mod material;
pub mod mesh;
pub mod mesh_library;

// Re-export commonly used types
pub use backend::{DrawCommand, DrawRecord, RecordingBackend, RenderBackend};
pub use buffer::{BufferUsage, IndexBuffer, IndexWidth, VertexAttribute, VertexBuffer};
pub use material::{colors, CullMode, Material, MaterialUniform, RenderFlags};
pub use mesh::{Mesh, Topology, Vertex};
pub use mesh_library::{divided_line, Axis, BuiltinMesh, MeshLibrary};
