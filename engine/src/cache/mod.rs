//! Shape fingerprints and the mesh cache keyed by them

pub mod fingerprint;
pub mod mesh_cache;

pub use fingerprint::ShapeFingerprint;
pub use mesh_cache::{CacheStats, MeshCache};
