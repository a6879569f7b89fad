//! Weakly-held cache of generated shape meshes
//!
//! The cache never keeps a mesh alive: entries hold [`Weak`] references and
//! geometries hold the strong ones. Once every geometry using a mesh is gone
//! the entry is dead and is dropped by the next [`MeshCache::purge`].

use crate::cache::fingerprint::ShapeFingerprint;
use crate::graphics::mesh::Mesh;
use crate::meshing::{generate_mesh, MeshingError, MeshingStrategy};
use crate::physics::shape::ShapeRef;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Running totals, for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug)]
pub struct MeshCache {
    entries: HashMap<ShapeFingerprint, Weak<Mesh>>,
    stats: CacheStats,
}

impl Default for MeshCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::with_capacity(200),
            stats: CacheStats::default(),
        }
    }

    /// Mesh for `shape` in its current state, generated on a miss
    ///
    /// Returns the fingerprint used as key alongside the mesh so the caller
    /// can detect later changes with [`ShapeFingerprint::matches`].
    pub fn mesh_for(
        &mut self,
        shape: &ShapeRef,
        strategy: &MeshingStrategy,
    ) -> Result<(ShapeFingerprint, Arc<Mesh>), MeshingError> {
        let fingerprint = ShapeFingerprint::new(shape, strategy);
        let mesh = self.mesh_for_fingerprint(shape, &fingerprint)?;
        Ok((fingerprint, mesh))
    }

    /// Mesh for `shape`, keyed by an already computed fingerprint
    pub fn mesh_for_fingerprint(
        &mut self,
        shape: &ShapeRef,
        fingerprint: &ShapeFingerprint,
    ) -> Result<Arc<Mesh>, MeshingError> {
        if let Some(mesh) = self.entries.get(fingerprint).and_then(Weak::upgrade) {
            self.stats.hits += 1;
            trace!(shape_id = %fingerprint.shape_id(), "Mesh cache hit");
            return Ok(mesh);
        }

        let mesh = Arc::new(generate_mesh(shape, fingerprint.strategy())?);
        self.entries
            .insert(fingerprint.clone(), Arc::downgrade(&mesh));
        self.stats.misses += 1;
        debug!(
            shape_id = %fingerprint.shape_id(),
            revision = fingerprint.revision(),
            strategy = %fingerprint.strategy(),
            entries = self.entries.len(),
            "Generated mesh for shape"
        );
        Ok(mesh)
    }

    /// Drop entries whose mesh is no longer referenced; returns how many
    pub fn purge(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, mesh| mesh.strong_count() > 0);
        let evicted = before - self.entries.len();
        self.stats.evictions += evicted as u64;
        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "Purged dead mesh cache entries");
        }
        evicted
    }

    pub fn clear(&mut self) {
        debug!(entries = self.entries.len(), "Clearing mesh cache");
        self.entries.clear();
    }

    /// Number of entries, dead or alive
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries whose mesh is still referenced
    pub fn live_len(&self) -> usize {
        self.entries
            .values()
            .filter(|mesh| mesh.strong_count() > 0)
            .count()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
