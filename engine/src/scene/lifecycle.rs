//! Visible geometry set and pruning of geometries whose entity is gone

use crate::physics::system::PhysicsSystem;
use crate::scene::geometry::{Geometry, GeometryError, GeometryId};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Owns every visible geometry
///
/// Geometries enter through [`make_visible`](Self::make_visible) and leave,
/// hidden, through [`hide`](Self::hide), [`hide_all`](Self::hide_all) or
/// [`prune_removed`](Self::prune_removed). A hidden geometry is handed back to
/// the caller and can never be made visible again.
#[derive(Debug, Default)]
pub struct GeometryRegistry {
    visible: Vec<Geometry>,
    hidden_total: u64,
}

impl GeometryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make_visible(&mut self, mut geometry: Geometry) -> Result<GeometryId, GeometryError> {
        geometry.attach()?;
        let id = geometry.id();
        debug!(geometry = %id, binding = ?geometry.binding(), "Geometry made visible");
        self.visible.push(geometry);
        Ok(id)
    }

    pub fn hide(&mut self, id: GeometryId) -> Option<Geometry> {
        let index = self.visible.iter().position(|g| g.id() == id)?;
        let mut geometry = self.visible.remove(index);
        geometry.detach();
        self.hidden_total += 1;
        debug!(geometry = %id, "Geometry hidden");
        Some(geometry)
    }

    /// Hide every listed geometry in one pass over the visible set
    pub fn hide_all(&mut self, ids: &HashSet<GeometryId>) -> Vec<Geometry> {
        if ids.is_empty() {
            return Vec::new();
        }
        let (mut hidden, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.visible)
            .into_iter()
            .partition(|g| ids.contains(&g.id()));
        self.visible = kept;
        for geometry in &mut hidden {
            geometry.detach();
        }
        self.hidden_total += hidden.len() as u64;
        if !hidden.is_empty() {
            debug!(count = hidden.len(), "Geometries hidden");
        }
        hidden
    }

    /// Hide every geometry whose entity has been removed from `system`
    ///
    /// Removal is detected for all geometries first, then they are hidden as
    /// one batch, so the visible set is never mutated while being scanned.
    pub fn prune_removed<P: PhysicsSystem + ?Sized>(&mut self, system: &P) -> Vec<Geometry> {
        let removed: HashSet<GeometryId> = self
            .visible
            .iter()
            .filter(|g| g.was_removed_from(system))
            .map(Geometry::id)
            .collect();
        trace!(visible = self.visible.len(), removed = removed.len(), "Pruned geometries");
        self.hide_all(&removed)
    }

    /// Hide everything
    pub fn clear(&mut self) -> Vec<Geometry> {
        let ids: HashSet<GeometryId> = self.visible.iter().map(Geometry::id).collect();
        self.hide_all(&ids)
    }

    pub fn get(&self, id: GeometryId) -> Option<&Geometry> {
        self.visible.iter().find(|g| g.id() == id)
    }

    pub fn get_mut(&mut self, id: GeometryId) -> Option<&mut Geometry> {
        self.visible.iter_mut().find(|g| g.id() == id)
    }

    pub fn contains(&self, id: GeometryId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// Total number of geometries hidden so far
    pub fn hidden_total(&self) -> u64 {
        self.hidden_total
    }

    /// Visible geometries in the order they were made visible
    pub fn iter(&self) -> impl Iterator<Item = &Geometry> {
        self.visible.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Geometry> {
        self.visible.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::mesh::{Mesh, Topology};
    use crate::scene::geometry::GeometryState;
    use std::sync::Arc;

    fn floating() -> Geometry {
        Geometry::floating(Arc::new(Mesh::new(Topology::PointList, &[glam::Vec3::ZERO])))
    }

    #[test]
    fn test_make_visible_and_hide() {
        let mut registry = GeometryRegistry::new();
        let id = registry.make_visible(floating()).unwrap();
        assert!(registry.contains(id));
        assert_eq!(registry.len(), 1);

        let hidden = registry.hide(id).unwrap();
        assert_eq!(hidden.state(), GeometryState::Hidden);
        assert!(registry.is_empty());
        assert_eq!(registry.hidden_total(), 1);
        assert!(registry.hide(id).is_none());
    }

    #[test]
    fn test_hidden_geometry_cannot_return() {
        let mut registry = GeometryRegistry::new();
        let id = registry.make_visible(floating()).unwrap();
        let hidden = registry.hide(id).unwrap();

        assert_eq!(registry.make_visible(hidden), Err(GeometryError::Hidden(id)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_hide_all_keeps_order_of_the_rest() {
        let mut registry = GeometryRegistry::new();
        let ids: Vec<_> = (0..5)
            .map(|_| registry.make_visible(floating()).unwrap())
            .collect();

        let hidden = registry.hide_all(&[ids[1], ids[3]].into_iter().collect());

        assert_eq!(hidden.len(), 2);
        let remaining: Vec<_> = registry.iter().map(Geometry::id).collect();
        assert_eq!(remaining, vec![ids[0], ids[2], ids[4]]);
    }

    #[test]
    fn test_clear() {
        let mut registry = GeometryRegistry::new();
        registry.make_visible(floating()).unwrap();
        registry.make_visible(floating()).unwrap();
        assert_eq!(registry.clear().len(), 2);
        assert!(registry.is_empty());
    }
}
