//! Structural fingerprint of a shape as last meshed
//!
//! A fingerprint captures identity, revision and meshing strategy of a shape
//! and, recursively, of its children. Two fingerprints compare equal exactly
//! when a mesh generated for one is valid for the other, which makes them
//! usable as mesh cache keys.

use crate::meshing::MeshingStrategy;
use crate::physics::shape::{ShapeId, ShapeRef};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeFingerprint {
    shape_id: ShapeId,
    revision: u64,
    strategy: MeshingStrategy,
    /// `Some` for compound and decorated shapes, in child order
    children: Option<Vec<ShapeFingerprint>>,
}

impl ShapeFingerprint {
    /// Summarize the current state of `shape`
    pub fn new(shape: &ShapeRef, strategy: &MeshingStrategy) -> Self {
        let children = shape.is_composite().then(|| {
            shape
                .children()
                .iter()
                .map(|child| ShapeFingerprint::new(child, strategy))
                .collect()
        });
        Self {
            shape_id: shape.id(),
            revision: shape.revision(),
            strategy: *strategy,
            children,
        }
    }

    pub fn shape_id(&self) -> ShapeId {
        self.shape_id
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn strategy(&self) -> &MeshingStrategy {
        &self.strategy
    }

    pub fn children(&self) -> Option<&[ShapeFingerprint]> {
        self.children.as_deref()
    }

    /// Whether `shape` is still in the state this fingerprint describes
    ///
    /// # Panics
    ///
    /// If a composite shape with unchanged identity and revision reports a
    /// different number of children. Adding or removing children must bump
    /// the shape's revision.
    pub fn matches(&self, shape: &ShapeRef) -> bool {
        if self.shape_id != shape.id() || self.revision != shape.revision() {
            return false;
        }
        match &self.children {
            None => true,
            Some(summaries) => {
                let children = shape.children();
                assert_eq!(
                    summaries.len(),
                    children.len(),
                    "{} changed its child count without a revision bump",
                    self.shape_id
                );
                summaries
                    .iter()
                    .zip(&children)
                    .all(|(summary, child)| summary.matches(child))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::shape::{CompoundChild, ShapeGeometry};
    use glam::{Quat, Vec3};
    use std::collections::HashSet;

    fn two_box_compound() -> (ShapeRef, ShapeRef) {
        let child = ShapeRef::cuboid(Vec3::ONE);
        let compound = ShapeRef::compound(vec![
            CompoundChild::new(child.clone(), Vec3::X, Quat::IDENTITY),
            CompoundChild::new(ShapeRef::sphere(0.5), -Vec3::X, Quat::IDENTITY),
        ]);
        (compound, child)
    }

    #[test]
    fn test_matches_until_modified() {
        let shape = ShapeRef::sphere(1.0);
        let fingerprint = ShapeFingerprint::new(&shape, &MeshingStrategy::default());
        assert!(fingerprint.matches(&shape));
        assert!(fingerprint.children().is_none());

        shape.modify(|_| ());
        assert!(!fingerprint.matches(&shape));
    }

    #[test]
    fn test_different_shape_never_matches() {
        let a = ShapeRef::sphere(1.0);
        let b = ShapeRef::sphere(1.0);
        let fingerprint = ShapeFingerprint::new(&a, &MeshingStrategy::default());
        assert!(!fingerprint.matches(&b));
    }

    #[test]
    fn test_child_modification_is_detected() {
        let (compound, child) = two_box_compound();
        let fingerprint = ShapeFingerprint::new(&compound, &MeshingStrategy::default());
        assert_eq!(fingerprint.children().map(<[_]>::len), Some(2));
        assert!(fingerprint.matches(&compound));

        child.modify(|g| *g = ShapeGeometry::Box { half_extents: Vec3::splat(2.0) });

        assert_eq!(compound.revision(), 0);
        assert!(!fingerprint.matches(&compound));
        assert_ne!(
            fingerprint,
            ShapeFingerprint::new(&compound, &MeshingStrategy::default())
        );
    }

    #[test]
    fn test_equality_and_hash_are_structural() {
        let (compound, _) = two_box_compound();
        let a = ShapeFingerprint::new(&compound, &MeshingStrategy::default());
        let b = ShapeFingerprint::new(&compound, &MeshingStrategy::default());
        let c = ShapeFingerprint::new(&compound, &"high/Smooth".parse().unwrap());
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    #[should_panic(expected = "changed its child count")]
    fn test_child_count_divergence_is_a_contract_violation() {
        let (compound, _) = two_box_compound();
        let fingerprint = ShapeFingerprint::new(&compound, &MeshingStrategy::default());

        // Bypass `modify` to simulate an edit that skipped the revision bump
        let bogus = ShapeFingerprint {
            children: Some(vec![]),
            ..fingerprint
        };
        bogus.matches(&compound);
    }
}
