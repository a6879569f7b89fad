//! Meshing strategy: how a collision shape is turned into triangles
//!
//! Strategies are plain values, usable as part of a cache key. Equality and
//! hashing compare the UV coefficients bit for bit.

use crate::config::ConfigError;
use crate::physics::shape::{ShapeRef, ShapeSubType};
use glam::Vec4;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Tessellation density
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionsOption {
    Low,
    High,
    /// Explicit refinement level; spheres use it as icosphere subdivisions
    Subdivisions(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NormalsOption {
    None,
    /// One normal per triangle; vertices are not shared
    Facet,
    /// Face normals averaged over shared vertices
    Smooth,
    /// Normalized vertex position, for shapes centered on the origin
    Sphere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UvsOption {
    None,
    /// `u = dot(u_coefficients, (p, 1))`, likewise for `v`
    Linear,
    /// Longitude and latitude of the vertex direction, scaled by
    /// `u_coefficients.x` and `v_coefficients.y`
    Spherical,
}

/// Parameters controlling mesh generation for a shape
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MeshingStrategy {
    pub positions: PositionsOption,
    pub normals: NormalsOption,
    pub uvs: UvsOption,
    pub u_coefficients: Vec4,
    pub v_coefficients: Vec4,
}

impl MeshingStrategy {
    pub fn new(positions: PositionsOption, normals: NormalsOption) -> Self {
        Self {
            positions,
            normals,
            uvs: UvsOption::None,
            u_coefficients: Vec4::ZERO,
            v_coefficients: Vec4::ZERO,
        }
    }

    pub fn with_linear_uvs(mut self, u_coefficients: Vec4, v_coefficients: Vec4) -> Self {
        self.uvs = UvsOption::Linear;
        self.u_coefficients = u_coefficients;
        self.v_coefficients = v_coefficients;
        self
    }

    pub fn with_spherical_uvs(mut self, u_scale: f32, v_scale: f32) -> Self {
        self.uvs = UvsOption::Spherical;
        self.u_coefficients = Vec4::new(u_scale, 0.0, 0.0, 0.0);
        self.v_coefficients = Vec4::new(0.0, v_scale, 0.0, 0.0);
        self
    }

    /// Default strategy for visualizing a shape of the given kind
    pub fn for_shape(shape: &ShapeRef, uv_scale: f32) -> Self {
        match shape.sub_type() {
            ShapeSubType::Plane => Self::new(PositionsOption::Low, NormalsOption::Facet)
                .with_linear_uvs(
                    Vec4::new(uv_scale, 0.0, 0.0, 0.0),
                    Vec4::new(0.0, 0.0, uv_scale, 0.0),
                ),
            ShapeSubType::Sphere => Self::new(PositionsOption::Subdivisions(3), NormalsOption::Sphere)
                .with_spherical_uvs(uv_scale, uv_scale),
            ShapeSubType::Capsule | ShapeSubType::Cylinder => {
                Self::new(PositionsOption::Low, NormalsOption::Smooth)
            }
            _ => Self::default(),
        }
    }

    fn float_bits(&self) -> [u32; 8] {
        let u = self.u_coefficients.to_array();
        let v = self.v_coefficients.to_array();
        [u[0], u[1], u[2], u[3], v[0], v[1], v[2], v[3]].map(f32::to_bits)
    }
}

impl Default for MeshingStrategy {
    fn default() -> Self {
        Self::new(PositionsOption::Low, NormalsOption::Facet)
    }
}

impl PartialEq for MeshingStrategy {
    fn eq(&self, other: &Self) -> bool {
        self.positions == other.positions
            && self.normals == other.normals
            && self.uvs == other.uvs
            && self.float_bits() == other.float_bits()
    }
}

impl Eq for MeshingStrategy {}

impl Hash for MeshingStrategy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.positions.hash(state);
        self.normals.hash(state);
        self.uvs.hash(state);
        self.float_bits().hash(state);
    }
}

impl fmt::Display for MeshingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.positions {
            PositionsOption::Low => write!(f, "low")?,
            PositionsOption::High => write!(f, "high")?,
            PositionsOption::Subdivisions(n) => write!(f, "{n}")?,
        }
        write!(f, "/{:?}", self.normals)?;
        if self.uvs != UvsOption::None {
            write!(f, "/{:?}", self.uvs)?;
        }
        Ok(())
    }
}

/// Parses the compact `positions/Normals[/Uvs]` form, e.g. `"low/Facet"`
///
/// UVs parsed this way use unit scale.
impl FromStr for MeshingStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidStrategy(s.to_string());
        let mut parts = s.split('/').map(str::trim);

        let positions = match parts.next().ok_or_else(invalid)?.to_ascii_lowercase().as_str() {
            "low" => PositionsOption::Low,
            "high" => PositionsOption::High,
            n => PositionsOption::Subdivisions(n.parse().map_err(|_| invalid())?),
        };
        let normals = match parts.next().ok_or_else(invalid)?.to_ascii_lowercase().as_str() {
            "none" => NormalsOption::None,
            "facet" => NormalsOption::Facet,
            "smooth" => NormalsOption::Smooth,
            "sphere" => NormalsOption::Sphere,
            _ => return Err(invalid()),
        };
        let strategy = Self::new(positions, normals);
        let strategy = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("none") => strategy,
            Some("linear") => strategy.with_linear_uvs(Vec4::X, Vec4::Y),
            Some("spherical") => strategy.with_spherical_uvs(1.0, 1.0),
            Some(_) => return Err(invalid()),
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::collections::HashSet;

    #[test]
    fn test_parse_compact_form() {
        let strategy: MeshingStrategy = "low/Facet".parse().unwrap();
        assert_eq!(strategy, MeshingStrategy::default());

        let strategy: MeshingStrategy = "high/Smooth/Spherical".parse().unwrap();
        assert_eq!(strategy.positions, PositionsOption::High);
        assert_eq!(strategy.normals, NormalsOption::Smooth);
        assert_eq!(strategy.uvs, UvsOption::Spherical);

        let strategy: MeshingStrategy = "3/Sphere".parse().unwrap();
        assert_eq!(strategy.positions, PositionsOption::Subdivisions(3));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "low", "low/Shiny", "medium/Facet", "low/Facet/Linear/x"] {
            assert!(
                matches!(bad.parse::<MeshingStrategy>(), Err(ConfigError::InvalidStrategy(_))),
                "{bad} should not parse"
            );
        }
    }

    #[test]
    fn test_display_parses_back() {
        let strategy = MeshingStrategy::new(PositionsOption::Subdivisions(2), NormalsOption::Smooth)
            .with_linear_uvs(Vec4::X, Vec4::Y);
        assert_eq!(strategy.to_string(), "2/Smooth/Linear");
        assert_eq!(strategy.to_string().parse::<MeshingStrategy>().unwrap(), strategy);
    }

    #[test]
    fn test_uv_coefficients_affect_equality_and_hash() {
        let a = MeshingStrategy::default().with_linear_uvs(Vec4::X, Vec4::Z);
        let b = MeshingStrategy::default().with_linear_uvs(Vec4::X * 2.0, Vec4::Z);
        assert_ne!(a, b);

        let set: HashSet<_> = [a, a, b].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_default_selection_per_shape() {
        let plane = ShapeRef::plane(Vec3::Y, 0.0, 10.0);
        let strategy = MeshingStrategy::for_shape(&plane, 0.5);
        assert_eq!(strategy.uvs, UvsOption::Linear);
        assert_eq!(strategy.u_coefficients.x, 0.5);
        assert_eq!(strategy.v_coefficients.z, 0.5);

        let sphere = MeshingStrategy::for_shape(&ShapeRef::sphere(1.0), 1.0);
        assert_eq!(sphere.normals, NormalsOption::Sphere);

        let capsule = MeshingStrategy::for_shape(&ShapeRef::capsule(1.0, 0.5), 1.0);
        assert_eq!(capsule, "low/Smooth".parse::<MeshingStrategy>().unwrap());

        let cuboid = MeshingStrategy::for_shape(&ShapeRef::cuboid(Vec3::ONE), 1.0);
        assert_eq!(cuboid, "low/Facet".parse::<MeshingStrategy>().unwrap());
    }
}
