//! Normal and texture-coordinate generation

use crate::meshing::strategy::{MeshingStrategy, NormalsOption, UvsOption};
use crate::meshing::tessellate::TriangleList;
use glam::{Vec2, Vec3};
use std::f32::consts::{PI, TAU};

/// Vertex normals for `list`, or `None` when the strategy asks for none
///
/// Facet normals assume the list has already been unshared.
pub fn normals(list: &TriangleList, option: NormalsOption) -> Option<Vec<Vec3>> {
    match option {
        NormalsOption::None => None,
        NormalsOption::Sphere => Some(list.positions.iter().map(|p| p.normalize_or_zero()).collect()),
        NormalsOption::Facet => {
            let mut normals = vec![Vec3::ZERO; list.positions.len()];
            for t in list.triangles() {
                let n = face_normal(list, t).normalize_or_zero();
                for i in t {
                    normals[i as usize] = n;
                }
            }
            Some(normals)
        }
        NormalsOption::Smooth => {
            let mut sums = vec![Vec3::ZERO; list.positions.len()];
            for t in list.triangles() {
                // area-weighted
                let n = face_normal(list, t);
                for i in t {
                    sums[i as usize] += n;
                }
            }
            Some(sums.into_iter().map(Vec3::normalize_or_zero).collect())
        }
    }
}

fn face_normal(list: &TriangleList, [a, b, c]: [u32; 3]) -> Vec3 {
    let a = list.positions[a as usize];
    let b = list.positions[b as usize];
    let c = list.positions[c as usize];
    (b - a).cross(c - a)
}

/// Texture coordinates for the given positions, or `None` when not requested
pub fn uvs(positions: &[Vec3], strategy: &MeshingStrategy) -> Option<Vec<Vec2>> {
    match strategy.uvs {
        UvsOption::None => None,
        UvsOption::Linear => Some(
            positions
                .iter()
                .map(|p| {
                    let h = p.extend(1.0);
                    Vec2::new(strategy.u_coefficients.dot(h), strategy.v_coefficients.dot(h))
                })
                .collect(),
        ),
        UvsOption::Spherical => Some(
            positions
                .iter()
                .map(|p| {
                    let d = p.normalize_or(Vec3::Y);
                    let longitude = 0.5 + d.z.atan2(d.x) / TAU;
                    let latitude = 0.5 - d.y.clamp(-1.0, 1.0).asin() / PI;
                    Vec2::new(
                        longitude * strategy.u_coefficients.x,
                        latitude * strategy.v_coefficients.y,
                    )
                })
                .collect(),
        ),
    }
}
