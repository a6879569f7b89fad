//! Material and render-state properties of a geometry

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use serde::{Deserialize, Serialize};

/// Named colors used by the visualizer
pub mod colors {
    use glam::Vec4;

    pub const WHITE: Vec4 = Vec4::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);
    pub const GRAY: Vec4 = Vec4::new(0.5, 0.5, 0.5, 1.0);
    pub const RED: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Vec4 = Vec4::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Vec4 = Vec4::new(0.0, 0.0, 1.0, 1.0);
    pub const YELLOW: Vec4 = Vec4::new(1.0, 1.0, 0.0, 1.0);
    pub const MAGENTA: Vec4 = Vec4::new(1.0, 0.0, 1.0, 1.0);
    pub const ORANGE: Vec4 = Vec4::new(1.0, 0.5, 0.0, 1.0);
    pub const BROWN: Vec4 = Vec4::new(0.3, 0.15, 0.0, 1.0);
    pub const PINK: Vec4 = Vec4::new(1.0, 0.5, 0.5, 1.0);
}

/// Surface properties of a geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Base color (RGBA)
    pub base_color: Vec4,
    /// Specular color (RGBA)
    pub specular_color: Vec4,
    /// Fragments with alpha below this are discarded
    pub alpha_discard_threshold: f32,
    /// Point size in pixels, for point meshes
    pub point_size: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: colors::WHITE,
            specular_color: colors::WHITE,
            alpha_discard_threshold: 0.5,
            point_size: 32.0,
        }
    }
}

impl Material {
    pub fn new(base_color: Vec4) -> Self {
        Self {
            base_color,
            ..Default::default()
        }
    }

    /// Create a material from RGB values (alpha = 1.0)
    pub fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(Vec4::new(r, g, b, 1.0))
    }
}

/// Face culling requested by a geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Back,
    Front,
    /// Every triangle is culled; only lines and points remain visible
    FrontAndBack,
}

/// Fixed-function render state of a geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderFlags {
    pub depth_test: bool,
    pub back_culling: bool,
    pub front_culling: bool,
    pub wireframe: bool,
}

impl Default for RenderFlags {
    fn default() -> Self {
        Self {
            depth_test: true,
            back_culling: true,
            front_culling: false,
            wireframe: false,
        }
    }
}

impl RenderFlags {
    pub fn cull_mode(&self) -> CullMode {
        match (self.front_culling, self.back_culling) {
            (false, false) => CullMode::None,
            (false, true) => CullMode::Back,
            (true, false) => CullMode::Front,
            (true, true) => CullMode::FrontAndBack,
        }
    }

    /// The wgpu cull face; `FrontAndBack` has no wgpu equivalent and maps to `None`
    pub fn cull_face(&self) -> Option<wgpu::Face> {
        match self.cull_mode() {
            CullMode::Back => Some(wgpu::Face::Back),
            CullMode::Front => Some(wgpu::Face::Front),
            CullMode::None | CullMode::FrontAndBack => None,
        }
    }

    pub fn polygon_mode(&self) -> wgpu::PolygonMode {
        if self.wireframe {
            wgpu::PolygonMode::Line
        } else {
            wgpu::PolygonMode::Fill
        }
    }
}

/// Material data for GPU uniform buffer
///
/// This struct is aligned for GPU uniform buffer requirements
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MaterialUniform {
    pub base_color: [f32; 4],
    pub specular_color: [f32; 4],
    pub alpha_discard_threshold: f32,
    pub point_size: f32,
    pub _padding: [f32; 2],
}

impl From<&Material> for MaterialUniform {
    fn from(material: &Material) -> Self {
        Self {
            base_color: material.base_color.to_array(),
            specular_color: material.specular_color.to_array(),
            alpha_discard_threshold: material.alpha_discard_threshold,
            point_size: material.point_size,
            _padding: [0.0; 2],
        }
    }
}

impl From<Material> for MaterialUniform {
    fn from(material: Material) -> Self {
        Self::from(&material)
    }
}
